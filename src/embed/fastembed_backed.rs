//! On-device sentence embeddings backed by the `fastembed` crate, matching
//! the default model named throughout this crate's configuration
//! (`all-MiniLM-L6-v2`, 384 dimensions). Gated behind the
//! `fastembed-embedder` feature so the default build doesn't pull in ONNX
//! runtime and model weights.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::Embedder;
use crate::error::{RetrievalError, Result};

pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
    dimensions: usize,
    model_name: String,
}

impl FastEmbedEmbedder {
    pub fn try_new() -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| RetrievalError::ExternalFailure(e.to_string()))?;
        Ok(FastEmbedEmbedder {
            model: Mutex::new(model),
            dimensions: 384,
            model_name: "all-MiniLM-L6-v2".to_string(),
        })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.model
            .lock()
            .embed(borrowed, None)
            .map_err(|e| RetrievalError::ExternalFailure(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
