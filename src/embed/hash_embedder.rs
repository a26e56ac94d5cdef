//! Deterministic, model-free embedder used as the crate's default: no
//! network access, no multi-hundred-megabyte model weights, no GPU. It
//! produces vectors that are stable for a given input string and model
//! name, which is all the trait contract actually requires — it is not
//! semantically meaningful and should not be used to judge ranking
//! quality, only to exercise the chunking/caching/scoring machinery
//! around an embedder.

use ahash::AHasher;
use std::hash::{Hash, Hasher};

use super::Embedder;
use crate::error::Result;

pub struct HashEmbedder {
    dimensions: usize,
    model_name: String,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        HashEmbedder {
            dimensions,
            model_name: format!("hash-embedder-{dimensions}d"),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, word) in text.split_whitespace().enumerate() {
            let mut hasher = AHasher::default();
            word.hash(&mut hasher);
            (i as u64).hash(&mut hasher);
            let h = hasher.finish();
            let slot = (h as usize) % self.dimensions;
            let sign = if h & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        HashEmbedder::new(384)
    }
}

impl Embedder for HashEmbedder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_input() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.encode(&["a running bear".to_string()]).unwrap();
        let b = embedder.encode(&["a running bear".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn preserves_batch_order() {
        let embedder = HashEmbedder::new(16);
        let rows = embedder
            .encode(&["first".to_string(), "second".to_string()])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0], rows[1]);
    }

    #[test]
    fn encode_one_rejects_empty_text() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.encode_one("   ").is_err());
    }
}
