//! The Embedder boundary: a deterministic, batch-oriented string-to-vector
//! capability. The model itself is an external collaborator; this module
//! owns only the trait contract and the implementations that satisfy it.

#[cfg(feature = "fastembed-embedder")]
mod fastembed_backed;
mod hash_embedder;

#[cfg(feature = "fastembed-embedder")]
pub use fastembed_backed::FastEmbedEmbedder;
pub use hash_embedder::HashEmbedder;

use crate::error::Result;

/// `encode(texts) -> N x D` matrix, preserving input order. `D` is fixed
/// for a given model. Callers must filter empty strings before calling —
/// `encode(&[""])` is undefined by contract, so implementations are free
/// to return whatever they want for an empty string, including garbage;
/// the `EmptyText` check belongs to the caller.
pub trait Embedder: Send + Sync {
    /// Embeds a batch of non-empty strings, returning one row per input in
    /// the same order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single query string. Default implementation delegates to
    /// `encode`; callers needing to embed one query at a time (as opposed
    /// to batching document chunks) go through this entrypoint so the
    /// `EmptyText` check always applies uniformly.
    fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(crate::error::RetrievalError::EmptyText);
        }
        let mut rows = self.encode(std::slice::from_ref(&text.to_string()))?;
        Ok(rows.pop().unwrap_or_default())
    }

    /// Fixed output dimensionality for this model.
    fn dimensions(&self) -> usize;

    /// Model identifier, recorded in cache fingerprints.
    fn model_name(&self) -> &str;
}
