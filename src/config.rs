//! Retrieval configuration.
//!
//! Groups the tunable constants of each scorer so they can be overridden
//! from the CLI or a config file instead of being scattered through the
//! index implementations as bare literals.

use serde::{Deserialize, Serialize};

/// Okapi BM25 tuning parameters.
///
/// - `k1` controls term-frequency saturation (higher = TF keeps mattering
///   at higher counts).
/// - `b` controls document-length normalization (0 = none, 1 = full).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Config {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Config {
    /// Classic Robertson/Sparck-Jones defaults, as used by most search
    /// engines out of the box.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Disables length normalization entirely (`b = 0`), useful when
    /// documents are already near-uniform in length.
    pub fn without_length_norm(self) -> Self {
        Bm25Config { b: 0.0, ..self }
    }
}

/// Sentence-chunking parameters for the chunked semantic index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum number of sentences per chunk.
    pub chunk_size: usize,
    /// Number of sentences a new chunk repeats from the tail of the
    /// previous one.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            chunk_size: 4,
            overlap: 1,
        }
    }
}

/// Score-fusion parameters shared by the weighted and RRF rankers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weight given to the BM25 score in weighted fusion; `1 - alpha` goes
    /// to the semantic score.
    pub alpha: f32,
    /// RRF rank-damping constant.
    pub rrf_k: f32,
    /// How many candidates each underlying searcher is asked for before
    /// fusion and truncation to `limit`.
    pub overfetch_factor: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            alpha: 0.5,
            rrf_k: 60.0,
            overfetch_factor: 500,
        }
    }
}

/// Embedding model identity, recorded in the persisted cache fingerprint
/// so a stale cache built against a different model is never silently
/// reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            model_name: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
        }
    }
}

/// Top-level configuration bundle passed down into the index and ranker
/// constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub bm25: Bm25Config,
    pub chunk: ChunkConfig,
    pub fusion: FusionConfig,
    pub embedding: EmbeddingConfig,
    /// Default result count for search subcommands that don't specify
    /// `--limit` explicitly.
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            bm25: Bm25Config::default(),
            chunk: ChunkConfig::default(),
            fusion: FusionConfig::default(),
            embedding: EmbeddingConfig::default(),
            default_limit: 5,
        }
    }
}

impl RetrievalConfig {
    /// Wider result windows and a neutral fusion weight, suited to running
    /// the evaluator over a golden dataset.
    pub fn for_evaluation() -> Self {
        RetrievalConfig {
            default_limit: 10,
            ..Self::default()
        }
    }

    /// Small, deterministic settings for unit tests: tiny overfetch factor
    /// so fixture corpora of a handful of documents still exercise fusion.
    pub fn for_testing() -> Self {
        RetrievalConfig {
            fusion: FusionConfig {
                overfetch_factor: 50,
                ..FusionConfig::default()
            },
            default_limit: 5,
            ..Self::default()
        }
    }
}
