//! Dense-vector retrieval: sentence chunking, the chunked semantic index
//! built on top of it, and the simpler whole-document semantic index.

pub mod chunk;
pub mod chunked_index;
pub mod doc_index;

pub use chunk::{semantic_chunk, semantic_chunk_strings, word_chunk};
pub use chunked_index::{ChunkMetadataEntry, ChunkedScored, ChunkedSemanticIndex};
pub use doc_index::{DocScored, DocumentSemanticIndex};
