//! Chunked semantic index: sentence-chunks each document's description,
//! embeds the flat chunk list once, and answers queries by per-document
//! best-chunk cosine similarity.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ChunkConfig;
use crate::dataset::{docmap_from, Document, DocMap};
use crate::distance::cosine_similarity;
use crate::embed::Embedder;
use crate::error::{RetrievalError, Result};
use crate::persist::{self, artifact_names, CacheFingerprint};

use super::chunk::semantic_chunk_strings;

/// One entry per row of the chunk-embedding matrix; identifies the
/// originating document and the chunk's position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadataEntry {
    pub doc_index: u32,
    pub chunk_index_within_doc: u32,
    pub total_chunks_in_doc: u32,
}

/// A scored chunked-search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedScored {
    pub document: Document,
    pub best_chunk_score: f32,
}

pub struct ChunkedSemanticIndex {
    docmap: DocMap,
    /// `doc_index -> doc_id`, parallel to how chunk metadata addresses
    /// documents (by position in the build-time document list, not by id).
    doc_ids_by_index: Vec<u64>,
    metadata: Vec<ChunkMetadataEntry>,
    embeddings: Vec<Vec<f32>>,
}

impl ChunkedSemanticIndex {
    /// Builds chunk embeddings for every document with a non-empty
    /// description. Documents with an empty description contribute no
    /// rows but remain addressable via `docmap`.
    pub fn build(
        documents: &[Document],
        config: ChunkConfig,
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        let docmap = docmap_from(documents);
        let mut doc_ids_by_index = Vec::new();
        let mut metadata = Vec::new();
        let mut flat_chunks: Vec<String> = Vec::new();

        for doc in documents {
            if doc.description.trim().is_empty() {
                continue;
            }
            let chunks = semantic_chunk_strings(&doc.description, config.chunk_size, config.overlap);
            if chunks.is_empty() {
                continue;
            }
            let doc_index = doc_ids_by_index.len() as u32;
            doc_ids_by_index.push(doc.id);
            let total = chunks.len() as u32;
            for (chunk_index, chunk_text) in chunks.into_iter().enumerate() {
                metadata.push(ChunkMetadataEntry {
                    doc_index,
                    chunk_index_within_doc: chunk_index as u32,
                    total_chunks_in_doc: total,
                });
                flat_chunks.push(chunk_text);
            }
        }

        let embeddings = if flat_chunks.is_empty() {
            Vec::new()
        } else {
            embedder.encode(&flat_chunks)?
        };

        Ok(ChunkedSemanticIndex {
            docmap,
            doc_ids_by_index,
            metadata,
            embeddings,
        })
    }

    /// Loads the cached chunk index if present and fingerprint-compatible
    /// with `documents`/`embedder`; otherwise rebuilds and persists.
    pub fn load_or_build(
        dir: &Path,
        documents: &[Document],
        config: ChunkConfig,
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        let docmap = docmap_from(documents);
        let expected_fingerprint = CacheFingerprint::compute(documents, embedder.model_name());

        let have_both = persist::artifact_exists(dir, artifact_names::CHUNK_EMBEDDINGS)
            && persist::artifact_exists(dir, artifact_names::CHUNK_METADATA);

        if have_both {
            let stored_fingerprint: Result<CacheFingerprint> =
                persist::read_artifact(dir, artifact_names::CHUNK_FINGERPRINT);
            if stored_fingerprint.ok().as_ref() == Some(&expected_fingerprint) {
                let embeddings: Vec<Vec<f32>> =
                    persist::read_artifact(dir, artifact_names::CHUNK_EMBEDDINGS)?;
                let stored: StoredChunkMetadata =
                    persist::read_artifact(dir, artifact_names::CHUNK_METADATA)?;
                return Ok(ChunkedSemanticIndex {
                    docmap,
                    doc_ids_by_index: stored.doc_ids_by_index,
                    metadata: stored.entries,
                    embeddings,
                });
            }
            log::warn!("chunk cache fingerprint mismatch at {:?}, rebuilding", dir);
        }

        let built = Self::build(documents, config, embedder)?;
        built.save(dir)?;
        Ok(built)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        persist::write_atomic(dir, artifact_names::CHUNK_EMBEDDINGS, &self.embeddings)?;
        let stored = StoredChunkMetadata {
            doc_ids_by_index: self.doc_ids_by_index.clone(),
            entries: self.metadata.clone(),
        };
        persist::write_atomic(dir, artifact_names::CHUNK_METADATA, &stored)?;
        Ok(())
    }

    /// Persists a fingerprint alongside the chunk artifacts so a future
    /// load can detect a stale cache. Separate from `save` because the
    /// fingerprint depends on the embedder identity, which `build` alone
    /// doesn't need to know about beyond calling `encode`.
    pub fn save_fingerprint(&self, dir: &Path, documents: &[Document], embedder: &dyn Embedder) -> Result<()> {
        let fingerprint = CacheFingerprint::compute(documents, embedder.model_name());
        persist::write_atomic(dir, artifact_names::CHUNK_FINGERPRINT, &fingerprint)
    }

    /// Embeds `query` and returns the top-`limit` documents by best-chunk
    /// cosine similarity.
    pub fn search_chunks(
        &self,
        query: &str,
        limit: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<ChunkedScored>> {
        if self.embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = embedder.encode_one(query)?;

        // Chunk scoring is an embarrassingly parallel linear scan over every
        // row, so it's handed to rayon rather than walked on one thread —
        // the same data-parallel treatment this codebase gives any
        // per-row distance computation over a whole matrix.
        let row_scores: Vec<(u32, f32)> = self
            .embeddings
            .par_iter()
            .zip(self.metadata.par_iter())
            .map(|(row, meta)| (meta.doc_index, cosine_similarity(&query_vector, row)))
            .collect();

        let mut best_per_doc: HashMap<u32, f32> = HashMap::new();
        for (doc_index, score) in row_scores {
            best_per_doc
                .entry(doc_index)
                .and_modify(|best| {
                    if score > *best {
                        *best = score;
                    }
                })
                .or_insert(score);
        }

        let mut ranked: Vec<(u32, f32)> = best_per_doc.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let id_a = self.doc_ids_by_index.get(a.0 as usize).copied().unwrap_or(u64::MAX);
                    let id_b = self.doc_ids_by_index.get(b.0 as usize).copied().unwrap_or(u64::MAX);
                    id_a.cmp(&id_b)
                })
        });

        Ok(ranked
            .into_iter()
            .take(limit)
            .filter_map(|(doc_index, score)| {
                let doc_id = self.doc_ids_by_index.get(doc_index as usize)?;
                let document = self.docmap.get(doc_id)?.clone();
                Some(ChunkedScored {
                    document,
                    best_chunk_score: score,
                })
            })
            .collect())
    }

    pub fn row_count(&self) -> usize {
        self.metadata.len()
    }

    /// Returns `(doc_id, score)` candidates for an over-fetched pool, used
    /// by the hybrid ranker.
    pub fn search_chunks_ranked(
        &self,
        query: &str,
        limit: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<(u64, f32)>> {
        Ok(self
            .search_chunks(query, limit, embedder)?
            .into_iter()
            .map(|hit| (hit.document.id, hit.best_chunk_score))
            .collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunkMetadata {
    doc_ids_by_index: Vec<u64>,
    entries: Vec<ChunkMetadataEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn docs() -> Vec<Document> {
        vec![
            Document {
                id: 1,
                title: "Brave".into(),
                description: "A princess with a bow. She fights a bear. The forest is old.".into(),
            },
            Document {
                id: 2,
                title: "Empty".into(),
                description: "".into(),
            },
        ]
    }

    #[test]
    fn chunk_metadata_length_matches_matrix_rows() {
        let embedder = HashEmbedder::new(16);
        let index = ChunkedSemanticIndex::build(&docs(), ChunkConfig::default(), &embedder).unwrap();
        assert_eq!(index.metadata.len(), index.embeddings.len());
    }

    #[test]
    fn empty_description_contributes_no_rows() {
        let embedder = HashEmbedder::new(16);
        let index = ChunkedSemanticIndex::build(&docs(), ChunkConfig::default(), &embedder).unwrap();
        assert!(index.metadata.iter().all(|m| {
            let doc_id = index.doc_ids_by_index[m.doc_index as usize];
            doc_id != 2
        }));
    }

    #[test]
    fn search_chunks_returns_matching_document() {
        let embedder = HashEmbedder::new(16);
        let index = ChunkedSemanticIndex::build(&docs(), ChunkConfig::default(), &embedder).unwrap();
        let results = index.search_chunks("bear forest", 5, &embedder).unwrap();
        assert_eq!(results[0].document.title, "Brave");
    }

    #[test]
    fn round_trips_through_persistence() {
        let embedder = HashEmbedder::new(16);
        let index = ChunkedSemanticIndex::build(&docs(), ChunkConfig::default(), &embedder).unwrap();
        let dir = tempfile::tempdir().unwrap();
        index.save(dir.path()).unwrap();
        index.save_fingerprint(dir.path(), &docs(), &embedder).unwrap();

        let reloaded =
            ChunkedSemanticIndex::load_or_build(dir.path(), &docs(), ChunkConfig::default(), &embedder)
                .unwrap();
        assert_eq!(reloaded.metadata.len(), index.metadata.len());
    }

    #[test]
    fn stale_fingerprint_triggers_rebuild() {
        let embedder = HashEmbedder::new(16);
        let index = ChunkedSemanticIndex::build(&docs(), ChunkConfig::default(), &embedder).unwrap();
        let dir = tempfile::tempdir().unwrap();
        index.save(dir.path()).unwrap();
        // No fingerprint written: load_or_build must treat this as absent
        // and rebuild rather than trusting the stale artifacts.
        let mut other_docs = docs();
        other_docs.push(Document { id: 3, title: "New".into(), description: "Fresh text. More text.".into() });
        let rebuilt =
            ChunkedSemanticIndex::load_or_build(dir.path(), &other_docs, ChunkConfig::default(), &embedder)
                .unwrap();
        assert!(rebuilt.doc_ids_by_index.contains(&3));
    }
}
