//! Whole-document semantic index: one embedding per document (no
//! chunking), embedding `"{title}: {description}"`. Supplements the
//! chunked index as the simpler baseline behind the `embed-text` /
//! `embedquery` / `search` (whole-doc) / `verify` / `verify-embeddings`
//! CLI diagnostics.

use std::path::Path;

use rayon::prelude::*;

use crate::config::EmbeddingConfig;
use crate::dataset::{docmap_from, Document, DocMap};
use crate::distance::cosine_similarity;
use crate::embed::Embedder;
use crate::error::Result;
use crate::persist::{self, artifact_names, CacheFingerprint};

#[derive(Debug, Clone, PartialEq)]
pub struct DocScored {
    pub document: Document,
    pub score: f32,
}

pub struct DocumentSemanticIndex {
    docmap: DocMap,
    doc_ids: Vec<u64>,
    embeddings: Vec<Vec<f32>>,
}

impl DocumentSemanticIndex {
    pub fn build(documents: &[Document], embedder: &dyn Embedder) -> Result<Self> {
        let docmap = docmap_from(documents);
        let mut doc_ids = Vec::new();
        let mut texts = Vec::new();
        for doc in documents {
            if doc.description.trim().is_empty() {
                continue;
            }
            doc_ids.push(doc.id);
            texts.push(format!("{}: {}", doc.title, doc.description));
        }
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.encode(&texts)?
        };
        Ok(DocumentSemanticIndex {
            docmap,
            doc_ids,
            embeddings,
        })
    }

    /// Loads the cached whole-document embeddings if the basic
    /// `len(documents) == len(embeddings)` consistency check (the one
    /// check the original baseline did perform) and the model fingerprint
    /// both hold; otherwise rebuilds.
    pub fn load_or_build(
        dir: &Path,
        documents: &[Document],
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        let docmap = docmap_from(documents);
        let expected_fingerprint = CacheFingerprint::compute(documents, embedder.model_name());

        if persist::artifact_exists(dir, artifact_names::DOC_EMBEDDINGS) {
            let stored_fingerprint: Result<CacheFingerprint> =
                persist::read_artifact(dir, artifact_names::DOC_EMBEDDINGS_FINGERPRINT);
            if stored_fingerprint.ok().as_ref() == Some(&expected_fingerprint) {
                let stored: StoredDocEmbeddings =
                    persist::read_artifact(dir, artifact_names::DOC_EMBEDDINGS)?;
                if stored.doc_ids.len() == stored.embeddings.len() {
                    return Ok(DocumentSemanticIndex {
                        docmap,
                        doc_ids: stored.doc_ids,
                        embeddings: stored.embeddings,
                    });
                }
            }
        }

        let built = Self::build(documents, embedder)?;
        built.save(dir, documents, embedder)?;
        Ok(built)
    }

    pub fn save(&self, dir: &Path, documents: &[Document], embedder: &dyn Embedder) -> Result<()> {
        let stored = StoredDocEmbeddings {
            doc_ids: self.doc_ids.clone(),
            embeddings: self.embeddings.clone(),
        };
        persist::write_atomic(dir, artifact_names::DOC_EMBEDDINGS, &stored)?;
        let fingerprint = CacheFingerprint::compute(documents, embedder.model_name());
        persist::write_atomic(dir, artifact_names::DOC_EMBEDDINGS_FINGERPRINT, &fingerprint)
    }

    pub fn search(&self, query: &str, limit: usize, embedder: &dyn Embedder) -> Result<Vec<DocScored>> {
        if self.embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = embedder.encode_one(query)?;
        let mut ranked: Vec<(u64, f32)> = self
            .doc_ids
            .par_iter()
            .zip(self.embeddings.par_iter())
            .map(|(&id, row)| (id, cosine_similarity(&query_vector, row)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(ranked
            .into_iter()
            .take(limit)
            .filter_map(|(id, score)| {
                self.docmap.get(&id).map(|doc| DocScored {
                    document: doc.clone(),
                    score,
                })
            })
            .collect())
    }

    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }

    pub fn dimensions(&self, config: &EmbeddingConfig) -> usize {
        self.embeddings.first().map(Vec::len).unwrap_or(config.dimensions)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredDocEmbeddings {
    doc_ids: Vec<u64>,
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn docs() -> Vec<Document> {
        vec![
            Document { id: 1, title: "Brave".into(), description: "A princess with a bow.".into() },
            Document { id: 2, title: "Empty".into(), description: "".into() },
        ]
    }

    #[test]
    fn skips_documents_with_empty_description() {
        let embedder = HashEmbedder::new(16);
        let index = DocumentSemanticIndex::build(&docs(), &embedder).unwrap();
        assert_eq!(index.embedding_count(), 1);
    }

    #[test]
    fn search_returns_closest_document() {
        let embedder = HashEmbedder::new(16);
        let index = DocumentSemanticIndex::build(&docs(), &embedder).unwrap();
        let results = index.search("princess bow", 5, &embedder).unwrap();
        assert_eq!(results[0].document.title, "Brave");
    }

    #[test]
    fn round_trips_through_persistence() {
        let embedder = HashEmbedder::new(16);
        let index = DocumentSemanticIndex::build(&docs(), &embedder).unwrap();
        let dir = tempfile::tempdir().unwrap();
        index.save(dir.path(), &docs(), &embedder).unwrap();
        let reloaded = DocumentSemanticIndex::load_or_build(dir.path(), &docs(), &embedder).unwrap();
        assert_eq!(reloaded.embedding_count(), index.embedding_count());
    }
}
