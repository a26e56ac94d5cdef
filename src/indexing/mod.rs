//! The lexical side of the engine: a persisted inverted index with Okapi
//! BM25 statistics and top-k search.

mod posting;

pub use posting::PostingList;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Bm25Config;
use crate::dataset::{docmap_from, Document, DocMap};
use crate::error::{RetrievalError, Result};
use crate::persist::{self, artifact_names};
use crate::text::TextPipeline;

/// `doc_id -> (token -> count)`.
pub type TermFrequencyTable = HashMap<u64, HashMap<String, u32>>;
/// `doc_id -> token count`, counted with repetition.
pub type DocLengths = HashMap<u64, u32>;
/// `token -> posting list`.
pub type Postings = HashMap<String, PostingList>;

/// A scored search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub document: Document,
    pub score: f32,
}

/// Build/load/save, corpus statistics, and BM25 scoring over a static
/// document set. Read-only once built; rebuilding means constructing a
/// fresh instance from the full corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvertedIndex {
    postings: Postings,
    docmap: DocMap,
    term_frequencies: TermFrequencyTable,
    doc_lengths: DocLengths,
}

impl InvertedIndex {
    /// Builds the index from the full document set. Document iteration
    /// order becomes posting-list insertion order.
    pub fn build(documents: &[Document], pipeline: &TextPipeline) -> Self {
        let docmap = docmap_from(documents);
        let mut postings: Postings = HashMap::new();
        let mut term_frequencies: TermFrequencyTable = HashMap::new();
        let mut doc_lengths: DocLengths = HashMap::new();

        for doc in documents {
            let text = format!("{} {}", doc.title, doc.description);
            let tokens = pipeline.normalize(&text);
            doc_lengths.insert(doc.id, tokens.len() as u32);

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *counts.entry(token.clone()).or_insert(0) += 1;
            }

            // Posting lists get one entry per document, de-duplicated via
            // the keys of the per-doc count map rather than via the raw
            // token stream.
            for token in counts.keys() {
                postings
                    .entry(token.clone())
                    .or_insert_with(PostingList::new)
                    .push(doc.id);
            }
            term_frequencies.insert(doc.id, counts);
        }

        InvertedIndex {
            postings,
            docmap,
            term_frequencies,
            doc_lengths,
        }
    }

    pub fn document_count(&self) -> usize {
        self.docmap.len()
    }

    pub fn average_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: u64 = self.doc_lengths.values().map(|&l| l as u64).sum();
        total as f32 / self.doc_lengths.len() as f32
    }

    /// Tokenizes `term`; requires exactly one resulting token.
    fn single_token(term: &str, pipeline: &TextPipeline) -> Result<String> {
        let tokens = pipeline.normalize(term);
        if tokens.len() != 1 {
            return Err(RetrievalError::BadTerm(term.to_string()));
        }
        Ok(tokens.into_iter().next().unwrap())
    }

    pub fn get_documents(&self, term: &str, pipeline: &TextPipeline) -> Result<Vec<u64>> {
        let token = Self::single_token(term, pipeline)?;
        Ok(self
            .postings
            .get(&token)
            .map(|p| p.as_slice().to_vec())
            .unwrap_or_default())
    }

    pub fn get_tf(&self, doc_id: u64, term: &str, pipeline: &TextPipeline) -> Result<u32> {
        let token = Self::single_token(term, pipeline)?;
        let counts = self
            .term_frequencies
            .get(&doc_id)
            .ok_or(RetrievalError::UnknownDocument(doc_id))?;
        Ok(*counts.get(&token).unwrap_or(&0))
    }

    /// `ln((N + 1) / (df + 1))`, smoothed, always positive.
    pub fn get_idf(&self, term: &str, pipeline: &TextPipeline) -> Result<f32> {
        let token = Self::single_token(term, pipeline)?;
        let n = self.document_count() as f32;
        let df = self.postings.get(&token).map(|p| p.len()).unwrap_or(0) as f32;
        Ok(((n + 1.0) / (df + 1.0)).ln())
    }

    /// `ln(((N - df + 0.5) / (df + 0.5)) + 1)`, Lucene-style BM25 IDF.
    pub fn get_bm25_idf(&self, term: &str, pipeline: &TextPipeline) -> Result<f32> {
        let token = Self::single_token(term, pipeline)?;
        let n = self.document_count() as f32;
        let df = self.postings.get(&token).map(|p| p.len()).unwrap_or(0) as f32;
        Ok((((n - df + 0.5) / (df + 0.5)) + 1.0).ln())
    }

    pub fn get_tfidf(&self, doc_id: u64, term: &str, pipeline: &TextPipeline) -> Result<f32> {
        let tf = self.get_tf(doc_id, term, pipeline)? as f32;
        let idf = self.get_idf(term, pipeline)?;
        Ok(tf * idf)
    }

    /// `tf * (k1 + 1) / (tf + k1 * (1 - b + b * dl / adl))`. `dl / adl` is
    /// treated as 1 when `adl == 0` (empty corpus).
    pub fn get_bm25_tf(
        &self,
        doc_id: u64,
        term: &str,
        pipeline: &TextPipeline,
        config: Bm25Config,
    ) -> Result<f32> {
        let tf = self.get_tf(doc_id, term, pipeline)? as f32;
        let dl = *self
            .doc_lengths
            .get(&doc_id)
            .ok_or(RetrievalError::UnknownDocument(doc_id))? as f32;
        let adl = self.average_doc_length();
        let length_ratio = if adl == 0.0 { 1.0 } else { dl / adl };
        let norm = 1.0 - config.b + config.b * length_ratio;
        Ok(tf * (config.k1 + 1.0) / (tf + config.k1 * norm))
    }

    pub fn bm25(
        &self,
        doc_id: u64,
        term: &str,
        pipeline: &TextPipeline,
        config: Bm25Config,
    ) -> Result<f32> {
        let bm25_tf = self.get_bm25_tf(doc_id, term, pipeline, config)?;
        let bm25_idf = self.get_bm25_idf(term, pipeline)?;
        Ok(bm25_tf * bm25_idf)
    }

    /// Top-`limit` BM25 search. Queries with no recognized tokens return
    /// an empty list. Ties broken by ascending `doc_id`.
    pub fn bm25_search(
        &self,
        query: &str,
        limit: usize,
        pipeline: &TextPipeline,
        config: Bm25Config,
    ) -> Vec<Scored> {
        let tokens = pipeline.normalize(query);
        let mut scores: HashMap<u64, f32> = HashMap::new();

        for token in &tokens {
            let Some(posting) = self.postings.get(token) else {
                continue;
            };
            let bm25_idf = {
                let n = self.document_count() as f32;
                let df = posting.len() as f32;
                (((n - df + 0.5) / (df + 0.5)) + 1.0).ln()
            };
            for &doc_id in posting.as_slice() {
                let tf = self
                    .term_frequencies
                    .get(&doc_id)
                    .and_then(|counts| counts.get(token))
                    .copied()
                    .unwrap_or(0) as f32;
                let dl = *self.doc_lengths.get(&doc_id).unwrap_or(&0) as f32;
                let adl = self.average_doc_length();
                let length_ratio = if adl == 0.0 { 1.0 } else { dl / adl };
                let norm = 1.0 - config.b + config.b * length_ratio;
                let bm25_tf = tf * (config.k1 + 1.0) / (tf + config.k1 * norm);
                *scores.entry(doc_id).or_insert(0.0) += bm25_tf * bm25_idf;
            }
        }

        let mut ranked: Vec<(u64, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
            .into_iter()
            .take(limit)
            .filter_map(|(doc_id, score)| {
                self.docmap.get(&doc_id).map(|doc| Scored {
                    document: doc.clone(),
                    score,
                })
            })
            .collect()
    }

    /// The weak, non-ranked `search` diagnostic: unions the posting lists
    /// of every query token in token order, capping at `limit` once
    /// reached. Not deduplicated beyond natural posting-list membership,
    /// not scored.
    pub fn search_command(&self, query: &str, limit: usize, pipeline: &TextPipeline) -> Vec<Document> {
        let tokens = pipeline.normalize(query);
        let mut ids: Vec<u64> = Vec::new();
        for token in &tokens {
            if let Some(posting) = self.postings.get(token) {
                ids.extend(posting.as_slice());
                if ids.len() >= limit {
                    break;
                }
            }
        }
        ids.into_iter()
            .take(limit)
            .filter_map(|id| self.docmap.get(&id).cloned())
            .collect()
    }

    pub fn docmap(&self) -> &DocMap {
        &self.docmap
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        persist::write_atomic(dir, artifact_names::POSTINGS, &self.postings)?;
        persist::write_atomic(dir, artifact_names::DOCMAP, &self.docmap)?;
        persist::write_atomic(
            dir,
            artifact_names::TERM_FREQUENCIES,
            &self.term_frequencies,
        )?;
        persist::write_atomic(dir, artifact_names::DOC_LENGTHS, &self.doc_lengths)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        Ok(InvertedIndex {
            postings: persist::read_artifact(dir, artifact_names::POSTINGS)?,
            docmap: persist::read_artifact(dir, artifact_names::DOCMAP)?,
            term_frequencies: persist::read_artifact(dir, artifact_names::TERM_FREQUENCIES)?,
            doc_lengths: persist::read_artifact(dir, artifact_names::DOC_LENGTHS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pipeline() -> TextPipeline {
        TextPipeline::new(HashSet::new())
    }

    fn sample_documents() -> Vec<Document> {
        vec![
            Document { id: 1, title: "Brave".into(), description: "A princess with a bow.".into() },
            Document { id: 2, title: "Merida".into(), description: "Scottish archer heroine.".into() },
            Document { id: 3, title: "Up".into(), description: "An old man and his balloons.".into() },
        ]
    }

    #[test]
    fn length_consistency_invariant() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        for (doc_id, length) in &index.doc_lengths {
            let counted: u32 = index.term_frequencies[doc_id].values().sum();
            assert_eq!(counted, *length);
        }
    }

    #[test]
    fn posting_completeness_invariant() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        for (token, posting) in &index.postings {
            for &doc_id in posting.as_slice() {
                let tf = index.term_frequencies[&doc_id].get(token).copied().unwrap_or(0);
                assert!(tf > 0);
            }
        }
    }

    #[test]
    fn s1_lexical_only_search_command() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        let results = index.search_command("merida", 5, &p);
        assert_eq!(results[0].title, "Merida");
    }

    #[test]
    fn unknown_doc_is_an_error() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        assert!(matches!(
            index.get_tf(999, "bear", &p),
            Err(RetrievalError::UnknownDocument(999))
        ));
    }

    #[test]
    fn multi_token_term_is_bad_term() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        assert!(matches!(
            index.get_documents("two words", &p),
            Err(RetrievalError::BadTerm(_))
        ));
    }

    #[test]
    fn s2_bm25_ranks_shorter_document_higher_for_equal_term_density() {
        let p = pipeline();
        let long_desc = format!("{} filler", "bear ".repeat(3)).repeat(1) + &" word".repeat(94);
        let short_desc = "bear word word word word word word word word word".to_string();
        let docs = vec![
            Document { id: 1, title: "Long".into(), description: long_desc },
            Document { id: 2, title: "Short".into(), description: short_desc },
        ];
        let index = InvertedIndex::build(&docs, &p);
        let config = Bm25Config::default();
        let results = index.bm25_search("bear", 2, &p, config);
        assert_eq!(results[0].document.title, "Short");
    }

    #[test]
    fn bm25_search_with_no_recognized_tokens_is_empty() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        let results = index.bm25_search("zzzznotaword", 5, &p, Bm25Config::default());
        assert!(results.is_empty());
    }

    #[test]
    fn save_and_load_round_trips() {
        let p = pipeline();
        let index = InvertedIndex::build(&sample_documents(), &p);
        let dir = tempfile::tempdir().unwrap();
        index.save(dir.path()).unwrap();
        let loaded = InvertedIndex::load(dir.path()).unwrap();
        assert_eq!(index.postings, loaded.postings);
        assert_eq!(index.docmap, loaded.docmap);
        assert_eq!(index.term_frequencies, loaded.term_frequencies);
        assert_eq!(index.doc_lengths, loaded.doc_lengths);
    }

    #[test]
    fn missing_artifact_reports_cache_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = InvertedIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, RetrievalError::CacheMissing(_)));
    }
}
