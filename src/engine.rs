//! Top-level orchestration: owns the loaded lexical and semantic indexes
//! and exposes one method per operation the CLI dispatches to. The CLI
//! itself stays a thin argument-parsing layer; this is where build/query
//! control flow actually lives.

use std::path::PathBuf;

use crate::config::RetrievalConfig;
use crate::dataset::{self, Document};
use crate::embed::Embedder;
use crate::error::Result;
use crate::eval::{evaluate, EvaluationSummary};
use crate::hybrid::enhance::EnhanceMode;
use crate::hybrid::rerank::{RerankMethod, Reranker};
use crate::hybrid::{HybridRanker, HybridScored, RrfScored, Searcher};
use crate::indexing::{InvertedIndex, Scored};
use crate::persist;
use crate::semantic::{semantic_chunk, word_chunk, ChunkedScored, ChunkedSemanticIndex, DocScored, DocumentSemanticIndex};
use crate::text::TextPipeline;

pub struct Engine {
    base_dir: PathBuf,
    config: RetrievalConfig,
    pipeline: TextPipeline,
    embedder: Box<dyn Embedder>,
    inverted: InvertedIndex,
    chunked: ChunkedSemanticIndex,
    whole_doc: Option<DocumentSemanticIndex>,
}

impl Engine {
    fn cache_dir(&self) -> PathBuf {
        persist::cache_dir(&self.base_dir)
    }

    /// Builds both indexes from scratch and persists them.
    pub fn build(
        base_dir: impl Into<PathBuf>,
        documents: &[Document],
        stopword_text: &str,
        config: RetrievalConfig,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        let pipeline = TextPipeline::from_stopword_text(stopword_text);
        let inverted = InvertedIndex::build(documents, &pipeline);
        let chunked = ChunkedSemanticIndex::build(documents, config.chunk, embedder.as_ref())?;

        let cache_dir = persist::cache_dir(&base_dir);
        inverted.save(&cache_dir)?;
        chunked.save(&cache_dir)?;
        chunked.save_fingerprint(&cache_dir, documents, embedder.as_ref())?;
        log::info!(
            "built index over {} documents, {} chunk rows",
            documents.len(),
            chunked.row_count()
        );

        Ok(Engine {
            base_dir,
            config,
            pipeline,
            embedder,
            inverted,
            chunked,
            whole_doc: None,
        })
    }

    /// Loads both indexes from the cache directory. Fails with
    /// `CacheMissing`/`CacheIncompatible` if the lexical artifacts are
    /// absent or malformed; the chunked index rebuilds transparently on a
    /// stale/missing cache given `documents`.
    pub fn load(
        base_dir: impl Into<PathBuf>,
        documents: &[Document],
        stopword_text: &str,
        config: RetrievalConfig,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        let cache_dir = persist::cache_dir(&base_dir);
        let inverted = InvertedIndex::load(&cache_dir)?;
        let pipeline = TextPipeline::from_stopword_text(stopword_text);
        let chunked =
            ChunkedSemanticIndex::load_or_build(&cache_dir, documents, config.chunk, embedder.as_ref())?;

        Ok(Engine {
            base_dir,
            config,
            pipeline,
            embedder,
            inverted,
            chunked,
            whole_doc: None,
        })
    }

    fn ensure_whole_doc(&mut self, documents: &[Document]) -> Result<()> {
        if self.whole_doc.is_none() {
            let cache_dir = self.cache_dir();
            let index = DocumentSemanticIndex::load_or_build(&cache_dir, documents, self.embedder.as_ref())?;
            self.whole_doc = Some(index);
        }
        Ok(())
    }

    // -- Lexical diagnostics -------------------------------------------------

    pub fn search_command(&self, query: &str, limit: usize) -> Vec<Document> {
        self.inverted.search_command(query, limit, &self.pipeline)
    }

    pub fn bm25_search(&self, query: &str, limit: usize) -> Vec<Scored> {
        self.inverted.bm25_search(query, limit, &self.pipeline, self.config.bm25)
    }

    pub fn tf(&self, doc_id: u64, term: &str) -> Result<u32> {
        self.inverted.get_tf(doc_id, term, &self.pipeline)
    }

    pub fn idf(&self, term: &str) -> Result<f32> {
        self.inverted.get_idf(term, &self.pipeline)
    }

    pub fn tfidf(&self, doc_id: u64, term: &str) -> Result<f32> {
        self.inverted.get_tfidf(doc_id, term, &self.pipeline)
    }

    /// `k1`/`b` override the configured defaults when given (spec §6's
    /// `bm25tf <doc_id> <term> [k1 b]`).
    pub fn bm25_tf(&self, doc_id: u64, term: &str, k1: Option<f32>, b: Option<f32>) -> Result<f32> {
        let mut config = self.config.bm25;
        if let Some(k1) = k1 {
            config.k1 = k1;
        }
        if let Some(b) = b {
            config.b = b;
        }
        self.inverted.get_bm25_tf(doc_id, term, &self.pipeline, config)
    }

    pub fn bm25_idf(&self, term: &str) -> Result<f32> {
        self.inverted.get_bm25_idf(term, &self.pipeline)
    }

    // -- Semantic diagnostics -------------------------------------------------

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.encode_one(text)
    }

    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.encode_one(text)
    }

    pub fn verify(&self) -> (String, usize) {
        (self.embedder.model_name().to_string(), self.embedder.dimensions())
    }

    pub fn verify_embeddings(&mut self, documents: &[Document]) -> Result<(usize, usize)> {
        self.ensure_whole_doc(documents)?;
        let index = self.whole_doc.as_ref().unwrap();
        Ok((index.embedding_count(), self.embedder.dimensions()))
    }

    pub fn embed_chunks(&self) -> usize {
        self.chunked.row_count()
    }

    pub fn chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
        word_chunk(text, size, overlap)
    }

    pub fn semantic_chunk(text: &str, size: usize, overlap: usize) -> Vec<Vec<String>> {
        semantic_chunk(text, size, overlap)
    }

    pub fn search_chunked(&self, query: &str, limit: usize) -> Result<Vec<ChunkedScored>> {
        self.chunked.search_chunks(query, limit, self.embedder.as_ref())
    }

    pub fn search_whole_doc(&mut self, documents: &[Document], query: &str, limit: usize) -> Result<Vec<DocScored>> {
        self.ensure_whole_doc(documents)?;
        let index = self.whole_doc.as_ref().unwrap();
        index.search(query, limit, self.embedder.as_ref())
    }

    // -- Hybrid ---------------------------------------------------------------

    fn lexical_searcher(&self) -> impl Searcher + '_ {
        move |query: &str, limit: usize| -> Result<Vec<(u64, f32)>> {
            Ok(self
                .bm25_search(query, limit)
                .into_iter()
                .map(|s| (s.document.id, s.score))
                .collect())
        }
    }

    fn semantic_searcher(&self) -> impl Searcher + '_ {
        move |query: &str, limit: usize| -> Result<Vec<(u64, f32)>> {
            self.chunked.search_chunks_ranked(query, limit, self.embedder.as_ref())
        }
    }

    pub fn weighted_search(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<HybridScored>> {
        let lexical = self.lexical_searcher();
        let semantic = self.semantic_searcher();
        let ranker = HybridRanker::new(&lexical, &semantic, self.inverted.docmap(), self.config.fusion);
        ranker.weighted(query, alpha, limit)
    }

    pub fn rrf_search(
        &self,
        query: &str,
        k: f32,
        limit: usize,
        enhance: Option<(EnhanceMode, &dyn crate::hybrid::enhance::QueryEnhancer)>,
        rerank: Option<(RerankMethod, &dyn Reranker)>,
    ) -> Result<Vec<RrfScored>> {
        let effective_query = if let Some((mode, enhancer)) = enhance {
            let rewritten = enhancer.enhance(query, mode)?;
            log::info!("enhanced query ({:?}): '{}' -> '{}'", mode, query, rewritten);
            rewritten
        } else {
            query.to_string()
        };

        let lexical = self.lexical_searcher();
        let semantic = self.semantic_searcher();
        let ranker = HybridRanker::new(&lexical, &semantic, self.inverted.docmap(), self.config.fusion);
        let mut results = ranker.rrf(&effective_query, k, limit)?;

        if let Some((_, reranker)) = rerank {
            let candidates: Vec<(Document, f32)> = results
                .iter()
                .map(|r| (r.document.clone(), r.rrf_score))
                .collect();
            let reranked = reranker.rerank(&effective_query, &candidates)?;
            results = reranked
                .into_iter()
                .map(|(document, score)| {
                    let original = results.iter().find(|r| r.document.id == document.id);
                    RrfScored {
                        bm25_rank: original.and_then(|r| r.bm25_rank),
                        semantic_rank: original.and_then(|r| r.semantic_rank),
                        document,
                        rrf_score: score,
                    }
                })
                .collect();
        }

        Ok(results)
    }

    pub fn evaluate(&self, cases: &[dataset::GoldenCase], limit: usize) -> EvaluationSummary {
        evaluate(cases, |query| {
            self.rrf_search(query, self.config.fusion.rrf_k, limit, None, None)
                .map(|hits| hits.into_iter().map(|h| h.document.title).collect())
        })
    }
}
