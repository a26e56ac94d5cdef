//! Hybrid fusion of a lexical searcher and a semantic searcher: weighted
//! linear combination over min-max-normalized scores, or Reciprocal Rank
//! Fusion. Both fusion strategies see their inputs through the same
//! capability, so neither fusion algorithm needs to know whether a given
//! ranked list came from BM25 or from cosine similarity over chunks.

pub mod enhance;
pub mod rerank;

use std::collections::HashMap;

use crate::config::FusionConfig;
use crate::dataset::{require_document, DocMap};
use crate::error::Result;

/// "Given a query and a limit, produce a ranked list of `(doc_id, score)`
/// candidates, best first." The only capability HybridRanker depends on;
/// BM25 search and chunked cosine search are two unrelated implementers,
/// not a shared base type.
pub trait Searcher {
    fn search_ranked(&self, query: &str, limit: usize) -> Result<Vec<(u64, f32)>>;
}

impl<F> Searcher for F
where
    F: Fn(&str, usize) -> Result<Vec<(u64, f32)>>,
{
    fn search_ranked(&self, query: &str, limit: usize) -> Result<Vec<(u64, f32)>> {
        self(query, limit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HybridScored {
    pub document: crate::dataset::Document,
    pub bm25_score: f32,
    pub semantic_score: f32,
    pub hybrid_score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RrfScored {
    pub document: crate::dataset::Document,
    pub rrf_score: f32,
    pub bm25_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
}

/// Min-max rescale into `[0, 1]`. Empty input yields empty output (not a
/// missing value); a degenerate all-equal list collapses to all `1.0`
/// rather than dividing by zero.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if min == max {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&x| (x - min) / (max - min)).collect()
}

pub struct HybridRanker<'a> {
    lexical: &'a dyn Searcher,
    semantic: &'a dyn Searcher,
    docmap: &'a DocMap,
    fusion: FusionConfig,
}

impl<'a> HybridRanker<'a> {
    pub fn new(
        lexical: &'a dyn Searcher,
        semantic: &'a dyn Searcher,
        docmap: &'a DocMap,
        fusion: FusionConfig,
    ) -> Self {
        HybridRanker {
            lexical,
            semantic,
            docmap,
            fusion,
        }
    }

    fn overfetch_limit(&self, limit: usize) -> usize {
        limit.saturating_mul(self.fusion.overfetch_factor).max(limit)
    }

    /// `hybrid = alpha * lexical_norm + (1 - alpha) * semantic_norm`, over
    /// an over-fetched candidate pool from both searchers. Ties broken by
    /// ascending `doc_id`.
    pub fn weighted(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<HybridScored>> {
        let pool = self.overfetch_limit(limit);
        let lexical_hits = self.lexical.search_ranked(query, pool)?;
        let semantic_hits = self.semantic.search_ranked(query, pool)?;

        let lexical_norm = normalize(&lexical_hits.iter().map(|(_, s)| *s).collect::<Vec<_>>());
        let semantic_norm = normalize(&semantic_hits.iter().map(|(_, s)| *s).collect::<Vec<_>>());

        let mut lexical_scores: HashMap<u64, f32> = HashMap::new();
        for ((doc_id, _), score) in lexical_hits.iter().zip(lexical_norm) {
            lexical_scores.insert(*doc_id, score);
        }
        let mut semantic_scores: HashMap<u64, f32> = HashMap::new();
        for ((doc_id, _), score) in semantic_hits.iter().zip(semantic_norm) {
            semantic_scores.insert(*doc_id, score);
        }

        let mut all_ids: Vec<u64> = lexical_scores.keys().chain(semantic_scores.keys()).copied().collect();
        all_ids.sort_unstable();
        all_ids.dedup();

        let mut results: Vec<HybridScored> = Vec::new();
        for doc_id in all_ids {
            let Ok(document) = require_document(self.docmap, doc_id) else {
                continue;
            };
            let bm25_score = lexical_scores.get(&doc_id).copied().unwrap_or(0.0);
            let semantic_score = semantic_scores.get(&doc_id).copied().unwrap_or(0.0);
            let hybrid_score = alpha * bm25_score + (1.0 - alpha) * semantic_score;
            results.push(HybridScored {
                document: document.clone(),
                bm25_score,
                semantic_score,
                hybrid_score,
            });
        }

        results.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    /// `rrf_score(d) = sum of 1 / (k + rank_i(d))` across the lists `d`
    /// appears in (1-based rank; absence contributes nothing). Default
    /// `k = 60`.
    pub fn rrf(&self, query: &str, k: f32, limit: usize) -> Result<Vec<RrfScored>> {
        let pool = self.overfetch_limit(limit);
        let lexical_hits = self.lexical.search_ranked(query, pool)?;
        let semantic_hits = self.semantic.search_ranked(query, pool)?;

        let lexical_ranks: HashMap<u64, usize> = lexical_hits
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i + 1))
            .collect();
        let semantic_ranks: HashMap<u64, usize> = semantic_hits
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i + 1))
            .collect();

        let mut all_ids: Vec<u64> = lexical_ranks.keys().chain(semantic_ranks.keys()).copied().collect();
        all_ids.sort_unstable();
        all_ids.dedup();

        let mut results: Vec<RrfScored> = Vec::new();
        for doc_id in all_ids {
            let Ok(document) = require_document(self.docmap, doc_id) else {
                continue;
            };
            let bm25_rank = lexical_ranks.get(&doc_id).copied();
            let semantic_rank = semantic_ranks.get(&doc_id).copied();
            let mut score = 0.0f32;
            if let Some(r) = bm25_rank {
                score += 1.0 / (k + r as f32);
            }
            if let Some(r) = semantic_rank {
                score += 1.0 / (k + r as f32);
            }
            results.push(RrfScored {
                document: document.clone(),
                rrf_score: score,
                bm25_rank,
                semantic_rank,
            });
        }

        results.sort_by(|a, b| {
            b.rrf_score
                .partial_cmp(&a.rrf_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        results.truncate(limit);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Document;

    fn docmap() -> DocMap {
        [
            (1, Document { id: 1, title: "A".into(), description: "".into() }),
            (2, Document { id: 2, title: "B".into(), description: "".into() }),
            (3, Document { id: 3, title: "C".into(), description: "".into() }),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn normalize_degenerate_is_all_ones() {
        assert_eq!(normalize(&[5.0, 5.0, 5.0]), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn normalize_bounds_include_zero_and_one() {
        let normalized = normalize(&[3.0, 1.0, 2.0]);
        assert!(normalized.contains(&0.0));
        assert!(normalized.contains(&1.0));
        assert!(normalized.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn s4_rrf_scenario() {
        let docmap = docmap();
        let lexical = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(1, 2.0), (2, 1.0)])
        };
        let semantic = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(2, 0.9), (3, 0.5)])
        };
        let fusion = FusionConfig { overfetch_factor: 10, ..FusionConfig::default() };
        let ranker = HybridRanker::new(&lexical, &semantic, &docmap, fusion);
        let results = ranker.rrf("q", 60.0, 3).unwrap();
        let order: Vec<u64> = results.iter().map(|r| r.document.id).collect();
        assert_eq!(order, vec![2, 1, 3]);
        let b = results.iter().find(|r| r.document.id == 2).unwrap();
        assert!((b.rrf_score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-6);
    }

    #[test]
    fn s5_weighted_scenario_ties_break_ascending_doc_id() {
        let docmap = docmap();
        let lexical = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(1, 10.0), (2, 0.0)])
        };
        let semantic = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(2, 10.0), (1, 0.0)])
        };
        let fusion = FusionConfig { overfetch_factor: 10, ..FusionConfig::default() };
        let ranker = HybridRanker::new(&lexical, &semantic, &docmap, fusion);
        let results = ranker.weighted("q", 0.5, 2).unwrap();
        assert_eq!(results[0].hybrid_score, 0.5);
        assert_eq!(results[1].hybrid_score, 0.5);
        assert_eq!(results[0].document.id, 1);
        assert_eq!(results[1].document.id, 2);
    }

    #[test]
    fn weighted_boundary_alpha_one_is_lexical_order() {
        let docmap = docmap();
        let lexical = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(1, 5.0), (2, 1.0)])
        };
        let semantic = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(2, 5.0), (1, 1.0)])
        };
        let fusion = FusionConfig { overfetch_factor: 10, ..FusionConfig::default() };
        let ranker = HybridRanker::new(&lexical, &semantic, &docmap, fusion);
        let results = ranker.weighted("q", 1.0, 2).unwrap();
        assert_eq!(results[0].document.id, 1);
        assert_eq!(results[1].document.id, 2);
    }

    #[test]
    fn rrf_monotonicity_law() {
        let docmap = docmap();
        // A ranks equal-or-better than B in both lists, strictly better in one.
        let lexical = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(1, 2.0), (2, 1.0)])
        };
        let semantic = |_: &str, _: usize| -> Result<Vec<(u64, f32)>> {
            Ok(vec![(1, 2.0), (2, 1.0)])
        };
        let fusion = FusionConfig { overfetch_factor: 10, ..FusionConfig::default() };
        let ranker = HybridRanker::new(&lexical, &semantic, &docmap, fusion);
        let results = ranker.rrf("q", 60.0, 2).unwrap();
        let a = results.iter().find(|r| r.document.id == 1).unwrap();
        let b = results.iter().find(|r| r.document.id == 2).unwrap();
        assert!(a.rrf_score > b.rrf_score);
    }
}
