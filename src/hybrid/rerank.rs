//! Optional LLM reranking of the fused top-`limit` list. A single
//! candidate whose LLM score doesn't parse soft-fails (is dropped, keeping
//! its original position relative to the rest) rather than aborting the
//! whole rerank.

use crate::dataset::Document;
use crate::error::{RetrievalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankMethod {
    /// Scores each candidate document individually against the query.
    Individual,
    /// Scores the whole candidate list in one call. Not implemented.
    Batch,
    /// Scores via a dedicated cross-encoder model. Not implemented.
    CrossEncoder,
}

impl std::str::FromStr for RerankMethod {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "individual" => Ok(RerankMethod::Individual),
            "batch" => Ok(RerankMethod::Batch),
            "cross_encoder" => Ok(RerankMethod::CrossEncoder),
            other => Err(RetrievalError::BadTerm(format!("unknown rerank method: {other}"))),
        }
    }
}

pub trait Reranker {
    fn rerank(&self, query: &str, candidates: &[(Document, f32)]) -> Result<Vec<(Document, f32)>>;
}

#[cfg(feature = "llm")]
pub mod gemini {
    use super::*;

    const MODEL: &str = "gemini-2.5-flash";

    pub struct GeminiReranker {
        method: RerankMethod,
        api_key: String,
        client: reqwest::blocking::Client,
    }

    impl GeminiReranker {
        pub fn from_env(method: RerankMethod) -> Result<Self> {
            let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
                RetrievalError::ExternalFailure("GEMINI_API_KEY is not set".to_string())
            })?;
            Ok(GeminiReranker {
                method,
                api_key,
                client: reqwest::blocking::Client::new(),
            })
        }

        fn score_one(&self, query: &str, doc: &Document) -> Result<f32> {
            let prompt = format!(
                "On a scale from 0 to 1, how relevant is this movie to the search \
                 query \"{query}\"? Respond with only a number.\n\n\
                 Title: {}\nDescription: {}",
                doc.title, doc.description
            );
            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{MODEL}:generateContent?key={}",
                self.api_key
            );
            let body = serde_json::json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            });
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .map_err(|e| RetrievalError::ExternalFailure(e.to_string()))?;
            let parsed: serde_json::Value = response
                .json()
                .map_err(|e| RetrievalError::ExternalFailure(e.to_string()))?;
            let text = parsed["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .ok_or_else(|| RetrievalError::ExternalFailure("empty Gemini response".to_string()))?;
            text.trim()
                .parse::<f32>()
                .map_err(|e| RetrievalError::ExternalFailure(e.to_string()))
        }
    }

    impl Reranker for GeminiReranker {
        fn rerank(&self, query: &str, candidates: &[(Document, f32)]) -> Result<Vec<(Document, f32)>> {
            match self.method {
                RerankMethod::Individual => {
                    let mut scored: Vec<(Document, f32)> = Vec::new();
                    for (doc, fallback_score) in candidates {
                        match self.score_one(query, doc) {
                            Ok(score) => scored.push((doc.clone(), score)),
                            Err(_) => {
                                // Soft-fail: keep the candidate at its
                                // original fused score rather than
                                // dropping it silently from the ranking.
                                scored.push((doc.clone(), *fallback_score));
                            }
                        }
                    }
                    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                    Ok(scored)
                }
                RerankMethod::Batch | RerankMethod::CrossEncoder => Err(
                    RetrievalError::ExternalFailure(format!("{:?} reranking is not implemented", self.method)),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rerank_method_from_str() {
        assert_eq!("individual".parse::<RerankMethod>().unwrap(), RerankMethod::Individual);
        assert!("nonsense".parse::<RerankMethod>().is_err());
    }
}
