//! Optional query enhancement: an LLM rewrites or corrects the query
//! before either searcher runs. A network-I/O boundary, not part of the
//! deterministic core — callers that don't pass `--enhance` never touch
//! this module.

use crate::error::{RetrievalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhanceMode {
    /// Broadens the query with related terms a user might not have typed.
    Expand,
    /// Rewrites a vague/conversational query into a more literal search
    /// query (e.g. "that bear movie where leo gets attacked" -> "The
    /// Revenant Leonardo DiCaprio bear attack").
    Rewrite,
    /// Corrects likely spelling mistakes without otherwise changing intent.
    Spell,
}

impl std::str::FromStr for EnhanceMode {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "expand" => Ok(EnhanceMode::Expand),
            "rewrite" => Ok(EnhanceMode::Rewrite),
            "spell" => Ok(EnhanceMode::Spell),
            other => Err(RetrievalError::BadTerm(format!("unknown enhance mode: {other}"))),
        }
    }
}

pub trait QueryEnhancer {
    fn enhance(&self, query: &str, mode: EnhanceMode) -> Result<String>;
}

fn prompt_for(query: &str, mode: EnhanceMode) -> String {
    match mode {
        EnhanceMode::Expand => format!(
            "You are helping search a small movie database. Expand the following \
             search query with closely related terms (alternate titles, character \
             names, actors, plot elements) a user might have meant, without \
             changing its core intent. Respond with only the expanded query, no \
             explanation.\n\nQuery: \"{query}\"",
        ),
        EnhanceMode::Rewrite => format!(
            "You are helping search a small movie database using keyword search, \
             not semantic search. Rewrite the following vague or conversational \
             query into a more literal movie search query using concrete terms \
             (title words, character names, actors, plot elements).\n\n\
             Examples:\n\
             \"that bear movie where leo gets attacked\" -> \"The Revenant Leonardo DiCaprio bear attack\"\n\
             \"the one with the talking toys\" -> \"Toy Story talking toys\"\n\n\
             Respond with only the rewritten query, no explanation.\n\nQuery: \"{query}\"",
        ),
        EnhanceMode::Spell => format!(
            "Correct any spelling mistakes in the following movie search query. \
             Do not change anything else about it. Respond with only the \
             corrected query, no explanation.\n\nQuery: \"{query}\"",
        ),
    }
}

#[cfg(feature = "llm")]
pub mod gemini {
    use super::*;

    const MODEL: &str = "gemini-2.5-flash";

    pub struct GeminiQueryEnhancer {
        api_key: String,
        client: reqwest::blocking::Client,
    }

    impl GeminiQueryEnhancer {
        pub fn from_env() -> Result<Self> {
            let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
                RetrievalError::ExternalFailure("GEMINI_API_KEY is not set".to_string())
            })?;
            Ok(GeminiQueryEnhancer {
                api_key,
                client: reqwest::blocking::Client::new(),
            })
        }
    }

    impl QueryEnhancer for GeminiQueryEnhancer {
        fn enhance(&self, query: &str, mode: EnhanceMode) -> Result<String> {
            let prompt = prompt_for(query, mode);
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
            parsed["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| RetrievalError::ExternalFailure("empty Gemini response".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enhance_mode_from_str() {
        assert_eq!("expand".parse::<EnhanceMode>().unwrap(), EnhanceMode::Expand);
        assert_eq!("rewrite".parse::<EnhanceMode>().unwrap(), EnhanceMode::Rewrite);
        assert_eq!("spell".parse::<EnhanceMode>().unwrap(), EnhanceMode::Spell);
        assert!("nonsense".parse::<EnhanceMode>().is_err());
    }

    #[test]
    fn prompts_differ_by_mode() {
        let expand = prompt_for("bear movie", EnhanceMode::Expand);
        let rewrite = prompt_for("bear movie", EnhanceMode::Rewrite);
        let spell = prompt_for("bear movie", EnhanceMode::Spell);
        assert_ne!(expand, rewrite);
        assert_ne!(rewrite, spell);
    }
}
