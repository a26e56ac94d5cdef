//! Text normalization pipeline shared by the lexical index and the query
//! path: `lower -> strip punctuation -> collapse whitespace -> split ->
//! remove stopwords -> stem`.

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};

/// Deterministic string -> ordered token list normalizer.
///
/// Owns its stop-word list and stemmer instance rather than reaching for
/// process-global state, so a pipeline can be rebuilt with a different
/// stop-word list (e.g. per locale) without touching global mutable state.
pub struct TextPipeline {
    stopwords: HashSet<String>,
    stemmer: Stemmer,
}

impl TextPipeline {
    pub fn new(stopwords: HashSet<String>) -> Self {
        TextPipeline {
            stopwords,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Builds a pipeline from a newline-delimited stop-word list, skipping
    /// blank lines.
    pub fn from_stopword_text(text: &str) -> Self {
        let stopwords = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        TextPipeline::new(stopwords)
    }

    /// `normalize(s) = stem(remove_stopwords(split_whitespace(collapse_whitespace(strip_punctuation(lower(s))))))`
    pub fn normalize(&self, s: &str) -> Vec<String> {
        let lowered = lower(s);
        let stripped = strip_punctuation(&lowered);
        let collapsed = collapse_whitespace(&stripped);
        let tokens = split_whitespace(&collapsed);
        let kept = self.remove_stopwords(tokens);
        kept.into_iter().map(|t| self.stem(&t)).collect()
    }

    fn remove_stopwords(&self, tokens: Vec<String>) -> Vec<String> {
        tokens
            .into_iter()
            .filter(|t| !self.stopwords.contains(t))
            .collect()
    }

    fn stem(&self, token: &str) -> String {
        self.stemmer.stem(token).into_owned()
    }
}

fn lower(s: &str) -> String {
    s.to_lowercase()
}

/// Removes every ASCII punctuation code point plus U+2019 (right single
/// quotation mark, the character word processors substitute for `'`).
fn strip_punctuation(s: &str) -> String {
    s.chars()
        .filter(|c| !(c.is_ascii_punctuation() || *c == '\u{2019}'))
        .collect()
}

/// Replaces any run of ASCII whitespace with a single space and trims ends.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_ascii_whitespace() {
            if !in_space && !out.is_empty() {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

fn split_whitespace(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> TextPipeline {
        let mut stops = HashSet::new();
        stops.insert("the".to_string());
        stops.insert("a".to_string());
        stops.insert("and".to_string());
        TextPipeline::new(stops)
    }

    #[test]
    fn normalizes_and_strips_punctuation() {
        let p = pipeline();
        let tokens = p.normalize("The bear's cave, and a running river!");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.iter().any(|t| t.contains('\'') || t.contains(',')));
    }

    #[test]
    fn strips_right_single_quote_u2019() {
        let p = pipeline();
        let tokens = p.normalize("bear\u{2019}s");
        assert_eq!(tokens, vec!["bear".to_string()]);
    }

    #[test]
    fn collapses_whitespace_runs() {
        let p = pipeline();
        let tokens = p.normalize("running    fast\t\tbear");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn empty_input_yields_empty_tokens() {
        let p = pipeline();
        assert!(p.normalize("").is_empty());
        assert!(p.normalize("   ").is_empty());
    }

    #[test]
    fn idempotent_on_already_normalized_input() {
        let p = pipeline();
        let first = p.normalize("running bears hunt rivers");
        let joined = first.join(" ");
        let second = p.normalize(&joined);
        assert_eq!(first, second);
    }

    #[test]
    fn stopwords_removed_case_sensitively_against_lowercased_tokens() {
        let p = pipeline();
        let tokens = p.normalize("The Cave And A River");
        assert!(!tokens.iter().any(|t| t == "the" || t == "and" || t == "a"));
    }
}
