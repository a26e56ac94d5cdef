//! Document type and loaders for the three external dataset formats:
//! the movie corpus, the stop-word list, and the evaluation golden
//! dataset.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, Result};

/// A single corpus record. Immutable once constructed; `id` is assigned
/// externally and is stable across rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub title: String,
    pub description: String,
}

/// `doc_id -> Document`, used to materialize search results from ids.
pub type DocMap = HashMap<u64, Document>;

#[derive(Deserialize)]
struct MoviesFile {
    movies: Vec<Document>,
}

/// Loads `{ "movies": [ { "id", "title", "description" }, ... ] }`.
pub fn load_movies(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)?;
    let parsed: MoviesFile = serde_json::from_str(&text)?;
    Ok(parsed.movies)
}

/// Loads a newline-delimited stop-word file, discarding blank lines.
pub fn load_stopword_text(path: impl AsRef<Path>) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// One labelled case in the golden dataset: a query and the titles of the
/// documents considered relevant to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GoldenCase {
    pub query: String,
    pub relevant_docs: Vec<String>,
}

#[derive(Deserialize)]
struct GoldenDatasetFile {
    test_cases: Vec<GoldenCase>,
}

/// Loads `{ "test_cases": [ { "query", "relevant_docs": [title, ...] }, ... ] }`.
pub fn load_golden_dataset(path: impl AsRef<Path>) -> Result<Vec<GoldenCase>> {
    let text = std::fs::read_to_string(path)?;
    let parsed: GoldenDatasetFile = serde_json::from_str(&text)?;
    Ok(parsed.test_cases)
}

pub fn docmap_from(documents: &[Document]) -> DocMap {
    documents.iter().cloned().map(|d| (d.id, d)).collect()
}

pub fn require_document(docmap: &DocMap, id: u64) -> Result<&Document> {
    docmap.get(&id).ok_or(RetrievalError::UnknownDocument(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_movies_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"movies": [{{"id": 1, "title": "Brave", "description": "A princess."}}]}}"#
        )
        .unwrap();
        let movies = load_movies(f.path()).unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Brave");
    }

    #[test]
    fn loads_golden_dataset_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"test_cases": [{{"query": "bear", "relevant_docs": ["Brave"]}}]}}"#
        )
        .unwrap();
        let cases = load_golden_dataset(f.path()).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].query, "bear");
    }
}
