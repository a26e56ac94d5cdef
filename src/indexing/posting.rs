//! Ordered, de-duplicated posting lists.
//!
//! A roaring-bitmap-backed sorted set would dedupe for free but cannot
//! preserve insertion order, and this engine's ranking and `search_command`
//! diagnostic both depend on posting lists reflecting document-iteration
//! order. A plain `Vec<u64>` with a build-time dedup check is used here
//! instead.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList(Vec<u64>);

impl PostingList {
    pub fn new() -> Self {
        PostingList(Vec::new())
    }

    /// Appends `doc_id`. Callers are expected to call this at most once
    /// per document per token (the inverted index builds from a
    /// per-document token-count map's keys, which already dedupes).
    pub fn push(&mut self, doc_id: u64) {
        debug_assert!(
            !self.0.contains(&doc_id),
            "posting list must contain at most one entry per document"
        );
        self.0.push(doc_id);
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut list = PostingList::new();
        list.push(5);
        list.push(1);
        list.push(3);
        assert_eq!(list.as_slice(), &[5, 1, 3]);
    }
}
