//! Splitting text into overlapping windows, two ways: a sentence-aware
//! split used by the semantic index, and a plain word-window split used
//! only as a standalone CLI diagnostic.

/// Splits `text` into sentences on a sentence-ending punctuation mark
/// (`.`, `!`, `?`) followed by whitespace, consuming the whitespace as the
/// separator — equivalent to splitting on `(?<=[.!?])\s+` without needing
/// lookbehind support. Blank-after-trim sentences are discarded, but
/// sentences that do pass the filter keep their original (unstripped)
/// text, matching how downstream chunk text is expected to read.
fn split_sentences(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = trimmed.chars().collect();
    let n = chars.len();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < n {
        if matches!(chars[i], '.' | '!' | '?') {
            let mut j = i + 1;
            if j >= n || chars[j].is_whitespace() {
                let sentence: String = chars[start..=i].iter().collect();
                while j < n && chars[j].is_whitespace() {
                    j += 1;
                }
                if !sentence.trim().is_empty() {
                    sentences.push(sentence);
                }
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    if start < n {
        let sentence: String = chars[start..n].iter().collect();
        if !sentence.trim().is_empty() {
            sentences.push(sentence);
        }
    }
    sentences
}

/// Groups a sequence of items into successive windows of `size` items
/// advancing by `size - overlap` each step, with a final (possibly
/// partial, possibly empty-remainder) window appended at the end.
fn window<T: Clone>(items: Vec<T>, size: usize, overlap: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut remaining = items;
    while remaining.len() > size {
        chunks.push(remaining[0..size].to_vec());
        remaining = remaining[step..].to_vec();
    }
    chunks.push(remaining);
    chunks
}

/// Sentence-window chunking used to build the chunked semantic index.
/// Default `size = 4`, `overlap = 1`. Empty input yields an empty list.
pub fn semantic_chunk(text: &str, size: usize, overlap: usize) -> Vec<Vec<String>> {
    let sentences = split_sentences(text);
    window(sentences, size, overlap)
}

/// Flattens sentence-window chunks into chunk strings (sentences within a
/// chunk joined with a single space), the unit actually embedded.
pub fn semantic_chunk_strings(text: &str, size: usize, overlap: usize) -> Vec<String> {
    semantic_chunk(text, size, overlap)
        .into_iter()
        .map(|sentences| sentences.join(" "))
        .collect()
}

/// Plain word-window chunking, a standalone diagnostic utility distinct
/// from the sentence-aware semantic chunker the index actually builds on.
pub fn word_chunk(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<String> = text.split(' ').filter(|w| !w.is_empty()).map(str::to_string).collect();
    window(words, size, overlap)
        .into_iter()
        .map(|w| w.join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_chunking_scenario() {
        let chunks = semantic_chunk("A. B. C. D. E. F.", 4, 1);
        assert_eq!(
            chunks,
            vec![
                vec!["A.".to_string(), "B.".to_string(), "C.".to_string(), "D.".to_string()],
                vec!["D.".to_string(), "E.".to_string(), "F.".to_string()],
            ]
        );
    }

    #[test]
    fn empty_input_yields_empty_list() {
        assert!(semantic_chunk("", 4, 1).is_empty());
        assert!(semantic_chunk("   ", 4, 1).is_empty());
    }

    #[test]
    fn fewer_sentences_than_chunk_size_yields_one_chunk() {
        let chunks = semantic_chunk("A. B.", 4, 1);
        assert_eq!(chunks, vec![vec!["A.".to_string(), "B.".to_string()]]);
    }

    #[test]
    fn handles_exclamation_and_question_marks() {
        let chunks = semantic_chunk("Run! Stop? Go.", 4, 1);
        assert_eq!(
            chunks,
            vec![vec!["Run!".to_string(), "Stop?".to_string(), "Go.".to_string()]]
        );
    }

    #[test]
    fn word_chunk_is_a_distinct_simpler_split() {
        let chunks = word_chunk("one two three four five", 2, 0);
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }
}
