//! Word-window chunking for embedding.

pub const CHUNK_WORDS: usize = 500;
pub const OVERLAP_WORDS: usize = 50;

/// Splits `text` into windows of `size` words, each starting `size - overlap`
/// words after the previous one. Texts that fit in one window come back whole.
pub fn chunk_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if words.len() <= size {
        return vec![text.trim().to_string()];
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

pub fn chunk_transcript(text: &str) -> Vec<String> {
    chunk_words(text, CHUNK_WORDS, OVERLAP_WORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_transcript("  hello world "), vec!["hello world"]);
        assert!(chunk_transcript("   ").is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let chunks = chunk_transcript(&words(1000));
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].starts_with("w450 "));
        assert!(chunks[2].starts_with("w900 "));
        assert!(chunks[2].ends_with("w999"));
    }
}
