//! Overlapping fixed-size text chunker.
//!
//! Splits extracted document text into windows of `size` characters that
//! overlap by `overlap` characters, the unit of indexing and retrieval.
//! Windows are measured in characters and cut on UTF-8 character
//! boundaries, so multi-byte text never splits mid-character.
//!
//! Callers guarantee `overlap < size` (config validation rejects anything
//! else); with that precondition every pair of consecutive chunks shares
//! exactly `overlap` characters, and stripping the overlaps reconstructs
//! the input.

/// Split `text` into overlapping chunks. Deterministic for identical input
/// and parameters; empty input yields an empty sequence.
pub fn split(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        return vec![text.to_string()];
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert!(split("", 1000, 200).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split("hello world", 1000, 200);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn consecutive_chunks_share_exactly_overlap() {
        let text: String = ('a'..='z').cycle().take(2500).collect();
        let chunks = split(&text, 1000, 200);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            let tail: String = prev[prev.len() - 200..].iter().collect();
            let head: String = next[..200].iter().collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn stripping_overlaps_reconstructs_input() {
        let text: String = ('a'..='z').cycle().take(3210).collect();
        let chunks = split(&text, 1000, 200);
        let mut rebuilt: String = chunks[0].clone();
        for c in &chunks[1..] {
            let chars: Vec<char> = c.chars().collect();
            rebuilt.extend(&chars[200.min(chars.len())..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_characters_never_split() {
        let text: String = "héllo wörld çà ".repeat(200);
        let chunks = split(&text, 100, 20);
        let total: usize = text.chars().count();
        let mut rebuilt: String = chunks[0].clone();
        for c in &chunks[1..] {
            let chars: Vec<char> = c.chars().collect();
            rebuilt.extend(&chars[20..]);
        }
        assert_eq!(rebuilt.chars().count(), total);
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn deterministic() {
        let text: String = "deterministic input ".repeat(300);
        assert_eq!(split(&text, 1000, 200), split(&text, 1000, 200));
    }

    #[test]
    fn ordered_and_finite() {
        let text: String = "x".repeat(10_000);
        let chunks = split(&text, 1000, 200);
        assert_eq!(chunks.len(), 13);
        assert!(chunks[..chunks.len() - 1].iter().all(|c| c.chars().count() == 1000));
    }
}
