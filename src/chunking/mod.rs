//! Content chunking for breaking transcripts into searchable segments.
//!
//! Transcripts are split into overlapping character windows that prefer to
//! end on a sentence boundary. Offsets are expressed in characters of the
//! normalized text, never in bytes.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous span of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Inclusive start offset, in characters.
    pub start_char: usize,
    /// Exclusive end offset, in characters.
    pub end_char: usize,
    /// The text of `[start_char, end_char)`.
    pub text: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn len(&self) -> usize {
        self.end_char - self.start_char
    }

    pub fn is_empty(&self) -> bool {
        self.start_char == self.end_char
    }
}

/// Collapse line breaks into spaces and trim the result.
///
/// Chunk offsets always refer to the output of this function.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Sentence-aware sliding window chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker with `size > 0` and `overlap < size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(RagError::Config("chunk size must be greater than 0".into()));
        }
        if overlap >= size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split already-normalized text into ordered chunks.
    ///
    /// A window of `size` characters is cut back to just after its last `.`
    /// when that period sits in the second half of the window. The next
    /// window starts `overlap` characters before the chosen end, and always
    /// at least one character after the previous start.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = (start + self.size).min(len);

            // The final window is kept whole so short inputs stay a single chunk.
            if end < len {
                if let Some(period) = chars[start..end].iter().rposition(|c| *c == '.') {
                    if period >= self.size / 2 {
                        end = start + period + 1;
                    }
                }
            }

            if let Some(chunk) = trimmed_span(&chars, start, end) {
                chunks.push(chunk);
            }

            if end >= len {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        chunks
    }
}

/// Build a chunk from `chars[start..end]` with surrounding whitespace removed.
fn trimmed_span(chars: &[char], start: usize, end: usize) -> Option<Chunk> {
    let window = &chars[start..end];
    let leading = window.iter().take_while(|c| c.is_whitespace()).count();
    if leading == window.len() {
        return None;
    }
    let trailing = window.iter().rev().take_while(|c| c.is_whitespace()).count();

    let start_char = start + leading;
    let end_char = end - trailing;
    Some(Chunk {
        start_char,
        end_char,
        text: chars[start_char..end_char].iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(text: &str, chunk: &Chunk) -> String {
        text.chars()
            .skip(chunk.start_char)
            .take(chunk.end_char - chunk.start_char)
            .collect()
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(matches!(TextChunker::new(0, 0), Err(RagError::Config(_))));
        assert!(matches!(TextChunker::new(100, 100), Err(RagError::Config(_))));
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let chunker = TextChunker::new(500, 100).unwrap();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::new(500, 100).unwrap();
        let text = normalize_text("  Short transcript. It has two sentences and a tail\n");
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short transcript. It has two sentences and a tail");
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, text.chars().count());
    }

    #[test]
    fn test_windows_without_periods() {
        let text = "a".repeat(1050);
        let chunker = TextChunker::new(500, 100).unwrap();
        let chunks = chunker.chunk(&text);

        let starts: Vec<usize> = chunks.iter().map(|c| c.start_char).collect();
        assert_eq!(starts, vec![0, 400, 800]);
        assert_eq!(chunks.last().unwrap().end_char, 1050);
    }

    #[test]
    fn test_snaps_to_sentence_end() {
        // Period at index 349, inside the second half of a 500 window.
        let mut text = "b".repeat(349);
        text.push('.');
        text.push_str(&"c".repeat(400));
        let chunker = TextChunker::new(500, 100).unwrap();
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks[0].end_char, 350);
        assert!(chunks[0].text.ends_with('.'));
        assert_eq!(chunks[1].start_char, 250);
    }

    #[test]
    fn test_ignores_period_in_first_half() {
        let mut text = "d".repeat(100);
        text.push('.');
        text.push_str(&"e".repeat(800));
        let chunker = TextChunker::new(500, 0).unwrap();
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks[0].end_char, 500);
    }

    #[test]
    fn test_offsets_match_text_and_increase() {
        let text = normalize_text(
            &"Pasta needs salted water. Stir gently and often.\nTaste before draining! "
                .repeat(40),
        );
        let chunker = TextChunker::new(120, 30).unwrap();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[0].start_char < pair[1].start_char);
            // Consecutive chunks never leave a gap.
            assert!(pair[1].start_char <= pair[0].end_char + 1);
        }
        for chunk in &chunks {
            assert!(chunk.start_char < chunk.end_char);
            assert_eq!(slice(&text, chunk), chunk.text);
        }
    }

    #[test]
    fn test_terminates_when_snap_shrinks_below_overlap() {
        // Every window snaps right after its midpoint, well under the overlap.
        let text = "xxxxx.".repeat(200);
        let chunker = TextChunker::new(10, 9).unwrap();
        let chunks = chunker.chunk(&text);
        assert!(!chunks.is_empty());
        for pair in chunks.windows(2) {
            assert!(pair[0].start_char < pair[1].start_char);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Uno. Due. Tre. Quattro. Cinque. ".repeat(50);
        let chunker = TextChunker::new(64, 16).unwrap();
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn test_multibyte_offsets_are_characters() {
        let text = "è".repeat(30);
        let chunker = TextChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks[0].end_char, 20);
        assert_eq!(chunks[0].text.chars().count(), 20);
        assert_eq!(chunks[1].start_char, 15);
    }

    #[test]
    fn test_normalize_collapses_newlines() {
        assert_eq!(normalize_text("\n line one\r\nline two\n"), "line one line two");
    }
}
