use tracing::info;

use crate::error::{RagError, Result};

/// One piece of a chunked document, with the character offset of its window
/// in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub start: usize,
    pub text: String,
}

/// Split text into overlapping chunks of at most `size` characters, breaking
/// at whitespace where one falls inside the window. Consecutive chunks share
/// `overlap` characters so that no sentence is cut off from all context.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if text.trim().is_empty() {
        return Err(RagError::InvalidInput(
            "text is required for chunking".to_string(),
        ));
    }
    if size == 0 {
        return Err(RagError::InvalidInput(
            "chunk size must be positive".to_string(),
        ));
    }
    if overlap >= size {
        return Err(RagError::InvalidInput(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + size).min(chars.len());
        let mut end = hard_end;
        if hard_end < chars.len() {
            // Break at the last whitespace inside the window so words stay
            // whole; fall back to a hard cut for unbroken runs.
            if let Some(ws) = (start..hard_end).rev().find(|&i| chars[i].is_whitespace()) {
                if ws > start {
                    end = ws;
                }
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                start,
                text: trimmed.to_string(),
            });
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    info!(count = chunks.len(), "text chunked");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk("a short text", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "a short text");
    }

    #[test]
    fn chunks_never_exceed_the_size_limit() {
        let words: Vec<String> = (0..200).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk(&text, 50, 10).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 50, "oversized chunk: {:?}", c);
        }
    }

    #[test]
    fn every_word_survives_chunking() {
        let words: Vec<String> = (0..200).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk(&text, 50, 10).unwrap();
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for word in &words {
            assert!(joined.contains(word.as_str()), "lost {word}");
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "abcdefghij ".repeat(20);
        let chunks = chunk(&text, 40, 15).unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].start + 40);
        }
    }

    #[test]
    fn unbroken_runs_are_hard_cut() {
        let text = "x".repeat(2500);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert!(chunks.len() >= 3);
        for c in &chunks {
            assert!(c.text.chars().count() <= 1000);
        }
    }

    #[test]
    fn empty_text_is_invalid() {
        assert!(matches!(
            chunk("   ", 1000, 200),
            Err(RagError::InvalidInput(_))
        ));
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(matches!(
            chunk("some text", 100, 100),
            Err(RagError::InvalidInput(_))
        ));
    }
}
