//! Boundary-aware text chunking for ingestion.
//!
//! Greedy forward scan: each cut prefers a natural separator found in a
//! window behind the size target, falling back to a hard cut. Overlap is
//! applied by stepping back from the cut. A hard chunk cap bounds memory on
//! pathological inputs.

use tracing::debug;

use crate::config::{ChunkerMode, RagConfig};
use crate::error::{CoreError, CoreResult};

use super::structured_chunker::StructuredTextChunker;

/// Separators in priority order (best to worst).
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "; ", ", ", " "];

const DEFAULT_MAX_CHUNKS: usize = 2000;
const SPLIT_WINDOW: usize = 120;

pub struct SimpleTextChunker {
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
}

impl SimpleTextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> CoreResult<Self> {
        if chunk_size == 0 {
            return Err(CoreError::validation("chunk_size must be > 0"));
        }
        if overlap >= chunk_size {
            return Err(CoreError::validation(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
            max_chunks: DEFAULT_MAX_CHUNKS,
        })
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let raw: Vec<char> = text.trim().chars().collect();
        if raw.is_empty() {
            return Vec::new();
        }

        if raw.len() <= self.chunk_size {
            return vec![raw.iter().collect::<String>()];
        }

        let mut chunks: Vec<String> = Vec::new();
        let mut start = 0usize;

        while start < raw.len() {
            if chunks.len() >= self.max_chunks {
                // Hard guardrail: truncate rather than exhaust memory.
                debug!(max_chunks = self.max_chunks, "chunk cap reached, truncating");
                break;
            }

            let target = start + self.chunk_size;
            if target >= raw.len() {
                let piece = slice_trimmed(&raw, start, raw.len());
                if !piece.is_empty() {
                    chunks.push(piece);
                }
                break;
            }

            let split_at = find_best_split(&raw, target, SPLIT_WINDOW);
            // The best separator can sit behind the cursor once overlap has
            // replayed past it; emit nothing and inch forward.
            if split_at > start {
                let piece = slice_trimmed(&raw, start, split_at);
                if !piece.is_empty() {
                    chunks.push(piece);
                }
            }

            // Overlap step, guarded against zero-progress loops.
            start = (start + 1).max(split_at.saturating_sub(self.overlap));
        }

        merge_small_tail(chunks, self.min_tail_chars())
    }

    fn min_tail_chars(&self) -> usize {
        (self.chunk_size / 4).max(80)
    }
}

fn slice_trimmed(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect::<String>().trim().to_string()
}

/// Best cut near `target`: last separator ending at or before the target
/// inside the window, tried in priority order; exact `target` otherwise.
/// Returns the index just after the separator.
fn find_best_split(chars: &[char], target: usize, window: usize) -> usize {
    if target >= chars.len() {
        return chars.len();
    }

    let lo = target.saturating_sub(window);

    for sep in SEPARATORS {
        let sep_chars: Vec<char> = sep.chars().collect();
        let sep_len = sep_chars.len();

        // Scan backwards: match start must stay within [lo, target].
        let mut pos = target.min(chars.len().saturating_sub(sep_len));
        loop {
            if chars[pos..pos + sep_len] == sep_chars[..] {
                return pos + sep_len;
            }
            if pos == lo {
                break;
            }
            pos -= 1;
        }
    }

    target
}

/// Merge an undersized trailing chunk into its predecessor to avoid
/// low-signal fragments.
fn merge_small_tail(mut chunks: Vec<String>, min_tail_chars: usize) -> Vec<String> {
    if chunks.len() < 2 {
        return chunks;
    }

    let last_len = chunks[chunks.len() - 1].chars().count();
    if last_len >= min_tail_chars {
        return chunks;
    }

    let last = chunks.pop().unwrap_or_default();
    let prev = chunks.pop().unwrap_or_default();
    chunks.push(
        format!("{}\n\n{}", prev.trim_end(), last.trim_start())
            .trim()
            .to_string(),
    );
    chunks
}

/// Mode dispatcher configured by `text_chunker_mode`.
pub enum TextChunker {
    Simple(SimpleTextChunker),
    Structured(StructuredTextChunker),
}

impl TextChunker {
    pub fn from_config(config: &RagConfig) -> CoreResult<Self> {
        match config.text_chunker_mode {
            ChunkerMode::Simple => Ok(Self::Simple(SimpleTextChunker::new(
                config.chunk_size,
                config.chunk_overlap,
            )?)),
            ChunkerMode::Structured => Ok(Self::Structured(StructuredTextChunker::new(
                config.chunk_size,
                config.chunk_overlap,
            )?)),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        match self {
            Self::Simple(chunker) => chunker.chunk(text),
            Self::Structured(chunker) => chunker.chunk(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> SimpleTextChunker {
        SimpleTextChunker::new(size, overlap).unwrap()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunker(100, 20).chunk("").is_empty());
        assert!(chunker(100, 20).chunk("   \n  ").is_empty());
    }

    #[test]
    fn short_input_yields_single_trimmed_chunk() {
        let chunks = chunker(100, 20).chunk("  hello world  ");
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(SimpleTextChunker::new(100, 100).is_err());
        assert!(SimpleTextChunker::new(0, 0).is_err());
    }

    #[test]
    fn prefers_paragraph_breaks_over_hard_cuts() {
        let first = "a".repeat(80);
        let second = "b".repeat(200);
        let text = format!("{first}\n\n{second}");
        let chunks = chunker(100, 10).chunk(&text);

        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0], first);
        assert!(!chunks[0].contains('b'));
    }

    #[test]
    fn hard_cut_when_no_separator_in_window() {
        let text = "x".repeat(1000);
        let chunks = chunker(100, 10).chunk(&text);

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text = "word ".repeat(200);
        let chunks = chunker(100, 30).chunk(&text);
        assert!(chunks.len() > 1);

        // The step back from the cut replays the tail of each chunk.
        let first_tail: String = chunks[0].chars().rev().take(10).collect();
        let tail: String = first_tail.chars().rev().collect();
        assert!(chunks[1].starts_with(tail.trim_start()) || chunks[1].contains(tail.trim()));
    }

    #[test]
    fn small_trailing_chunk_is_merged() {
        let body = "a".repeat(395);
        let tail = "tiny tail.";
        let text = format!("{body}\n\n{tail}");
        let chunks = chunker(400, 0).chunk(&text);

        let last = chunks.last().unwrap();
        assert!(last.contains("tiny tail."));
        assert!(chunks.iter().all(|c| c.chars().count() >= 10));
    }

    #[test]
    fn always_makes_forward_progress() {
        // Dense separators at every position must not loop.
        let text = " ".repeat(50) + &"ab ".repeat(500);
        let chunks = chunker(30, 29).chunk(&text);
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= DEFAULT_MAX_CHUNKS);
    }
}
