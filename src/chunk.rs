//! Overlapping sliding-window text splitter.
//!
//! Splits extracted document text into [`Chunk`]s of at most
//! `chunk_size` characters, where each window after the first starts
//! `chunk_size - chunk_overlap` characters after the previous window's
//! start. Consecutive full windows therefore share exactly
//! `chunk_overlap` characters.
//!
//! With `boundary_snap` enabled, a window's *end* is pulled back to the
//! nearest paragraph, sentence, or word boundary within a search radius
//! so chunks don't cut mid-token. Window starts stay on the fixed stride,
//! and the radius is capped by `chunk_overlap`, so a snapped end can never
//! land before the next window's start: every character of the input is
//! covered by some chunk either way.
//!
//! All offsets are measured in characters, not bytes; multi-byte UTF-8
//! input is handled by splitting on char boundaries.

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// How far back from the window end to look for a natural boundary.
/// The effective radius is further capped by `chunk_overlap`.
const SNAP_RADIUS: usize = 80;

/// Split text into overlapping windows. Empty text yields zero chunks;
/// text shorter than `chunk_size` yields exactly one.
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    // Config validation guarantees overlap < size; the max(1) guards
    // against a hand-constructed config that would never advance.
    let stride = config
        .chunk_size
        .saturating_sub(config.chunk_overlap)
        .max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let hard_end = (start + config.chunk_size).min(chars.len());
        let end = if config.boundary_snap && hard_end < chars.len() {
            snap_boundary(&chars, start, hard_end, config.chunk_overlap)
        } else {
            hard_end
        };

        chunks.push(Chunk {
            index,
            text: chars[start..end].iter().collect(),
        });

        if hard_end >= chars.len() {
            break;
        }
        start += stride;
        index += 1;
    }

    chunks
}

/// Find the best natural break at or before `hard_end`, searching at most
/// `min(SNAP_RADIUS, overlap)` characters back. Preference order:
/// paragraph break, sentence end, whitespace. Falls back to the exact
/// offset. The pull-back never exceeds `overlap`, so the snapped end stays
/// at or past the next window's start and no text falls between chunks.
fn snap_boundary(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    let radius = SNAP_RADIUS.min(overlap).min(hard_end - start - 1);
    let floor = hard_end - radius;

    // Paragraph break: end just after the second newline of "\n\n".
    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' && i > start && chars[i - 1] == '\n' {
            return i + 1;
        }
    }

    // Sentence end: terminator followed by whitespace.
    for i in (floor..hard_end.saturating_sub(1)).rev() {
        if matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace() {
            return i + 1;
        }
    }

    // Word boundary.
    for i in (floor..hard_end).rev() {
        if chars[i].is_whitespace() {
            return i + 1;
        }
    }

    hard_end
}
