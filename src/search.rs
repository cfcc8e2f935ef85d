//! Byte and substring search across a queue of chunks (spec.md §4.5).

use std::collections::VecDeque;

use crate::chunk::Chunk;

/// Finds `byte` in the logical stream `[start, end)`. `end == None` means
/// "to the end of the buffered data". Offsets are absolute, in the
/// consumer's index space (0 is the oldest unconsumed byte).
pub(crate) fn find_byte(
    chunks: &VecDeque<Chunk>,
    byte: u8,
    start: usize,
    end: Option<usize>,
) -> Option<usize> {
    let mut base = 0usize;
    let mut remaining_start = start;
    for chunk in chunks {
        let chunk_len = chunk.length();
        if let Some(end) = end {
            if base >= end {
                break;
            }
        }
        if remaining_start >= chunk_len {
            base += chunk_len;
            remaining_start -= chunk_len;
            continue;
        }
        let local_end = end.map(|e| e.saturating_sub(base));
        if let Some(idx) = chunk.find(byte, remaining_start, local_end) {
            return Some(base + idx);
        }
        base += chunk_len;
        remaining_start = 0;
    }
    None
}

/// Finds `needle` in the logical stream `[start, end)`. A match must lie
/// entirely within `[start, end)` (see DESIGN.md for why that reading of
/// spec.md's open question was chosen).
///
/// Single-byte needles delegate to [`find_byte`]. Longer needles locate
/// the first byte as a candidate, then verify the rest one byte at a
/// time via `find_byte` windows of length 1 — this is what lets a match
/// straddle a chunk boundary without ever materializing a contiguous
/// copy of the buffered data.
pub(crate) fn find(
    chunks: &VecDeque<Chunk>,
    needle: &[u8],
    start: usize,
    end: Option<usize>,
) -> Option<usize> {
    match needle.len() {
        0 => {
            let total: usize = chunks.iter().map(Chunk::length).sum();
            if start <= total {
                Some(start)
            } else {
                None
            }
        }
        1 => find_byte(chunks, needle[0], start, end),
        _ => find_multi(chunks, needle, start, end),
    }
}

fn find_multi(
    chunks: &VecDeque<Chunk>,
    needle: &[u8],
    start: usize,
    end: Option<usize>,
) -> Option<usize> {
    let mut candidate_start = start;
    loop {
        let idx = find_byte(chunks, needle[0], candidate_start, end)?;
        if let Some(end) = end {
            if idx + needle.len() > end {
                return None;
            }
        }
        let mut matched = true;
        for (offset, &want) in needle.iter().enumerate().skip(1) {
            let pos = idx + offset;
            match find_byte(chunks, want, pos, Some(pos + 1)) {
                Some(found) if found == pos => continue,
                _ => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some(idx);
        }
        candidate_start = idx + 1;
    }
}
