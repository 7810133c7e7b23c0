//! Chunk planner: deterministic fixed-size splitting.
//!
//! Sizes are counted in characters (Unicode scalar values), and slices
//! always fall on character boundaries. Concatenating the output in order
//! gives back the input exactly.

/// Split `text` into consecutive slices of at most `max_size` characters.
///
/// Every slice except possibly the last has exactly `max_size` characters.
/// Empty input yields no slices. `max_size` of 0 is treated as 1.
pub fn split(text: &str, max_size: usize) -> Vec<&str> {
    let max_size = max_size.max(1);
    let mut out = Vec::with_capacity(text.len() / max_size + 1);
    let mut rest = text;
    while !rest.is_empty() {
        let cut = byte_offset_of_char(rest, max_size);
        let (head, tail) = rest.split_at(cut);
        out.push(head);
        rest = tail;
    }
    out
}

/// Number of chunks [`split`] produces for `text`.
pub fn chunk_count(text: &str, max_size: usize) -> usize {
    text.chars().count().div_ceil(max_size.max(1))
}

/// Byte offset of the `n`-th character, or the string length if shorter.
pub(crate) fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
