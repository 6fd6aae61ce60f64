//! String helpers for log output.

/// Truncate `s` to at most `max_bytes`, backing off to the previous UTF-8
/// boundary when the cut would land inside a codepoint.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
