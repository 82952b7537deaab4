//! Shared utility functions.

/// Marker appended to content that was cut to fit a budget.
pub const TRUNCATION_MARKER: &str = "\n[... truncated]";

/// Truncate a string to approximately `max_bytes` without splitting a UTF-8
/// character boundary.
///
/// Returns a sub-slice of the original string. If the string is shorter than
/// `max_bytes`, the entire string is returned unchanged.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate to at most `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed. The marker counts against the limit.
pub fn truncate_chars_with_marker(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return s.chars().take(max_chars).collect();
    }
    let mut out: String = s.chars().take(max_chars - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// One-line preview for log messages.
pub fn preview(s: &str, max_bytes: usize) -> String {
    let line = s.lines().next().unwrap_or_default();
    let cut = truncate_str(line, max_bytes);
    if cut.len() < s.len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}
