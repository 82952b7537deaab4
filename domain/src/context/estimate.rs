//! Token estimation.

/// Characters per token used when no exact count is available.
pub const CHARS_PER_TOKEN: usize = 4;

/// Counts tokens of rendered prompt text. Exact provider counts are plugged
/// in by the caller; [`estimate_tokens`] is the default.
pub type TokenCounter<'a> = &'a dyn Fn(&str) -> usize;

/// `⌈chars / 4⌉`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}
