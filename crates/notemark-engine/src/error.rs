use crate::buffer::TextRange;

/// Failures inside the highlighting engine.
///
/// None of these reach the end user: each one degrades to a dropped write or
/// to flat code styling, and the document stays editable.
#[derive(Debug, thiserror::Error)]
pub enum HighlightError {
    #[error("Pattern {name} failed to compile: {source}")]
    PatternCompile {
        name: &'static str,
        source: regex::Error,
    },
    #[error("Range {range:?} exceeds buffer length {buffer_len}")]
    RangeOutOfBounds { range: TextRange, buffer_len: u32 },
    #[error("Token highlighter changed the text of a {len} unit code block")]
    TokenizerMismatch { len: u32 },
    #[error("No token highlighter available")]
    TokenizerUnavailable,
    #[error("Token highlighter failed: {reason}")]
    Tokenizer { reason: String },
}
