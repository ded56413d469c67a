/// Deepest bracket/paren nesting the anchor and image patterns accept.
pub const MAX_NESTING_DEPTH: usize = 6;

/// Builds a pattern matching text with `open`/`close` pairs balanced up to
/// `depth` levels deep, never crossing a line break.
///
/// Each level is the alternation "a non-delimiter character, or a delimited
/// group of the previous level", repeated. Depth 0 accepts no delimiters at
/// all. The result has no capture groups, so callers can wrap it freely.
pub fn balanced(open: char, close: char, depth: usize) -> String {
    let o = regex::escape(&open.to_string());
    let c = regex::escape(&close.to_string());
    let atom = format!(r"[^{o}{c}\n]");

    let mut pattern = format!("{atom}*");
    for _ in 0..depth {
        pattern = format!("(?:{atom}|{o}{pattern}{c})*");
    }
    pattern
}

/// Balanced `[...]` content, up to [`MAX_NESTING_DEPTH`].
pub fn nested_brackets() -> String {
    balanced('[', ']', MAX_NESTING_DEPTH)
}

/// Balanced `(...)` content, up to [`MAX_NESTING_DEPTH`].
pub fn nested_parens() -> String {
    balanced('(', ')', MAX_NESTING_DEPTH)
}
