/// Fence marker knowledge shared by block detection and the rescan classifier.
pub struct CodeFence;

impl CodeFence {
    pub const BACKTICKS: &'static str = "```";
    /// Two ticks: what is left of a fence torn by a single backspace.
    pub const TORN: &'static str = "``";

    /// True when `line` opens or closes a fence, ignoring leading whitespace.
    pub fn is_fence_line(line: &str) -> bool {
        line.trim_start().starts_with(Self::BACKTICKS)
    }

    /// The language token after an opening fence, lowercased.
    ///
    /// `None` for a bare fence or when `line` is not a fence at all.
    pub fn language(line: &str) -> Option<String> {
        let rest = line.trim_start().strip_prefix(Self::BACKTICKS)?;
        let token = rest
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '`' || c == '{')
            .next()
            .unwrap_or_default();
        (!token.is_empty()).then(|| token.to_lowercase())
    }
}
