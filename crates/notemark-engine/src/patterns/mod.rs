//! # Pattern Library
//!
//! Every Markdown construct the highlighter recognises, compiled once and
//! shared read-only by all documents.
//!
//! ## Line locality
//!
//! Prose patterns never match across a line break, with the single exception
//! of Setext headers (title line + underline). A scan over a line-aligned
//! window therefore sees exactly the matches a whole-document scan sees on
//! those lines, which is what keeps incremental rescans in step with full
//! ones.
//!
//! ## Failure handling
//!
//! A pattern that fails to compile is dropped and reported; rules that depend
//! on it simply find nothing.

pub mod nesting;

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::HighlightError;

/// Identifies one pattern in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternId {
    AtxHeader,
    SetextHeader,
    ReferenceDefinition,
    ListMarker,
    InlineAnchor,
    ReferenceAnchor,
    InlineImage,
    BlockImage,
    AppLink,
    Bold,
    Italic,
    Strikethrough,
    CodeSpan,
    FencedCode,
    HtmlTag,
    HtmlComment,
    Emoji,
    BlockQuote,
    Url,
}

impl PatternId {
    pub const ALL: [PatternId; 19] = [
        PatternId::AtxHeader,
        PatternId::SetextHeader,
        PatternId::ReferenceDefinition,
        PatternId::ListMarker,
        PatternId::InlineAnchor,
        PatternId::ReferenceAnchor,
        PatternId::InlineImage,
        PatternId::BlockImage,
        PatternId::AppLink,
        PatternId::Bold,
        PatternId::Italic,
        PatternId::Strikethrough,
        PatternId::CodeSpan,
        PatternId::FencedCode,
        PatternId::HtmlTag,
        PatternId::HtmlComment,
        PatternId::Emoji,
        PatternId::BlockQuote,
        PatternId::Url,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PatternId::AtxHeader => "atx-header",
            PatternId::SetextHeader => "setext-header",
            PatternId::ReferenceDefinition => "reference-definition",
            PatternId::ListMarker => "list-marker",
            PatternId::InlineAnchor => "inline-anchor",
            PatternId::ReferenceAnchor => "reference-anchor",
            PatternId::InlineImage => "inline-image",
            PatternId::BlockImage => "block-image",
            PatternId::AppLink => "app-link",
            PatternId::Bold => "bold",
            PatternId::Italic => "italic",
            PatternId::Strikethrough => "strikethrough",
            PatternId::CodeSpan => "code-span",
            PatternId::FencedCode => "fenced-code",
            PatternId::HtmlTag => "html-tag",
            PatternId::HtmlComment => "html-comment",
            PatternId::Emoji => "emoji",
            PatternId::BlockQuote => "block-quote",
            PatternId::Url => "url",
        }
    }

    /// The regex source for this pattern.
    pub fn source(self) -> String {
        let brackets = nesting::nested_brackets();
        let parens = nesting::nested_parens();
        match self {
            // 1: opening hashes, 2: title text.
            PatternId::AtxHeader => {
                r"(?m)^(#{1,6})(?:[ \t]+([^\n]*?))?(?:[ \t]+#+)?[ \t]*$".to_string()
            }
            // 1: title line, 2: underline. The title needs one character that
            // could not itself be an underline.
            PatternId::SetextHeader => r"(?m)^([^\n]*[^\s=\-][^\n]*)\n(=+|-+)[ \t]*$".to_string(),
            // 1: label, 2: target.
            PatternId::ReferenceDefinition => concat!(
                r#"(?m)^[ ]{0,3}\[([^\[\]\n]+)\]:[ \t]*<?([^\s>]+)>?"#,
                r#"(?:[ \t]+(?:"[^"\n]*"|'[^'\n]*'|\([^)\n]*\)))?[ \t]*$"#
            )
            .to_string(),
            // 1: indent, 2: marker.
            PatternId::ListMarker => r"(?m)^([ \t]*)([*+\-]|\d{1,9}[.)])[ \t]+".to_string(),
            // 1: label, 2: target (with optional title).
            PatternId::InlineAnchor => {
                format!(r"\[({brackets})\]\([ \t]*<?({parens}?)>?[ \t]*\)")
            }
            // 1: label, 2: reference id.
            PatternId::ReferenceAnchor => format!(r"\[({brackets})\][ ]?\[([^\[\]\n]*)\]"),
            // 1: alt text, 2: source.
            PatternId::InlineImage => {
                format!(r"!\[({brackets})\]\([ \t]*<?({parens}?)>?[ \t]*\)")
            }
            PatternId::BlockImage => {
                format!(r"(?m)^[ \t]*!\[({brackets})\]\([ \t]*<?({parens}?)>?[ \t]*\)[ \t]*$")
            }
            // 1: page name.
            PatternId::AppLink => r"\[\[([^\[\]\n]+)\]\]".to_string(),
            // 1 or 2: emphasised text.
            PatternId::Bold => {
                r"\*\*([^\s*](?:[^\n]*?[^\s*])?)\*\*|__([^\s_](?:[^\n]*?[^\s_])?)__".to_string()
            }
            PatternId::Italic => {
                r"\*([^\s*](?:[^\n*]*?[^\s*])?)\*|_([^\s_](?:[^\n_]*?[^\s_])?)_".to_string()
            }
            PatternId::Strikethrough => r"~~([^\s~](?:[^\n]*?[^\s~])?)~~".to_string(),
            // 1 or 2: code text.
            PatternId::CodeSpan => r"``([^\n]+?)``|`([^`\n]+)`".to_string(),
            // 1: language token. Open and close fences sit at line starts.
            PatternId::FencedCode => {
                r"(?m)^```[ \t]*([^\s`]*)[^\n]*\n(?:[^\n]*\n)*?```[ \t]*$".to_string()
            }
            PatternId::HtmlTag => {
                r"</?[A-Za-z][A-Za-z0-9\-]*(?:[ \t][^<>\n]*?)?[ \t]*/?>".to_string()
            }
            PatternId::HtmlComment => r"<!--[^\n]*?-->".to_string(),
            // 1: shortcode name.
            PatternId::Emoji => r":([a-z][a-z0-9_+\-]*|\+1|-1):".to_string(),
            // 1: quote markers.
            PatternId::BlockQuote => r"(?m)^([ \t]{0,3}(?:>[ \t]?)+)[^\n]*$".to_string(),
            PatternId::Url => concat!(
                r#"(?:https?|ftp|file|app)://[^\s<>\[\]()"']+"#,
                r#"|www\.[^\s<>\[\]()"']+"#,
                r#"|/(?:i|files)/[^\s<>\[\]()"']+"#
            )
            .to_string(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Compiled patterns, one slot per [`PatternId`].
#[derive(Debug)]
pub struct PatternLibrary {
    patterns: Vec<Option<Regex>>,
}

impl PatternLibrary {
    /// Compiles the standard pattern set. Failed patterns are returned as
    /// errors and left empty in the library.
    pub fn compile() -> (Self, Vec<HighlightError>) {
        Self::compile_with(PatternId::source)
    }

    /// Compiles the library from custom sources.
    pub fn compile_with(source: impl Fn(PatternId) -> String) -> (Self, Vec<HighlightError>) {
        let mut patterns = Vec::with_capacity(PatternId::ALL.len());
        let mut errors = Vec::new();

        for id in PatternId::ALL {
            debug_assert_eq!(id.index(), patterns.len());
            match Regex::new(&source(id)) {
                Ok(re) => patterns.push(Some(re)),
                Err(source) => {
                    patterns.push(None);
                    errors.push(HighlightError::PatternCompile {
                        name: id.name(),
                        source,
                    });
                }
            }
        }

        (Self { patterns }, errors)
    }

    /// The process-wide library, compiled on first use.
    pub fn shared() -> &'static PatternLibrary {
        static SHARED: OnceLock<PatternLibrary> = OnceLock::new();
        SHARED.get_or_init(|| {
            let (library, errors) = Self::compile();
            for error in &errors {
                log::error!("{error}");
            }
            library
        })
    }

    pub fn get(&self, id: PatternId) -> Option<&Regex> {
        self.patterns.get(id.index()).and_then(Option::as_ref)
    }

    pub fn is_available(&self, id: PatternId) -> bool {
        self.get(id).is_some()
    }

    /// All captures of `id` in `text`; nothing if the pattern is unavailable.
    pub fn captures<'t>(&self, id: PatternId, text: &'t str) -> Vec<Captures<'t>> {
        match self.get(id) {
            Some(re) => re.captures_iter(text).collect(),
            None => Vec::new(),
        }
    }

    /// Like [`captures`](Self::captures), but a match rejected by `accept`
    /// does not consume its text: the search resumes one character after the
    /// rejected match's start.
    pub fn captures_where<'t>(
        &self,
        id: PatternId,
        text: &'t str,
        mut accept: impl FnMut(&Captures<'t>) -> bool,
    ) -> Vec<Captures<'t>> {
        let Some(re) = self.get(id) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut pos = 0;
        while pos <= text.len() {
            let Some(caps) = re.captures_at(text, pos) else {
                break;
            };
            let whole = caps.get(0).map_or(pos..pos, |m| m.range());
            if accept(&caps) {
                pos = if whole.is_empty() {
                    next_char_boundary(text, whole.end)
                } else {
                    whole.end
                };
                out.push(caps);
            } else {
                pos = next_char_boundary(text, whole.start);
            }
        }
        out
    }
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| pos + c.len_utf8())
}
