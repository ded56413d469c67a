//! The token highlighter seam.
//!
//! Coloring inside code blocks is delegated to an external tokenizer. The
//! engine only needs two things from it: a list of supported language ids and
//! a colored copy of a code string. Instances are expensive to build, so they
//! are handed out by a [`HighlighterProvider`] that caches one per theme.

use std::sync::{Arc, Mutex, OnceLock};

use crate::buffer::{Color, TextRange, utf16_len};
use crate::error::HighlightError;

/// One colored token. `range` is in UTF-16 units relative to the tokenized
/// string.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub range: TextRange,
    pub foreground: Color,
    pub bold: bool,
    pub italic: bool,
}

/// A tokenizer's output: the text it actually colored plus its tokens.
///
/// The text is returned so the caller can check it matches what was sent in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedString {
    pub text: String,
    pub tokens: Vec<Token>,
}

impl TokenizedString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens: Vec::new(),
        }
    }

    /// Appends a token covering `piece`, placed right after the previous one.
    pub fn push(&mut self, piece: &str, foreground: Color, bold: bool, italic: bool) {
        let location = self.tokens.last().map_or(0, |t| t.range.end());
        let length = utf16_len(piece);
        if length == 0 {
            return;
        }
        self.tokens.push(Token {
            range: TextRange::new(location, length),
            foreground,
            bold,
            italic,
        });
    }
}

pub trait TokenHighlighter: Send + Sync {
    /// Colors `code`. `language` is a lowercased id from
    /// [`supported_languages`](Self::supported_languages), or `None` for plain
    /// text.
    fn highlight(&self, code: &str, language: Option<&str>)
    -> Result<TokenizedString, HighlightError>;

    /// Language ids (lowercase) this highlighter can color.
    fn supported_languages(&self) -> Vec<String>;
}

/// Hands out the token highlighter for the current theme.
pub trait HighlighterProvider: Send + Sync {
    /// `None` when no highlighter could be built.
    fn highlighter(&self, dark: bool) -> Option<Arc<dyn TokenHighlighter>>;
}

type Factory = dyn Fn(bool) -> Result<Arc<dyn TokenHighlighter>, HighlightError> + Send + Sync;

#[derive(Clone)]
struct Cached {
    dark: bool,
    highlighter: Option<Arc<dyn TokenHighlighter>>,
}

/// Lazily built, cached highlighter that is rebuilt only when the theme flips
/// between light and dark.
///
/// A failed build is cached too, so a missing resource is reported once per
/// theme rather than on every keystroke.
pub struct HighlighterRegistry {
    factory: Box<Factory>,
    slot: Mutex<Option<Cached>>,
}

impl HighlighterRegistry {
    pub fn new(
        factory: impl Fn(bool) -> Result<Arc<dyn TokenHighlighter>, HighlightError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    /// The process-wide registry backed by syntect.
    pub fn global() -> Arc<HighlighterRegistry> {
        static GLOBAL: OnceLock<Arc<HighlighterRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                Arc::new(HighlighterRegistry::new(|dark| {
                    let highlighter = super::syntect_highlighter::SyntectHighlighter::new(dark)?;
                    Ok(Arc::new(highlighter) as Arc<dyn TokenHighlighter>)
                }))
            })
            .clone()
    }
}

impl HighlighterProvider for HighlighterRegistry {
    fn highlighter(&self, dark: bool) -> Option<Arc<dyn TokenHighlighter>> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(cached) = slot.as_ref().filter(|c| c.dark == dark) {
            return cached.highlighter.clone();
        }

        log::debug!("Building token highlighter (dark: {dark})");
        let highlighter = match (self.factory)(dark) {
            Ok(h) => Some(h),
            Err(e) => {
                log::warn!("Token highlighter unavailable: {e}");
                None
            }
        };
        *slot = Some(Cached {
            dark,
            highlighter: highlighter.clone(),
        });
        highlighter
    }
}

/// A provider that never has a highlighter; every block gets flat styling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHighlighter;

impl HighlighterProvider for NoHighlighter {
    fn highlighter(&self, _dark: bool) -> Option<Arc<dyn TokenHighlighter>> {
        None
    }
}
