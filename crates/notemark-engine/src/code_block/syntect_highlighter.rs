//! Default [`TokenHighlighter`] backed by syntect's bundled syntaxes and
//! themes.

use std::collections::BTreeSet;

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use super::tokenizer::{TokenHighlighter, TokenizedString};
use crate::buffer::Color;
use crate::error::HighlightError;

const LIGHT_THEME: &str = "InspiredGitHub";
const DARK_THEME: &str = "base16-ocean.dark";

pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    languages: Vec<String>,
}

impl SyntectHighlighter {
    pub fn new(dark: bool) -> Result<Self, HighlightError> {
        let name = if dark { DARK_THEME } else { LIGHT_THEME };
        let theme = ThemeSet::load_defaults()
            .themes
            .remove(name)
            .ok_or(HighlightError::TokenizerUnavailable)?;
        let syntax_set = SyntaxSet::load_defaults_newlines();

        let languages: BTreeSet<String> = syntax_set
            .syntaxes()
            .iter()
            .flat_map(|syntax| {
                std::iter::once(syntax.name.to_lowercase())
                    .chain(syntax.file_extensions.iter().map(|ext| ext.to_lowercase()))
            })
            .collect();

        Ok(Self {
            syntax_set,
            theme,
            languages: languages.into_iter().collect(),
        })
    }
}

impl TokenHighlighter for SyntectHighlighter {
    fn highlight(
        &self,
        code: &str,
        language: Option<&str>,
    ) -> Result<TokenizedString, HighlightError> {
        let syntax = language
            .and_then(|lang| self.syntax_set.find_syntax_by_token(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());
        let mut lines = HighlightLines::new(syntax, &self.theme);

        let mut out = TokenizedString::default();
        for line in LinesWithEndings::from(code) {
            let ranges = lines
                .highlight_line(line, &self.syntax_set)
                .map_err(|e| HighlightError::Tokenizer {
                    reason: e.to_string(),
                })?;
            for (style, piece) in ranges {
                let fg = style.foreground;
                out.push(
                    piece,
                    Color::rgba(fg.r, fg.g, fg.b, fg.a),
                    style.font_style.contains(FontStyle::BOLD),
                    style.font_style.contains(FontStyle::ITALIC),
                );
                out.text.push_str(piece);
            }
        }
        Ok(out)
    }

    fn supported_languages(&self) -> Vec<String> {
        self.languages.clone()
    }
}
