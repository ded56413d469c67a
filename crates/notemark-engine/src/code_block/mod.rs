//! # Code Blocks
//!
//! Detection and styling of fenced and indented code blocks, plus the inline
//! code span helper.
//!
//! Block interiors are colored by an external [`TokenHighlighter`] when one
//! is available and the block is small enough; otherwise they get flat code
//! styling. Tokenizer failures of any kind, panics included, degrade to flat
//! styling and are only logged.

pub mod fence;
pub mod syntect_highlighter;
pub mod tokenizer;

use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};

pub use fence::CodeFence;
pub use syntect_highlighter::SyntectHighlighter;
pub use tokenizer::{
    HighlighterProvider, HighlighterRegistry, NoHighlighter, Token, TokenHighlighter,
    TokenizedString,
};

use crate::buffer::lines::{line_end, line_start, lines_with_spans};
use crate::buffer::{AttributeKind, StyleAttribute, TextRange, Utf16Index};
use crate::engine::StyleEngine;
use crate::error::HighlightError;
use crate::highlight::AttributeWriter;
use crate::patterns::{PatternId, PatternLibrary};
use crate::theme::StyleRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeBlockKind {
    Fenced,
    Indented,
}

/// A detected code block.
///
/// `range` is line aligned: it starts at a line start and includes the
/// trailing line break of its last line. Blocks never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockSpan {
    pub range: TextRange,
    /// Fence language token, lowercased.
    pub language: Option<String>,
    pub kind: CodeBlockKind,
    pub(crate) bytes: Range<usize>,
    /// Bytes of the code itself, without fence lines.
    pub(crate) content: Range<usize>,
}

impl CodeBlockSpan {
    pub fn bytes(&self) -> Range<usize> {
        self.bytes.clone()
    }

    pub fn content_bytes(&self) -> Range<usize> {
        self.content.clone()
    }
}

/// All code blocks in `text`, in document order.
pub fn find_code_blocks(
    text: &str,
    idx: &Utf16Index,
    patterns: &PatternLibrary,
) -> Vec<CodeBlockSpan> {
    let mut blocks = find_fenced(text, idx, patterns);
    let fenced: Vec<Range<usize>> = blocks.iter().map(|b| b.bytes.clone()).collect();
    blocks.extend(find_indented(text, idx, patterns, &fenced));
    blocks.sort_by_key(|b| b.bytes.start);
    blocks
}

fn find_fenced(text: &str, idx: &Utf16Index, patterns: &PatternLibrary) -> Vec<CodeBlockSpan> {
    patterns
        .captures(PatternId::FencedCode, text)
        .into_iter()
        .filter_map(|caps| {
            let m = caps.get(0)?;
            let bytes = m.start()..line_end(text, m.end());
            let open_end = line_end(text, m.start());
            let close_start = line_start(text, m.end());
            Some(CodeBlockSpan {
                range: idx.range(bytes.clone()),
                language: CodeFence::language(&text[m.start()..open_end]),
                kind: CodeBlockKind::Fenced,
                bytes,
                content: open_end..close_start.max(open_end),
            })
        })
        .collect()
}

fn is_indented(line: &str) -> bool {
    (line.starts_with("    ") || line.starts_with('\t')) && !line.trim().is_empty()
}

/// Indented blocks: runs of lines indented by four spaces or a tab, opened
/// after a blank line, not continuing a list. Blank lines may sit inside a
/// block but never end it. `fenced` is in document order.
fn find_indented(
    text: &str,
    idx: &Utf16Index,
    patterns: &PatternLibrary,
    fenced: &[Range<usize>],
) -> Vec<CodeBlockSpan> {
    let is_list_item =
        |line: &str| patterns.get(PatternId::ListMarker).is_some_and(|re| re.is_match(line));

    let mut blocks = Vec::new();
    let mut current: Option<Range<usize>> = None;
    let mut prev_blank = true;
    let mut in_list = false;

    let mut close = |current: &mut Option<Range<usize>>| {
        if let Some(bytes) = current.take() {
            blocks.push(CodeBlockSpan {
                range: idx.range(bytes.clone()),
                language: None,
                kind: CodeBlockKind::Indented,
                content: bytes.clone(),
                bytes,
            });
        }
    };

    let mut fences = fenced.iter().peekable();
    for line in lines_with_spans(text) {
        while fences.next_if(|f| f.end <= line.span.start).is_some() {}
        if fences.peek().is_some_and(|f| f.contains(&line.span.start)) {
            close(&mut current);
            prev_blank = false;
            in_list = false;
            continue;
        }

        let content = line.content();
        let blank = content.trim().is_empty();

        if let Some(bytes) = current.as_mut() {
            if blank {
                prev_blank = true;
                continue;
            }
            if is_indented(content) {
                bytes.end = line.span.end;
                prev_blank = false;
                continue;
            }
            close(&mut current);
        }

        if blank {
            prev_blank = true;
            continue;
        }

        let list_item = is_list_item(content);
        if is_indented(content) && prev_blank && !in_list && !list_item {
            current = Some(line.span.clone());
        } else {
            in_list = list_item || (in_list && is_indented(content));
        }
        prev_blank = false;
    }
    close(&mut current);
    blocks
}

/// Styles one block: flat code styling, then token colors when a highlighter
/// is available and the block is within the size cap.
pub(crate) fn style_block(
    engine: &StyleEngine,
    writer: &mut AttributeWriter<'_>,
    text: &str,
    idx: &Utf16Index,
    block: &CodeBlockSpan,
) {
    let theme = engine.theme();
    let code_font = theme.code_font();

    for kind in [
        AttributeKind::Link,
        AttributeKind::Strikethrough,
        AttributeKind::Attachment,
        AttributeKind::ParagraphStyle,
        AttributeKind::CodeLanguage,
    ] {
        writer.remove(block.range, kind);
    }
    writer.font(block.range, code_font.clone());
    writer.foreground(block.range, theme.color(StyleRole::Code));
    writer.set(block.range, StyleAttribute::CodeBlockFlag(true));

    if block.kind == CodeBlockKind::Fenced {
        style_fence_lines(engine, writer, text, idx, block);
    }

    let content = idx.range(block.content.clone());
    let Some(highlighter) = eligible_highlighter(engine, block, content) else {
        return;
    };

    let language = resolve_language(engine, highlighter.as_ref(), block.language.as_deref());
    let code = &text[block.content.clone()];
    match tokenize(highlighter.as_ref(), code, language.as_deref()) {
        Ok(tokens) => {
            let buffer_len = writer.len();
            for token in &tokens.tokens {
                let Some(range) = token.range.shifted(content.location).clamp_to(buffer_len)
                else {
                    continue;
                };
                let mut font = code_font.clone();
                font.bold = token.bold;
                font.italic = token.italic;
                writer.font(range, font);
                writer.foreground(range, token.foreground);
            }
            if let Some(language) = language {
                writer.set(block.range, StyleAttribute::CodeLanguage(language));
            }
        }
        Err(e) => log::warn!("Falling back to flat code styling: {e}"),
    }
}

fn style_fence_lines(
    engine: &StyleEngine,
    writer: &mut AttributeWriter<'_>,
    text: &str,
    idx: &Utf16Index,
    block: &CodeBlockSpan,
) {
    let theme = engine.theme();
    let open = block.bytes.start..block.content.start;
    let close = block.content.end..block.bytes.end;

    for line in [open, close] {
        let trimmed = text[line.clone()].trim_end_matches(['\r', '\n']).len();
        let visible = line.start..line.start + trimmed;
        writer.foreground(idx.range(visible), theme.color(StyleRole::Syntax));
        if engine.settings().hide_syntax {
            let ticks = line.start..line.start + CodeFence::BACKTICKS.len().min(trimmed);
            writer.hide(idx.range(ticks), &theme.code_font());
        }
    }
}

fn eligible_highlighter(
    engine: &StyleEngine,
    block: &CodeBlockSpan,
    content: TextRange,
) -> Option<std::sync::Arc<dyn TokenHighlighter>> {
    let settings = engine.settings();
    if settings.skip_highlighting {
        return None;
    }
    let cap = settings.active_code_size_cap();
    if content.length > cap {
        log::debug!(
            "Code block at {:?} is {} units, over the cap of {cap}",
            block.range,
            content.length
        );
        return None;
    }
    let highlighter = engine.highlighter();
    if highlighter.is_none() {
        log::debug!("{}", HighlightError::TokenizerUnavailable);
    }
    highlighter
}

/// The fence language if the highlighter supports it and the host has not
/// marked it unsupported.
fn resolve_language(
    engine: &StyleEngine,
    highlighter: &dyn TokenHighlighter,
    token: Option<&str>,
) -> Option<String> {
    let token = token?.to_lowercase();
    if engine.settings().is_language_unsupported(&token) {
        return None;
    }
    highlighter
        .supported_languages()
        .iter()
        .any(|lang| lang.eq_ignore_ascii_case(&token))
        .then_some(token)
}

/// Runs the tokenizer, containing panics and rejecting output whose text
/// differs from the input.
fn tokenize(
    highlighter: &dyn TokenHighlighter,
    code: &str,
    language: Option<&str>,
) -> Result<TokenizedString, HighlightError> {
    let tokens = catch_unwind(AssertUnwindSafe(|| highlighter.highlight(code, language)))
        .map_err(|payload| HighlightError::Tokenizer {
            reason: panic_message(payload.as_ref()),
        })??;

    if tokens.text != code {
        return Err(HighlightError::TokenizerMismatch {
            len: crate::buffer::utf16_len(code),
        });
    }
    Ok(tokens)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string())
}

/// Inline code span: code font and color on the content, syntax color on the
/// backtick markers (hidden when syntax hiding is on).
pub(crate) fn style_inline_code(
    engine: &StyleEngine,
    writer: &mut AttributeWriter<'_>,
    markers: [TextRange; 2],
    content: TextRange,
) {
    let theme = engine.theme();
    writer.font(content, theme.code_font());
    writer.foreground(content, theme.color(StyleRole::Code));
    for marker in markers {
        writer.foreground(marker, theme.color(StyleRole::Syntax));
        if engine.settings().hide_syntax {
            writer.hide(marker, &theme.body_font());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blocks(text: &str) -> Vec<(CodeBlockKind, String, Option<String>)> {
        let idx = Utf16Index::new(text, 0);
        find_code_blocks(text, &idx, PatternLibrary::shared())
            .into_iter()
            .map(|b| (b.kind, text[b.bytes.clone()].to_string(), b.language))
            .collect()
    }

    #[test]
    fn fenced_block_is_line_aligned() {
        let text = "intro\n```Rust\nfn main() {}\n```\nafter";
        let idx = Utf16Index::new(text, 0);
        let found = find_code_blocks(text, &idx, PatternLibrary::shared());

        assert_eq!(found.len(), 1);
        let block = &found[0];
        assert_eq!(&text[block.bytes()], "```Rust\nfn main() {}\n```\n");
        assert_eq!(&text[block.content_bytes()], "fn main() {}\n");
        assert_eq!(block.language.as_deref(), Some("rust"));
        assert_eq!(block.range, TextRange::new(6, 25));
    }

    #[test]
    fn empty_fenced_block_at_end_of_text() {
        let text = "```\n```";
        let idx = Utf16Index::new(text, 0);
        let found = find_code_blocks(text, &idx, PatternLibrary::shared());
        assert_eq!(found[0].bytes(), 0..7);
        assert_eq!(found[0].content_bytes(), 4..4);
    }

    #[test]
    fn indented_block_after_blank_line() {
        let text = "para\n\n    let x = 1;\n\n    let y = 2;\n\nend\n";
        assert_eq!(
            blocks(text),
            vec![(
                CodeBlockKind::Indented,
                "    let x = 1;\n\n    let y = 2;\n".to_string(),
                None
            )]
        );
    }

    #[test]
    fn indented_text_without_blank_line_is_not_code() {
        assert_eq!(blocks("para\n    continued\n"), vec![]);
    }

    #[test]
    fn indented_list_continuation_is_not_code() {
        assert_eq!(blocks("- item\n\n    more about item\n"), vec![]);
        assert_eq!(blocks("\n    - nested item\n"), vec![]);
    }

    #[test]
    fn indented_lines_inside_fence_belong_to_the_fence() {
        let text = "\n```\n\n    indented\n```\n";
        let found = blocks(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, CodeBlockKind::Fenced);
    }

    #[test]
    fn indented_blocks_between_many_fences() {
        let text = "```\n\n    a\n```\n\n    b\n\n```\n    c\n```\n\n    d\n";
        let indented: Vec<_> = blocks(text)
            .into_iter()
            .filter(|b| b.0 == CodeBlockKind::Indented)
            .map(|b| b.1)
            .collect();
        assert_eq!(indented, vec!["    b\n".to_string(), "    d\n".to_string()]);
        assert_eq!(blocks(text).len(), 4);
    }

    #[test]
    fn mixed_blocks_are_sorted() {
        let text = "    first\n\n```sh\nls\n```\n\n    second\n";
        let kinds: Vec<_> = blocks(text).into_iter().map(|b| b.0).collect();
        assert_eq!(
            kinds,
            vec![
                CodeBlockKind::Indented,
                CodeBlockKind::Fenced,
                CodeBlockKind::Indented
            ]
        );
    }
}
