//! Prose rules. Each takes a line-aligned segment of the text, finds its
//! pattern there, and writes attributes. Wrapper attributes are written
//! before the nested ones that refine them.

use std::ops::Range;

use regex::Captures;

use super::{Pass, overlaps};
use crate::buffer::lines::{line_end, line_start};
use crate::buffer::{Alignment, Attachment, ParagraphStyle, StyleAttribute, utf16_len};
use crate::code_block;
use crate::patterns::PatternId;
use crate::theme::StyleRole;

/// Scheme used for links between notes.
pub const APP_LINK_PREFIX: &str = "app://goto/";

/// An inline or block image match, in absolute bytes.
#[derive(Debug, Clone)]
pub(super) struct ImageMatch {
    whole: Range<usize>,
    alt: Range<usize>,
    target: Range<usize>,
    block: bool,
}

fn shift(seg: &Range<usize>, r: Range<usize>) -> Range<usize> {
    seg.start + r.start..seg.start + r.end
}

fn hits(zones: &[Range<usize>], r: &Range<usize>) -> bool {
    zones.iter().any(|z| overlaps(z, r))
}

fn group(seg: &Range<usize>, caps: &Captures<'_>, n: usize) -> Option<Range<usize>> {
    caps.get(n).map(|m| shift(seg, m.range()))
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The link destination without its optional title and angle brackets.
fn destination(raw: &str) -> &str {
    raw.trim()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_start_matches('<')
        .trim_end_matches('>')
}

impl Pass<'_> {
    fn marker(&mut self, bytes: Range<usize>) {
        let range = self.idx.range(bytes);
        let theme = self.engine.theme();
        self.writer.foreground(range, theme.color(StyleRole::Syntax));
        if self.engine.settings().hide_syntax {
            self.writer.hide(range, &theme.body_font());
        }
    }

    fn paint(&mut self, bytes: Range<usize>, role: StyleRole) {
        let range = self.idx.range(bytes);
        self.writer.foreground(range, self.engine.theme().color(role));
    }

    fn link(&mut self, bytes: Range<usize>, target: String) {
        let range = self.idx.range(bytes);
        self.writer.set(range, StyleAttribute::Link(target));
    }

    /// Where a written link destination points, or `None` when it cannot be
    /// resolved.
    fn link_target(&self, raw: &str) -> Option<String> {
        let dest = destination(raw);
        if dest.is_empty() {
            return None;
        }
        if dest.contains("://") || dest.starts_with("mailto:") || dest.starts_with('#') {
            return Some(dest.to_string());
        }
        if dest.starts_with("www.") {
            return Some(format!("https://{dest}"));
        }
        self.engine.resolver().resolve(dest)
    }

    /// Bare references in prose. Repository-relative paths (`/i/...`,
    /// `/files/...`) are rewritten under the project root whether or not the
    /// file exists yet.
    fn bare_link_target(&self, raw: &str) -> Option<String> {
        if raw.starts_with('/') {
            return self.engine.resolver().rewrite(raw);
        }
        self.link_target(raw)
    }

    fn captures_in<'t>(
        &self,
        id: PatternId,
        text: &'t str,
        seg: &Range<usize>,
        skip: &[Range<usize>],
    ) -> Vec<Captures<'t>> {
        let s = &text[seg.clone()];
        self.engine.patterns().captures_where(id, s, |caps| {
            caps.get(0)
                .is_some_and(|m| !hits(skip, &shift(seg, m.range())))
        })
    }

    pub(super) fn atx_headers(&mut self, seg: &Range<usize>) {
        let text = self.text;
        for caps in self.captures_in(PatternId::AtxHeader, text, seg, &[]) {
            let (Some(m), Some(hashes)) = (group(seg, &caps, 0), group(seg, &caps, 1)) else {
                continue;
            };
            let level = u8::try_from(hashes.len()).unwrap_or(6);
            let line = self.idx.range(m.clone());
            let theme = self.engine.theme();
            self.writer.font(line, theme.title_font(level));
            self.writer.foreground(line, theme.color(StyleRole::Title));

            match group(seg, &caps, 2) {
                Some(title) => {
                    self.marker(m.start..title.start);
                    if title.end < m.end {
                        self.marker(title.end..m.end);
                    }
                }
                None => self.marker(m),
            }
        }
    }

    pub(super) fn setext_headers(&mut self, seg: &Range<usize>) {
        let text = self.text;
        for caps in self.captures_in(PatternId::SetextHeader, text, seg, &[]) {
            let (Some(m), Some(title), Some(underline)) = (
                group(seg, &caps, 0),
                group(seg, &caps, 1),
                group(seg, &caps, 2),
            ) else {
                continue;
            };
            let level = if text[underline.clone()].starts_with('=') { 1 } else { 2 };
            let range = self.idx.range(title);
            let theme = self.engine.theme();
            self.writer.font(range, theme.title_font(level));
            self.writer.foreground(range, theme.color(StyleRole::Title));
            self.marker(underline.start..m.end);
        }
    }

    pub(super) fn block_quotes(&mut self, seg: &Range<usize>) {
        let text = self.text;
        for caps in self.captures_in(PatternId::BlockQuote, text, seg, &[]) {
            let (Some(m), Some(markers)) = (group(seg, &caps, 0), group(seg, &caps, 1)) else {
                continue;
            };
            self.paint(m, StyleRole::Quote);
            self.paint(markers, StyleRole::Syntax);
        }
    }

    pub(super) fn list_markers(&mut self, seg: &Range<usize>) {
        let text = self.text;
        let body_size = self.engine.theme().body_font().size;
        for caps in self.captures_in(PatternId::ListMarker, text, seg, &[]) {
            let (Some(m), Some(marker)) = (group(seg, &caps, 0), group(seg, &caps, 2)) else {
                continue;
            };
            let line = self.idx.range(m.start..line_end(text, m.start));
            let indent = utf16_len(&text[m.clone()]) as f32 * body_size * 0.6;
            self.writer.set(
                line,
                StyleAttribute::ParagraphStyle(ParagraphStyle {
                    head_indent: indent,
                    alignment: Alignment::Natural,
                }),
            );
            self.paint(marker, StyleRole::List);
        }
    }

    pub(super) fn reference_definitions(&mut self, seg: &Range<usize>) {
        let text = self.text;
        for caps in self.captures_in(PatternId::ReferenceDefinition, text, seg, &[]) {
            let (Some(m), Some(label), Some(url)) = (
                group(seg, &caps, 0),
                group(seg, &caps, 1),
                group(seg, &caps, 2),
            ) else {
                continue;
            };
            self.paint(m, StyleRole::Syntax);
            self.paint(label, StyleRole::Link);
            self.paint(url.clone(), StyleRole::Link);
            if let Some(target) = self.link_target(&text[url.clone()]) {
                self.link(url, target);
            }
        }
    }

    /// Code spans as `(whole, content)` pairs.
    fn code_span_matches(&self, seg: &Range<usize>) -> Vec<(Range<usize>, Range<usize>)> {
        self.captures_in(PatternId::CodeSpan, self.text, seg, &[])
            .iter()
            .filter_map(|caps| {
                let whole = group(seg, caps, 0)?;
                let content = group(seg, caps, 1).or_else(|| group(seg, caps, 2))?;
                Some((whole, content))
            })
            .collect()
    }

    fn comment_matches(&self, seg: &Range<usize>, code: &[Range<usize>]) -> Vec<Range<usize>> {
        self.captures_in(PatternId::HtmlComment, self.text, seg, code)
            .iter()
            .filter_map(|caps| group(seg, caps, 0))
            .collect()
    }

    /// Ranges no inline rule may touch: code spans and HTML comments.
    pub(super) fn raw_zones(&self, seg: &Range<usize>) -> Vec<Range<usize>> {
        let mut zones: Vec<_> = self
            .code_span_matches(seg)
            .into_iter()
            .map(|(whole, _)| whole)
            .collect();
        let comments = self.comment_matches(seg, &zones);
        zones.extend(comments);
        zones
    }

    pub(super) fn code_spans(&mut self, seg: &Range<usize>) -> Vec<Range<usize>> {
        let spans = self.code_span_matches(seg);
        for (whole, content) in &spans {
            let markers = [
                self.idx.range(whole.start..content.start),
                self.idx.range(content.end..whole.end),
            ];
            let content = self.idx.range(content.clone());
            code_block::style_inline_code(self.engine, &mut self.writer, markers, content);
        }
        spans.into_iter().map(|(whole, _)| whole).collect()
    }

    pub(super) fn html_comments(&mut self, seg: &Range<usize>) -> Vec<Range<usize>> {
        let code: Vec<_> = self
            .code_span_matches(seg)
            .into_iter()
            .map(|(whole, _)| whole)
            .collect();
        let comments = self.comment_matches(seg, &code);
        for comment in &comments {
            self.paint(comment.clone(), StyleRole::Html);
        }
        comments
    }

    pub(super) fn find_images(&self, seg: &Range<usize>, skip: &[Range<usize>]) -> Vec<ImageMatch> {
        let text = self.text;
        let block_lines: Vec<Range<usize>> = self
            .captures_in(PatternId::BlockImage, text, seg, skip)
            .iter()
            .filter_map(|caps| group(seg, caps, 0))
            .collect();

        self.captures_in(PatternId::InlineImage, text, seg, skip)
            .iter()
            .filter_map(|caps| {
                let whole = group(seg, caps, 0)?;
                let block = block_lines
                    .iter()
                    .any(|line| line.start <= whole.start && whole.end <= line.end);
                Some(ImageMatch {
                    alt: group(seg, caps, 1)?,
                    target: group(seg, caps, 2)?,
                    whole,
                    block,
                })
            })
            .collect()
    }

    /// The attachment attribute for an image, the only attribute the
    /// neighbourhood pass rewrites.
    pub(super) fn attach(&mut self, image: &ImageMatch) {
        let source = destination(&self.text[image.target.clone()]).to_string();
        let url = self.link_target(&source);
        let range = self.idx.range(image.whole.clone());
        self.writer
            .set(range, StyleAttribute::Attachment(Attachment { source, url }));
    }

    pub(super) fn images(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) -> Vec<Range<usize>> {
        let text = self.text;
        let images = self.find_images(seg, skip);
        for image in &images {
            self.paint(image.whole.clone(), StyleRole::Syntax);
            self.paint(image.alt.clone(), StyleRole::Link);
            if let Some(target) = self.link_target(&text[image.target.clone()]) {
                self.link(image.target.clone(), target);
            }
            self.attach(image);
            if image.block {
                let line = line_start(text, image.whole.start)..line_end(text, image.whole.end);
                self.writer.set(
                    self.idx.range(line),
                    StyleAttribute::ParagraphStyle(ParagraphStyle {
                        head_indent: 0.0,
                        alignment: Alignment::Center,
                    }),
                );
            }
        }
        images.into_iter().map(|image| image.whole).collect()
    }

    pub(super) fn app_links(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) -> Vec<Range<usize>> {
        let text = self.text;
        let mut found = Vec::new();
        for caps in self.captures_in(PatternId::AppLink, text, seg, skip) {
            let (Some(m), Some(label)) = (group(seg, &caps, 0), group(seg, &caps, 1)) else {
                continue;
            };
            self.paint(m.clone(), StyleRole::Syntax);
            self.marker(m.start..label.start);
            self.marker(label.end..m.end);
            self.paint(label.clone(), StyleRole::Link);
            let target = format!("{APP_LINK_PREFIX}{}", urlencoding::encode(&text[label]));
            self.link(m.clone(), target);
            found.push(m);
        }
        found
    }

    pub(super) fn inline_anchors(
        &mut self,
        seg: &Range<usize>,
        skip: &[Range<usize>],
    ) -> Vec<Range<usize>> {
        let text = self.text;
        let mut found = Vec::new();
        for caps in self.captures_in(PatternId::InlineAnchor, text, seg, skip) {
            let (Some(m), Some(label), Some(dest)) = (
                group(seg, &caps, 0),
                group(seg, &caps, 1),
                group(seg, &caps, 2),
            ) else {
                continue;
            };
            if text[..m.start].ends_with('!') {
                continue;
            }
            self.paint(m.clone(), StyleRole::Syntax);
            self.marker(m.start..label.start);
            self.marker(label.end..m.end);
            self.paint(label.clone(), StyleRole::Link);
            if let Some(target) = self.link_target(&text[dest]) {
                self.link(label, target);
            }
            found.push(m);
        }
        found
    }

    /// `[label][id]`. Definitions can live anywhere in the note, so these are
    /// styled but not linked.
    pub(super) fn reference_anchors(
        &mut self,
        seg: &Range<usize>,
        skip: &[Range<usize>],
    ) -> Vec<Range<usize>> {
        let text = self.text;
        let mut found = Vec::new();
        for caps in self.captures_in(PatternId::ReferenceAnchor, text, seg, skip) {
            let (Some(m), Some(label)) = (group(seg, &caps, 0), group(seg, &caps, 1)) else {
                continue;
            };
            if text[..m.start].ends_with('!') {
                continue;
            }
            self.paint(m.clone(), StyleRole::Syntax);
            self.marker(m.start..label.start);
            self.marker(label.end..m.end);
            self.paint(label, StyleRole::Link);
            found.push(m);
        }
        found
    }

    pub(super) fn urls(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) -> Vec<Range<usize>> {
        let text = self.text;
        let s = &text[seg.clone()];
        let matches = self.engine.patterns().captures_where(PatternId::Url, s, |caps| {
            let Some(m) = caps.get(0) else {
                return false;
            };
            let before = s[..m.start()].chars().next_back();
            let boundary = if m.as_str().starts_with('/') {
                before.is_none_or(|c| c.is_whitespace() || "(<[\"'".contains(c))
            } else {
                before.is_none_or(|c| !(c.is_alphanumeric() || "/._-".contains(c)))
            };
            boundary && !hits(skip, &shift(seg, m.range()))
        });

        let mut found = Vec::new();
        for caps in matches {
            let Some(m) = caps.get(0) else {
                continue;
            };
            let trimmed = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
            if trimmed.is_empty() {
                continue;
            }
            let range = shift(seg, m.start()..m.start() + trimmed.len());
            self.paint(range.clone(), StyleRole::Link);
            if let Some(target) = self.bare_link_target(trimmed) {
                self.link(range.clone(), target);
            }
            found.push(range);
        }
        found
    }

    pub(super) fn html_tags(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) {
        let text = self.text;
        for caps in self.captures_in(PatternId::HtmlTag, text, seg, skip) {
            if let Some(m) = group(seg, &caps, 0) {
                self.paint(m, StyleRole::Html);
            }
        }
    }

    pub(super) fn emoji(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) {
        let text = self.text;
        for caps in self.captures_in(PatternId::Emoji, text, seg, skip) {
            if let Some(m) = group(seg, &caps, 0) {
                self.paint(m, StyleRole::Emoji);
            }
        }
    }

    /// Styles the content of a `marker`-delimited span and its markers.
    fn delimited(&mut self, m: Range<usize>, content: Range<usize>, apply: impl FnOnce(&mut Self, Range<usize>)) {
        self.marker(m.start..content.start);
        self.marker(content.end..m.end);
        apply(self, content);
    }

    pub(super) fn strikethrough(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) {
        let text = self.text;
        for caps in self.captures_in(PatternId::Strikethrough, text, seg, skip) {
            let (Some(m), Some(content)) = (group(seg, &caps, 0), group(seg, &caps, 1)) else {
                continue;
            };
            self.delimited(m, content, |pass, content| {
                let range = pass.idx.range(content);
                pass.writer.set(range, StyleAttribute::Strikethrough);
            });
        }
    }

    pub(super) fn bold(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) {
        let text = self.text;
        for caps in self.captures_in(PatternId::Bold, text, seg, skip) {
            let Some(m) = group(seg, &caps, 0) else {
                continue;
            };
            let Some(content) = group(seg, &caps, 1).or_else(|| group(seg, &caps, 2)) else {
                continue;
            };
            self.delimited(m, content, |pass, content| {
                let range = pass.idx.range(content);
                let body = pass.engine.theme().body_font();
                pass.writer.update_font(range, &body, |font| font.bold = true);
            });
        }
    }

    pub(super) fn italic(&mut self, seg: &Range<usize>, skip: &[Range<usize>]) {
        let text = self.text;
        let s = &text[seg.clone()];
        let matches = self.engine.patterns().captures_where(PatternId::Italic, s, |caps| {
            let Some(m) = caps.get(0) else {
                return false;
            };
            let before = s[..m.start()].chars().next_back();
            let after = s[m.end()..].chars().next();
            let flanked = if m.as_str().starts_with('*') {
                before != Some('*') && after != Some('*')
            } else {
                !before.is_some_and(is_word) && !after.is_some_and(is_word)
            };
            flanked && !hits(skip, &shift(seg, m.range()))
        });

        for caps in matches {
            let Some(m) = group(seg, &caps, 0) else {
                continue;
            };
            let Some(content) = group(seg, &caps, 1).or_else(|| group(seg, &caps, 2)) else {
                continue;
            };
            self.delimited(m, content, |pass, content| {
                let range = pass.idx.range(content);
                let body = pass.engine.theme().body_font();
                pass.writer.update_font(range, &body, |font| font.italic = true);
            });
        }
    }
}
