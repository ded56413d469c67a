//! # Highlight Application Pass
//!
//! Turns pattern matches into attribute writes over a line-aligned region.
//!
//! A region is split into code blocks, which go through the code-block
//! sub-pipeline, and prose segments, which are reset to the body style and
//! then run through the prose rules. The same routine serves full and local
//! rescans; a local rescan only differs in how its region is chosen.
//!
//! ## Local regions
//!
//! A local rescan starts from the edited paragraph widened by one line and
//! grows it until no styling outside it can depend on text inside it:
//!
//! - code blocks found in the current text that touch the region
//! - stale code styling (`CodeBlockFlag` runs) that touches the region
//! - a Setext title/underline pair straddling a region boundary
//! - blank and indented lines after the region, which inherit indented-code
//!   context from it
//!
//! Block structure is always recomputed from the text. The cached flag only
//! marks where old code styling has to be cleaned up.

mod rules;
pub mod writer;

use std::ops::Range;

pub use rules::APP_LINK_PREFIX;
pub use writer::{AttributeWriter, StyleChange, StyleWrite};

use crate::buffer::lines::{line_end, line_start, paragraph_bytes, widen_by_lines};
use crate::buffer::{AttributeKind, AttributeStore, TextRange, Utf16Index};
use crate::code_block::{self, CodeBlockSpan};
use crate::engine::{StyleEngine, TextSnapshot};
use crate::patterns::PatternId;
use crate::theme::StyleRole;

pub(crate) struct Pass<'a> {
    engine: &'a StyleEngine,
    text: &'a str,
    idx: &'a Utf16Index,
    blocks: &'a [CodeBlockSpan],
    writer: AttributeWriter<'a>,
}

impl<'a> Pass<'a> {
    pub(crate) fn new(
        engine: &'a StyleEngine,
        snapshot: &'a TextSnapshot,
        store: &'a mut AttributeStore,
    ) -> Self {
        Self {
            engine,
            text: snapshot.text(),
            idx: snapshot.idx(),
            blocks: snapshot.blocks(),
            writer: AttributeWriter::new(store),
        }
    }

    pub(crate) fn finish(self) -> Vec<StyleWrite> {
        let dropped = self.writer.dropped();
        if dropped > 0 {
            log::debug!("Dropped {dropped} writes outside the buffer");
        }
        self.writer.into_writes()
    }

    pub(crate) fn full(&mut self) {
        self.restyle(0..self.text.len());
        self.fixup_backgrounds();
    }

    /// Rescans the paragraph covering `bytes` and whatever depends on it.
    pub(crate) fn local(&mut self, bytes: Range<usize>) {
        let window = widen_by_lines(self.text, paragraph_bytes(self.text, bytes), 1);
        let region = self.damage_region(window.clone());
        if region != window {
            log::debug!("Local rescan grew from {window:?} to {region:?}");
        }
        self.restyle(region);
    }

    /// Re-resolves image attachments on the prose lines covering `bytes`.
    pub(crate) fn attachments(&mut self, bytes: Range<usize>) {
        let lines = paragraph_bytes(self.text, bytes);
        for seg in self.prose_segments(lines) {
            let range = self.idx.range(seg.clone());
            self.writer.remove(range, AttributeKind::Attachment);
            let zones = self.raw_zones(&seg);
            for image in self.find_images(&seg, &zones) {
                self.attach(&image);
            }
        }
    }

    fn restyle(&mut self, region: Range<usize>) {
        let mut cursor = region.start;
        for block in self.blocks_overlapping(&region) {
            if block.bytes.start > cursor {
                self.prose(cursor..block.bytes.start);
            }
            code_block::style_block(self.engine, &mut self.writer, self.text, self.idx, block);
            cursor = cursor.max(block.bytes.end);
        }
        if cursor < region.end {
            self.prose(cursor..region.end);
        }
    }

    /// `lines` minus any code blocks.
    fn prose_segments(&self, lines: Range<usize>) -> Vec<Range<usize>> {
        let mut segments = Vec::new();
        let mut cursor = lines.start;
        for block in self.blocks_overlapping(&lines) {
            if block.bytes.start > cursor {
                segments.push(cursor..block.bytes.start);
            }
            cursor = block.bytes.end;
        }
        if cursor < lines.end {
            segments.push(cursor..lines.end);
        }
        segments
    }

    /// Blocks sharing a byte with `region`, in order. Blocks are sorted and
    /// disjoint, so ends ascend with starts.
    fn blocks_overlapping(
        &self,
        region: &Range<usize>,
    ) -> impl Iterator<Item = &'a CodeBlockSpan> + use<'a> {
        let blocks = self.blocks;
        let first = blocks.partition_point(|b| b.bytes.end <= region.start);
        let end = region.end;
        blocks[first..].iter().take_while(move |b| b.bytes.start < end)
    }

    fn prose(&mut self, seg: Range<usize>) {
        if seg.is_empty() {
            return;
        }
        self.reset(&seg);

        self.atx_headers(&seg);
        self.setext_headers(&seg);
        self.block_quotes(&seg);
        self.list_markers(&seg);
        self.reference_definitions(&seg);

        let mut zones = self.code_spans(&seg);
        zones.extend(self.html_comments(&seg));

        let mut claimed = zones.clone();
        let images = self.images(&seg, &claimed);
        claimed.extend(images);
        let app_links = self.app_links(&seg, &claimed);
        claimed.extend(app_links);
        let anchors = self.inline_anchors(&seg, &claimed);
        claimed.extend(anchors);
        let references = self.reference_anchors(&seg, &claimed);
        claimed.extend(references);
        let urls = self.urls(&seg, &claimed);

        self.html_tags(&seg, &zones);
        claimed.extend(urls.iter().cloned());
        self.emoji(&seg, &claimed);

        zones.extend(urls);
        self.strikethrough(&seg, &zones);
        self.bold(&seg, &zones);
        self.italic(&seg, &zones);
    }

    /// Body style over `seg`. Host search highlights survive.
    fn reset(&mut self, seg: &Range<usize>) {
        let range = self.idx.range(seg.clone());
        let theme = self.engine.theme();
        self.writer.font(range, theme.body_font());
        self.writer.foreground(range, theme.color(StyleRole::Body));
        for kind in [
            AttributeKind::Link,
            AttributeKind::Strikethrough,
            AttributeKind::ParagraphStyle,
            AttributeKind::CodeBlockFlag,
            AttributeKind::CodeLanguage,
            AttributeKind::Attachment,
        ] {
            self.writer.remove(range, kind);
        }
    }

    /// Drops every background the host did not mark as a search highlight.
    /// Code spans and blocks carry code foreground and font instead.
    fn fixup_backgrounds(&mut self) {
        let stray: Vec<TextRange> = self
            .writer
            .store()
            .runs()
            .filter(|(_, attrs)| attrs.background().is_some_and(|(_, highlight)| !highlight))
            .map(|(range, _)| range)
            .collect();
        for range in stray {
            self.writer.remove(range, AttributeKind::BackgroundColor);
        }
    }

    fn damage_region(&self, window: Range<usize>) -> Range<usize> {
        let flagged = self.flagged_extents();
        let mut region = window;
        loop {
            let before = region.clone();
            for extent in self.blocks.iter().map(|b| &b.bytes).chain(flagged.iter()) {
                if touches(extent, &region) {
                    region = region.start.min(extent.start)..region.end.max(extent.end);
                }
            }
            region = self.extend_setext(region);
            region = self.extend_indented_context(region);
            if region == before {
                return region;
            }
        }
    }

    /// Line-aligned byte ranges of contiguous `CodeBlockFlag` runs.
    fn flagged_extents(&self) -> Vec<Range<usize>> {
        let mut extents: Vec<TextRange> = Vec::new();
        for (range, attrs) in self.writer.store().runs() {
            if !attrs.is_code_block() {
                continue;
            }
            match extents.last_mut() {
                Some(last) if last.end() == range.location => *last = last.union(range),
                _ => extents.push(range),
            }
        }
        extents
            .into_iter()
            .map(|range| match self.idx.byte_range(range) {
                Some(bytes) => paragraph_bytes(self.text, bytes),
                None => 0..self.text.len(),
            })
            .collect()
    }

    fn in_block(&self, pos: usize) -> bool {
        let i = self.blocks.partition_point(|b| b.bytes.end <= pos);
        self.blocks.get(i).is_some_and(|b| b.bytes.contains(&pos))
    }

    fn is_setext_pair(&self, lines: Range<usize>) -> bool {
        if self.in_block(lines.start) || self.in_block(lines.end.saturating_sub(1)) {
            return false;
        }
        self.engine
            .patterns()
            .get(PatternId::SetextHeader)
            .and_then(|re| re.find(&self.text[lines]))
            .is_some_and(|m| m.start() == 0)
    }

    fn extend_setext(&self, mut region: Range<usize>) -> Range<usize> {
        let text = self.text;
        if region.start > 0 {
            let above = line_start(text, region.start - 1);
            if self.is_setext_pair(above..line_end(text, region.start)) {
                region.start = above;
            }
        }
        if region.end < text.len() && region.end > region.start {
            let last = line_start(text, region.end - 1);
            let below_end = line_end(text, region.end);
            if self.is_setext_pair(last..below_end) {
                region.end = below_end;
            }
        }
        region
    }

    fn extend_indented_context(&self, mut region: Range<usize>) -> Range<usize> {
        let text = self.text;
        while region.end < text.len() {
            let next = line_end(text, region.end);
            let line = text[region.end..next].trim_end_matches(['\r', '\n']);
            let blank = line.trim().is_empty();
            let indented = line.starts_with("    ") || line.starts_with('\t');
            if !(blank || indented) {
                break;
            }
            region.end = next;
        }
        region
    }
}

/// True when the byte ranges overlap or meet.
fn touches(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start <= b.end && b.start <= a.end
}

/// True when the byte ranges share at least one byte.
fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
