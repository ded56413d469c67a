use std::borrow::Cow;
use std::sync::Arc;

use notemark_config::EditorSettings;
use uuid::Uuid;

use crate::buffer::{StyledBuffer, TextRange, Utf16Index};
use crate::code_block::{
    self, CodeBlockSpan, HighlighterProvider, HighlighterRegistry, TokenHighlighter,
};
use crate::highlight::{Pass, StyleWrite};
use crate::patterns::PatternLibrary;
use crate::resolver::{AssetResolver, NoAssets};
use crate::theme::{Theme, ThemeProvider};

/// Everything a rescan needs besides the buffer: host settings, the theme,
/// the asset resolver, the token highlighter provider and the compiled
/// patterns.
///
/// Shared by every open document; all rescans take the buffer explicitly and
/// nothing about a buffer is kept between calls.
pub struct StyleEngine {
    settings: EditorSettings,
    theme: Arc<dyn ThemeProvider>,
    resolver: Arc<dyn AssetResolver>,
    highlighters: Arc<dyn HighlighterProvider>,
    patterns: &'static PatternLibrary,
}

impl StyleEngine {
    /// An engine with the built-in theme for `settings`, no asset
    /// resolution, the shared syntect highlighter and the shared patterns.
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            theme: Arc::new(Theme::from_settings(&settings)),
            settings,
            resolver: Arc::new(NoAssets),
            highlighters: HighlighterRegistry::global(),
            patterns: PatternLibrary::shared(),
        }
    }

    #[must_use]
    pub fn with_theme(mut self, theme: Arc<dyn ThemeProvider>) -> Self {
        self.theme = theme;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn AssetResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_highlighters(mut self, highlighters: Arc<dyn HighlighterProvider>) -> Self {
        self.highlighters = highlighters;
        self
    }

    #[must_use]
    pub fn with_patterns(mut self, patterns: &'static PatternLibrary) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn theme(&self) -> &dyn ThemeProvider {
        self.theme.as_ref()
    }

    pub fn resolver(&self) -> &dyn AssetResolver {
        self.resolver.as_ref()
    }

    pub fn patterns(&self) -> &PatternLibrary {
        self.patterns
    }

    /// The token highlighter for the current theme, if one can be built.
    pub fn highlighter(&self) -> Option<Arc<dyn TokenHighlighter>> {
        self.highlighters.highlighter(self.theme.is_dark())
    }

    /// Code blocks in `text` as the engine sees them.
    pub fn code_blocks(&self, text: &str) -> Vec<CodeBlockSpan> {
        code_block::find_code_blocks(text, &Utf16Index::new(text, 0), self.patterns)
    }

    /// Captures `buffer` as it is now. Rescans of the same version can share
    /// one snapshot instead of each re-reading the text.
    pub fn snapshot(&self, buffer: &StyledBuffer) -> TextSnapshot {
        let text = buffer.text().into_owned();
        let idx = Utf16Index::new(&text, 0);
        let blocks = code_block::find_code_blocks(&text, &idx, self.patterns);
        TextSnapshot {
            buffer_id: buffer.id(),
            version: buffer.version(),
            text,
            idx,
            blocks,
        }
    }

    /// Restyles the whole buffer.
    pub fn full_rescan(&self, buffer: &mut StyledBuffer) -> Vec<StyleWrite> {
        let snapshot = self.snapshot(buffer);
        self.full_rescan_at(&snapshot, buffer)
    }

    /// Restyles the paragraph covering `range` plus whatever styling depends
    /// on it. Falls back to a full rescan when `range` does not map onto the
    /// text.
    pub fn local_rescan(&self, buffer: &mut StyledBuffer, range: TextRange) -> Vec<StyleWrite> {
        let snapshot = self.snapshot(buffer);
        self.local_rescan_at(&snapshot, buffer, range)
    }

    /// Re-resolves image attachments on the lines touching `range`.
    pub fn refresh_attachments(
        &self,
        buffer: &mut StyledBuffer,
        range: TextRange,
    ) -> Vec<StyleWrite> {
        let snapshot = self.snapshot(buffer);
        self.refresh_attachments_at(&snapshot, buffer, range)
    }

    /// [`StyleEngine::full_rescan`] against a snapshot of `buffer`.
    pub fn full_rescan_at(
        &self,
        snapshot: &TextSnapshot,
        buffer: &mut StyledBuffer,
    ) -> Vec<StyleWrite> {
        let snapshot = self.current(snapshot, buffer);
        let mut pass = Pass::new(self, &snapshot, buffer.attributes_mut());
        pass.full();
        pass.finish()
    }

    /// [`StyleEngine::local_rescan`] against a snapshot of `buffer`.
    pub fn local_rescan_at(
        &self,
        snapshot: &TextSnapshot,
        buffer: &mut StyledBuffer,
        range: TextRange,
    ) -> Vec<StyleWrite> {
        let snapshot = self.current(snapshot, buffer);
        let idx = &snapshot.idx;
        let Some(bytes) = range.clamp_to(idx.len()).map_or_else(
            || idx.byte_range(TextRange::new(range.location.min(idx.len()), 0)),
            |clamped| idx.byte_range(clamped),
        ) else {
            log::debug!("Local rescan of {range:?} does not map onto the text, rescanning all");
            return self.full_rescan_at(&snapshot, buffer);
        };

        let mut pass = Pass::new(self, &snapshot, buffer.attributes_mut());
        pass.local(bytes);
        pass.finish()
    }

    /// [`StyleEngine::refresh_attachments`] against a snapshot of `buffer`.
    pub fn refresh_attachments_at(
        &self,
        snapshot: &TextSnapshot,
        buffer: &mut StyledBuffer,
        range: TextRange,
    ) -> Vec<StyleWrite> {
        let snapshot = self.current(snapshot, buffer);
        let idx = &snapshot.idx;
        let start = range.location.min(idx.len());
        let end = range.end().min(idx.len());
        let (Some(start), Some(end)) = (idx.byte(start), idx.byte(end)) else {
            return Vec::new();
        };

        let mut pass = Pass::new(self, &snapshot, buffer.attributes_mut());
        pass.attachments(start..end);
        pass.finish()
    }

    /// `snapshot` if it still describes `buffer`, otherwise a fresh one.
    fn current<'s>(
        &self,
        snapshot: &'s TextSnapshot,
        buffer: &StyledBuffer,
    ) -> Cow<'s, TextSnapshot> {
        if snapshot.is_current(buffer) {
            Cow::Borrowed(snapshot)
        } else {
            log::debug!(
                "Snapshot of version {} is stale at version {}, retaking it",
                snapshot.version,
                buffer.version()
            );
            Cow::Owned(self.snapshot(buffer))
        }
    }
}

impl std::fmt::Debug for StyleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleEngine")
            .field("settings", &self.settings)
            .field("dark", &self.theme.is_dark())
            .finish_non_exhaustive()
    }
}

/// A buffer's text at one version together with its UTF-16 index and code
/// blocks.
#[derive(Debug, Clone)]
pub struct TextSnapshot {
    buffer_id: Uuid,
    version: u64,
    text: String,
    idx: Utf16Index,
    blocks: Vec<CodeBlockSpan>,
}

impl TextSnapshot {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn blocks(&self) -> &[CodeBlockSpan] {
        &self.blocks
    }

    pub(crate) fn idx(&self) -> &Utf16Index {
        &self.idx
    }

    /// True while `buffer` is the buffer, at the version, this was taken from.
    pub fn is_current(&self, buffer: &StyledBuffer) -> bool {
        self.buffer_id == buffer.id() && self.version == buffer.version()
    }
}
