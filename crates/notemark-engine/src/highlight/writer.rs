use serde::Serialize;

use crate::buffer::{AttributeKind, AttributeStore, Color, Font, StyleAttribute, TextRange};

/// What a single write did to a range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StyleChange {
    Set(StyleAttribute),
    Remove(AttributeKind),
}

/// One attribute write applied to the buffer during a rescan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleWrite {
    pub range: TextRange,
    pub change: StyleChange,
}

/// Applies attribute writes to a store and records them.
///
/// Writes reaching past the end of the store are dropped, never clamped: a
/// range that does not fit was computed against different text.
pub struct AttributeWriter<'a> {
    store: &'a mut AttributeStore,
    writes: Vec<StyleWrite>,
    dropped: usize,
}

impl<'a> AttributeWriter<'a> {
    pub fn new(store: &'a mut AttributeStore) -> Self {
        Self {
            store,
            writes: Vec::new(),
            dropped: 0,
        }
    }

    pub fn len(&self) -> u32 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &AttributeStore {
        self.store
    }

    /// Number of writes dropped as out of bounds.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn accept(&mut self, range: TextRange) -> bool {
        if range.end() > self.store.len() {
            log::debug!(
                "Dropping write to {range:?}, buffer length is {}",
                self.store.len()
            );
            self.dropped += 1;
            return false;
        }
        !range.is_empty()
    }

    pub fn set(&mut self, range: TextRange, attr: StyleAttribute) {
        if !self.accept(range) {
            return;
        }
        self.store.set(range, &attr);
        self.writes.push(StyleWrite {
            range,
            change: StyleChange::Set(attr),
        });
    }

    pub fn remove(&mut self, range: TextRange, kind: AttributeKind) {
        if !self.accept(range) {
            return;
        }
        self.store.remove(range, kind);
        self.writes.push(StyleWrite {
            range,
            change: StyleChange::Remove(kind),
        });
    }

    pub fn foreground(&mut self, range: TextRange, color: Color) {
        self.set(range, StyleAttribute::ForegroundColor(color));
    }

    pub fn font(&mut self, range: TextRange, font: Font) {
        self.set(range, StyleAttribute::Font(font));
    }

    /// Shrinks `range` to the hidden size and paints it transparent.
    pub fn hide(&mut self, range: TextRange, base: &Font) {
        self.font(range, base.hidden());
        self.foreground(range, Color::TRANSPARENT);
    }

    /// Rewrites the font of every run in `range`, starting from `fallback`
    /// where a run has no font yet. Hidden runs stay hidden.
    pub fn update_font(&mut self, range: TextRange, fallback: &Font, f: impl Fn(&mut Font)) {
        if !self.accept(range) {
            return;
        }
        for (run, attrs) in self.store.runs_in(range) {
            let mut font = attrs.font().cloned().unwrap_or_else(|| fallback.clone());
            if font.is_hidden() {
                continue;
            }
            f(&mut font);
            self.set(run, StyleAttribute::Font(font));
        }
    }

    pub fn into_writes(self) -> Vec<StyleWrite> {
        self.writes
    }
}
