//! # Styled Buffer
//!
//! The text a note editor shows, plus the attributes the engine paints on it.
//!
//! - **`range`**: `TextRange`, the UTF-16 `(location, length)` pair used for
//!   every position the engine hands out or accepts
//! - **`utf16`**: translation between regex byte offsets and UTF-16 offsets
//! - **`lines`**: line and paragraph boundaries over a text slice
//! - **`attributes`**: the closed `StyleAttribute` enum and `AttributeSet`
//! - **`store`**: run-length `AttributeStore` parallel to the text
//!
//! The text itself lives in an `xi_rope::Rope`; edits are compiled to a
//! `Delta` and applied, and the attribute store is shifted to match.

pub mod attributes;
pub mod lines;
pub mod range;
pub mod store;
pub mod utf16;

use std::borrow::Cow;

use uuid::Uuid;
use xi_rope::Rope;
use xi_rope::delta::Builder;

pub use attributes::{
    Alignment, Attachment, AttributeKind, AttributeSet, Color, Font, ParagraphStyle,
    StyleAttribute,
};
pub use range::TextRange;
pub use store::AttributeStore;
pub use utf16::{Utf16Index, utf16_len};

use crate::{edit::EditEvent, error::HighlightError};

/// A note's text and its style attributes.
///
/// Owned by the host. The engine borrows it mutably for the duration of one
/// rescan and keeps nothing afterwards except the `(id, version)` pair used to
/// validate deferred rescans.
#[derive(Debug, Clone)]
pub struct StyledBuffer {
    id: Uuid,
    text: Rope,
    len: u32,
    attributes: AttributeStore,
    version: u64,
}

impl StyledBuffer {
    pub fn new(text: &str) -> Self {
        let len = utf16_len(text);
        Self {
            id: Uuid::new_v4(),
            text: Rope::from(text),
            len,
            attributes: AttributeStore::new(len),
            version: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Incremented on every text edit.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Length in UTF-16 code units.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn text(&self) -> Cow<'_, str> {
        self.text.slice_to_cow(..)
    }

    /// The text of `range`, or `None` when it is out of bounds or splits a
    /// surrogate pair.
    pub fn slice(&self, range: TextRange) -> Option<String> {
        if range.end() > self.len {
            return None;
        }
        let text = self.text();
        let idx = Utf16Index::new(&text, 0);
        let bytes = idx.byte_range(range)?;
        Some(text[bytes].to_string())
    }

    /// Replaces `range` with `replacement` and returns the edit to forward to
    /// the editing session.
    ///
    /// Inserted text inherits the attributes of the character before it.
    pub fn replace(
        &mut self,
        range: TextRange,
        replacement: &str,
    ) -> Result<EditEvent, HighlightError> {
        let out_of_bounds = || HighlightError::RangeOutOfBounds {
            range,
            buffer_len: self.len,
        };
        if range.end() > self.len {
            return Err(out_of_bounds());
        }

        let bytes = {
            let text = self.text();
            let idx = Utf16Index::new(&text, 0);
            idx.byte_range(range)
        }
        .ok_or_else(out_of_bounds)?;

        let mut builder = Builder::new(self.text.len());
        builder.replace(bytes, Rope::from(replacement));
        let delta = builder.build();
        self.text = delta.apply(&self.text);

        let new_length = utf16_len(replacement);
        self.attributes.edit(range.location, range.length, new_length);
        self.len = self.len - range.length + new_length;
        self.version += 1;

        Ok(EditEvent::replace(range.location, range.length, new_length))
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    /// Host-side attribute write, e.g. a search highlight. The text is not
    /// touched, so no edit needs forwarding.
    pub fn set_attribute(
        &mut self,
        range: TextRange,
        attr: StyleAttribute,
    ) -> Result<(), HighlightError> {
        if range.end() > self.len {
            return Err(HighlightError::RangeOutOfBounds {
                range,
                buffer_len: self.len,
            });
        }
        self.attributes.set(range, &attr);
        Ok(())
    }

    pub fn remove_attribute(&mut self, range: TextRange, kind: AttributeKind) {
        if let Some(range) = range.clamp_to(self.len) {
            self.attributes.remove(range, kind);
        }
    }

    pub fn attributes_at(&self, pos: u32) -> Option<&AttributeSet> {
        self.attributes.attributes_at(pos)
    }

    /// Convenience lookup of one attribute at `pos`.
    pub fn attribute_at(&self, pos: u32, kind: AttributeKind) -> Option<&StyleAttribute> {
        self.attributes_at(pos)?.get(kind)
    }

    /// One line per attribute run: range, text and attributes.
    pub fn dump(&self) -> String {
        let text = self.text();
        let idx = Utf16Index::new(&text, 0);
        self.attributes
            .runs()
            .map(|(range, attrs)| {
                let slice = idx.byte_range(range).map_or("", |bytes| &text[bytes]);
                format!("{}..{} {slice:?} {attrs}", range.location, range.end())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Snapshot of every attribute run, in order.
    pub fn runs(&self) -> Vec<(TextRange, AttributeSet)> {
        self.attributes
            .runs()
            .map(|(range, attrs)| (range, attrs.clone()))
            .collect()
    }
}
