use crate::buffer::TextRange;

/// A text change reported by the host, in UTF-16 code units.
///
/// `[location, location + old_length)` of the previous text was replaced by
/// `new_length` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditEvent {
    pub location: u32,
    pub old_length: u32,
    pub new_length: u32,
    /// Only attributes changed; the text is untouched.
    pub attributes_only: bool,
}

impl EditEvent {
    pub const fn replace(location: u32, old_length: u32, new_length: u32) -> Self {
        Self {
            location,
            old_length,
            new_length,
            attributes_only: false,
        }
    }

    pub const fn insert(location: u32, new_length: u32) -> Self {
        Self::replace(location, 0, new_length)
    }

    pub const fn delete(location: u32, old_length: u32) -> Self {
        Self::replace(location, old_length, 0)
    }

    /// An attribute-only notification covering `range`.
    pub const fn attributes(range: TextRange) -> Self {
        Self {
            location: range.location,
            old_length: range.length,
            new_length: range.length,
            attributes_only: true,
        }
    }

    /// Change in text length caused by the edit.
    pub fn delta(&self) -> i64 {
        i64::from(self.new_length) - i64::from(self.old_length)
    }

    /// The range the new text occupies after the edit.
    pub fn edited_range(&self) -> TextRange {
        TextRange::new(self.location, self.new_length)
    }

    /// Edits that cannot affect styling and are skipped outright.
    pub fn is_noop(&self) -> bool {
        self.attributes_only || (self.new_length == 0 && self.delta() == 0)
    }
}
