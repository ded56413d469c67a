use serde::Serialize;

/// A half-open range `[location, location + length)` in UTF-16 code units.
///
/// All buffer positions are UTF-16 offsets so that hosts built on UTF-16
/// text systems line up exactly, including around surrogate pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TextRange {
    pub location: u32,
    pub length: u32,
}

impl TextRange {
    pub const fn new(location: u32, length: u32) -> Self {
        Self { location, length }
    }

    /// Builds a range from `[start, end)`. Uses saturating subtraction, so an
    /// inverted pair yields an empty range at `start`.
    pub const fn from_bounds(start: u32, end: u32) -> Self {
        Self {
            location: start,
            length: end.saturating_sub(start),
        }
    }

    #[must_use]
    pub const fn end(self) -> u32 {
        self.location.saturating_add(self.length)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.length == 0
    }

    /// True when `pos` lies inside the range.
    #[must_use]
    pub const fn contains(self, pos: u32) -> bool {
        pos >= self.location && pos < self.end()
    }

    /// True when the ranges share a code unit or touch end-to-start.
    #[must_use]
    pub fn touches(self, other: TextRange) -> bool {
        self.location <= other.end() && other.location <= self.end()
    }

    #[must_use]
    pub fn intersection(self, other: TextRange) -> Option<TextRange> {
        let start = self.location.max(other.location);
        let end = self.end().min(other.end());
        (start < end).then(|| TextRange::from_bounds(start, end))
    }

    #[must_use]
    pub fn union(self, other: TextRange) -> TextRange {
        TextRange::from_bounds(
            self.location.min(other.location),
            self.end().max(other.end()),
        )
    }

    /// Clips the range to `[0, len)`; `None` when nothing is left.
    #[must_use]
    pub fn clamp_to(self, len: u32) -> Option<TextRange> {
        let start = self.location.min(len);
        let end = self.end().min(len);
        (start < end).then(|| TextRange::from_bounds(start, end))
    }

    /// Moves the range by `offset` code units, saturating at `u32::MAX`.
    #[must_use]
    pub const fn shifted(self, offset: u32) -> TextRange {
        TextRange::new(self.location.saturating_add(offset), self.length)
    }
}

impl From<std::ops::Range<u32>> for TextRange {
    fn from(r: std::ops::Range<u32>) -> Self {
        TextRange::from_bounds(r.start, r.end)
    }
}
