use std::ops::Range;

use super::range::TextRange;

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Translates byte offsets within a text slice into buffer UTF-16 offsets.
///
/// Regex matches come back as byte ranges; every attribute write needs UTF-16
/// ranges. `base` is the UTF-16 offset of the slice start within the buffer.
#[derive(Debug, Clone)]
pub struct Utf16Index {
    base: u32,
    len: u32,
    byte_len: usize,
    /// UTF-16 offset of the char containing each byte, plus one trailing
    /// entry for the end. Empty for ASCII text, where bytes and code units
    /// coincide.
    offsets: Vec<u32>,
}

impl Utf16Index {
    pub fn new(text: &str, base: u32) -> Self {
        if text.is_ascii() {
            return Self {
                base,
                len: text.len() as u32,
                byte_len: text.len(),
                offsets: Vec::new(),
            };
        }

        let mut offsets = Vec::with_capacity(text.len() + 1);
        let mut unit = 0u32;
        for ch in text.chars() {
            for _ in 0..ch.len_utf8() {
                offsets.push(unit);
            }
            unit += ch.len_utf16() as u32;
        }
        offsets.push(unit);

        Self {
            base,
            len: unit,
            byte_len: text.len(),
            offsets,
        }
    }

    /// Slice length in UTF-16 code units.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole slice as a buffer range.
    pub fn full_range(&self) -> TextRange {
        TextRange::new(self.base, self.len)
    }

    /// Buffer UTF-16 offset of a byte offset in the slice. Offsets past the
    /// end clamp to the end.
    pub fn utf16(&self, byte: usize) -> u32 {
        let byte = byte.min(self.byte_len);
        let local = if self.offsets.is_empty() {
            byte as u32
        } else {
            self.offsets[byte]
        };
        self.base + local
    }

    /// Buffer range of a byte range in the slice.
    pub fn range(&self, bytes: Range<usize>) -> TextRange {
        TextRange::from_bounds(self.utf16(bytes.start), self.utf16(bytes.end))
    }

    /// Byte offset in the slice of a buffer UTF-16 offset.
    ///
    /// Returns `None` outside the slice or when the offset falls between the
    /// two halves of a surrogate pair.
    pub fn byte(&self, utf16: u32) -> Option<usize> {
        let local = utf16.checked_sub(self.base)?;
        if local > self.len {
            return None;
        }
        if self.offsets.is_empty() {
            return Some(local as usize);
        }
        if local == self.len {
            return Some(self.byte_len);
        }
        let b = self.offsets.partition_point(|&u| u < local);
        (self.offsets[b] == local).then_some(b)
    }

    /// Byte range in the slice of a buffer range, clipped to the slice.
    pub fn byte_range(&self, range: TextRange) -> Option<Range<usize>> {
        let clipped = range.intersection(self.full_range()).or_else(|| {
            // An empty range at a valid position still maps to an empty slice.
            (range.is_empty() && self.full_range().touches(range)).then_some(range)
        })?;
        Some(self.byte(clipped.location)?..self.byte(clipped.end())?)
    }
}

/// Byte offset of a UTF-16 offset in `text`, walking from the start.
pub fn byte_offset(text: &str, utf16: u32) -> Option<usize> {
    let mut unit = 0u32;
    for (byte, ch) in text.char_indices() {
        if unit == utf16 {
            return Some(byte);
        }
        if unit > utf16 {
            return None;
        }
        unit += ch.len_utf16() as u32;
    }
    (unit == utf16).then_some(text.len())
}
