use std::ops::Range;

/// A single line of text with its byte span (newline included when present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRef<'a> {
    pub span: Range<usize>,
    pub text: &'a str,
}

impl LineRef<'_> {
    /// Line text without the trailing line break.
    pub fn content(&self) -> &str {
        self.text.trim_end_matches(['\r', '\n'])
    }
}

/// Iterates over lines with their byte spans, keeping newline characters so
/// that spans tile the text exactly.
pub fn lines_with_spans(text: &str) -> impl Iterator<Item = LineRef<'_>> + '_ {
    let mut offset = 0usize;
    text.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        LineRef {
            span: start..offset,
            text: line,
        }
    })
}

/// Byte offset of the start of the line containing `pos`.
pub fn line_start(text: &str, pos: usize) -> usize {
    text[..pos.min(text.len())]
        .rfind('\n')
        .map_or(0, |nl| nl + 1)
}

/// Byte offset just past the line break of the line containing `pos`
/// (or the end of the text).
pub fn line_end(text: &str, pos: usize) -> usize {
    let pos = pos.min(text.len());
    text[pos..].find('\n').map_or(text.len(), |nl| pos + nl + 1)
}

/// The line-aligned byte range ("paragraph") covering `bytes`.
///
/// An empty range selects the line it sits on. A non-empty range that ends
/// right after a newline does not pull in the following line.
pub fn paragraph_bytes(text: &str, bytes: Range<usize>) -> Range<usize> {
    let start = line_start(text, bytes.start);
    let last = if bytes.end > bytes.start {
        text[..bytes.end]
            .char_indices()
            .next_back()
            .map_or(bytes.start, |(i, _)| i)
    } else {
        bytes.end
    };
    start..line_end(text, last.max(start))
}

/// Widens a line-aligned range by `extra` whole lines on each side.
pub fn widen_by_lines(text: &str, bytes: Range<usize>, extra: usize) -> Range<usize> {
    let mut start = bytes.start;
    let mut end = bytes.end;
    for _ in 0..extra {
        if start > 0 {
            start = line_start(text, start - 1);
        }
        if end < text.len() {
            end = line_end(text, end);
        }
    }
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn lines_tile_text() {
        let lines: Vec<_> = lines_with_spans("a\nbc\n\nd").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1].span, 2..5);
        assert_eq!(lines[1].content(), "bc");
        assert_eq!(lines[2].content(), "");
        assert_eq!(lines[3].span, 6..7);
    }

    #[rstest]
    #[case::caret_in_first_line(0..0, 0..4)]
    #[case::caret_in_second_line(5..5, 4..8)]
    #[case::caret_at_end_of_text(11..11, 8..11)]
    #[case::range_ending_after_newline(1..4, 0..4)]
    #[case::range_spanning_lines(2..6, 0..8)]
    fn paragraph_covers_edit(#[case] edit: Range<usize>, #[case] expected: Range<usize>) {
        let text = "abc\ndef\nghi";
        assert_eq!(paragraph_bytes(text, edit), expected);
    }

    #[test]
    fn caret_after_trailing_newline_is_empty_last_line() {
        let text = "abc\n";
        assert_eq!(paragraph_bytes(text, 4..4), 4..4);
    }

    #[test]
    fn widen_adds_neighbour_lines() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(widen_by_lines(text, 4..8, 1), 0..14);
        assert_eq!(widen_by_lines(text, 0..4, 1), 0..8);
        assert_eq!(widen_by_lines(text, 14..18, 1), 8..18);
    }
}
