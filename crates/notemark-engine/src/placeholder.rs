//! # Placeholder Protector
//!
//! Swaps literal tag-like markup for opaque tokens so a transformation pass
//! cannot touch it, then swaps it back. Independent of the rescan pipeline.
//!
//! Protected spans are void or self-closing tags (`<br>`, `<img src=x />`)
//! and open/close pairs whose content holds no nested tag of the same name
//! (`<kbd>Ctrl</kbd>`). A pair swallows anything inside it.

use std::ops::Range;

use uuid::Uuid;

use crate::buffer::utf16_len;
use crate::patterns::{PatternId, PatternLibrary};

/// Elements that never take a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Length of the shortest image tag, `<img>`.
pub const MIN_IMAGE_TAG_LEN: u32 = 5;

const TOKEN_PREFIX: &str = "notemark-placeholder-";

/// Tokens in the order their originals appear in the source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, o)| (t.as_str(), o.as_str()))
    }

    pub fn original(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, o)| o.as_str())
    }
}

#[derive(Debug)]
struct Tag {
    span: Range<usize>,
    name: String,
    kind: TagKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    /// Self-closing or void.
    Standalone,
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn scan_tags(library: &PatternLibrary, text: &str) -> Vec<Tag> {
    let Some(re) = library.get(PatternId::HtmlTag) else {
        return Vec::new();
    };
    re.find_iter(text)
        .map(|m| {
            let raw = m.as_str();
            let name = tag_name(raw);
            let kind = if raw.starts_with("</") {
                TagKind::Close
            } else if raw.ends_with("/>") || VOID_ELEMENTS.contains(&name.as_str()) {
                TagKind::Standalone
            } else {
                TagKind::Open
            };
            Tag {
                span: m.range(),
                name,
                kind,
            }
        })
        .collect()
}

/// Byte spans to protect, ascending and non-overlapping.
fn protected_spans(library: &PatternLibrary, text: &str) -> Vec<Range<usize>> {
    let tags = scan_tags(library, text);
    let mut candidates: Vec<Range<usize>> = Vec::new();

    for (i, tag) in tags.iter().enumerate() {
        match tag.kind {
            TagKind::Standalone => candidates.push(tag.span.clone()),
            TagKind::Close => {}
            TagKind::Open => {
                // The next same-name tag must close this one.
                let partner = tags[i + 1..]
                    .iter()
                    .find(|t| t.name == tag.name && t.kind != TagKind::Standalone)
                    .filter(|t| t.kind == TagKind::Close);
                if let Some(close) = partner {
                    candidates.push(tag.span.start..close.span.end);
                }
            }
        }
    }

    candidates.sort_by_key(|span| (span.start, std::cmp::Reverse(span.end)));
    let mut spans: Vec<Range<usize>> = Vec::new();
    for span in candidates {
        if spans.last().is_none_or(|last| span.start >= last.end) {
            spans.push(span);
        }
    }
    spans
}

fn fresh_token() -> String {
    format!("{TOKEN_PREFIX}{}", Uuid::new_v4().simple())
}

/// Replaces every protected span in `text` with a unique token.
pub fn protect(text: &str) -> (String, PlaceholderMap) {
    protect_with(PatternLibrary::shared(), text)
}

pub fn protect_with(library: &PatternLibrary, text: &str) -> (String, PlaceholderMap) {
    let spans = protected_spans(library, text);
    let mut protected = text.to_string();
    let mut entries = Vec::with_capacity(spans.len());

    // Right to left, so pending spans keep their offsets.
    for span in spans.iter().rev() {
        let token = fresh_token();
        entries.push((token.clone(), text[span.clone()].to_string()));
        protected.replace_range(span.clone(), &token);
    }
    entries.reverse();

    if !entries.is_empty() {
        log::debug!("Protected {} tag spans", entries.len());
    }
    (protected, PlaceholderMap { entries })
}

/// Puts the originals back. Tokens missing from `text` are skipped.
pub fn restore(text: &str, map: &PlaceholderMap) -> String {
    let mut restored = text.to_string();
    for (token, original) in &map.entries {
        match restored.find(token.as_str()) {
            Some(at) => restored.replace_range(at..at + token.len(), original),
            None => log::debug!("Placeholder {token} no longer present"),
        }
    }
    restored
}

fn shift_cursor(cursor: u32, from: &str, to: &str) -> u32 {
    let to_len = i64::from(utf16_len(to));
    let shifted = i64::from(cursor) + to_len - i64::from(utf16_len(from));
    shifted.clamp(0, to_len) as u32
}

/// Maps a UTF-16 cursor in `original` to one in `protected`.
pub fn adjust_cursor_for_protect(cursor: u32, original: &str, protected: &str) -> u32 {
    shift_cursor(cursor, original, protected)
}

/// Maps a UTF-16 cursor in `protected` to one in `restored`, never leaving
/// it inside a leading image tag.
pub fn adjust_cursor_after_restore(cursor: u32, protected: &str, restored: &str) -> u32 {
    let cursor = shift_cursor(cursor, protected, restored);
    let starts_with_image = restored
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("<img"));
    if cursor <= MIN_IMAGE_TAG_LEN && starts_with_image {
        if let Some(close) = restored.find('>') {
            return utf16_len(&restored[..=close]);
        }
    }
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn originals(map: &PlaceholderMap) -> Vec<&str> {
        map.entries().map(|(_, o)| o).collect()
    }

    #[test]
    fn void_and_self_closing_tags() {
        let text = "a<br>b<img src=\"x.png\">c<widget />d";
        let (protected, map) = protect(text);
        assert_eq!(
            originals(&map),
            vec!["<br>", "<img src=\"x.png\">", "<widget />"]
        );
        assert!(!protected.contains('<'));
        assert!(protected.starts_with('a') && protected.ends_with('d'));
    }

    #[test]
    fn pairs_swallow_their_content() {
        let text = "press <kbd>Ctrl<br>C</kbd> now";
        let (protected, map) = protect(text);
        assert_eq!(originals(&map), vec!["<kbd>Ctrl<br>C</kbd>"]);
        assert!(protected.starts_with("press notemark-placeholder-"));
        assert!(protected.ends_with(" now"));
    }

    #[test]
    fn nested_same_name_is_not_a_pair() {
        let text = "<div><div>x</div></div>";
        let (_, map) = protect(text);
        assert_eq!(originals(&map), vec!["<div>x</div>"]);
    }

    #[test]
    fn unclosed_tags_stay() {
        let (protected, map) = protect("<b>open and </i>");
        assert!(map.is_empty());
        assert_eq!(protected, "<b>open and </i>");
    }

    #[test]
    fn tokens_are_unique() {
        let (_, map) = protect("<br><br>");
        let tokens: Vec<&str> = map.entries().map(|(t, _)| t).collect();
        assert_eq!(tokens.len(), 2);
        assert_ne!(tokens[0], tokens[1]);
        assert_eq!(map.original(tokens[1]), Some("<br>"));
    }

    #[rstest]
    #[case::plain("no tags here")]
    #[case::mixed("x <b>bold</b> <br/> y <em>é😀</em>")]
    #[case::multiline("<details>\nmore\n</details>\n<hr>")]
    #[case::stray_brackets("a < b > c")]
    fn restore_inverts_protect(#[case] text: &str) {
        let (protected, map) = protect(text);
        assert_eq!(restore(&protected, &map), text);
    }

    #[test]
    fn cursor_follows_length_change() {
        let original = "<br>abc";
        let (protected, map) = protect(original);
        let token_len = utf16_len(&protected) - 3;
        assert_eq!(adjust_cursor_for_protect(7, original, &protected), token_len + 3);
        assert_eq!(adjust_cursor_for_protect(0, original, &protected), token_len - 4);

        let restored = restore(&protected, &map);
        assert_eq!(adjust_cursor_after_restore(token_len + 3, &protected, &restored), 7);
    }

    #[test]
    fn cursor_is_clamped() {
        assert_eq!(adjust_cursor_for_protect(2, "abcdef", "ab"), 0);
        assert_eq!(adjust_cursor_for_protect(9, "ab", "abc"), 3);
    }

    #[test]
    fn cursor_snaps_past_leading_image() {
        let restored = "<img src=\"a.png\">text";
        assert_eq!(adjust_cursor_after_restore(0, restored, restored), 17);
        assert_eq!(adjust_cursor_after_restore(5, restored, restored), 17);
        assert_eq!(adjust_cursor_after_restore(6, restored, restored), 6);
        assert_eq!(adjust_cursor_after_restore(2, "<b>x", "<b>x"), 2);
    }
}
