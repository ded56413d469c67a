//! # Dirty-Range Classifier
//!
//! Decides how much of the buffer an edit forces the engine to look at.
//! Typing stays proportional to the paragraph; only edits that can change
//! code block structure or replace the whole buffer pay for a full rescan.

use crate::buffer::lines::{lines_with_spans, paragraph_bytes};
use crate::buffer::{TextRange, Utf16Index};
use crate::code_block::CodeFence;
use crate::edit::EditEvent;

/// Per-document flags set by the host for the next rescan only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShotFlags {
    /// Rescan everything regardless of the edit (e.g. after a paste).
    pub force_full_rescan: bool,
    /// The character a backspace/delete just removed.
    pub last_removed_char: Option<char>,
    /// The edit is the document being loaded.
    pub initial_load: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanDecision {
    FullSync,
    /// Full rescan deferred to the next host turn; only for initial loads.
    FullAsync,
    /// Single character edit; rescan the paragraph.
    ParagraphLocal(TextRange),
    /// Multi-character edit; rescan the paragraph range.
    MultilineLocal(TextRange),
}

impl RescanDecision {
    pub fn is_full(&self) -> bool {
        matches!(self, RescanDecision::FullSync | RescanDecision::FullAsync)
    }
}

/// Classifies `edit` against `text`, the buffer contents after the edit.
pub fn classify(text: &str, edit: &EditEvent, flags: &OneShotFlags) -> RescanDecision {
    classify_indexed(text, &Utf16Index::new(text, 0), edit, flags)
}

/// [`classify`] with the UTF-16 index of `text` already built.
pub(crate) fn classify_indexed(
    text: &str,
    idx: &Utf16Index,
    edit: &EditEvent,
    flags: &OneShotFlags,
) -> RescanDecision {
    let edited = edit.edited_range();

    if edited.location == 0 && edited.length == idx.len() {
        return if flags.initial_load {
            RescanDecision::FullAsync
        } else {
            RescanDecision::FullSync
        };
    }

    if flags.force_full_rescan {
        return RescanDecision::FullSync;
    }

    let Some(bytes) = idx.byte_range(edited) else {
        log::debug!("Edit {edit:?} does not map onto the text");
        return RescanDecision::FullSync;
    };
    let para_bytes = paragraph_bytes(text, bytes);
    let paragraph = &text[para_bytes.clone()];
    let trimmed = paragraph.trim();

    if trimmed.starts_with(CodeFence::BACKTICKS) {
        return RescanDecision::FullSync;
    }
    if flags.last_removed_char == Some('`') && trimmed.contains(CodeFence::TORN) {
        return RescanDecision::FullSync;
    }
    if lines_with_spans(paragraph).any(|line| CodeFence::is_fence_line(line.content())) {
        return RescanDecision::FullSync;
    }

    let range = idx.range(para_bytes);
    if edit.delta().abs() == 1 {
        RescanDecision::ParagraphLocal(range)
    } else {
        RescanDecision::MultilineLocal(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn flags() -> OneShotFlags {
        OneShotFlags::default()
    }

    #[test]
    fn whole_buffer_insert_is_full() {
        let text = "```js\nconsole.log(1)\n```";
        let edit = EditEvent::insert(0, 24);
        assert_eq!(classify(text, &edit, &flags()), RescanDecision::FullSync);

        let load = OneShotFlags {
            initial_load: true,
            ..flags()
        };
        assert_eq!(classify(text, &edit, &load), RescanDecision::FullAsync);
    }

    #[test]
    fn clearing_the_buffer_is_full() {
        assert_eq!(
            classify("", &EditEvent::delete(0, 10), &flags()),
            RescanDecision::FullSync
        );
    }

    #[test]
    fn forced_rescan_wins() {
        let forced = OneShotFlags {
            force_full_rescan: true,
            ..flags()
        };
        assert_eq!(
            classify("abc\ndef", &EditEvent::insert(1, 1), &forced),
            RescanDecision::FullSync
        );
    }

    #[test]
    fn backtick_without_fence_is_paragraph_local() {
        let text = "hello ``";
        assert_eq!(
            classify(text, &EditEvent::insert(7, 1), &flags()),
            RescanDecision::ParagraphLocal(TextRange::new(0, 8))
        );
    }

    #[test]
    fn torn_fence_is_full() {
        let text = "`code``";
        let removed = OneShotFlags {
            last_removed_char: Some('`'),
            ..flags()
        };
        assert_eq!(
            classify(text, &EditEvent::delete(0, 1), &removed),
            RescanDecision::FullSync
        );
        assert!(matches!(
            classify(text, &EditEvent::delete(0, 1), &flags()),
            RescanDecision::ParagraphLocal(_)
        ));
    }

    #[rstest]
    #[case::opening_fence("a\n```rust\nb", 5)]
    #[case::indented_fence("a\n  ```\nb", 4)]
    fn typing_on_a_fence_line_is_full(#[case] text: &str, #[case] at: u32) {
        assert_eq!(
            classify(text, &EditEvent::insert(at, 1), &flags()),
            RescanDecision::FullSync
        );
    }

    #[test]
    fn paste_spanning_a_fence_is_full() {
        let text = "intro\n```\ncode";
        assert_eq!(
            classify(text, &EditEvent::insert(3, 8), &flags()),
            RescanDecision::FullSync
        );
    }

    #[test]
    fn multi_character_edit_is_multiline_local() {
        let text = "one\ntwo words\nthree";
        assert_eq!(
            classify(text, &EditEvent::replace(4, 3, 9), &flags()),
            RescanDecision::MultilineLocal(TextRange::new(4, 10))
        );
    }

    #[test]
    fn deletion_selects_the_joined_line() {
        let text = "onetwo\nthree";
        assert_eq!(
            classify(text, &EditEvent::delete(3, 1), &flags()),
            RescanDecision::ParagraphLocal(TextRange::new(0, 7))
        );
    }

    #[test]
    fn decision_kinds() {
        assert!(RescanDecision::FullAsync.is_full());
        assert!(!RescanDecision::ParagraphLocal(TextRange::new(0, 1)).is_full());
    }
}
