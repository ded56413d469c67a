//! # Incremental Orchestrator
//!
//! One `EditSession` per open document. The host forwards every text edit;
//! the session classifies it, runs the matching rescan and hands back the
//! writes it made. The buffer is borrowed mutably for each call, so two
//! rescans of one document can never overlap.

use std::sync::Arc;

use uuid::Uuid;

use crate::buffer::{StyledBuffer, TextRange};
use crate::classify::{OneShotFlags, RescanDecision, classify_indexed};
use crate::edit::EditEvent;
use crate::engine::StyleEngine;
use crate::error::HighlightError;
use crate::highlight::StyleWrite;

/// A full rescan postponed to the next host turn, valid only while the
/// buffer it was scheduled for is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeferredRescan {
    buffer_id: Uuid,
    version: u64,
}

#[derive(Debug)]
pub struct EditSession {
    engine: Arc<StyleEngine>,
    flags: OneShotFlags,
    deferred: Option<DeferredRescan>,
}

impl EditSession {
    pub fn new(engine: Arc<StyleEngine>) -> Self {
        Self {
            engine,
            flags: OneShotFlags::default(),
            deferred: None,
        }
    }

    pub fn engine(&self) -> &StyleEngine {
        &self.engine
    }

    pub fn flags(&self) -> &OneShotFlags {
        &self.flags
    }

    /// Makes the next edit rescan the whole buffer.
    pub fn force_full_rescan(&mut self) {
        self.flags.force_full_rescan = true;
    }

    /// Records the character the next edit removes.
    pub fn note_removed_char(&mut self, removed: char) {
        self.flags.last_removed_char = Some(removed);
    }

    /// Marks the next edit as the document being loaded.
    pub fn mark_initial_load(&mut self) {
        self.flags.initial_load = true;
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Treats the buffer's current contents as freshly loaded. The full
    /// rescan is deferred; call [`EditSession::run_deferred`] on the next turn.
    pub fn load(&mut self, buffer: &mut StyledBuffer) -> Vec<StyleWrite> {
        self.mark_initial_load();
        self.apply_edit(buffer, EditEvent::insert(0, buffer.len()))
    }

    /// Replaces `range` in `buffer` and restyles. A single removed character
    /// is recorded for the classifier.
    pub fn edit(
        &mut self,
        buffer: &mut StyledBuffer,
        range: TextRange,
        replacement: &str,
    ) -> Result<Vec<StyleWrite>, HighlightError> {
        if replacement.is_empty() && self.flags.last_removed_char.is_none() {
            let removed = buffer.slice(range).and_then(|s| {
                let mut chars = s.chars();
                chars.next().filter(|_| chars.next().is_none())
            });
            self.flags.last_removed_char = removed;
        }
        let edit = buffer.replace(range, replacement)?;
        Ok(self.apply_edit(buffer, edit))
    }

    /// Restyles `buffer` after `edit`, which has already been applied to it.
    pub fn apply_edit(&mut self, buffer: &mut StyledBuffer, edit: EditEvent) -> Vec<StyleWrite> {
        if edit.is_noop() {
            log::debug!("Skipping no-op edit {edit:?}");
            return Vec::new();
        }

        let snapshot = self.engine.snapshot(buffer);
        let decision = if self.deferred.take().is_some() {
            log::debug!("Edit arrived before the deferred rescan ran, rescanning now");
            RescanDecision::FullSync
        } else {
            classify_indexed(snapshot.text(), snapshot.idx(), &edit, &self.flags)
        };
        log::debug!("Edit {edit:?} classified as {decision:?}");

        let mut writes = match decision {
            RescanDecision::FullSync => self.engine.full_rescan_at(&snapshot, buffer),
            RescanDecision::FullAsync => {
                self.deferred = Some(DeferredRescan {
                    buffer_id: buffer.id(),
                    version: buffer.version(),
                });
                Vec::new()
            }
            RescanDecision::ParagraphLocal(range) | RescanDecision::MultilineLocal(range) => {
                self.engine.local_rescan_at(&snapshot, buffer, range)
            }
        };

        // Full rescans attach images themselves, or will once deferred.
        if !decision.is_full() {
            let edited = edit.edited_range();
            let neighbourhood = TextRange::from_bounds(
                edited.location.saturating_sub(1),
                edited.end().saturating_add(1).min(buffer.len()),
            );
            writes.extend(self.engine.refresh_attachments_at(&snapshot, buffer, neighbourhood));
        }

        self.flags = OneShotFlags::default();
        writes
    }

    /// Runs the rescan deferred by an initial load. Returns `None` when
    /// nothing was pending or when `buffer` is not the buffer (or version)
    /// it was scheduled for.
    pub fn run_deferred(&mut self, buffer: &mut StyledBuffer) -> Option<Vec<StyleWrite>> {
        let deferred = self.deferred.take()?;
        if deferred.buffer_id != buffer.id() || deferred.version != buffer.version() {
            log::debug!("Dropping deferred rescan, buffer changed since {deferred:?}");
            return None;
        }
        Some(self.engine.full_rescan(buffer))
    }
}
