#![forbid(unsafe_code)]

//! The remote editor boundary.
//!
//! [`RemoteEditor`] is the contract the core consumes; it is implemented by
//! platform glue in production and by a fake endpoint in tests. The reverse
//! direction (confirmations coming back) is the pair of callbacks on
//! [`ReconciliationEngine`](crate::engine::ReconciliationEngine):
//! `on_selection_updated` and `on_extracted_text_updated`.
//!
//! # Offsets
//!
//! All positions are UTF-16 code-unit offsets into the editor's full text.
//!
//! # Threading
//!
//! Calls and callbacks share one sequential execution context. Nothing here
//! requires `Send`.

use crate::error::RemoteUnavailable;
use crate::event::KeyEvent;
use crate::span::{SelectionState, Span};

/// Parameters of a `getExtractedText` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtractedTextRequest {
    /// Caller-chosen token echoed back with monitored updates.
    pub token: u32,
    /// Upper bound on returned code units; `0` means no limit.
    pub hint_max_chars: usize,
}

/// Text reported by the editor, full or as a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Full text starting at `start_offset`, or the replacement text when
    /// `partial` is set.
    pub text: String,
    /// Absolute offset of the first code unit of a full report.
    pub start_offset: usize,
    /// Selection, relative to `start_offset`.
    pub selection_start: usize,
    pub selection_end: usize,
    /// For delta reports: the absolute range that `text` replaces.
    pub partial: Option<Span>,
}

impl ExtractedText {
    /// Selection in absolute offsets.
    #[must_use]
    pub fn absolute_selection(&self) -> Span {
        Span::new(
            self.start_offset + self.selection_start,
            self.start_offset + self.selection_end,
        )
    }
}

/// A selection confirmation as reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionUpdate {
    pub old_selection: Span,
    pub new_selection: Span,
    pub composing: Option<Span>,
}

impl SelectionUpdate {
    #[must_use]
    pub const fn new(old_selection: Span, new_selection: Span, composing: Option<Span>) -> Self {
        Self {
            old_selection,
            new_selection,
            composing,
        }
    }

    /// Build from the protocol's raw integers, where a negative composing
    /// bound means "no composing span".
    #[must_use]
    pub fn from_raw(
        old_start: i32,
        old_end: i32,
        new_start: i32,
        new_end: i32,
        composing_start: i32,
        composing_end: i32,
    ) -> Self {
        let pos = |v: i32| v.max(0) as usize;
        let composing = (composing_start >= 0 && composing_end >= 0)
            .then(|| Span::new(pos(composing_start), pos(composing_end)));
        Self {
            old_selection: Span::new(pos(old_start), pos(old_end)),
            new_selection: Span::new(pos(new_start), pos(new_end)),
            composing,
        }
    }

    /// The state this update says the editor is now in.
    #[must_use]
    pub const fn reported(&self) -> SelectionState {
        SelectionState::new(self.new_selection, self.composing)
    }

    /// Whether the update moves nothing.
    #[must_use]
    pub fn is_noop_shape(&self) -> bool {
        self.old_selection == self.new_selection
    }
}

/// Operations the core issues against the editor that owns the text.
///
/// Reads may return fewer units than requested, or an empty string because
/// of transient unavailability; neither necessarily means "no text". Writes
/// are fire-and-forget.
pub trait RemoteEditor {
    fn text_before_cursor(&mut self, max_len: usize) -> Result<String, RemoteUnavailable>;

    fn text_after_cursor(&mut self, max_len: usize) -> Result<String, RemoteUnavailable>;

    /// `Ok(None)` when nothing is selected.
    fn selected_text(&mut self) -> Result<Option<String>, RemoteUnavailable>;

    /// With `monitor` set the editor keeps pushing updates tagged with
    /// `request.token` until a later monitored request replaces it.
    fn extracted_text(
        &mut self,
        request: ExtractedTextRequest,
        monitor: bool,
    ) -> Result<Option<ExtractedText>, RemoteUnavailable>;

    fn set_composing_text(&mut self, text: &str, new_cursor_position: i32);

    /// Returns `false` when the editor does not support composing regions.
    fn set_composing_region(&mut self, start: usize, end: usize) -> bool;

    fn finish_composing_text(&mut self);

    fn commit_text(&mut self, text: &str, new_cursor_position: i32);

    fn delete_surrounding_text(&mut self, before: usize, after: usize);

    fn set_selection(&mut self, start: usize, end: usize);

    fn begin_batch_edit(&mut self);

    fn end_batch_edit(&mut self);

    fn send_key_event(&mut self, event: KeyEvent);
}
