#![forbid(unsafe_code)]

//! Batch edit coordination.
//!
//! `begin`/`end` nest. The state at the outermost `begin` is the baseline;
//! at the outermost `end` the coordinator emits the net change between the
//! baseline and the final state, never one notification per edit. Outside
//! a batch every change settles immediately.
//!
//! The same coordinator drives both sides of the connection: the engine uses
//! it to record what the editor should report, a simulated editor uses it to
//! decide what to report.

use smallvec::SmallVec;
use tracing::debug;

use crate::config::UpdateOrder;
use crate::error::{Result, SyncError};
use crate::span::SelectionState;

/// A change observers are told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    SelectionChanged {
        old: SelectionState,
        new: SelectionState,
    },
    ExtractedTextChanged,
}

/// Notifications for one settled change, in delivery order.
pub type Notifications = SmallVec<[Notification; 2]>;

/// What closing the outermost batch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub baseline: SelectionState,
    pub notifications: Notifications,
}

impl BatchSummary {
    /// Whether the batch as a whole moved the selection or composing span.
    #[must_use]
    pub fn selection_changed(&self) -> bool {
        self.notifications
            .iter()
            .any(|n| matches!(n, Notification::SelectionChanged { .. }))
    }
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    state: SelectionState,
    revision: u64,
}

/// Nesting depth plus the state captured when the outermost batch opened.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    depth: u32,
    baseline: Option<Baseline>,
    order: UpdateOrder,
}

impl BatchCoordinator {
    #[must_use]
    pub fn new(order: UpdateOrder) -> Self {
        Self {
            depth: 0,
            baseline: None,
            order,
        }
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.depth > 0
    }

    /// Open a (possibly nested) batch. `revision` identifies the current text
    /// content; any change to the text must change it.
    pub fn begin(&mut self, state: SelectionState, revision: u64) {
        if self.depth == 0 {
            self.baseline = Some(Baseline { state, revision });
        }
        self.depth += 1;
        debug!(depth = self.depth, "batch opened");
    }

    /// Close one level. Returns the consolidated summary when the outermost
    /// batch closes, `Ok(None)` for inner levels.
    ///
    /// # Errors
    ///
    /// [`SyncError::ProtocolState`] when no batch is open.
    pub fn end(&mut self, state: SelectionState, revision: u64) -> Result<Option<BatchSummary>> {
        if self.depth == 0 {
            return Err(SyncError::ProtocolState(
                "end_batch_edit called with no open batch".into(),
            ));
        }
        self.depth -= 1;
        debug!(depth = self.depth, "batch closed");
        if self.depth > 0 {
            return Ok(None);
        }
        let baseline = self.baseline.take().unwrap_or(Baseline { state, revision });
        Ok(Some(BatchSummary {
            baseline: baseline.state,
            notifications: self.diff(baseline.state, state, baseline.revision != revision),
        }))
    }

    /// Notifications for a single change made outside a batch; `None` while
    /// a batch is open (the change is folded into the batch summary).
    #[must_use]
    pub fn settle(&self, before: SelectionState, after: SelectionState, text_changed: bool) -> Option<Notifications> {
        (!self.is_open()).then(|| self.diff(before, after, text_changed))
    }

    /// Forget any open batch.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.baseline = None;
    }

    fn diff(&self, old: SelectionState, new: SelectionState, text_changed: bool) -> Notifications {
        let selection = (old != new).then_some(Notification::SelectionChanged { old, new });
        let text = text_changed.then_some(Notification::ExtractedTextChanged);
        let ordered = match self.order {
            UpdateOrder::SelectionFirst => [selection, text],
            UpdateOrder::ExtractedTextFirst => [text, selection],
        };
        ordered.into_iter().flatten().collect()
    }
}
