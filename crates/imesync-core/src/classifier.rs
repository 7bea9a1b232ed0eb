#![forbid(unsafe_code)]

//! Decide what an incoming selection confirmation means.
//!
//! The classifier is a pure function of the pending queue, the engine's
//! current belief, and the update. The engine acts on the verdict.
//!
//! # Matching
//!
//! The reported `old` selection anchors the update: the first pending record
//! whose pre-edit selection equals it is where the remote says it started.
//! From there the earliest record whose prediction equals the reported state
//! is confirmed, together with everything queued before it (the remote may
//! merge several edits into one report). Taking the earliest match can leave
//! a merged report's tail pending; the next report anchors on it and settles
//! it. Taking a later one could settle edits the remote has not applied yet.
//!
//! A report whose `old` matches no record never rolls newer local edits back:
//! it confirms the current belief, repeats a settled confirmation, or is an
//! external change.

use bitflags::bitflags;

use crate::pending::{PendingEditRecord, PendingEdits};
use crate::remote::SelectionUpdate;
use crate::span::SelectionState;

bitflags! {
    /// Result bits returned from `on_selection_updated`.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u8 {
        /// The reported selection differs from every prediction.
        const UPDATE_IMPACTED_SELECTION = 0b01;
        /// Some local bookkeeping matched the update.
        const UPDATE_WAS_EXPECTED       = 0b10;
    }
}

/// What an update turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Nothing moved and nothing was waiting.
    NoOp,
    /// Confirms the oldest `consumed` pending records.
    Expected { consumed: usize },
    /// Selection confirmed, composing reported differently.
    ComposingCorrected {
        consumed: usize,
        /// Whether the reported composing span should replace the local one
        /// (only when no later edit builds on it).
        adopt: bool,
    },
    /// Repeats a confirmation that was already settled.
    Duplicate,
    /// An external change; local selection bookkeeping must be replaced.
    Unexpected,
}

/// Classification plus the flags handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Verdict {
    pub classification: Classification,
    pub flags: UpdateFlags,
}

impl Verdict {
    const fn new(classification: Classification, flags: UpdateFlags) -> Self {
        Self {
            classification,
            flags,
        }
    }

    fn expected(consumed: usize) -> Self {
        Self::new(Classification::Expected { consumed }, UpdateFlags::UPDATE_WAS_EXPECTED)
    }
}

/// Classify `update` against `pending` and the current local belief.
#[must_use]
pub fn classify(pending: &PendingEdits, current: SelectionState, update: &SelectionUpdate) -> Verdict {
    let reported = update.reported();
    let old = update.old_selection;

    if pending.is_empty() {
        if update.is_noop_shape() && reported == current {
            return Verdict::new(Classification::NoOp, UpdateFlags::empty());
        }
        if reported == current {
            return Verdict::expected(0);
        }
        if update.is_noop_shape() && reported.selection == current.selection {
            return Verdict::new(
                Classification::ComposingCorrected { consumed: 0, adopt: true },
                UpdateFlags::UPDATE_WAS_EXPECTED,
            );
        }
        return settled_or_unexpected(pending, update);
    }

    let records: Vec<_> = pending.iter().collect();

    if let Some(anchor) = records.iter().position(|r| r.before.selection == old) {
        if let Some(j) = first_match(&records, anchor, |e| *e == reported) {
            return Verdict::expected(j + 1);
        }
        if let Some(j) = first_match(&records, anchor, |e| e.selection == reported.selection) {
            return Verdict::new(
                Classification::ComposingCorrected {
                    consumed: j + 1,
                    adopt: j + 1 == records.len(),
                },
                UpdateFlags::UPDATE_WAS_EXPECTED,
            );
        }
        if update.is_noop_shape() && records[anchor].before == reported {
            // The remote echoing the state the edit started from.
            return Verdict::new(Classification::Duplicate, UpdateFlags::UPDATE_WAS_EXPECTED);
        }
        return Verdict::new(
            Classification::Unexpected,
            UpdateFlags::UPDATE_IMPACTED_SELECTION | UpdateFlags::UPDATE_WAS_EXPECTED,
        );
    }

    if reported == current {
        return Verdict::expected(records.len());
    }
    if let Some(j) = first_match(&records, 0, |e| *e == reported) {
        return Verdict::expected(j + 1);
    }
    settled_or_unexpected(pending, update)
}

/// Index of the earliest record at or after `from` whose prediction satisfies `hit`.
fn first_match(
    records: &[&PendingEditRecord],
    from: usize,
    hit: impl Fn(&SelectionState) -> bool,
) -> Option<usize> {
    (from..records.len()).find(|&j| hit(&records[j].expected))
}

fn settled_or_unexpected(pending: &PendingEdits, update: &SelectionUpdate) -> Verdict {
    if pending.seen(update.old_selection, update.reported()) {
        Verdict::new(Classification::Duplicate, UpdateFlags::UPDATE_WAS_EXPECTED)
    } else {
        Verdict::new(Classification::Unexpected, UpdateFlags::UPDATE_IMPACTED_SELECTION)
    }
}
