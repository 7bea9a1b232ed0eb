#![forbid(unsafe_code)]

//! Bookkeeping for local edits whose confirmation has not arrived yet.
//!
//! Records are kept in issue order. Confirmations consume a prefix of the
//! queue (the remote may coalesce several edits into one report); whatever is
//! consumed or discarded leaves a fingerprint in a bounded history so a late
//! or repeated confirmation can be recognised instead of being mistaken for
//! an external change.

use std::collections::VecDeque;

use crate::edit::EditOp;
use crate::span::{SelectionState, Span};

/// One in-flight local edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEditRecord {
    pub seq: u64,
    pub op: EditOp,
    /// State immediately before the edit was applied.
    pub before: SelectionState,
    /// State the remote is expected to report afterwards.
    pub expected: SelectionState,
    pub text_changed: bool,
}

impl PendingEditRecord {
    fn fingerprint(&self) -> (Span, SelectionState) {
        (self.before.selection, self.expected)
    }
}

/// FIFO of [`PendingEditRecord`]s plus a history of settled fingerprints.
#[derive(Debug, Clone)]
pub struct PendingEdits {
    records: VecDeque<PendingEditRecord>,
    next_seq: u64,
    history: VecDeque<(Span, SelectionState)>,
    history_capacity: usize,
}

impl PendingEdits {
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            next_seq: 0,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    /// Register an edit; returns its sequence number.
    pub fn push(&mut self, op: EditOp, before: SelectionState, expected: SelectionState, text_changed: bool) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.push_back(PendingEditRecord {
            seq,
            op,
            before,
            expected,
            text_changed,
        });
        seq
    }

    /// Sequence number the next pushed record will get.
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PendingEditRecord> + ExactSizeIterator {
        self.records.iter()
    }

    #[must_use]
    pub fn front(&self) -> Option<&PendingEditRecord> {
        self.records.front()
    }

    /// Remove the oldest `count` records as confirmed.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.records.len());
        let settled: Vec<_> = self.records.drain(..count).collect();
        for record in &settled {
            self.remember(record.fingerprint());
        }
    }

    /// Drop every outstanding record without confirmation.
    pub fn discard_all(&mut self) {
        self.consume(self.records.len());
    }

    /// Drop records with `seq >= first`; their confirmations will never come.
    pub fn retire_from(&mut self, first: u64) {
        let keep = self.records.iter().take_while(|r| r.seq < first).count();
        let retired: Vec<_> = self.records.drain(keep..).collect();
        for record in &retired {
            self.remember(record.fingerprint());
        }
    }

    /// Replace records with `seq >= first` by a single record running from
    /// `baseline` to the last one's prediction; the editor reports a whole
    /// batch as one transition.
    pub fn fold_from(&mut self, first: u64, baseline: SelectionState) {
        let keep = self.records.iter().take_while(|r| r.seq < first).count();
        if keep == self.records.len() {
            return;
        }
        let text_changed = self.records.iter().skip(keep).any(|r| r.text_changed);
        let Some(last) = self.records.drain(keep..).last() else {
            return;
        };
        self.records.push_back(PendingEditRecord {
            before: baseline,
            text_changed,
            ..last
        });
    }

    /// Forget records and history; sequence numbers keep counting.
    pub fn reset(&mut self) {
        self.records.clear();
        self.history.clear();
    }

    /// Whether `(old, reported)` matches a settled record.
    #[must_use]
    pub fn seen(&self, old: Span, reported: SelectionState) -> bool {
        self.history.iter().any(|&(o, r)| o == old && r == reported)
    }

    fn remember(&mut self, fingerprint: (Span, SelectionState)) {
        if self.history_capacity == 0 {
            return;
        }
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(fingerprint);
    }
}
