#![forbid(unsafe_code)]

//! Observability: a bounded log of what the engine decided, plus counters.

use std::collections::VecDeque;

use crate::classifier::{Classification, UpdateFlags};
use crate::error::RemoteUnavailable;
use crate::span::SelectionState;

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEntry {
    /// The local snapshot settled on a new selection or composing span.
    SelectionChanged {
        old: SelectionState,
        new: SelectionState,
    },
    /// The local text settled on new content.
    ExtractedTextChanged { revision: u64 },
    /// A selection confirmation was classified.
    UpdateClassified {
        classification: Classification,
        flags: UpdateFlags,
    },
    /// A monitored extracted-text update was applied to the cache.
    ExtractedTextApplied { token: u32, partial: bool },
    /// A read came back empty because the remote was unavailable.
    ReadDegraded {
        op: &'static str,
        reason: RemoteUnavailable,
    },
    /// A stale cache was replaced by fresh remote text.
    Refetched { start: usize, len: usize },
    /// The outermost batch closed.
    BatchClosed,
}

/// Running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub noop: u64,
    pub expected: u64,
    pub composing_corrected: u64,
    pub duplicate: u64,
    pub unexpected: u64,
    pub cache_hits: u64,
    pub remote_reads: u64,
    pub degraded_reads: u64,
    pub refetches: u64,
    pub batches_closed: u64,
}

impl EngineStats {
    pub(crate) fn count(&mut self, classification: Classification) {
        let slot = match classification {
            Classification::NoOp => &mut self.noop,
            Classification::Expected { .. } => &mut self.expected,
            Classification::ComposingCorrected { .. } => &mut self.composing_corrected,
            Classification::Duplicate => &mut self.duplicate,
            Classification::Unexpected => &mut self.unexpected,
        };
        *slot += 1;
    }
}

/// Ring of the most recent [`StatusEntry`] values.
#[derive(Debug, Clone)]
pub struct StatusLog {
    entries: VecDeque<StatusEntry>,
    capacity: usize,
    stats: EngineStats,
}

impl StatusLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            stats: EngineStats::default(),
        }
    }

    pub(crate) fn record(&mut self, entry: StatusEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn stats_mut(&mut self) -> &mut EngineStats {
        &mut self.stats
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &StatusEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&StatusEntry> {
        self.entries.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `SelectionChanged` entries currently retained.
    #[must_use]
    pub fn selection_changes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, StatusEntry::SelectionChanged { .. }))
            .count()
    }

    /// Drop retained entries; counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest() {
        let mut log = StatusLog::new(2);
        log.record(StatusEntry::BatchClosed);
        log.record(StatusEntry::ExtractedTextChanged { revision: 1 });
        log.record(StatusEntry::ExtractedTextChanged { revision: 2 });
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries().next(), Some(&StatusEntry::ExtractedTextChanged { revision: 1 }));
        assert_eq!(log.last(), Some(&StatusEntry::ExtractedTextChanged { revision: 2 }));
    }

    #[test]
    fn counters_follow_classification() {
        let mut log = StatusLog::new(4);
        log.stats_mut().count(Classification::Unexpected);
        log.stats_mut().count(Classification::Expected { consumed: 2 });
        log.stats_mut().count(Classification::Expected { consumed: 1 });
        let stats = log.stats();
        assert_eq!(stats.unexpected, 1);
        assert_eq!(stats.expected, 2);
        assert_eq!(stats.noop, 0);
    }

    #[test]
    fn clear_keeps_counters() {
        let mut log = StatusLog::new(4);
        log.stats_mut().cache_hits += 3;
        log.record(StatusEntry::BatchClosed);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.stats().cache_hits, 3);
    }
}
