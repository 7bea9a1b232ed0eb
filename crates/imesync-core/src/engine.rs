#![forbid(unsafe_code)]

//! The reconciliation engine.
//!
//! Owns the local belief about the remote editor (selection, composing span,
//! cached text window), applies every local edit optimistically, forwards it,
//! and interprets the confirmations that come back.
//!
//! # State
//!
//! [`SyncState`] is derived, never stored:
//!
//! | Condition                                      | State                 |
//! |------------------------------------------------|-----------------------|
//! | `reset_state` not called (or `finish_input`)   | `Uninitialized`       |
//! | cache stale, or a divergence held for a batch  | `Desynced`            |
//! | edits awaiting confirmation                    | `PendingConfirmation` |
//! | otherwise                                      | `Synced`              |
//!
//! A successful read from the remote clears staleness.
//!
//! # Batches
//!
//! Inside a batch, confirmations are classified and their bookkeeping is
//! applied immediately, but adopting a divergent selection and invalidating
//! the cache wait for the outermost `end_batch_edit`.

use std::collections::BTreeSet;

use tracing::{debug, debug_span, trace, warn};
use web_time::Instant;

use crate::batch::{BatchCoordinator, BatchSummary, Notification};
use crate::cache::CachedTextWindow;
use crate::classifier::{Classification, UpdateFlags, classify};
use crate::config::SyncConfig;
use crate::edit::{self, EditOp, EditPolicy};
use crate::error::{RemoteUnavailable, Result, SyncError};
use crate::event::KeyEvent;
use crate::pending::PendingEdits;
use crate::remote::{ExtractedText, ExtractedTextRequest, RemoteEditor, SelectionUpdate};
use crate::span::{SelectionState, Span};
use crate::status::{StatusEntry, StatusLog};
use crate::text::Utf16Text;

/// Connection state as seen from the keyboard side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Uninitialized,
    Synced,
    PendingConfirmation,
    Desynced,
}

/// A divergent confirmation received while a batch was open.
#[derive(Debug, Clone, Copy)]
struct DeferredUpdate {
    reported: SelectionState,
    /// `next_seq` at the time; any later edit means the report is outdated.
    seq: u64,
}

/// Keyboard-side mirror of a remote text field.
#[derive(Debug)]
pub struct ReconciliationEngine<R: RemoteEditor> {
    remote: R,
    config: SyncConfig,
    policy: EditPolicy,
    initialized: bool,
    state: SelectionState,
    cache: CachedTextWindow,
    pending: PendingEdits,
    batch: BatchCoordinator,
    batch_mark: u64,
    deferred: Option<DeferredUpdate>,
    text_revision: u64,
    requested_tokens: BTreeSet<u32>,
    monitor: Option<ExtractedTextRequest>,
    /// Text changes the monitored editor has yet to report; earlier reports
    /// are superseded.
    awaited_text_reports: usize,
    held: Option<(u32, ExtractedText)>,
    status: StatusLog,
}

fn non_negative(op: &'static str, what: &str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| SyncError::invalid_argument(op, format!("{what} {value} < 0")))
}

fn ordered_range(op: &'static str, start: i32, end: i32) -> Result<(usize, usize)> {
    let start = non_negative(op, "start", start)?;
    let end = non_negative(op, "end", end)?;
    if start > end {
        return Err(SyncError::invalid_argument(
            op,
            format!("inverted range {start}..{end}"),
        ));
    }
    Ok((start, end))
}

impl<R: RemoteEditor> ReconciliationEngine<R> {
    #[must_use]
    pub fn new(remote: R, config: SyncConfig) -> Self {
        Self {
            remote,
            policy: EditPolicy::from(&config),
            initialized: false,
            state: SelectionState::default(),
            cache: CachedTextWindow::new(),
            pending: PendingEdits::new(config.confirmation_history),
            batch: BatchCoordinator::new(config.update_order),
            batch_mark: 0,
            deferred: None,
            text_revision: 0,
            requested_tokens: BTreeSet::new(),
            monitor: None,
            awaited_text_reports: 0,
            held: None,
            status: StatusLog::new(config.status_capacity),
            config,
        }
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    /// Start (or restart) tracking with the editor's current selection.
    pub fn reset_state(&mut self, selection_start: i32, selection_end: i32) -> Result<()> {
        let (start, end) = ordered_range("reset_state", selection_start, selection_end)?;
        self.state = SelectionState::new(Span::new(start, end), None);
        self.cache.clear();
        self.pending.reset();
        self.batch.reset();
        self.deferred = None;
        self.held = None;
        self.awaited_text_reports = 0;
        self.initialized = true;
        debug!(start, end, "connection state reset");
        Ok(())
    }

    /// The connection ended; back to `Uninitialized`.
    pub fn finish_input(&mut self) {
        self.initialized = false;
        self.state = SelectionState::default();
        self.cache.clear();
        self.pending.reset();
        self.batch.reset();
        self.deferred = None;
        self.held = None;
        self.monitor = None;
        self.awaited_text_reports = 0;
        debug!("input finished");
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        if !self.initialized {
            SyncState::Uninitialized
        } else if self.cache.is_stale() || self.deferred.is_some() {
            SyncState::Desynced
        } else if !self.pending.is_empty() {
            SyncState::PendingConfirmation
        } else {
            SyncState::Synced
        }
    }

    // ── edits ───────────────────────────────────────────────────────────

    pub fn commit_text(&mut self, text: &str, new_cursor_position: i32) -> Result<()> {
        self.submit(EditOp::CommitText {
            text: text.into(),
            new_cursor_position,
        })
        .map(|_| ())
    }

    pub fn set_composing_text(&mut self, text: &str, new_cursor_position: i32) -> Result<()> {
        self.submit(EditOp::SetComposingText {
            text: text.into(),
            new_cursor_position,
        })
        .map(|_| ())
    }

    /// Returns whether the editor supports composing regions; when it does
    /// not, nothing changes locally.
    pub fn set_composing_region(&mut self, start: i32, end: i32) -> Result<bool> {
        let (start, end) = ordered_range("set_composing_region", start, end)?;
        self.submit(EditOp::SetComposingRegion { start, end })
    }

    pub fn finish_composing_text(&mut self) -> Result<()> {
        self.submit(EditOp::FinishComposingText).map(|_| ())
    }

    pub fn delete_surrounding_text(&mut self, before_length: i32, after_length: i32) -> Result<()> {
        let before = non_negative("delete_surrounding_text", "before_length", before_length)?;
        let after = non_negative("delete_surrounding_text", "after_length", after_length)?;
        self.submit(EditOp::DeleteSurroundingText { before, after })
            .map(|_| ())
    }

    pub fn set_selection(&mut self, start: i32, end: i32) -> Result<()> {
        let (start, end) = ordered_range("set_selection", start, end)?;
        self.submit(EditOp::SetSelection { start, end }).map(|_| ())
    }

    pub fn send_key_event(&mut self, event: KeyEvent) -> Result<()> {
        self.submit(EditOp::Key(event)).map(|_| ())
    }

    pub fn begin_batch_edit(&mut self) {
        if !self.batch.is_open() {
            self.batch_mark = self.pending.next_seq();
        }
        self.batch.begin(self.state, self.text_revision);
        self.remote.begin_batch_edit();
    }

    /// # Panics
    ///
    /// Panics when no batch is open.
    pub fn end_batch_edit(&mut self) {
        let summary = match self.batch.end(self.state, self.text_revision) {
            Ok(summary) => summary,
            Err(err) => panic!("{err}"),
        };
        self.remote.end_batch_edit();
        if let Some(summary) = summary {
            self.close_batch(&summary);
        }
    }

    fn ensure_initialized(&self, op: &'static str) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SyncError::ProtocolState(format!("{op} called before reset_state")))
        }
    }

    /// Plan, forward, then apply locally. Returns `false` when the remote
    /// declined the operation.
    fn submit(&mut self, op: EditOp) -> Result<bool> {
        self.ensure_initialized(op.name())?;
        self.read_context(&op);
        let before = self.state;
        let planned = edit::plan(&op, before, &self.cache, self.policy)?;

        if !self.forward(&op) {
            debug!(op = op.name(), "remote declined operation");
            return Ok(false);
        }

        self.held = None;
        let text_changed = planned.changes_text();
        for replacement in &planned.replacements {
            self.cache.apply_replacement(replacement.range, &replacement.text);
        }
        if text_changed {
            self.text_revision += 1;
        }
        self.state = planned.after;

        if planned.after != before {
            let seq = self.pending.push(op.clone(), before, planned.after, text_changed);
            debug!(
                op = op.name(),
                seq,
                pending = self.pending.len(),
                "edit applied optimistically"
            );
        } else {
            trace!(op = op.name(), "edit leaves selection unchanged");
        }

        if let Some(notifications) = self.batch.settle(before, self.state, text_changed) {
            self.record_notifications(&notifications);
        }
        Ok(true)
    }

    /// Read the units around `op` that decide surrogate snapping when the
    /// cache cannot answer for them. A degraded read leaves the planner
    /// blind to pairs there, as before.
    fn read_context(&mut self, op: &EditOp) {
        if self.deferred.is_some() {
            // The local selection is about to be replaced.
            return;
        }
        let sel = self.state.selection;
        let (mut need_before, mut need_after, mut inside) = (0, 0, false);
        for span in edit::surrogate_context(op, self.state, self.policy) {
            if self.cache.knows(span) {
                continue;
            }
            need_before = need_before.max(sel.start.saturating_sub(span.start));
            need_after = need_after.max(span.end.saturating_sub(sel.end));
            inside |= !sel.is_empty() && span.start < sel.end && span.end > sel.start;
        }
        if need_before == 0 && need_after == 0 && !inside {
            return;
        }
        trace!(op = op.name(), need_before, need_after, inside, "reading around edit");

        let was_stale = self.cache.is_stale();
        if need_before > 0 {
            let request = self.config.cache_window.max(need_before);
            if let Some(read) = self.timed_read("text_before_cursor", |r| r.text_before_cursor(request)) {
                self.cache.record_before(sel.start, Utf16Text::from(read));
            }
        }
        // Bridges the before and after reads across a selection.
        if inside || (!sel.is_empty() && need_before > 0 && need_after > 0) {
            if let Some(Some(read)) = self.timed_read("selected_text", |r| r.selected_text()) {
                self.cache.record_selected(sel, Utf16Text::from(read));
            }
        }
        if need_after > 0 {
            let request = self.config.cache_window.max(need_after);
            if let Some(read) = self.timed_read("text_after_cursor", |r| r.text_after_cursor(request)) {
                self.cache.record_after(sel.end, Utf16Text::from(read), request);
            }
        }
        self.note_refetch(was_stale);
    }

    fn forward(&mut self, op: &EditOp) -> bool {
        match op {
            EditOp::CommitText {
                text,
                new_cursor_position,
            } => self
                .remote
                .commit_text(&text.to_string_lossy(), *new_cursor_position),
            EditOp::SetComposingText {
                text,
                new_cursor_position,
            } => self
                .remote
                .set_composing_text(&text.to_string_lossy(), *new_cursor_position),
            EditOp::SetComposingRegion { start, end } => {
                return self.remote.set_composing_region(*start, *end);
            }
            EditOp::FinishComposingText => self.remote.finish_composing_text(),
            EditOp::DeleteSurroundingText { before, after } => {
                self.remote.delete_surrounding_text(*before, *after);
            }
            EditOp::SetSelection { start, end } => self.remote.set_selection(*start, *end),
            EditOp::Key(event) => self.remote.send_key_event(*event),
        }
        true
    }

    fn close_batch(&mut self, summary: &BatchSummary) {
        self.status.stats_mut().batches_closed += 1;
        self.status.record(StatusEntry::BatchClosed);
        if summary.selection_changed() {
            self.pending.fold_from(self.batch_mark, summary.baseline);
        } else {
            // The editor has nothing to confirm for this batch.
            self.pending.retire_from(self.batch_mark);
        }
        self.record_notifications(&summary.notifications);

        if let Some(deferred) = self.deferred.take() {
            self.cache.mark_stale();
            if self.pending.next_seq() == deferred.seq {
                self.adopt(deferred.reported);
            } else {
                debug!("edits followed a divergent update inside the batch; keeping local selection");
            }
        }
        self.try_apply_held();
    }

    fn record_notifications(&mut self, notifications: &[Notification]) {
        for notification in notifications {
            let entry = match *notification {
                Notification::SelectionChanged { old, new } => StatusEntry::SelectionChanged { old, new },
                Notification::ExtractedTextChanged => {
                    if self.monitor.is_some() {
                        self.awaited_text_reports += 1;
                        self.held = None;
                    }
                    StatusEntry::ExtractedTextChanged {
                        revision: self.text_revision,
                    }
                }
            };
            self.status.record(entry);
        }
    }

    fn adopt(&mut self, reported: SelectionState) {
        let old = self.state;
        self.state = reported;
        self.cache.mark_stale();
        if old != reported {
            self.status
                .record(StatusEntry::SelectionChanged { old, new: reported });
        }
    }

    // ── callbacks ───────────────────────────────────────────────────────

    /// Interpret a selection confirmation.
    pub fn on_selection_updated(&mut self, update: SelectionUpdate) -> UpdateFlags {
        let span = debug_span!(
            "on_selection_updated",
            old_start = update.old_selection.start,
            old_end = update.old_selection.end,
            new_start = update.new_selection.start,
            new_end = update.new_selection.end,
        );
        let _guard = span.enter();

        if !self.initialized {
            debug!("update before reset_state ignored");
            return UpdateFlags::empty();
        }

        let verdict = classify(&self.pending, self.state, &update);
        self.status.stats_mut().count(verdict.classification);
        match verdict.classification {
            Classification::NoOp => trace!("no-op confirmation"),
            Classification::Expected { consumed } => {
                self.pending.consume(consumed);
                debug!(consumed, remaining = self.pending.len(), "confirmation matched");
            }
            Classification::ComposingCorrected { consumed, adopt } => {
                self.pending.consume(consumed);
                if adopt {
                    let old = self.state;
                    self.state.composing = update.composing;
                    self.status.record(StatusEntry::SelectionChanged { old, new: self.state });
                }
                debug!(consumed, adopt, "composing span corrected from remote");
            }
            Classification::Duplicate => debug!("duplicate confirmation ignored"),
            Classification::Unexpected => {
                warn!(
                    believed = ?self.state,
                    reported = ?update.reported(),
                    pending = self.pending.len(),
                    "unexpected selection update"
                );
                self.pending.discard_all();
                let reported = update.reported();
                if self.batch.is_open() {
                    self.deferred = Some(DeferredUpdate {
                        reported,
                        seq: self.pending.next_seq(),
                    });
                } else {
                    self.adopt(reported);
                }
            }
        }
        self.status.record(StatusEntry::UpdateClassified {
            classification: verdict.classification,
            flags: verdict.flags,
        });
        self.try_apply_held();
        verdict.flags
    }

    /// Accept a monitored extracted-text update.
    ///
    /// # Panics
    ///
    /// Panics when `token` was never passed to [`Self::extracted_text`].
    pub fn on_extracted_text_updated(&mut self, token: u32, extracted: ExtractedText) {
        let span = debug_span!("on_extracted_text_updated", token);
        let _guard = span.enter();

        assert!(
            self.requested_tokens.contains(&token),
            "extracted text update for token {token} that was never requested"
        );
        if self.monitor.map(|request| request.token) != Some(token) {
            debug!("update for a replaced monitor ignored");
            return;
        }
        if self.awaited_text_reports > 0 {
            self.awaited_text_reports -= 1;
            // A stale cache takes whatever consistent report comes first.
            if self.awaited_text_reports > 0 && !self.cache.is_stale() {
                trace!(remaining = self.awaited_text_reports, "superseded extracted text dropped");
                return;
            }
        }
        self.held = Some((token, extracted));
        self.try_apply_held();
    }

    /// Apply the held extracted text once it describes the settled state.
    fn try_apply_held(&mut self) {
        if !self.pending.is_empty() || self.batch.is_open() || self.deferred.is_some() {
            return;
        }
        let Some((token, extracted)) = self.held.take() else {
            return;
        };
        if extracted.absolute_selection() != self.state.selection {
            trace!(token, "held extracted text does not match selection yet");
            self.held = Some((token, extracted));
            return;
        }

        let text = Utf16Text::from(extracted.text.as_str());
        let was_stale = self.cache.is_stale();
        match extracted.partial {
            None => {
                let hint = self.monitor.map_or(0, |request| request.hint_max_chars);
                let reaches_end = hint == 0 || text.len() < hint;
                self.cache.fill(extracted.start_offset, text, reaches_end);
                self.note_refetch(was_stale);
            }
            Some(range) => {
                let mirrored = self
                    .cache
                    .range(Span::new(range.start, range.start + text.len()));
                if mirrored.as_ref() != Some(&text) && self.cache.is_populated() {
                    debug!(
                        start = range.start,
                        end = range.end,
                        "partial update disagrees with cache"
                    );
                    self.cache.mark_stale();
                }
            }
        }
        self.status.record(StatusEntry::ExtractedTextApplied {
            token,
            partial: extracted.partial.is_some(),
        });
    }

    // ── reads ───────────────────────────────────────────────────────────

    /// Up to `max_len` code units before the selection start.
    ///
    /// A degraded read returns an empty string, never an error.
    pub fn text_before_cursor(&mut self, max_len: i32) -> Result<String> {
        let n = non_negative("text_before_cursor", "max_len", max_len)?;
        self.ensure_initialized("text_before_cursor")?;
        let cursor = self.state.selection.start;
        if let Some(hit) = self.cache.before(cursor, n) {
            self.cache_hit("text_before_cursor");
            return Ok(hit.trim_broken_edges().to_string_lossy());
        }

        let request = self.config.cache_window.max(n);
        let was_stale = self.cache.is_stale();
        let Some(read) = self.timed_read("text_before_cursor", |r| r.text_before_cursor(request)) else {
            return Ok(String::new());
        };
        let read = Utf16Text::from(read);
        let served = read.slice(read.len().saturating_sub(n)..read.len());
        self.cache.record_before(cursor, read);
        self.note_refetch(was_stale);
        Ok(served.trim_broken_edges().to_string_lossy())
    }

    /// Up to `max_len` code units after the selection end.
    pub fn text_after_cursor(&mut self, max_len: i32) -> Result<String> {
        let n = non_negative("text_after_cursor", "max_len", max_len)?;
        self.ensure_initialized("text_after_cursor")?;
        let cursor = self.state.selection.end;
        if let Some(hit) = self.cache.after(cursor, n) {
            self.cache_hit("text_after_cursor");
            return Ok(hit.trim_broken_edges().to_string_lossy());
        }

        let request = self.config.cache_window.max(n);
        let was_stale = self.cache.is_stale();
        let Some(read) = self.timed_read("text_after_cursor", |r| r.text_after_cursor(request)) else {
            return Ok(String::new());
        };
        let read = Utf16Text::from(read);
        let served = read.slice(0..n);
        self.cache.record_after(cursor, read, request);
        self.note_refetch(was_stale);
        Ok(served.trim_broken_edges().to_string_lossy())
    }

    /// The selected text, `None` when the selection is empty or the read
    /// degraded.
    pub fn selected_text(&mut self) -> Result<Option<String>> {
        self.ensure_initialized("selected_text")?;
        let selection = self.state.selection;
        if selection.is_empty() {
            return Ok(None);
        }
        if let Some(hit) = self.cache.range(selection) {
            self.cache_hit("selected_text");
            return Ok(Some(hit.to_string_lossy()));
        }
        let Some(Some(read)) = self.timed_read("selected_text", |r| r.selected_text()) else {
            return Ok(None);
        };
        let read = Utf16Text::from(read);
        self.cache.record_selected(selection, read.clone());
        Ok(Some(read.trim_broken_edges().to_string_lossy()))
    }

    /// Request extracted text; with `monitor` the editor keeps pushing
    /// updates for `request.token` until a later monitored request.
    pub fn extracted_text(&mut self, request: ExtractedTextRequest, monitor: bool) -> Result<Option<ExtractedText>> {
        self.ensure_initialized("extracted_text")?;
        self.requested_tokens.insert(request.token);
        if monitor {
            self.monitor = Some(request);
            self.awaited_text_reports = 0;
        }
        let was_stale = self.cache.is_stale();
        let Some(result) = self.timed_read("extracted_text", |r| r.extracted_text(request, monitor)) else {
            return Ok(None);
        };
        if let Some(extracted) = &result {
            let consistent = extracted.partial.is_none()
                && self.pending.is_empty()
                && extracted.absolute_selection() == self.state.selection;
            if consistent {
                let text = Utf16Text::from(extracted.text.as_str());
                let reaches_end = request.hint_max_chars == 0 || text.len() < request.hint_max_chars;
                self.cache.fill(extracted.start_offset, text, reaches_end);
                self.note_refetch(was_stale);
            }
        }
        Ok(result)
    }

    fn cache_hit(&mut self, op: &'static str) {
        self.status.stats_mut().cache_hits += 1;
        trace!(op, "served from cache");
    }

    fn note_refetch(&mut self, was_stale: bool) {
        if was_stale && !self.cache.is_stale() {
            self.status.stats_mut().refetches += 1;
            let (start, len) = (self.cache.start(), self.cache.text().len());
            self.status.record(StatusEntry::Refetched { start, len });
            debug!(start, len, "cache refreshed after desync");
        }
    }

    /// Run a blocking remote read, treating slow reads as unavailable.
    fn timed_read<T>(
        &mut self,
        op: &'static str,
        read: impl FnOnce(&mut R) -> std::result::Result<T, RemoteUnavailable>,
    ) -> Option<T> {
        self.status.stats_mut().remote_reads += 1;
        let started = Instant::now();
        let outcome = read(&mut self.remote);
        let elapsed = started.elapsed();
        let outcome = match outcome {
            Ok(_) if elapsed > self.config.read_timeout => Err(RemoteUnavailable::TimedOut),
            other => other,
        };
        match outcome {
            Ok(value) => {
                trace!(op, elapsed_us = elapsed.as_micros() as u64, "remote read");
                Some(value)
            }
            Err(reason) => {
                warn!(op, %reason, "remote read degraded, returning empty result");
                self.status.stats_mut().degraded_reads += 1;
                self.status.record(StatusEntry::ReadDegraded { op, reason });
                None
            }
        }
    }

    // ── observability ───────────────────────────────────────────────────

    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current local belief about selection and composing span.
    #[must_use]
    pub fn snapshot(&self) -> SelectionState {
        self.state
    }

    /// Content of the cache window, trusted or not.
    #[must_use]
    pub fn assumed_text(&self) -> String {
        self.cache.text().to_string_lossy()
    }

    #[must_use]
    pub fn cache(&self) -> &CachedTextWindow {
        &self.cache
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn batch_depth(&self) -> u32 {
        self.batch.depth()
    }

    #[must_use]
    pub fn text_revision(&self) -> u64 {
        self.text_revision
    }

    #[must_use]
    pub fn status(&self) -> &StatusLog {
        &self.status
    }
}
