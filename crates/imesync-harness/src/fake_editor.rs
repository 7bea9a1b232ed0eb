#![forbid(unsafe_code)]

//! In-process stand-in for the editor that owns the text.
//!
//! [`FakeEditor`] applies every incoming operation with the same planner the
//! engine uses, so a well-behaved fake reproduces the engine's prediction
//! exactly. Misbehaviour comes from [`EditorBehavior`]: rewritten text,
//! declined composing regions, short or failing reads, partial reports.
//!
//! Confirmations are not delivered directly. They are queued as
//! [`RemoteUpdate`]s in an outbox, and the test (or a
//! [`Session`](crate::Session)) decides when, how often and in which order
//! they reach the engine.

use std::collections::VecDeque;

use imesync_core::{
    BatchCoordinator, EditOp, ExtractedText, ExtractedTextRequest, KeyEvent, Notification, RemoteEditor,
    RemoteUnavailable, Result, SelectionState, SelectionUpdate, Span, TextSnapshot, Utf16Text, plan,
};
use tracing::debug;

use crate::behavior::{EditorBehavior, ExtractedMode};
use crate::call_log::{CallLog, RecordedCall};
use crate::modifier::TransformText;

/// A confirmation waiting to be delivered to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteUpdate {
    Selection(SelectionUpdate),
    ExtractedText { token: u32, text: ExtractedText },
}

/// Simulated remote editor.
#[derive(Debug)]
pub struct FakeEditor {
    snapshot: TextSnapshot,
    behavior: EditorBehavior,
    log: CallLog,
    batch: BatchCoordinator,
    revision: u64,
    monitor: Option<ExtractedTextRequest>,
    /// Text as of the last extracted-text report; partial reports diff
    /// against it.
    reported_text: Utf16Text,
    outbox: VecDeque<RemoteUpdate>,
}

impl FakeEditor {
    #[must_use]
    pub fn new(initial: TextSnapshot, behavior: EditorBehavior, log: CallLog) -> Self {
        Self {
            reported_text: initial.text().clone(),
            snapshot: initial,
            batch: BatchCoordinator::new(behavior.update_order),
            behavior,
            log,
            revision: 0,
            monitor: None,
            outbox: VecDeque::new(),
        }
    }

    // ── inspection ──────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> &TextSnapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.snapshot.text().to_string_lossy()
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        self.snapshot.state()
    }

    #[must_use]
    pub fn behavior(&self) -> &EditorBehavior {
        &self.behavior
    }

    /// Change behaviour mid-test. `update_order` only takes effect for
    /// editors built afterwards.
    pub fn behavior_mut(&mut self) -> &mut EditorBehavior {
        &mut self.behavior
    }

    #[must_use]
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    #[must_use]
    pub fn batch_depth(&self) -> u32 {
        self.batch.depth()
    }

    /// Token of the active extracted-text monitor.
    #[must_use]
    pub fn monitor_token(&self) -> Option<u32> {
        self.monitor.map(|request| request.token)
    }

    // ── outbox ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    #[must_use]
    pub fn peek_update(&self) -> Option<&RemoteUpdate> {
        self.outbox.front()
    }

    pub fn pop_update(&mut self) -> Option<RemoteUpdate> {
        self.outbox.pop_front()
    }

    pub fn take_updates(&mut self) -> Vec<RemoteUpdate> {
        self.outbox.drain(..).collect()
    }

    /// Queue an arbitrary update, e.g. a replay of one already delivered.
    pub fn inject_update(&mut self, update: RemoteUpdate) {
        self.outbox.push_back(update);
    }

    // ── external changes ────────────────────────────────────────────────

    /// The application moves the selection on its own. Composing is kept.
    pub fn external_set_selection(&mut self, start: usize, end: usize) -> Result<()> {
        let before = self.snapshot.state();
        let mut next = self.snapshot.clone();
        next.set_state(SelectionState::new(Span::new(start, end), before.composing))?;
        debug!(start, end, "external selection change");
        self.settle(before, next, false);
        Ok(())
    }

    /// The application rewrites `[start, end)` on its own.
    pub fn external_replace(&mut self, start: usize, end: usize, text: &str) -> Result<()> {
        let before = self.snapshot.state();
        let next = self.snapshot.replace_range(start, end, &Utf16Text::from(text))?;
        let text_changed = next.text() != self.snapshot.text();
        debug!(start, end, "external text change");
        self.settle(before, next, text_changed);
        Ok(())
    }

    // ── internals ───────────────────────────────────────────────────────

    fn apply(&mut self, op: EditOp) {
        let before = self.snapshot.state();
        let planned = match plan(&op, before, &self.snapshot, self.behavior.edit_policy()) {
            Ok(planned) => planned,
            Err(err) => {
                debug!(op = op.name(), %err, "operation ignored");
                return;
            }
        };
        match planned.apply_to(&self.snapshot) {
            Ok(next) => self.settle(before, next, planned.changes_text()),
            Err(err) => debug!(op = op.name(), %err, "operation ignored"),
        }
    }

    fn settle(&mut self, before: SelectionState, next: TextSnapshot, text_changed: bool) {
        self.snapshot = next;
        if text_changed {
            self.revision += 1;
        }
        if let Some(notifications) = self.batch.settle(before, self.snapshot.state(), text_changed) {
            self.emit(&notifications);
        }
    }

    fn emit(&mut self, notifications: &[Notification]) {
        for notification in notifications {
            match *notification {
                Notification::SelectionChanged { old, new } => {
                    self.outbox.push_back(RemoteUpdate::Selection(SelectionUpdate::new(
                        old.selection,
                        new.selection,
                        new.composing,
                    )));
                }
                Notification::ExtractedTextChanged => self.emit_extracted(),
            }
        }
    }

    fn emit_extracted(&mut self) {
        let Some(request) = self.monitor else {
            return;
        };
        let text = match self.behavior.extracted_mode {
            ExtractedMode::Full => self.full_report(request),
            ExtractedMode::Partial => self.partial_report(),
        };
        self.reported_text = self.snapshot.text().clone();
        self.outbox.push_back(RemoteUpdate::ExtractedText {
            token: request.token,
            text,
        });
    }

    fn full_report(&self, request: ExtractedTextRequest) -> ExtractedText {
        let text = self.snapshot.text();
        let end = match request.hint_max_chars {
            0 => text.len(),
            hint => text.snap_start(hint.min(text.len())),
        };
        let selection = self.snapshot.selection();
        ExtractedText {
            text: text.slice(0..end).to_string_lossy(),
            start_offset: 0,
            selection_start: selection.start,
            selection_end: selection.end,
            partial: None,
        }
    }

    /// The smallest range of the last report that changed, snapped so no
    /// surrogate pair is cut.
    fn partial_report(&self) -> ExtractedText {
        let old = &self.reported_text;
        let new = self.snapshot.text();
        let (o, n) = (old.units(), new.units());

        let mut prefix = o.iter().zip(n).take_while(|(a, b)| a == b).count();
        if old.splits_pair(prefix) || new.splits_pair(prefix) {
            prefix -= 1;
        }
        let room = o.len().min(n.len()) - prefix;
        let mut suffix = o
            .iter()
            .rev()
            .zip(n.iter().rev())
            .take(room)
            .take_while(|(a, b)| a == b)
            .count();
        if suffix > 0 && (old.splits_pair(o.len() - suffix) || new.splits_pair(n.len() - suffix)) {
            suffix -= 1;
        }

        let selection = self.snapshot.selection();
        ExtractedText {
            text: new.slice(prefix..n.len() - suffix).to_string_lossy(),
            start_offset: 0,
            selection_start: selection.start,
            selection_end: selection.end,
            partial: Some(Span::new(prefix, o.len() - suffix)),
        }
    }

    fn check_read(&self) -> std::result::Result<(), RemoteUnavailable> {
        match self.behavior.read_failure {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn read_len(&self, requested: usize) -> usize {
        self.behavior.read_limit.map_or(requested, |limit| limit.min(requested))
    }

    fn transformed(&self, text: &str) -> Utf16Text {
        Utf16Text::from(self.behavior.modifier.transform(text))
    }
}

impl RemoteEditor for FakeEditor {
    fn text_before_cursor(&mut self, max_len: usize) -> std::result::Result<String, RemoteUnavailable> {
        self.log.record(RecordedCall::TextBeforeCursor { max_len });
        self.check_read()?;
        let text = self.snapshot.text();
        let cursor = self.snapshot.selection().start;
        let from = text
            .snap_end(cursor.saturating_sub(self.read_len(max_len)))
            .min(cursor);
        Ok(text.slice(from..cursor).to_string_lossy())
    }

    fn text_after_cursor(&mut self, max_len: usize) -> std::result::Result<String, RemoteUnavailable> {
        self.log.record(RecordedCall::TextAfterCursor { max_len });
        self.check_read()?;
        let text = self.snapshot.text();
        let cursor = self.snapshot.selection().end;
        let to = text
            .snap_start(cursor.saturating_add(self.read_len(max_len)).min(text.len()))
            .max(cursor);
        Ok(text.slice(cursor..to).to_string_lossy())
    }

    fn selected_text(&mut self) -> std::result::Result<Option<String>, RemoteUnavailable> {
        self.log.record(RecordedCall::SelectedText);
        self.check_read()?;
        let selection = self.snapshot.selection();
        Ok((!selection.is_empty()).then(|| {
            self.snapshot
                .text()
                .slice(selection.start..selection.end)
                .to_string_lossy()
        }))
    }

    fn extracted_text(
        &mut self,
        request: ExtractedTextRequest,
        monitor: bool,
    ) -> std::result::Result<Option<ExtractedText>, RemoteUnavailable> {
        self.log.record(RecordedCall::ExtractedText {
            token: request.token,
            hint_max_chars: request.hint_max_chars,
            monitor,
        });
        self.check_read()?;
        if monitor {
            self.monitor = Some(request);
            self.reported_text = self.snapshot.text().clone();
        }
        Ok(Some(self.full_report(request)))
    }

    fn set_composing_text(&mut self, text: &str, new_cursor_position: i32) {
        self.log.record(RecordedCall::SetComposingText {
            text: text.to_owned(),
            new_cursor_position,
        });
        let text = self.transformed(text);
        self.apply(EditOp::SetComposingText {
            text,
            new_cursor_position,
        });
    }

    fn set_composing_region(&mut self, start: usize, end: usize) -> bool {
        self.log.record(RecordedCall::SetComposingRegion { start, end });
        if !self.behavior.composing_region_supported {
            return false;
        }
        self.apply(EditOp::SetComposingRegion { start, end });
        true
    }

    fn finish_composing_text(&mut self) {
        self.log.record(RecordedCall::FinishComposingText);
        self.apply(EditOp::FinishComposingText);
    }

    fn commit_text(&mut self, text: &str, new_cursor_position: i32) {
        self.log.record(RecordedCall::CommitText {
            text: text.to_owned(),
            new_cursor_position,
        });
        let text = self.transformed(text);
        self.apply(EditOp::CommitText {
            text,
            new_cursor_position,
        });
    }

    fn delete_surrounding_text(&mut self, before: usize, after: usize) {
        self.log.record(RecordedCall::DeleteSurroundingText { before, after });
        self.apply(EditOp::DeleteSurroundingText { before, after });
    }

    fn set_selection(&mut self, start: usize, end: usize) {
        self.log.record(RecordedCall::SetSelection { start, end });
        self.apply(EditOp::SetSelection { start, end });
    }

    fn begin_batch_edit(&mut self) {
        self.log.record(RecordedCall::BeginBatchEdit);
        self.batch.begin(self.snapshot.state(), self.revision);
    }

    fn end_batch_edit(&mut self) {
        self.log.record(RecordedCall::EndBatchEdit);
        match self.batch.end(self.snapshot.state(), self.revision) {
            Ok(Some(summary)) => self.emit(&summary.notifications),
            Ok(None) => {}
            Err(err) => debug!(%err, "unbalanced end_batch_edit ignored"),
        }
    }

    fn send_key_event(&mut self, event: KeyEvent) {
        self.log.record(RecordedCall::SendKeyEvent(event));
        self.apply(EditOp::Key(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::TextModifier;
    use imesync_core::KeyCode;

    fn editor(text: &str, caret: usize) -> FakeEditor {
        let snapshot = TextSnapshot::new(text, Span::caret(caret), None).unwrap();
        FakeEditor::new(snapshot, EditorBehavior::new(), CallLog::new())
    }

    fn selection_updates(fake: &mut FakeEditor) -> Vec<SelectionUpdate> {
        fake.take_updates()
            .into_iter()
            .filter_map(|u| match u {
                RemoteUpdate::Selection(s) => Some(s),
                RemoteUpdate::ExtractedText { .. } => None,
            })
            .collect()
    }

    #[test]
    fn commit_queues_one_selection_update() {
        let mut fake = editor("", 0);
        fake.commit_text("Hello world!", 1);
        assert_eq!(fake.text(), "Hello world!");
        assert_eq!(
            selection_updates(&mut fake),
            vec![SelectionUpdate::new(Span::caret(0), Span::caret(12), None)]
        );
        assert_eq!(fake.log().count("commit_text"), 1);
    }

    #[test]
    fn batch_reports_net_change_once() {
        let mut fake = editor("", 0);
        fake.begin_batch_edit();
        fake.commit_text("ab", 1);
        fake.set_composing_text("c", 1);
        fake.end_batch_edit();
        let updates = selection_updates(&mut fake);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].old_selection, Span::caret(0));
        assert_eq!(updates[0].new_selection, Span::caret(3));
        assert_eq!(updates[0].composing, Some(Span::new(2, 3)));
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let mut fake = editor("x", 1);
        fake.end_batch_edit();
        assert_eq!(fake.batch_depth(), 0);
        assert_eq!(fake.queued(), 0);
    }

    #[test]
    fn modifier_rewrites_committed_text() {
        let mut fake = editor("", 0);
        fake.behavior_mut().modifier = TextModifier::Double;
        fake.commit_text("ab", 1);
        assert_eq!(fake.text(), "aabb");
        // The log keeps what was sent, not what was stored.
        assert_eq!(
            fake.log().calls()[0],
            RecordedCall::CommitText {
                text: "ab".into(),
                new_cursor_position: 1
            }
        );
    }

    #[test]
    fn reads_respect_limit_and_pairs() {
        let mut fake = editor("a😀bc", 5);
        fake.behavior_mut().read_limit = Some(3);
        // Three units back from the caret would cut the pair.
        assert_eq!(fake.text_before_cursor(10).unwrap(), "bc");
        fake.set_selection(1, 1);
        assert_eq!(fake.text_after_cursor(3).unwrap(), "😀b");
        assert_eq!(fake.text_after_cursor(1).unwrap(), "");
    }

    #[test]
    fn read_failure_applies_to_every_read() {
        let mut fake = editor("abc", 1);
        fake.behavior_mut().read_failure = Some(RemoteUnavailable::ConnectionLost);
        assert_eq!(fake.text_before_cursor(5), Err(RemoteUnavailable::ConnectionLost));
        assert_eq!(fake.selected_text(), Err(RemoteUnavailable::ConnectionLost));
        assert_eq!(fake.log().reads(), 2);
    }

    #[test]
    fn declined_composing_region_changes_nothing() {
        let mut fake = editor("abc", 3);
        fake.behavior_mut().composing_region_supported = false;
        assert!(!fake.set_composing_region(0, 3));
        assert_eq!(fake.state().composing, None);
        assert_eq!(fake.queued(), 0);
    }

    #[test]
    fn monitored_full_reports_follow_edits() {
        let mut fake = editor("abc", 3);
        let request = ExtractedTextRequest {
            token: 7,
            hint_max_chars: 0,
        };
        let initial = fake.extracted_text(request, true).unwrap().unwrap();
        assert_eq!(initial.text, "abc");
        fake.commit_text("d", 1);
        let updates = fake.take_updates();
        assert_eq!(updates.len(), 2);
        match &updates[1] {
            RemoteUpdate::ExtractedText { token, text } => {
                assert_eq!(*token, 7);
                assert_eq!(text.text, "abcd");
                assert_eq!(text.absolute_selection(), Span::caret(4));
            }
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[test]
    fn partial_reports_carry_only_the_changed_range() {
        let mut fake = editor("hello world", 5);
        fake.behavior_mut().extracted_mode = ExtractedMode::Partial;
        let request = ExtractedTextRequest {
            token: 1,
            hint_max_chars: 0,
        };
        fake.extracted_text(request, true).unwrap();
        fake.commit_text(",", 1);
        let partial = fake
            .take_updates()
            .into_iter()
            .find_map(|u| match u {
                RemoteUpdate::ExtractedText { text, .. } => Some(text),
                RemoteUpdate::Selection(_) => None,
            })
            .unwrap();
        assert_eq!(partial.partial, Some(Span::new(5, 5)));
        assert_eq!(partial.text, ",");
    }

    #[test]
    fn partial_report_never_cuts_a_pair() {
        let mut fake = editor("😀", 2);
        fake.behavior_mut().extracted_mode = ExtractedMode::Partial;
        let request = ExtractedTextRequest {
            token: 1,
            hint_max_chars: 0,
        };
        fake.extracted_text(request, true).unwrap();
        // Same high surrogate, different low surrogate.
        fake.external_replace(0, 2, "😁").unwrap();
        let partial = fake
            .take_updates()
            .into_iter()
            .find_map(|u| match u {
                RemoteUpdate::ExtractedText { text, .. } => Some(text),
                RemoteUpdate::Selection(_) => None,
            })
            .unwrap();
        assert_eq!(partial.partial, Some(Span::new(0, 2)));
        assert_eq!(partial.text, "😁");
    }

    #[test]
    fn external_selection_notifies() {
        let mut fake = editor("hello", 5);
        fake.external_set_selection(0, 2).unwrap();
        assert_eq!(
            selection_updates(&mut fake),
            vec![SelectionUpdate::new(Span::caret(5), Span::new(0, 2), None)]
        );
        assert!(fake.external_set_selection(0, 9).is_err());
    }

    #[test]
    fn key_events_edit_text() {
        let mut fake = editor("ab", 2);
        fake.send_key_event(KeyEvent::down(KeyCode::Del));
        fake.send_key_event(KeyEvent::up(KeyCode::Del));
        assert_eq!(fake.text(), "a");
        assert_eq!(fake.log().count("send_key_event"), 2);
    }
}
