#![forbid(unsafe_code)]

//! Edit planning: what an operation does to text, selection, and composing.
//!
//! The planner is pure. It reads neighbouring code units through
//! [`TextSource`] (only needed for surrogate snapping and length bounds) and
//! returns a [`PlannedEdit`]. The engine plans against its partial cache, a
//! fake editor plans against its full text; both get identical answers for
//! the parts of the text they both know.

use smallvec::{SmallVec, smallvec};

use crate::config::{EmptyComposingPolicy, SurrogatePolicy, SyncConfig};
use crate::error::{Result, SyncError};
use crate::event::{KeyCode, KeyEvent, Modifiers};
use crate::span::{SelectionState, Span, TextSnapshot, adjust_span, resolve_new_cursor_position};
use crate::text::{Utf16Text, code_point_len_after, code_point_len_before, is_high_surrogate, is_low_surrogate};

/// One local edit operation, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    CommitText {
        text: Utf16Text,
        new_cursor_position: i32,
    },
    SetComposingText {
        text: Utf16Text,
        new_cursor_position: i32,
    },
    SetComposingRegion {
        start: usize,
        end: usize,
    },
    FinishComposingText,
    DeleteSurroundingText {
        before: usize,
        after: usize,
    },
    SetSelection {
        start: usize,
        end: usize,
    },
    Key(KeyEvent),
}

impl EditOp {
    /// Protocol name of the operation, for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CommitText { .. } => "commit_text",
            Self::SetComposingText { .. } => "set_composing_text",
            Self::SetComposingRegion { .. } => "set_composing_region",
            Self::FinishComposingText => "finish_composing_text",
            Self::DeleteSurroundingText { .. } => "delete_surrounding_text",
            Self::SetSelection { .. } => "set_selection",
            Self::Key(_) => "send_key_event",
        }
    }
}

/// Read access to whatever text the planner is allowed to see.
pub trait TextSource {
    /// Total text length, when known.
    fn len_hint(&self) -> Option<usize>;

    /// Code unit at an absolute offset, when known.
    fn unit_at(&self, offset: usize) -> Option<u16>;
}

impl TextSource for TextSnapshot {
    fn len_hint(&self) -> Option<usize> {
        Some(self.len())
    }

    fn unit_at(&self, offset: usize) -> Option<u16> {
        self.text().unit_at(offset)
    }
}

/// The subset of configuration the planner consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditPolicy {
    pub empty_composing: EmptyComposingPolicy,
    pub surrogates: SurrogatePolicy,
}

impl From<&SyncConfig> for EditPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            empty_composing: config.empty_composing,
            surrogates: config.surrogates,
        }
    }
}

impl EditPolicy {
    fn composing(&self, span: Span) -> Option<Span> {
        match self.empty_composing {
            EmptyComposingPolicy::Collapse if span.is_empty() => None,
            _ => Some(span),
        }
    }

    fn keeps_pairs(&self) -> bool {
        self.surrogates == SurrogatePolicy::KeepPairs
    }
}

/// Replace `range` (pre-edit offsets) with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub range: Span,
    pub text: Utf16Text,
}

/// Outcome of planning one operation.
///
/// `replacements` are ordered back-to-front, so applying them in sequence
/// never invalidates the offsets of the ones still to come.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEdit {
    pub replacements: SmallVec<[Replacement; 2]>,
    pub after: SelectionState,
}

impl PlannedEdit {
    fn unchanged(state: SelectionState) -> Self {
        Self {
            replacements: SmallVec::new(),
            after: state,
        }
    }

    /// Whether any text changes.
    #[must_use]
    pub fn changes_text(&self) -> bool {
        self.replacements
            .iter()
            .any(|r| !r.range.is_empty() || !r.text.is_empty())
    }

    /// Apply to a full snapshot.
    pub fn apply_to(&self, snapshot: &TextSnapshot) -> Result<TextSnapshot> {
        let mut out = snapshot.clone();
        for r in &self.replacements {
            out = out.replace_range(r.range.start, r.range.end, &r.text)?;
        }
        out.set_state(self.after)?;
        Ok(out)
    }
}

/// Plan `op` starting from `before`.
pub fn plan(
    op: &EditOp,
    before: SelectionState,
    source: &dyn TextSource,
    policy: EditPolicy,
) -> Result<PlannedEdit> {
    let planner = Planner { source, policy };
    match op {
        EditOp::CommitText {
            text,
            new_cursor_position,
        } => Ok(planner.insert(before, text, *new_cursor_position, false)),
        EditOp::SetComposingText {
            text,
            new_cursor_position,
        } => Ok(planner.insert(before, text, *new_cursor_position, true)),
        EditOp::SetComposingRegion { start, end } => {
            let span = planner.checked_span(op, *start, *end)?;
            Ok(PlannedEdit::unchanged(SelectionState::new(
                before.selection,
                policy.composing(span),
            )))
        }
        EditOp::FinishComposingText => Ok(PlannedEdit::unchanged(SelectionState::new(
            before.selection,
            None,
        ))),
        EditOp::DeleteSurroundingText {
            before: head_len,
            after: tail_len,
        } => Ok(planner.delete_surrounding(before, *head_len, *tail_len)),
        EditOp::SetSelection { start, end } => {
            let span = planner.checked_span(op, *start, *end)?;
            Ok(PlannedEdit::unchanged(SelectionState::new(
                span,
                before.composing,
            )))
        }
        EditOp::Key(event) => Ok(planner.key(before, *event)),
    }
}

/// Pre-edit ranges whose code units decide how `op` snaps around surrogate
/// pairs, starting from `before`.
///
/// A planner that cannot see these units treats them as ordinary code
/// points. Empty under [`SurrogatePolicy::CodeUnits`], and empty for
/// commits that leave the caret at either end of the inserted text, since a
/// whole-code-point text never ends inside a pair.
#[must_use]
pub fn surrogate_context(op: &EditOp, before: SelectionState, policy: EditPolicy) -> SmallVec<[Span; 2]> {
    let mut spans = SmallVec::new();
    if !policy.keeps_pairs() {
        return spans;
    }
    let sel = before.selection;
    match op {
        EditOp::CommitText {
            new_cursor_position: k,
            ..
        }
        | EditOp::SetComposingText {
            new_cursor_position: k,
            ..
        } => {
            let range = before.composing.unwrap_or(sel);
            if *k < 0 {
                around(&mut spans, range.start.saturating_sub(k.unsigned_abs() as usize));
            } else if *k > 1 {
                around(&mut spans, range.end.saturating_add(k.unsigned_abs() as usize - 1));
            }
        }
        EditOp::SetComposingRegion { start, end } | EditOp::SetSelection { start, end } => {
            around(&mut spans, *start);
            around(&mut spans, *end);
        }
        EditOp::FinishComposingText => {}
        EditOp::DeleteSurroundingText {
            before: head_len,
            after: tail_len,
        } => {
            if *head_len > 0 {
                around(&mut spans, sel.start.saturating_sub(*head_len));
            }
            if *tail_len > 0 {
                around(&mut spans, sel.end.saturating_add(*tail_len));
            }
        }
        EditOp::Key(event) => {
            if !event.is_down() {
                return spans;
            }
            let extend = event.modifiers.contains(Modifiers::SHIFT);
            match event.code {
                KeyCode::Del if sel.is_empty() && sel.start > 0 => {
                    spans.push(Span::new(sel.start.saturating_sub(2), sel.start));
                }
                KeyCode::DpadLeft if (extend || sel.is_empty()) && sel.start > 0 => {
                    spans.push(Span::new(sel.start.saturating_sub(2), sel.start));
                }
                KeyCode::ForwardDel if sel.is_empty() => spans.push(Span::new(sel.end, sel.end + 2)),
                KeyCode::DpadRight if extend || sel.is_empty() => spans.push(Span::new(sel.end, sel.end + 2)),
                _ => {}
            }
        }
    }
    spans
}

/// Both units of a pair that would straddle `offset`.
fn around(spans: &mut SmallVec<[Span; 2]>, offset: usize) {
    if offset > 0 {
        spans.push(Span::new(offset - 1, offset + 1));
    }
}

struct Planner<'a> {
    source: &'a dyn TextSource,
    policy: EditPolicy,
}

impl Planner<'_> {
    fn unit(&self, offset: usize) -> Option<u16> {
        self.source.unit_at(offset)
    }

    fn splits_pair(&self, offset: usize) -> bool {
        if offset == 0 {
            return false;
        }
        matches!(
            (self.unit(offset - 1), self.unit(offset)),
            (Some(hi), Some(lo)) if is_high_surrogate(hi) && is_low_surrogate(lo)
        )
    }

    fn snap_start(&self, offset: usize) -> usize {
        if self.policy.keeps_pairs() && self.splits_pair(offset) {
            offset - 1
        } else {
            offset
        }
    }

    fn snap_end(&self, offset: usize) -> usize {
        if self.policy.keeps_pairs() && self.splits_pair(offset) {
            offset + 1
        } else {
            offset
        }
    }

    fn width_before(&self, offset: usize) -> usize {
        if self.policy.keeps_pairs() {
            code_point_len_before(offset, |i| self.unit(i))
        } else {
            usize::from(offset > 0)
        }
    }

    fn width_after(&self, offset: usize) -> usize {
        if self.policy.keeps_pairs() {
            code_point_len_after(offset, |i| self.unit(i))
        } else {
            1
        }
    }

    fn at_end(&self, offset: usize) -> bool {
        self.source.len_hint().is_some_and(|len| offset >= len)
    }

    fn checked_span(&self, op: &EditOp, start: usize, end: usize) -> Result<Span> {
        if start > end {
            return Err(SyncError::invalid_argument(
                op.name(),
                format!("inverted range {start}..{end}"),
            ));
        }
        if let Some(len) = self.source.len_hint() {
            if end > len {
                return Err(SyncError::invalid_argument(
                    op.name(),
                    format!("range {start}..{end} exceeds text length {len}"),
                ));
            }
        }
        Ok(Span {
            start: self.snap_start(start),
            end: self.snap_end(end),
        })
    }

    /// commitText / setComposingText: replace the composing span (or the
    /// selection when not composing) and place the caret.
    fn insert(
        &self,
        before: SelectionState,
        text: &Utf16Text,
        new_cursor_position: i32,
        composing: bool,
    ) -> PlannedEdit {
        let range = before.composing.unwrap_or(before.selection);
        let n = text.len();
        let inserted = Span::new(range.start, range.start + n);
        let new_len = self
            .source
            .len_hint()
            .map(|len| len.saturating_sub(range.len()) + n);
        let mut cursor = resolve_new_cursor_position(new_cursor_position, inserted, new_len);

        if self.policy.keeps_pairs() && cursor > 0 {
            // Look the neighbours up in post-edit coordinates.
            let post_unit = |p: usize| -> Option<u16> {
                if p < range.start {
                    self.unit(p)
                } else if p < inserted.end {
                    text.unit_at(p - range.start)
                } else {
                    self.unit(p - n + range.len())
                }
            };
            if let (Some(hi), Some(lo)) = (post_unit(cursor - 1), post_unit(cursor)) {
                if is_high_surrogate(hi) && is_low_surrogate(lo) {
                    cursor -= 1;
                }
            }
        }

        let composing = if composing {
            self.policy.composing(inserted)
        } else {
            None
        };
        PlannedEdit {
            replacements: smallvec![Replacement {
                range,
                text: text.clone(),
            }],
            after: SelectionState::new(Span::caret(cursor), composing),
        }
    }

    fn delete_surrounding(&self, before: SelectionState, head_len: usize, tail_len: usize) -> PlannedEdit {
        let sel = before.selection;
        let mut tail_end = sel.end.saturating_add(tail_len);
        if let Some(len) = self.source.len_hint() {
            tail_end = tail_end.min(len.max(sel.end));
        }
        let head = Span {
            start: self.snap_start(sel.start.saturating_sub(head_len)),
            end: sel.start,
        };
        let tail = Span {
            start: sel.end,
            end: self.snap_end(tail_end),
        };

        let mut replacements = SmallVec::new();
        let mut state = before;
        for range in [tail, head] {
            if range.is_empty() {
                continue;
            }
            state = self.adjusted(state, range, 0);
            replacements.push(Replacement {
                range,
                text: Utf16Text::new(),
            });
        }
        PlannedEdit {
            replacements,
            after: state,
        }
    }

    fn adjusted(&self, state: SelectionState, range: Span, inserted_len: usize) -> SelectionState {
        SelectionState::new(
            adjust_span(state.selection, range, inserted_len),
            state
                .composing
                .map(|c| adjust_span(c, range, inserted_len))
                .and_then(|c| self.policy.composing(c)),
        )
    }

    fn replace_with_caret(&self, before: SelectionState, range: Span, text: Utf16Text) -> PlannedEdit {
        let n = text.len();
        let composing = self.adjusted(before, range, n).composing;
        PlannedEdit {
            replacements: smallvec![Replacement { range, text }],
            after: SelectionState::new(Span::caret(range.start + n), composing),
        }
    }

    fn key(&self, before: SelectionState, event: KeyEvent) -> PlannedEdit {
        if !event.is_down() {
            return PlannedEdit::unchanged(before);
        }
        let sel = before.selection;
        let extend = event.modifiers.contains(Modifiers::SHIFT);
        match event.code {
            KeyCode::Del | KeyCode::ForwardDel if !sel.is_empty() => {
                self.replace_with_caret(before, sel, Utf16Text::new())
            }
            KeyCode::Del => {
                if sel.start == 0 {
                    return PlannedEdit::unchanged(before);
                }
                let w = self.width_before(sel.start);
                self.replace_with_caret(before, Span::new(sel.start - w, sel.start), Utf16Text::new())
            }
            KeyCode::ForwardDel => {
                if self.at_end(sel.end) {
                    return PlannedEdit::unchanged(before);
                }
                let w = self.width_after(sel.end);
                let mut end = sel.end + w;
                if let Some(len) = self.source.len_hint() {
                    end = end.min(len);
                }
                self.replace_with_caret(before, Span::new(sel.end, end), Utf16Text::new())
            }
            KeyCode::DpadLeft => {
                if !extend && !sel.is_empty() {
                    return PlannedEdit::unchanged(SelectionState::new(
                        Span::caret(sel.start),
                        before.composing,
                    ));
                }
                if sel.start == 0 {
                    return PlannedEdit::unchanged(before);
                }
                let to = sel.start - self.width_before(sel.start);
                let selection = if extend {
                    Span::new(to, sel.end)
                } else {
                    Span::caret(to)
                };
                PlannedEdit::unchanged(SelectionState::new(selection, before.composing))
            }
            KeyCode::DpadRight => {
                if !extend && !sel.is_empty() {
                    return PlannedEdit::unchanged(SelectionState::new(
                        Span::caret(sel.end),
                        before.composing,
                    ));
                }
                if self.at_end(sel.end) {
                    return PlannedEdit::unchanged(before);
                }
                let to = sel.end + self.width_after(sel.end);
                let selection = if extend {
                    Span::new(sel.start, to)
                } else {
                    Span::caret(to)
                };
                PlannedEdit::unchanged(SelectionState::new(selection, before.composing))
            }
            KeyCode::Enter => self.replace_with_caret(before, sel, Utf16Text::from('\n')),
            KeyCode::Char(c) => self.replace_with_caret(before, sel, Utf16Text::from(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR: &str = "\u{1F34E}";

    fn snapshot(text: &str, sel: (usize, usize), comp: Option<(usize, usize)>) -> TextSnapshot {
        TextSnapshot::new(text, Span::new(sel.0, sel.1), comp.map(|(a, b)| Span::new(a, b))).unwrap()
    }

    fn run(s: &TextSnapshot, op: EditOp) -> TextSnapshot {
        run_with(s, op, EditPolicy::default())
    }

    fn run_with(s: &TextSnapshot, op: EditOp, policy: EditPolicy) -> TextSnapshot {
        plan(&op, s.state(), s, policy).unwrap().apply_to(s).unwrap()
    }

    #[test]
    fn commit_into_empty_text() {
        let s = snapshot("", (0, 0), None);
        let out = run(
            &s,
            EditOp::CommitText {
                text: "Hello world!".into(),
                new_cursor_position: 1,
            },
        );
        assert_eq!(out.text().to_string_lossy(), "Hello world!");
        assert_eq!(out.selection(), Span::caret(12));
        assert_eq!(out.composing(), None);
    }

    #[test]
    fn commit_replaces_composing_span() {
        let s = snapshot("Lorem ipsumtest dolor sit amet", (15, 15), Some((11, 15)));
        let out = run(
            &s,
            EditOp::CommitText {
                text: "changed".into(),
                new_cursor_position: 1,
            },
        );
        assert_eq!(out.text().to_string_lossy(), "Lorem ipsumchanged dolor sit amet");
        assert_eq!(out.selection(), Span::caret("Lorem ipsumchanged".len()));
        assert_eq!(out.composing(), None);
    }

    #[test]
    fn set_composing_text_marks_inserted_span() {
        let s = snapshot("ab", (1, 1), None);
        let out = run(
            &s,
            EditOp::SetComposingText {
                text: "xyz".into(),
                new_cursor_position: 1,
            },
        );
        assert_eq!(out.text().to_string_lossy(), "axyzb");
        assert_eq!(out.composing(), Some(Span::new(1, 4)));
        assert_eq!(out.selection(), Span::caret(4));
    }

    #[test]
    fn empty_composing_text_follows_policy() {
        let s = snapshot("abc", (3, 3), Some((1, 3)));
        let op = EditOp::SetComposingText {
            text: "".into(),
            new_cursor_position: 1,
        };
        let collapsed = run(&s, op.clone());
        assert_eq!(collapsed.composing(), None);
        let kept = run_with(
            &s,
            op,
            EditPolicy {
                empty_composing: EmptyComposingPolicy::Keep,
                ..EditPolicy::default()
            },
        );
        assert_eq!(kept.composing(), Some(Span::caret(1)));
    }

    #[test]
    fn delete_surrounding_leaves_selection_text() {
        let s = snapshot("0123456789", (4, 6), None);
        let out = run(&s, EditOp::DeleteSurroundingText { before: 2, after: 1 });
        assert_eq!(out.text().to_string_lossy(), "0145789");
        assert_eq!(out.selection(), Span::new(2, 4));
    }

    #[test]
    fn delete_surrounding_clamps_at_text_edges() {
        let s = snapshot("abc", (1, 1), None);
        let out = run(&s, EditOp::DeleteSurroundingText { before: 10, after: 10 });
        assert_eq!(out.text().to_string_lossy(), "");
        assert_eq!(out.selection(), Span::caret(0));
    }

    #[test]
    fn delete_surrounding_keeps_surrogate_pairs_whole() {
        let text = format!("a{PAIR}b");
        let s = snapshot(&text, (3, 3), None);
        let out = run(&s, EditOp::DeleteSurroundingText { before: 1, after: 0 });
        assert_eq!(out.text().to_string_lossy(), "ab");
        assert_eq!(out.selection(), Span::caret(1));

        let s = snapshot(&text, (1, 1), None);
        let out = run(&s, EditOp::DeleteSurroundingText { before: 0, after: 1 });
        assert_eq!(out.text().to_string_lossy(), "ab");
    }

    #[test]
    fn code_unit_policy_splits_pairs() {
        let text = format!("a{PAIR}b");
        let s = snapshot(&text, (3, 3), None);
        let out = run_with(
            &s,
            EditOp::DeleteSurroundingText { before: 1, after: 0 },
            EditPolicy {
                surrogates: SurrogatePolicy::CodeUnits,
                ..EditPolicy::default()
            },
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out.selection(), Span::caret(2));
    }

    #[test]
    fn delete_shrinks_composing_and_collapses_when_empty() {
        let s = snapshot("abcdef", (4, 4), Some((2, 4)));
        let out = run(&s, EditOp::DeleteSurroundingText { before: 2, after: 0 });
        assert_eq!(out.text().to_string_lossy(), "abef");
        assert_eq!(out.composing(), None);

        let s = snapshot("abcdef", (4, 4), Some((1, 4)));
        let out = run(&s, EditOp::DeleteSurroundingText { before: 2, after: 0 });
        assert_eq!(out.composing(), Some(Span::new(1, 2)));
    }

    #[test]
    fn set_selection_rejects_out_of_bounds() {
        let s = snapshot("abc", (0, 0), None);
        let err = plan(&EditOp::SetSelection { start: 1, end: 9 }, s.state(), &s, EditPolicy::default()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument { op: "set_selection", .. }));
    }

    #[test]
    fn set_selection_snaps_off_pair_middle() {
        let text = format!("a{PAIR}b");
        let s = snapshot(&text, (0, 0), None);
        let out = run(&s, EditOp::SetSelection { start: 2, end: 2 });
        // start snaps left, end snaps right
        assert_eq!(out.selection(), Span::new(1, 3));
    }

    #[test]
    fn composing_region_and_finish() {
        let s = snapshot("hello", (5, 5), None);
        let out = run(&s, EditOp::SetComposingRegion { start: 1, end: 4 });
        assert_eq!(out.composing(), Some(Span::new(1, 4)));
        assert_eq!(out.selection(), Span::caret(5));
        let out = run(&out, EditOp::FinishComposingText);
        assert_eq!(out.composing(), None);
        assert_eq!(out.text().to_string_lossy(), "hello");
    }

    #[test]
    fn backspace_removes_whole_code_point() {
        let text = format!("a{PAIR}");
        let s = snapshot(&text, (3, 3), None);
        let out = run(&s, EditOp::Key(KeyEvent::down(KeyCode::Del)));
        assert_eq!(out.text().to_string_lossy(), "a");
        assert_eq!(out.selection(), Span::caret(1));
    }

    #[test]
    fn backspace_at_start_is_noop() {
        let s = snapshot("abc", (0, 0), None);
        let planned = plan(&EditOp::Key(KeyEvent::down(KeyCode::Del)), s.state(), &s, EditPolicy::default()).unwrap();
        assert!(!planned.changes_text());
        assert_eq!(planned.after, s.state());
    }

    #[test]
    fn forward_delete_and_selection_delete() {
        let s = snapshot("abcd", (1, 1), None);
        let out = run(&s, EditOp::Key(KeyEvent::down(KeyCode::ForwardDel)));
        assert_eq!(out.text().to_string_lossy(), "acd");
        assert_eq!(out.selection(), Span::caret(1));

        let s = snapshot("abcd", (1, 3), None);
        let out = run(&s, EditOp::Key(KeyEvent::down(KeyCode::Del)));
        assert_eq!(out.text().to_string_lossy(), "ad");
        assert_eq!(out.selection(), Span::caret(1));
    }

    #[test]
    fn dpad_moves_by_code_point() {
        let text = format!("{PAIR}x");
        let s = snapshot(&text, (2, 2), None);
        let left = run(&s, EditOp::Key(KeyEvent::down(KeyCode::DpadLeft)));
        assert_eq!(left.selection(), Span::caret(0));
        let right = run(&left, EditOp::Key(KeyEvent::down(KeyCode::DpadRight)));
        assert_eq!(right.selection(), Span::caret(2));
        let extended = run(
            &right,
            EditOp::Key(KeyEvent::down(KeyCode::DpadRight).with_modifiers(Modifiers::SHIFT)),
        );
        assert_eq!(extended.selection(), Span::new(2, 3));
        let collapsed = run(&extended, EditOp::Key(KeyEvent::down(KeyCode::DpadLeft)));
        assert_eq!(collapsed.selection(), Span::caret(2));
    }

    #[test]
    fn key_up_does_nothing() {
        let s = snapshot("abc", (3, 3), None);
        let out = run(&s, EditOp::Key(KeyEvent::up(KeyCode::Del)));
        assert_eq!(out, s);
    }

    #[test]
    fn char_key_replaces_selection() {
        let s = snapshot("abcd", (1, 3), Some((0, 4)));
        let out = run(&s, EditOp::Key(KeyEvent::down(KeyCode::Char('Z'))));
        assert_eq!(out.text().to_string_lossy(), "aZd");
        assert_eq!(out.selection(), Span::caret(2));
        assert_eq!(out.composing(), Some(Span::new(0, 3)));
    }

    #[test]
    fn commit_cursor_does_not_land_inside_pair() {
        let text = format!("{PAIR}");
        let s = snapshot(&text, (0, 0), None);
        // Cursor requested one unit past the inserted "x": inside the pair.
        let out = run(
            &s,
            EditOp::CommitText {
                text: "x".into(),
                new_cursor_position: 2,
            },
        );
        assert_eq!(out.selection(), Span::caret(1));
    }

    #[test]
    fn context_covers_the_units_each_op_consults() {
        let caret = SelectionState::caret(5);
        let policy = EditPolicy::default();
        let ctx = |op: EditOp, before: SelectionState| surrogate_context(&op, before, policy).into_vec();

        assert_eq!(ctx(EditOp::Key(KeyEvent::down(KeyCode::Del)), caret), vec![Span::new(3, 5)]);
        assert_eq!(ctx(EditOp::Key(KeyEvent::down(KeyCode::DpadRight)), caret), vec![Span::new(5, 7)]);
        assert_eq!(
            ctx(EditOp::DeleteSurroundingText { before: 2, after: 1 }, caret),
            vec![Span::new(2, 4), Span::new(5, 7)]
        );
        assert_eq!(
            ctx(EditOp::SetSelection { start: 0, end: 8 }, caret),
            vec![Span::new(7, 9)]
        );
        let commit = |k| EditOp::CommitText {
            text: "x".into(),
            new_cursor_position: k,
        };
        assert_eq!(ctx(commit(-2), caret), vec![Span::new(2, 4)]);
        assert_eq!(ctx(commit(3), caret), vec![Span::new(6, 8)]);
        assert!(ctx(commit(1), caret).is_empty());
        assert!(ctx(commit(0), caret).is_empty());

        // Collapsing a selection needs nothing.
        let selected = SelectionState::new(Span::new(2, 5), None);
        assert!(ctx(EditOp::Key(KeyEvent::down(KeyCode::Del)), selected).is_empty());
        assert!(ctx(EditOp::Key(KeyEvent::down(KeyCode::DpadLeft)), selected).is_empty());
    }

    #[test]
    fn code_unit_policy_needs_no_context() {
        let policy = EditPolicy {
            surrogates: SurrogatePolicy::CodeUnits,
            ..EditPolicy::default()
        };
        let op = EditOp::Key(KeyEvent::down(KeyCode::Del));
        assert!(surrogate_context(&op, SelectionState::caret(5), policy).is_empty());
    }
}
