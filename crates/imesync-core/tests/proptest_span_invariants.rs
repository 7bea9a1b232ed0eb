#![forbid(unsafe_code)]

//! Property-based tests for the span model and the edit planner.
//!
//! 1. `adjust_span` keeps spans ordered and inside the edited text.
//! 2. Spans entirely before an edit never move; spans after it shift by the
//!    length delta.
//! 3. `resolve_new_cursor_position` follows the documented law.
//! 4. Under `KeepPairs`, no planned edit leaves a lone surrogate in the text
//!    or a selection/composing bound between the halves of a pair, even when
//!    the planner only sees the units `surrogate_context` names.

use imesync_core::{
    CachedTextWindow, EditOp, EditPolicy, KeyCode, KeyEvent, Modifiers, SelectionState, Span, SurrogatePolicy,
    TextSnapshot, Utf16Text, adjust_span, plan, resolve_new_cursor_position, surrogate_context,
};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

/// A text length, an edited range inside it, and a span inside it.
fn edit_geometry() -> impl Strategy<Value = (usize, Span, Span, usize)> {
    (0usize..40).prop_flat_map(|len| {
        (
            Just(len),
            (0..=len, 0..=len).prop_map(|(a, b)| Span::new(a, b)),
            (0..=len, 0..=len).prop_map(|(a, b)| Span::new(a, b)),
            0usize..12,
        )
    })
}

fn text_chars() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!['a', 'b', '\n', '\u{1F600}', '\u{10348}']),
        0..10,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// A snapshot whose selection and composing bounds sit on code-point
/// boundaries.
fn whole_snapshot() -> impl Strategy<Value = TextSnapshot> {
    (text_chars(), any::<[prop::sample::Index; 4]>(), any::<bool>()).prop_map(|(text, picks, composing)| {
        let units = Utf16Text::from(text.as_str());
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| text[..i].encode_utf16().count()).collect();
        boundaries.push(units.len());
        let at = |i: &prop::sample::Index| boundaries[i.index(boundaries.len())];
        let selection = Span::new(at(&picks[0]), at(&picks[1]));
        let composing = composing.then(|| Span::new(at(&picks[2]), at(&picks[3])));
        TextSnapshot::new(units, selection, composing).expect("bounds come from the text")
    })
}

fn op() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        (text_chars(), -4i32..6).prop_map(|(t, p)| EditOp::CommitText {
            text: t.as_str().into(),
            new_cursor_position: p,
        }),
        (text_chars(), -4i32..6).prop_map(|(t, p)| EditOp::SetComposingText {
            text: t.as_str().into(),
            new_cursor_position: p,
        }),
        (0usize..22, 0usize..22).prop_map(|(a, b)| EditOp::SetComposingRegion {
            start: a.min(b),
            end: a.max(b),
        }),
        Just(EditOp::FinishComposingText),
        (0usize..5, 0usize..5).prop_map(|(before, after)| EditOp::DeleteSurroundingText { before, after }),
        (0usize..22, 0usize..22).prop_map(|(a, b)| EditOp::SetSelection {
            start: a.min(b),
            end: a.max(b),
        }),
        (
            prop::sample::select(vec![
                KeyCode::Del,
                KeyCode::ForwardDel,
                KeyCode::DpadLeft,
                KeyCode::DpadRight,
                KeyCode::Enter,
                KeyCode::Char('\u{1F600}'),
            ]),
            any::<bool>(),
        )
            .prop_map(|(code, shift)| {
                let modifiers = if shift { Modifiers::SHIFT } else { Modifiers::NONE };
                EditOp::Key(KeyEvent::down(code).with_modifiers(modifiers))
            }),
    ]
}

fn whole(text: &Utf16Text, span: Span) -> bool {
    !text.splits_pair(span.start) && !text.splits_pair(span.end)
}

/// The smallest window a keyboard would hold after reading the context of
/// `op` around the selection.
fn context_window(snapshot: &TextSnapshot, op: &EditOp, policy: EditPolicy) -> CachedTextWindow {
    let mut window = CachedTextWindow::new();
    let spans = surrogate_context(op, snapshot.state(), policy);
    if spans.is_empty() {
        return window;
    }
    let selection = snapshot.state().selection;
    let len = snapshot.len();
    let start = spans.iter().map(|s| s.start).fold(selection.start, usize::min).min(len);
    let end = spans.iter().map(|s| s.end).fold(selection.end, usize::max);
    window.fill(start, snapshot.text().slice(start..end.min(len)), end >= len);
    window
}

// ═══════════════════════════════════════════════════════════════════════════
// 1-2. Shift-or-collapse
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig { max_global_rejects: 16384, ..ProptestConfig::default() })]

    #[test]
    fn adjusted_span_stays_ordered_and_in_bounds((len, replaced, span, n) in edit_geometry()) {
        let out = adjust_span(span, replaced, n);
        let new_len = len - replaced.len() + n;
        prop_assert!(out.start <= out.end);
        prop_assert!(out.fits(new_len), "{out:?} outside 0..={new_len}");
        if span.is_empty() {
            prop_assert!(out.is_empty());
        }
    }

    #[test]
    fn spans_before_the_edit_never_move((_len, replaced, span, n) in edit_geometry()) {
        prop_assume!(span.end <= replaced.start && !(span.is_empty() && span.start == replaced.start));
        prop_assert_eq!(adjust_span(span, replaced, n), span);
    }

    #[test]
    fn spans_after_the_edit_shift_by_the_delta((_len, replaced, span, n) in edit_geometry()) {
        prop_assume!(span.start >= replaced.end);
        let out = adjust_span(span, replaced, n);
        prop_assert_eq!(out.len(), span.len());
        prop_assert_eq!(out.start + replaced.len(), span.start + n);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 3. Cursor law
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cursor_position_law(start in 0usize..50, n in 0usize..20, k in -80i32..80) {
        let inserted = Span::new(start, start + n);
        let got = resolve_new_cursor_position(k, inserted, None);
        let want = if k > 0 {
            inserted.end as i64 + i64::from(k) - 1
        } else {
            (inserted.start as i64 + i64::from(k)).max(0)
        };
        prop_assert_eq!(got as i64, want);
    }

    #[test]
    fn cursor_position_is_clamped_to_text(start in 0usize..50, n in 0usize..20, k in -80i32..80, extra in 0usize..10) {
        let inserted = Span::new(start, start + n);
        let len = inserted.end + extra;
        prop_assert!(resolve_new_cursor_position(k, inserted, Some(len)) <= len);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 4. Surrogate pairs survive every planned edit
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn keep_pairs_never_splits_a_pair(snapshot in whole_snapshot(), op in op()) {
        let policy = EditPolicy {
            surrogates: SurrogatePolicy::KeepPairs,
            ..EditPolicy::default()
        };
        let Ok(planned) = plan(&op, snapshot.state(), &snapshot, policy) else {
            return Ok(());
        };
        let out = planned.apply_to(&snapshot).expect("planned against the same snapshot");
        prop_assert!(String::from_utf16(out.text().units()).is_ok(), "lone surrogate in {:?}", out.text());
        let SelectionState { selection, composing } = out.state();
        prop_assert!(whole(out.text(), selection));
        if let Some(composing) = composing {
            prop_assert!(whole(out.text(), composing));
        }
    }

    #[test]
    fn context_is_enough_to_keep_pairs(snapshot in whole_snapshot(), op in op()) {
        let policy = EditPolicy::default();
        let window = context_window(&snapshot, &op, policy);
        let Ok(planned) = plan(&op, snapshot.state(), &window, policy) else {
            return Ok(());
        };
        let Ok(out) = planned.apply_to(&snapshot) else {
            return Ok(());
        };
        prop_assert!(String::from_utf16(out.text().units()).is_ok(), "lone surrogate in {:?}", out.text());
        let SelectionState { selection, composing } = out.state();
        prop_assert!(whole(out.text(), selection), "{op:?} left {selection:?} in {:?}", out.text());
        if let Some(composing) = composing {
            prop_assert!(whole(out.text(), composing));
        }
    }

    #[test]
    fn planned_state_always_fits_the_new_text(snapshot in whole_snapshot(), op in op()) {
        let Ok(planned) = plan(&op, snapshot.state(), &snapshot, EditPolicy::default()) else {
            return Ok(());
        };
        prop_assert!(planned.apply_to(&snapshot).is_ok());
    }
}
