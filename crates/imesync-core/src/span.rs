#![forbid(unsafe_code)]

//! Text span model: a consistent text + selection + composing snapshot.
//!
//! # Invariants
//!
//! 1. `selection.start <= selection.end <= text.len()`
//! 2. `composing`, when present, satisfies the same bounds
//! 3. Every mutation adjusts both spans with [`adjust_span`]; there is no
//!    other path by which a span moves as a side effect of a text change.
//!
//! # Shift-or-collapse
//!
//! For a replacement of `[a, b)` by `n` units (`delta = n - (b - a)`):
//!
//! ```text
//!  span before [a,b)      -> unchanged
//!  span after  [a,b)      -> both ends shifted by delta
//!  span contains [a,b)    -> end shifted by delta
//!  span overlaps left edge  -> end clipped to a
//!  span overlaps right edge -> start clipped to a + n, end shifted by delta
//!  span inside [a,b)      -> collapsed to a
//! ```
//!
//! A zero-width span sitting exactly on an insertion point is treated as
//! "after" and moves past the inserted text.

use crate::error::{Result, SyncError};
use crate::text::Utf16Text;

/// Half-open range of code-unit offsets with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a span, normalizing so that `start <= end`.
    #[must_use]
    pub const fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Zero-width span at `offset`.
    #[must_use]
    pub const fn caret(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `self` lies within `[0, len]`.
    #[inline]
    #[must_use]
    pub const fn fits(&self, len: usize) -> bool {
        self.end <= len
    }
}

/// The part of a snapshot that selection confirmations report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SelectionState {
    pub selection: Span,
    pub composing: Option<Span>,
}

impl SelectionState {
    #[must_use]
    pub const fn new(selection: Span, composing: Option<Span>) -> Self {
        Self {
            selection,
            composing,
        }
    }

    /// Caret at `offset`, nothing composing.
    #[must_use]
    pub const fn caret(offset: usize) -> Self {
        Self::new(Span::caret(offset), None)
    }
}

/// Apply the shift-or-collapse rule to one span.
///
/// `replaced` is the range being replaced (in pre-edit offsets) and
/// `inserted_len` the length of the replacement text.
#[must_use]
pub fn adjust_span(span: Span, replaced: Span, inserted_len: usize) -> Span {
    let (a, b, n) = (replaced.start, replaced.end, inserted_len);
    let shift = |p: usize| p - (b - a) + n;

    if span.is_empty() {
        let p = span.start;
        let q = if p < a {
            p
        } else if p >= b {
            shift(p)
        } else {
            a
        };
        return Span::caret(q);
    }

    if span.end <= a {
        return span;
    }
    if span.start >= b {
        return Span {
            start: shift(span.start),
            end: shift(span.end),
        };
    }
    if span.start <= a && span.end >= b {
        return Span {
            start: span.start,
            end: shift(span.end),
        };
    }
    if span.start >= a && span.end <= b {
        return Span::caret(a);
    }
    if span.start < a {
        Span {
            start: span.start,
            end: a,
        }
    } else {
        Span {
            start: a + n,
            end: shift(span.end),
        }
    }
}

/// Resolve the protocol's `newCursorPosition` into an absolute offset.
///
/// A positive value counts from one past the end of the inserted text
/// (`1` = right after it); zero and negative values count from its start.
/// The result is clamped to `[0, text_len]`; when the total length is not
/// known only the lower bound applies.
#[must_use]
pub fn resolve_new_cursor_position(
    requested: i32,
    inserted: Span,
    text_len: Option<usize>,
) -> usize {
    let raw = if requested > 0 {
        inserted.end as i64 + i64::from(requested) - 1
    } else {
        inserted.start as i64 + i64::from(requested)
    };
    let upper = text_len.map_or(i64::MAX, |len| len as i64);
    raw.clamp(0, upper) as usize
}

/// A full, self-consistent view of an editor's text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextSnapshot {
    text: Utf16Text,
    state: SelectionState,
}

impl TextSnapshot {
    /// Create a snapshot, validating both spans against the text.
    pub fn new(text: impl Into<Utf16Text>, selection: Span, composing: Option<Span>) -> Result<Self> {
        let text = text.into();
        let len = text.len();
        for span in std::iter::once(selection).chain(composing) {
            if !span.fits(len) {
                return Err(SyncError::InvalidRange {
                    start: span.start,
                    end: span.end,
                    len,
                });
            }
        }
        Ok(Self {
            text,
            state: SelectionState::new(selection, composing),
        })
    }

    /// Text with the caret at the end and nothing composing.
    #[must_use]
    pub fn with_caret_at_end(text: impl Into<Utf16Text>) -> Self {
        let text = text.into();
        let end = text.len();
        Self {
            text,
            state: SelectionState::caret(end),
        }
    }

    #[must_use]
    pub fn text(&self) -> &Utf16Text {
        &self.text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn selection(&self) -> Span {
        self.state.selection
    }

    #[must_use]
    pub fn composing(&self) -> Option<Span> {
        self.state.composing
    }

    #[must_use]
    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Overwrite selection and composing; both must fit the text.
    pub fn set_state(&mut self, state: SelectionState) -> Result<()> {
        let len = self.len();
        for span in std::iter::once(state.selection).chain(state.composing) {
            if !span.fits(len) {
                return Err(SyncError::InvalidRange {
                    start: span.start,
                    end: span.end,
                    len,
                });
            }
        }
        self.state = state;
        Ok(())
    }

    /// Replace `[start, end)` with `new_text`, adjusting both spans.
    pub fn replace_range(&self, start: usize, end: usize, new_text: &Utf16Text) -> Result<TextSnapshot> {
        let len = self.len();
        if start > end || end > len {
            return Err(SyncError::InvalidRange { start, end, len });
        }
        let replaced = Span { start, end };
        let mut text = self.text.clone();
        text.splice(start..end, new_text);
        let n = new_text.len();
        Ok(TextSnapshot {
            text,
            state: SelectionState {
                selection: adjust_span(self.state.selection, replaced, n),
                composing: self.state.composing.map(|c| adjust_span(c, replaced, n)),
            },
        })
    }
}
