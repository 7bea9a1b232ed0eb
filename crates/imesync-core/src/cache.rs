#![forbid(unsafe_code)]

//! Bounded, possibly partial view of the remote text around the cursor.
//!
//! The window holds one contiguous run of code units `[start, end)` in
//! absolute offsets. It is filled by length-limited reads and kept current
//! by splicing in every local edit. Once a confirmation contradicts what the
//! engine expected the window is marked stale: the content is kept as the
//! assumed text but is no longer served to the keyboard.
//!
//! # Replacement policy
//!
//! ```text
//!  window:              [start ........ end)
//!  inside / touching        [a,b)                 -> exact splice
//!  entirely before    [a,b)                       -> shift by delta
//!  entirely after                          [a,b)  -> untouched
//!  straddling an edge    [a ....b)                -> whole window dropped
//! ```

use tracing::trace;

use crate::edit::TextSource;
use crate::span::Span;
use crate::text::Utf16Text;

/// Cached run of remote text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedTextWindow {
    start: usize,
    text: Utf16Text,
    populated: bool,
    reaches_end: bool,
    stale: bool,
}

impl CachedTextWindow {
    /// An empty window that knows nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content with `text` at `start`.
    pub fn fill(&mut self, start: usize, text: Utf16Text, reaches_end: bool) {
        self.start = start;
        self.text = text;
        self.populated = true;
        self.reaches_end = reaches_end;
        self.stale = false;
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Keep the content as assumed text but stop trusting it.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Populated and not stale.
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        self.populated && !self.stale
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    #[must_use]
    pub fn text(&self) -> &Utf16Text {
        &self.text
    }

    /// Whether the window is known to extend to the end of the text.
    #[must_use]
    pub fn reaches_end(&self) -> bool {
        self.reaches_end
    }

    fn holds(&self, offset: usize) -> bool {
        self.is_trusted() && self.start <= offset && offset <= self.end()
    }

    fn rel(&self, range: Span) -> std::ops::Range<usize> {
        (range.start - self.start)..(range.end - self.start)
    }

    /// Whether every unit of `range` that exists is in the window.
    #[must_use]
    pub fn knows(&self, range: Span) -> bool {
        self.is_trusted() && self.start <= range.start && (range.end <= self.end() || self.reaches_end)
    }

    /// Up to `n` units ending at `cursor`, if the window can answer.
    ///
    /// A window starting at offset 0 answers short requests with whatever
    /// precedes the cursor.
    #[must_use]
    pub fn before(&self, cursor: usize, n: usize) -> Option<Utf16Text> {
        if !self.holds(cursor) {
            return None;
        }
        let have = cursor - self.start;
        if have >= n {
            Some(self.text.slice(self.rel(Span::new(cursor - n, cursor))))
        } else if self.start == 0 {
            Some(self.text.slice(self.rel(Span::new(0, cursor))))
        } else {
            None
        }
    }

    /// Up to `n` units starting at `cursor`, if the window can answer.
    #[must_use]
    pub fn after(&self, cursor: usize, n: usize) -> Option<Utf16Text> {
        if !self.holds(cursor) {
            return None;
        }
        let end = self.end();
        if end - cursor >= n {
            Some(self.text.slice(self.rel(Span::new(cursor, cursor + n))))
        } else if self.reaches_end {
            Some(self.text.slice(self.rel(Span::new(cursor, end))))
        } else {
            None
        }
    }

    /// Exact content of `range`, if fully covered.
    #[must_use]
    pub fn range(&self, range: Span) -> Option<Utf16Text> {
        (self.holds(range.start) && range.end <= self.end()).then(|| self.text.slice(self.rel(range)))
    }

    /// Merge a `getTextBeforeCursor` result.
    ///
    /// Fresh units replace whatever the window held before `cursor`; a
    /// trusted window that contains `cursor` keeps its tail.
    pub fn record_before(&mut self, cursor: usize, read: Utf16Text) {
        let Some(new_start) = cursor.checked_sub(read.len()) else {
            // More text before the cursor than the cursor offset allows.
            self.clear();
            return;
        };
        if self.holds(cursor) {
            let mut merged = read;
            merged.push_text(&self.text.slice((cursor - self.start)..self.text.len()));
            let reaches_end = self.reaches_end;
            self.fill(new_start, merged, reaches_end);
        } else {
            self.fill(new_start, read, false);
        }
    }

    /// Merge a `getTextAfterCursor` result; a short read marks the end of text.
    pub fn record_after(&mut self, cursor: usize, read: Utf16Text, requested: usize) {
        let reaches_end = read.len() < requested;
        if self.holds(cursor) {
            let mut merged = self.text.slice(0..(cursor - self.start));
            merged.push_text(&read);
            let start = self.start;
            self.fill(start, merged, reaches_end);
        } else {
            self.fill(cursor, read, reaches_end);
        }
    }

    /// Merge a `getSelectedText` result when the window reaches the selection.
    pub fn record_selected(&mut self, selection: Span, read: Utf16Text) {
        if read.len() != selection.len() || !self.holds(selection.start) {
            return;
        }
        let mut merged = self.text.slice(0..(selection.start - self.start));
        merged.push_text(&read);
        let end = self.end();
        let reaches_end = if selection.end <= end {
            merged.push_text(&self.text.slice((selection.end - self.start)..self.text.len()));
            self.reaches_end
        } else {
            false
        };
        let start = self.start;
        self.fill(start, merged, reaches_end);
    }

    /// Mirror a replacement of `range` by `text` into the window.
    pub fn apply_replacement(&mut self, range: Span, text: &Utf16Text) {
        if !self.populated {
            return;
        }
        let (start, end) = (self.start, self.end());
        if range.start >= start && range.end <= end {
            self.text.splice(self.rel(range), text);
        } else if range.end <= start {
            self.start = start - range.len() + text.len();
        } else if range.start >= end {
            // Beyond the window; nothing cached there.
        } else {
            trace!(
                window_start = start,
                window_end = end,
                edit_start = range.start,
                edit_end = range.end,
                "edit straddles cached window, dropping it"
            );
            self.clear();
        }
    }
}

impl TextSource for CachedTextWindow {
    fn len_hint(&self) -> Option<usize> {
        (self.is_trusted() && self.reaches_end).then(|| self.end())
    }

    fn unit_at(&self, offset: usize) -> Option<u16> {
        if !self.is_trusted() || offset < self.start {
            return None;
        }
        self.text.unit_at(offset - self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: usize, text: &str, reaches_end: bool) -> CachedTextWindow {
        let mut w = CachedTextWindow::new();
        w.fill(start, text.into(), reaches_end);
        w
    }

    #[test]
    fn empty_window_answers_nothing() {
        let w = CachedTextWindow::new();
        assert_eq!(w.before(0, 5), None);
        assert_eq!(w.after(0, 5), None);
        assert_eq!(w.len_hint(), None);
    }

    #[test]
    fn window_at_origin_serves_short_before_reads() {
        let w = window(0, "Hello world!", true);
        assert_eq!(w.before(5, 100).unwrap().to_string_lossy(), "Hello");
        assert_eq!(w.before(12, 6).unwrap().to_string_lossy(), "world!");
        assert_eq!(w.after(6, 100).unwrap().to_string_lossy(), "world!");
        assert_eq!(w.len_hint(), Some(12));
    }

    #[test]
    fn partial_window_misses_beyond_its_edges() {
        let w = window(10, "abcdef", false);
        assert_eq!(w.before(12, 2).unwrap().to_string_lossy(), "ab");
        assert_eq!(w.before(12, 3), None);
        assert_eq!(w.after(14, 3), None);
        assert_eq!(w.after(9, 1), None);
        assert_eq!(w.unit_at(10), Some(u16::from(b'a')));
        assert_eq!(w.unit_at(9), None);
    }

    #[test]
    fn knows_needs_the_whole_range_or_the_end() {
        let w = window(10, "abcdef", false);
        assert!(w.knows(Span::new(10, 12)));
        assert!(w.knows(Span::new(15, 16)));
        assert!(!w.knows(Span::new(9, 11)));
        assert!(!w.knows(Span::new(15, 17)));
        assert!(window(10, "abcdef", true).knows(Span::new(15, 17)));
        assert!(!CachedTextWindow::new().knows(Span::new(0, 1)));
    }

    #[test]
    fn stale_window_is_not_served() {
        let mut w = window(0, "abc", true);
        w.mark_stale();
        assert!(w.is_populated());
        assert_eq!(w.before(3, 1), None);
        assert_eq!(w.unit_at(0), None);
        assert_eq!(w.text().to_string_lossy(), "abc");
    }

    #[test]
    fn replacement_inside_is_spliced() {
        let mut w = window(5, "abcdef", false);
        w.apply_replacement(Span::new(7, 9), &"XYZ".into());
        assert_eq!(w.text().to_string_lossy(), "abXYZef");
        assert_eq!(w.start(), 5);
        // touching the right edge
        w.apply_replacement(Span::caret(12), &"!".into());
        assert_eq!(w.text().to_string_lossy(), "abXYZef!");
    }

    #[test]
    fn replacement_before_shifts_window() {
        let mut w = window(5, "abc", false);
        w.apply_replacement(Span::new(1, 3), &"WXYZ".into());
        assert_eq!(w.start(), 7);
        assert_eq!(w.text().to_string_lossy(), "abc");
    }

    #[test]
    fn replacement_after_is_ignored() {
        let mut w = window(0, "abc", false);
        w.apply_replacement(Span::new(10, 12), &"Q".into());
        assert_eq!(w.text().to_string_lossy(), "abc");
    }

    #[test]
    fn straddling_replacement_drops_window() {
        let mut w = window(5, "abcdef", false);
        w.apply_replacement(Span::new(3, 7), &"".into());
        assert!(!w.is_populated());
        assert_eq!(w.before(5, 1), None);
    }

    #[test]
    fn reads_merge_around_cursor() {
        let mut w = CachedTextWindow::new();
        w.record_before(6, "Lorem ".into());
        assert_eq!(w.start(), 0);
        w.record_after(6, "ipsum".into(), 10);
        assert!(w.reaches_end());
        assert_eq!(w.text().to_string_lossy(), "Lorem ipsum");
        assert_eq!(w.len_hint(), Some(11));

        w.record_selected(Span::new(6, 11), "IPSUM".into());
        assert_eq!(w.text().to_string_lossy(), "Lorem IPSUM");
    }

    #[test]
    fn truncated_before_read_does_not_reach_origin() {
        let mut w = CachedTextWindow::new();
        w.record_before(20, "tail".into());
        assert_eq!(w.start(), 16);
        assert_eq!(w.before(20, 10), None);
    }

    #[test]
    fn before_read_longer_than_cursor_clears() {
        let mut w = window(0, "abc", true);
        w.record_before(2, "abcdef".into());
        assert!(!w.is_populated());
    }

    #[test]
    fn fill_clears_staleness() {
        let mut w = window(0, "abc", true);
        w.mark_stale();
        w.fill(0, "xyz".into(), true);
        assert!(w.is_trusted());
    }
}
