#![forbid(unsafe_code)]

//! UTF-16 text storage with surrogate-pair awareness.
//!
//! Every offset in this crate counts UTF-16 code units, because that is the
//! unit the remote editor protocol speaks. A code point outside the BMP takes
//! two units (a high surrogate followed by a low surrogate); nothing in the
//! core is allowed to cut between them unless the configured
//! [`SurrogatePolicy`](crate::config::SurrogatePolicy) says so.

use std::fmt;
use std::ops::Range;

/// Returns `true` for a leading (high) surrogate code unit.
#[inline]
#[must_use]
pub const fn is_high_surrogate(unit: u16) -> bool {
    matches!(unit, 0xD800..=0xDBFF)
}

/// Returns `true` for a trailing (low) surrogate code unit.
#[inline]
#[must_use]
pub const fn is_low_surrogate(unit: u16) -> bool {
    matches!(unit, 0xDC00..=0xDFFF)
}

/// Owned sequence of UTF-16 code units.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Utf16Text {
    units: Vec<u16>,
}

impl Utf16Text {
    /// Create an empty text.
    #[must_use]
    pub const fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Wrap raw code units.
    #[must_use]
    pub fn from_units(units: Vec<u16>) -> Self {
        Self { units }
    }

    /// Length in code units.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Raw code units.
    #[inline]
    #[must_use]
    pub fn units(&self) -> &[u16] {
        &self.units
    }

    /// Code unit at `offset`, if in bounds.
    #[inline]
    #[must_use]
    pub fn unit_at(&self, offset: usize) -> Option<u16> {
        self.units.get(offset).copied()
    }

    /// Copy of the units in `range`, clamped to the text bounds.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Utf16Text {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self::from_units(self.units[start..end].to_vec())
    }

    /// Replace `range` with `replacement` in place.
    ///
    /// # Panics
    ///
    /// Panics if `range` is inverted or exceeds the text length; callers
    /// validate ranges first.
    pub fn splice(&mut self, range: Range<usize>, replacement: &Utf16Text) {
        self.units.splice(range, replacement.units.iter().copied());
    }

    /// Append units at the end.
    pub fn push_text(&mut self, other: &Utf16Text) {
        self.units.extend_from_slice(&other.units);
    }

    /// Whether `offset` falls between the two halves of a surrogate pair.
    #[must_use]
    pub fn splits_pair(&self, offset: usize) -> bool {
        offset > 0
            && offset < self.len()
            && is_high_surrogate(self.units[offset - 1])
            && is_low_surrogate(self.units[offset])
    }

    /// Move a range start left so it does not split a pair.
    #[must_use]
    pub fn snap_start(&self, offset: usize) -> usize {
        if self.splits_pair(offset) {
            offset - 1
        } else {
            offset
        }
    }

    /// Move a range end right so it does not split a pair.
    #[must_use]
    pub fn snap_end(&self, offset: usize) -> usize {
        if self.splits_pair(offset) {
            offset + 1
        } else {
            offset
        }
    }

    /// Drop a dangling surrogate half at either edge.
    ///
    /// Used on read results: the keyboard never receives half a code point.
    #[must_use]
    pub fn trim_broken_edges(&self) -> Utf16Text {
        let mut start = 0;
        let mut end = self.len();
        if end > 0 && is_low_surrogate(self.units[0]) {
            start = 1;
        }
        if end > start && is_high_surrogate(self.units[end - 1]) {
            end -= 1;
        }
        self.slice(start..end)
    }

    /// Convert to a `String`, replacing unpaired surrogates with U+FFFD.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }
}

impl From<&str> for Utf16Text {
    fn from(s: &str) -> Self {
        Self {
            units: s.encode_utf16().collect(),
        }
    }
}

impl From<String> for Utf16Text {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<char> for Utf16Text {
    fn from(c: char) -> Self {
        let mut buf = [0u16; 2];
        Self::from_units(c.encode_utf16(&mut buf).to_vec())
    }
}

impl fmt::Debug for Utf16Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for Utf16Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// Width in code units of the code point that ends at `offset`.
///
/// `unit_at` returns `None` for unknown positions; an unknown neighbour is
/// assumed to be a single unit.
pub(crate) fn code_point_len_before(offset: usize, unit_at: impl Fn(usize) -> Option<u16>) -> usize {
    if offset == 0 {
        return 0;
    }
    let last = unit_at(offset - 1);
    let prev = offset.checked_sub(2).and_then(&unit_at);
    match (prev, last) {
        (Some(hi), Some(lo)) if is_high_surrogate(hi) && is_low_surrogate(lo) => 2,
        _ => 1,
    }
}

/// Width in code units of the code point that starts at `offset`.
pub(crate) fn code_point_len_after(offset: usize, unit_at: impl Fn(usize) -> Option<u16>) -> usize {
    match (unit_at(offset), unit_at(offset + 1)) {
        (Some(hi), Some(lo)) if is_high_surrogate(hi) && is_low_surrogate(lo) => 2,
        _ => 1,
    }
}
