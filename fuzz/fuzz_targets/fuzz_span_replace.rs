#![no_main]

use imesync_core::{Span, TextSnapshot, Utf16Text, adjust_span};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Layout: 6 offset bytes, then little-endian code units (lone surrogates
    // included).
    if data.len() < 6 {
        return;
    }
    let units: Vec<u16> = data[6..]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text = Utf16Text::from_units(units);
    let len = text.len();
    let at = |b: u8| usize::from(b) % (len + 1);

    let selection = Span::new(at(data[0]), at(data[1]));
    let replaced = Span::new(at(data[2]), at(data[3]));
    let inserted = Utf16Text::from_units(vec![u16::from(data[4]); usize::from(data[5] % 8)]);

    let snapshot = TextSnapshot::new(text, selection, None).expect("in-bounds selection rejected");
    let out = snapshot
        .replace_range(replaced.start, replaced.end, &inserted)
        .expect("in-bounds replacement rejected");

    let new_len = len - replaced.len() + inserted.len();
    assert_eq!(out.len(), new_len);
    assert_eq!(out.selection(), adjust_span(selection, replaced, inserted.len()));
    assert!(out.selection().fits(new_len));

    // Out-of-bounds replacements are errors, never panics.
    assert!(snapshot.replace_range(0, len + 1, &inserted).is_err());
});
