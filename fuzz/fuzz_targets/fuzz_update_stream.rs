#![no_main]

//! Drive the engine with arbitrary edits and arbitrary confirmations. The
//! only panics the engine documents (batch underflow, unrequested tokens)
//! are kept out of the stream; anything else is a bug.

use arbitrary::Arbitrary;
use imesync_core::{
    ExtractedText, ExtractedTextRequest, KeyCode, KeyEvent, Modifiers, ReconciliationEngine, RemoteEditor,
    RemoteUnavailable, SelectionUpdate, Span, SyncConfig, SyncState,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Step {
    Commit(String, i8),
    Compose(String, i8),
    Region(u8, u8),
    Finish,
    Delete(u8, u8),
    Select(u8, u8),
    Key(u8, bool),
    Begin,
    End,
    Update {
        old: (u8, u8),
        new: (u8, u8),
        composing: Option<(u8, u8)>,
    },
    Extracted {
        text: String,
        start_offset: u8,
        selection: (u8, u8),
    },
    ReadBefore(u8),
    ReadAfter(u8),
    Selected,
}

/// Replies with whatever `text` holds, cut to the request.
#[derive(Default)]
struct Echo {
    text: String,
}

impl RemoteEditor for Echo {
    fn text_before_cursor(&mut self, max_len: usize) -> Result<String, RemoteUnavailable> {
        Ok(self.text.chars().rev().take(max_len).collect::<Vec<_>>().into_iter().rev().collect())
    }

    fn text_after_cursor(&mut self, max_len: usize) -> Result<String, RemoteUnavailable> {
        Ok(self.text.chars().take(max_len).collect())
    }

    fn selected_text(&mut self) -> Result<Option<String>, RemoteUnavailable> {
        Ok(Some(self.text.clone()))
    }

    fn extracted_text(
        &mut self,
        _request: ExtractedTextRequest,
        _monitor: bool,
    ) -> Result<Option<ExtractedText>, RemoteUnavailable> {
        Ok(None)
    }

    fn set_composing_text(&mut self, text: &str, _new_cursor_position: i32) {
        self.text = text.to_owned();
    }

    fn set_composing_region(&mut self, start: usize, end: usize) -> bool {
        start != end
    }

    fn finish_composing_text(&mut self) {}

    fn commit_text(&mut self, text: &str, _new_cursor_position: i32) {
        self.text = text.to_owned();
    }

    fn delete_surrounding_text(&mut self, _before: usize, _after: usize) {}

    fn set_selection(&mut self, _start: usize, _end: usize) {}

    fn begin_batch_edit(&mut self) {}

    fn end_batch_edit(&mut self) {}

    fn send_key_event(&mut self, _event: KeyEvent) {}
}

fn key(code: u8) -> KeyCode {
    match code % 6 {
        0 => KeyCode::Del,
        1 => KeyCode::ForwardDel,
        2 => KeyCode::DpadLeft,
        3 => KeyCode::DpadRight,
        4 => KeyCode::Enter,
        _ => KeyCode::Char(char::from(b'a' + code % 26)),
    }
}

fn span((a, b): (u8, u8)) -> Span {
    Span::new(usize::from(a), usize::from(b))
}

fuzz_target!(|steps: Vec<Step>| {
    const TOKEN: u32 = 7;

    let mut engine = ReconciliationEngine::new(Echo::default(), SyncConfig::default());
    engine.reset_state(0, 0).expect("valid selection");
    let _ = engine.extracted_text(
        ExtractedTextRequest {
            token: TOKEN,
            hint_max_chars: 0,
        },
        true,
    );

    for step in steps {
        match step {
            Step::Commit(text, pos) => drop(engine.commit_text(&text, i32::from(pos))),
            Step::Compose(text, pos) => drop(engine.set_composing_text(&text, i32::from(pos))),
            Step::Region(a, b) => drop(engine.set_composing_region(i32::from(a), i32::from(b))),
            Step::Finish => drop(engine.finish_composing_text()),
            Step::Delete(before, after) => drop(engine.delete_surrounding_text(i32::from(before), i32::from(after))),
            Step::Select(a, b) => drop(engine.set_selection(i32::from(a), i32::from(b))),
            Step::Key(code, shift) => {
                let modifiers = if shift { Modifiers::SHIFT } else { Modifiers::NONE };
                drop(engine.send_key_event(KeyEvent::down(key(code)).with_modifiers(modifiers)));
            }
            Step::Begin => engine.begin_batch_edit(),
            Step::End => {
                if engine.batch_depth() > 0 {
                    engine.end_batch_edit();
                }
            }
            Step::Update { old, new, composing } => {
                let update = SelectionUpdate::new(span(old), span(new), composing.map(span));
                engine.on_selection_updated(update);
            }
            Step::Extracted {
                text,
                start_offset,
                selection,
            } => {
                let selection = span(selection);
                let extracted = ExtractedText {
                    text,
                    start_offset: usize::from(start_offset),
                    selection_start: selection.start,
                    selection_end: selection.end,
                    partial: None,
                };
                engine.on_extracted_text_updated(TOKEN, extracted);
            }
            Step::ReadBefore(n) => drop(engine.text_before_cursor(i32::from(n))),
            Step::ReadAfter(n) => drop(engine.text_after_cursor(i32::from(n))),
            Step::Selected => drop(engine.selected_text()),
        }
        assert_ne!(engine.state(), SyncState::Uninitialized);
    }
});
