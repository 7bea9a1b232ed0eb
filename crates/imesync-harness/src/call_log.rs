#![forbid(unsafe_code)]

//! Shared record of the calls a [`FakeEditor`](crate::FakeEditor) received.
//!
//! The log is handed to the fake at construction and can be cloned freely;
//! every clone sees the same calls.
//!
//! # JSONL Schema
//!
//! ```json
//! {"call":"commit_text","text":"hello","new_cursor_position":1}
//! {"call":"text_before_cursor","max_len":1024}
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use imesync_core::{KeyAction, KeyCode, KeyEvent};
use serde_json::{Value, json};

/// Prefix of [`CallLog::checksum`] values.
pub const CHECKSUM_PREFIX: &str = "blake3:";

// ============================================================================
// Calls
// ============================================================================

/// One call into the editor, arguments included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    TextBeforeCursor { max_len: usize },
    TextAfterCursor { max_len: usize },
    SelectedText,
    ExtractedText { token: u32, hint_max_chars: usize, monitor: bool },
    SetComposingText { text: String, new_cursor_position: i32 },
    SetComposingRegion { start: usize, end: usize },
    FinishComposingText,
    CommitText { text: String, new_cursor_position: i32 },
    DeleteSurroundingText { before: usize, after: usize },
    SetSelection { start: usize, end: usize },
    BeginBatchEdit,
    EndBatchEdit,
    SendKeyEvent(KeyEvent),
}

impl RecordedCall {
    /// Protocol name of the call.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TextBeforeCursor { .. } => "text_before_cursor",
            Self::TextAfterCursor { .. } => "text_after_cursor",
            Self::SelectedText => "selected_text",
            Self::ExtractedText { .. } => "extracted_text",
            Self::SetComposingText { .. } => "set_composing_text",
            Self::SetComposingRegion { .. } => "set_composing_region",
            Self::FinishComposingText => "finish_composing_text",
            Self::CommitText { .. } => "commit_text",
            Self::DeleteSurroundingText { .. } => "delete_surrounding_text",
            Self::SetSelection { .. } => "set_selection",
            Self::BeginBatchEdit => "begin_batch_edit",
            Self::EndBatchEdit => "end_batch_edit",
            Self::SendKeyEvent(_) => "send_key_event",
        }
    }

    /// Whether the call only reads.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::TextBeforeCursor { .. }
                | Self::TextAfterCursor { .. }
                | Self::SelectedText
                | Self::ExtractedText { .. }
        )
    }

    /// JSON object for one JSONL line.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let call = self.name();
        match self {
            Self::TextBeforeCursor { max_len } | Self::TextAfterCursor { max_len } => {
                json!({ "call": call, "max_len": max_len })
            }
            Self::ExtractedText {
                token,
                hint_max_chars,
                monitor,
            } => json!({
                "call": call,
                "token": token,
                "hint_max_chars": hint_max_chars,
                "monitor": monitor,
            }),
            Self::SetComposingText {
                text,
                new_cursor_position,
            }
            | Self::CommitText {
                text,
                new_cursor_position,
            } => json!({ "call": call, "text": text, "new_cursor_position": new_cursor_position }),
            Self::SetComposingRegion { start, end } | Self::SetSelection { start, end } => {
                json!({ "call": call, "start": start, "end": end })
            }
            Self::DeleteSurroundingText { before, after } => {
                json!({ "call": call, "before": before, "after": after })
            }
            Self::SendKeyEvent(event) => json!({
                "call": call,
                "action": match event.action {
                    KeyAction::Down => "down",
                    KeyAction::Up => "up",
                },
                "code": key_code_name(event.code),
                "modifiers": event.modifiers.bits(),
            }),
            Self::SelectedText | Self::FinishComposingText | Self::BeginBatchEdit | Self::EndBatchEdit => {
                json!({ "call": call })
            }
        }
    }
}

fn key_code_name(code: KeyCode) -> String {
    match code {
        KeyCode::Del => "del".into(),
        KeyCode::ForwardDel => "forward_del".into(),
        KeyCode::DpadLeft => "dpad_left".into(),
        KeyCode::DpadRight => "dpad_right".into(),
        KeyCode::Enter => "enter".into(),
        KeyCode::Char(c) => format!("char:{c}"),
    }
}

// ============================================================================
// Log
// ============================================================================

/// Cloneable handle to a shared call list.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        // A panicking test thread must not hide the calls made before it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, call: RecordedCall) {
        tracing::trace!(call = call.name(), "editor call");
        self.lock().push(call);
    }

    /// Copy of every call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of calls with the given protocol name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.lock().iter().filter(|c| c.name() == name).count()
    }

    /// Number of read calls.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.lock().iter().filter(|c| c.is_read()).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// One JSON object per line, in call order.
    #[must_use]
    pub fn to_json_lines(&self) -> String {
        let mut out = String::new();
        for call in self.lock().iter() {
            out.push_str(&call.to_json().to_string());
            out.push('\n');
        }
        out
    }

    /// `blake3:<hex>` digest of [`Self::to_json_lines`].
    #[must_use]
    pub fn checksum(&self) -> String {
        let hash = blake3::hash(self.to_json_lines().as_bytes());
        format!("{CHECKSUM_PREFIX}{}", hash.to_hex())
    }
}
