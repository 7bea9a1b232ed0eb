#![forbid(unsafe_code)]

//! An engine wired to a [`FakeEditor`], plus delivery of queued updates.

use imesync_core::{
    ExtractedText, ExtractedTextRequest, ReconciliationEngine, Result, SelectionUpdate, SyncConfig, SyncError,
    SyncState, TextSnapshot, UpdateFlags,
};
use tracing::trace;

use crate::behavior::EditorBehavior;
use crate::call_log::CallLog;
use crate::fake_editor::{FakeEditor, RemoteUpdate};

/// What [`Session::deliver_next`] handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Selection {
        update: SelectionUpdate,
        flags: UpdateFlags,
    },
    ExtractedText {
        token: u32,
    },
}

/// Keyboard-side engine talking to an in-process editor.
#[derive(Debug)]
pub struct Session {
    engine: ReconciliationEngine<FakeEditor>,
}

fn position(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| SyncError::InvalidArgument {
        op: "reset_state",
        detail: format!("offset {value} exceeds i32"),
    })
}

impl Session {
    /// Build the editor and engine, then reset the engine to the editor's
    /// current selection.
    pub fn new(initial: TextSnapshot, behavior: EditorBehavior, config: SyncConfig, log: CallLog) -> Result<Self> {
        let selection = initial.selection();
        let editor = FakeEditor::new(initial, behavior, log);
        let mut engine = ReconciliationEngine::new(editor, config);
        engine.reset_state(position(selection.start)?, position(selection.end)?)?;
        Ok(Self { engine })
    }

    /// Default configuration against an editor that agrees with it.
    pub fn well_behaved(initial: TextSnapshot) -> Result<Self> {
        let config = SyncConfig::default();
        let behavior = EditorBehavior::matching(&config);
        Self::new(initial, behavior, config, CallLog::new())
    }

    /// Start monitoring extracted text under `token`; the engine fills its
    /// cache from the reply.
    pub fn monitor(&mut self, token: u32) -> Result<Option<ExtractedText>> {
        self.engine.extracted_text(
            ExtractedTextRequest {
                token,
                hint_max_chars: 0,
            },
            true,
        )
    }

    #[must_use]
    pub fn engine(&self) -> &ReconciliationEngine<FakeEditor> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ReconciliationEngine<FakeEditor> {
        &mut self.engine
    }

    #[must_use]
    pub fn editor(&self) -> &FakeEditor {
        self.engine.remote()
    }

    pub fn editor_mut(&mut self) -> &mut FakeEditor {
        self.engine.remote_mut()
    }

    #[must_use]
    pub fn log(&self) -> &CallLog {
        self.editor().log()
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.engine.state()
    }

    /// Whether the engine's selection and composing span equal the editor's.
    #[must_use]
    pub fn agrees(&self) -> bool {
        self.engine.snapshot() == self.editor().state()
    }

    /// Deliver the oldest queued update.
    pub fn deliver_next(&mut self) -> Option<Delivery> {
        let update = self.engine.remote_mut().pop_update()?;
        Some(self.deliver(update))
    }

    /// Deliver `update` directly, bypassing the queue.
    pub fn deliver(&mut self, update: RemoteUpdate) -> Delivery {
        match update {
            RemoteUpdate::Selection(update) => {
                let flags = self.engine.on_selection_updated(update);
                trace!(?flags, "selection update delivered");
                Delivery::Selection { update, flags }
            }
            RemoteUpdate::ExtractedText { token, text } => {
                self.engine.on_extracted_text_updated(token, text);
                Delivery::ExtractedText { token }
            }
        }
    }

    /// Deliver everything queued, in order; returns the flags of each
    /// selection update.
    pub fn pump(&mut self) -> Vec<UpdateFlags> {
        let mut flags = Vec::new();
        while let Some(delivery) = self.deliver_next() {
            if let Delivery::Selection { flags: f, .. } = delivery {
                flags.push(f);
            }
        }
        flags
    }
}
