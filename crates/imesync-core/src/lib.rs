#![forbid(unsafe_code)]

//! Keyboard-side reconciliation of remotely owned text-editing state.
//!
//! # Role
//! An on-screen keyboard edits text that lives in another process. Every
//! write is fire-and-forget, every read is a potentially slow round trip,
//! and the editor confirms changes asynchronously, sometimes merged,
//! repeated, or interleaved with changes nobody on this side asked for.
//! `imesync-core` keeps a locally consistent view of that state.
//!
//! # Primary responsibilities
//! - **Span model** ([`span`], [`text`]): UTF-16 text with selection and
//!   composing spans, and the shift-or-collapse rule every edit goes through.
//! - **Edit planning** ([`edit`]): the effect of each protocol operation,
//!   shared by the engine and by editor doubles.
//! - **Reconciliation** ([`engine`]): optimistic local edits, pending-edit
//!   bookkeeping ([`pending`]), a partial text cache ([`cache`]), and a
//!   derived [`SyncState`].
//! - **Classification** ([`classifier`]): deciding whether a confirmation
//!   was expected, a duplicate, or an external change.
//! - **Batching** ([`batch`]): one consolidated change per outermost batch.
//!
//! # Boundary
//! The editor side is the [`RemoteEditor`] trait; confirmations flow back
//! through [`ReconciliationEngine::on_selection_updated`] and
//! [`ReconciliationEngine::on_extracted_text_updated`]. The library installs
//! no tracing subscriber.

pub mod batch;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod edit;
pub mod engine;
pub mod error;
pub mod event;
pub mod pending;
pub mod remote;
pub mod span;
pub mod status;
pub mod text;

pub use batch::{BatchCoordinator, BatchSummary, Notification, Notifications};
pub use cache::CachedTextWindow;
pub use classifier::{Classification, UpdateFlags, Verdict, classify};
pub use config::{ConfigError, EmptyComposingPolicy, SurrogatePolicy, SyncConfig, UpdateOrder};
pub use edit::{EditOp, EditPolicy, PlannedEdit, Replacement, TextSource, plan, surrogate_context};
pub use engine::{ReconciliationEngine, SyncState};
pub use error::{RemoteUnavailable, Result, SyncError};
pub use event::{KeyAction, KeyCode, KeyEvent, Modifiers};
pub use pending::{PendingEditRecord, PendingEdits};
pub use remote::{ExtractedText, ExtractedTextRequest, RemoteEditor, SelectionUpdate};
pub use span::{SelectionState, Span, TextSnapshot, adjust_span, resolve_new_cursor_position};
pub use status::{EngineStats, StatusEntry, StatusLog};
pub use text::Utf16Text;
