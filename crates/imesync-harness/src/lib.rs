#![forbid(unsafe_code)]

//! Test harness for `imesync-core`.
//!
//! - [`FakeEditor`]: an in-process [`RemoteEditor`](imesync_core::RemoteEditor)
//!   that owns the authoritative text and queues the confirmations a real
//!   editor would send.
//! - [`EditorBehavior`] / [`TextModifier`]: knobs that make the fake
//!   misbehave the ways real editors do.
//! - [`CallLog`]: every call the core issued, shareable and checksummed.
//! - [`Session`]: an engine wired to a fake, with helpers to deliver the
//!   queued confirmations.

pub mod behavior;
pub mod call_log;
pub mod fake_editor;
pub mod modifier;
pub mod session;

pub use behavior::{EditorBehavior, ExtractedMode};
pub use call_log::{CallLog, RecordedCall};
pub use fake_editor::{FakeEditor, RemoteUpdate};
pub use modifier::{TextModifier, TransformText};
pub use session::{Delivery, Session};
