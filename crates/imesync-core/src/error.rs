#![forbid(unsafe_code)]

//! Error model for the reconciliation core.
//!
//! # Propagation
//!
//! 1. **Validation fails fast**: malformed operation inputs surface as
//!    [`SyncError::InvalidArgument`] / [`SyncError::InvalidRange`] before any
//!    state is touched.
//! 2. **Contract violations are fatal**: [`SyncError::ProtocolState`] marks a
//!    caller bug (batch underflow, unknown request token). The engine panics on
//!    the ones that cannot be reported through a return value.
//! 3. **Remote trouble degrades**: [`RemoteUnavailable`] is what an adapter
//!    read returns on timeout or connection loss. The engine absorbs it and
//!    hands the keyboard an empty result.
//!
//! Desync is not an error at all; it is a state (see
//! [`SyncState::Desynced`](crate::engine::SyncState::Desynced)).

use std::fmt;

/// Errors surfaced synchronously by the span model and the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// An operation received malformed input (negative length, inverted
    /// range, position past the known end of text).
    InvalidArgument {
        /// Operation name, e.g. `"set_selection"`.
        op: &'static str,
        /// Human-readable description of the bad input.
        detail: String,
    },
    /// A range does not fit the text it is applied to.
    InvalidRange { start: usize, end: usize, len: usize },
    /// The caller broke the protocol contract.
    ProtocolState(String),
}

impl SyncError {
    pub(crate) fn invalid_argument(op: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            detail: detail.into(),
        }
    }

    /// Whether this error indicates a programming error rather than bad input.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProtocolState(_))
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { op, detail } => write!(f, "{op}: invalid argument: {detail}"),
            Self::InvalidRange { start, end, len } => {
                write!(f, "invalid range {start}..{end} for text of length {len}")
            }
            Self::ProtocolState(msg) => write!(f, "protocol violation: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Standard result type for reconciliation APIs.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Why a blocking read from the remote editor produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteUnavailable {
    /// The read took longer than the configured timeout.
    TimedOut,
    /// The connection to the editor is gone.
    ConnectionLost,
}

impl fmt::Display for RemoteUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => f.write_str("remote read timed out"),
            Self::ConnectionLost => f.write_str("remote connection lost"),
        }
    }
}

impl std::error::Error for RemoteUnavailable {}
