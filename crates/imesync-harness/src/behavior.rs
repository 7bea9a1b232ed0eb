#![forbid(unsafe_code)]

//! How a [`FakeEditor`](crate::FakeEditor) behaves.

use imesync_core::{EditPolicy, EmptyComposingPolicy, RemoteUnavailable, SurrogatePolicy, SyncConfig, UpdateOrder};

use crate::modifier::TextModifier;

/// Shape of monitored extracted-text updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractedMode {
    /// The whole text every time.
    #[default]
    Full,
    /// Only the changed range.
    Partial,
}

/// Editor quirks. The default is a well-behaved editor that matches
/// [`SyncConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorBehavior {
    pub update_order: UpdateOrder,
    pub modifier: TextModifier,
    pub empty_composing: EmptyComposingPolicy,
    pub surrogates: SurrogatePolicy,
    /// `false` makes `set_composing_region` decline.
    pub composing_region_supported: bool,
    /// Cap on code units returned by cursor reads.
    pub read_limit: Option<usize>,
    /// Every read fails this way while set.
    pub read_failure: Option<RemoteUnavailable>,
    pub extracted_mode: ExtractedMode,
}

impl EditorBehavior {
    /// Well-behaved editor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            composing_region_supported: true,
            ..Self::default()
        }
    }

    /// Well-behaved editor agreeing with `config` on every policy both sides
    /// share.
    #[must_use]
    pub fn matching(config: &SyncConfig) -> Self {
        Self {
            update_order: config.update_order,
            empty_composing: config.empty_composing,
            surrogates: config.surrogates,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_modifier(mut self, modifier: TextModifier) -> Self {
        self.modifier = modifier;
        self
    }

    #[must_use]
    pub fn with_update_order(mut self, order: UpdateOrder) -> Self {
        self.update_order = order;
        self
    }

    #[must_use]
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_read_failure(mut self, failure: RemoteUnavailable) -> Self {
        self.read_failure = Some(failure);
        self
    }

    #[must_use]
    pub fn with_extracted_mode(mut self, mode: ExtractedMode) -> Self {
        self.extracted_mode = mode;
        self
    }

    /// Planner policy the editor applies to incoming operations.
    #[must_use]
    pub fn edit_policy(&self) -> EditPolicy {
        EditPolicy {
            empty_composing: self.empty_composing,
            surrogates: self.surrogates,
        }
    }
}
