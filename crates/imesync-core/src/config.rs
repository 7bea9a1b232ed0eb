#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! Every behaviour the platform documentation leaves open is a named field
//! here, passed at construction. There is no global state and no builder with
//! hidden defaults; `SyncConfig::default()` is the documented default.
//!
//! # Loading
//!
//! With the `config-file` feature:
//!
//! ```toml
//! empty_composing = "keep"
//! update_order = "extracted_text_first"
//! read_timeout_ms = 150
//! ```
//!
//! ```rust,ignore
//! let config = SyncConfig::from_toml_str(src)?;
//! ```

#[cfg(feature = "config-file")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

/// What to do with a composing span that becomes zero-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "snake_case"))]
pub enum EmptyComposingPolicy {
    /// Drop it: an empty composing span means "not composing".
    #[default]
    Collapse,
    /// Keep it as a zero-width composing region.
    Keep,
}

/// Order of the two notifications delivered when a change settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "snake_case"))]
pub enum UpdateOrder {
    #[default]
    SelectionFirst,
    ExtractedTextFirst,
}

/// How range operations treat surrogate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(rename_all = "snake_case"))]
pub enum SurrogatePolicy {
    /// Widen ranges so a pair is always taken or left whole.
    #[default]
    KeepPairs,
    /// Plain code-unit arithmetic, pairs may be split.
    CodeUnits,
}

/// Configuration for [`ReconciliationEngine`](crate::engine::ReconciliationEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct SyncConfig {
    pub empty_composing: EmptyComposingPolicy,
    pub update_order: UpdateOrder,
    pub surrogates: SurrogatePolicy,
    /// Reads slower than this are treated as unavailable.
    #[cfg_attr(feature = "config-file", serde(rename = "read_timeout_ms", with = "duration_ms"))]
    pub read_timeout: Duration,
    /// Code units requested on each side of the cursor on a cache miss.
    pub cache_window: usize,
    /// Consumed confirmations remembered for duplicate detection.
    pub confirmation_history: usize,
    /// Entries retained by the status log.
    pub status_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            empty_composing: EmptyComposingPolicy::Collapse,
            update_order: UpdateOrder::SelectionFirst,
            surrogates: SurrogatePolicy::KeepPairs,
            read_timeout: Duration::from_millis(200),
            cache_window: 1024,
            confirmation_history: 16,
            status_capacity: 128,
        }
    }
}

impl SyncConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.checked()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.checked()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters.
    ///
    /// An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.read_timeout.is_zero() {
            errors.push("read_timeout must be > 0".into());
        }
        if self.cache_window == 0 {
            errors.push("cache_window must be > 0".into());
        }
        if self.status_capacity == 0 {
            errors.push("status_capacity must be > 0".into());
        }
        errors
    }

    #[cfg(feature = "config-file")]
    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading a [`SyncConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config-file")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config-file")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config-file")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config-file")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => write!(f, "validation errors: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config-file")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config-file")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(feature = "config-file")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
