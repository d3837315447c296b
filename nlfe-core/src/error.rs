//! Error types for nlfe operations.

use crate::types::Tag;
use thiserror::Error;

/// Result type alias using nlfe Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or driving a model.
///
/// Build-time variants (`NameConflict`, `NotFound`, `Configuration`, ...)
/// abort only the operation that raised them. `UpdateFailure` is the
/// recoverable solve-time condition: the driver may cut the step and retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A component already occupies this key and clobbering is disabled.
    #[error("{category} with key '{key}' already exists")]
    NameConflict { category: &'static str, key: String },

    /// Lookup miss.
    #[error("{category} with key '{key}' not found")]
    NotFound { category: &'static str, key: String },

    /// Invalid geometry, orientation or option combination.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A global vector does not have one entry per model DOF.
    #[error("vector length mismatch: expected {expected} entries, got {got}")]
    Length { expected: usize, got: usize },

    /// A material, section or transform rejected the trial state.
    #[error("update failed in component {tag}: {reason}")]
    UpdateFailure { tag: Tag, reason: String },

    /// Invalid material properties.
    #[error("invalid material: {0}")]
    InvalidMaterial(String),

    /// Invalid section definition.
    #[error("invalid section: {0}")]
    InvalidSection(String),

    /// The element does not accept this kind of load.
    #[error("{class_name} does not support load {load}")]
    UnsupportedLoad {
        class_name: &'static str,
        load: String,
    },

    /// Committed-state snapshot does not match the receiving component.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an update failure attributed to the component with `tag`.
    pub fn update_failure(tag: Tag, reason: impl Into<String>) -> Self {
        Self::UpdateFailure {
            tag,
            reason: reason.into(),
        }
    }

    /// Create a snapshot error.
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// True for conditions the solver may recover from by cutting the step.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UpdateFailure { .. })
    }
}
