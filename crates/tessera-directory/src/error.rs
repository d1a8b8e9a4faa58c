//! Directory error types.
//!
//! Structural errors are fatal to a synchronization run: a model that fails
//! validation cannot produce trustworthy desired state, so nothing is
//! written downstream.

use thiserror::Error;

use tessera_core::{GroupId, Role};

/// Errors raised while building or traversing the directory model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The model is structurally malformed (unknown parent, duplicate id,
    /// client mismatch along an edge, dangling reference).
    #[error("invalid hierarchy: {message}")]
    InvalidHierarchy { message: String },

    /// A parent link closes a loop in what must be a tree.
    #[error("cycle detected in group tree at {group_id}")]
    CycleDetected { group_id: GroupId },

    /// The configured precedence declares two roles as outranking each
    /// other, directly or transitively.
    #[error("contradictory precedence: '{first}' and '{second}' outrank each other")]
    ContradictoryPrecedence { first: Role, second: Role },
}

impl DirectoryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DirectoryError::InvalidHierarchy {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
