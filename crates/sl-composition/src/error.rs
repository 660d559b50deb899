//! Error types for map composition

use sl_remote::{ProjectLayerId, RemoteError, StyleError};

/// Map composition error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositionError {
    /// Entry is not part of the current project
    #[error("{0} not found")]
    NotFound(ProjectLayerId),

    /// Style was applied to a basemap entry
    #[error("{0} is a basemap and cannot be styled")]
    NotStylable(ProjectLayerId),

    /// Style values out of range
    #[error("invalid style: {0}")]
    InvalidStyle(#[from] StyleError),

    /// Remote call failed; optimistic changes were reverted
    #[error("remote failure: {0}")]
    RemoteFailure(#[from] RemoteError),

    /// Malformed input (no project loaded, pending entry, bad extent)
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// Result arrived after its scope was cancelled and was not applied
    #[error("operation cancelled; reload to resynchronise")]
    Cancelled,

    /// Composition was disposed
    #[error("map composition disposed")]
    Disposed,
}

impl CompositionError {
    /// Whether the failure was detected before any remote call
    #[inline]
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        !matches!(self, Self::RemoteFailure(_) | Self::Cancelled)
    }

    /// Check if retrying the same call could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteFailure(e) if e.is_retryable())
    }
}
