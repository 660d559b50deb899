//! Error types for the catalog
//!
//! - [`TreeError`]: structural failures of the pure tree operations
//! - [`CatalogError`]: what store callers see (not found, invalid move,
//!   remote failure, validation failure)

use crate::model::NodeRef;
use crate::validator::MoveRejection;
use sl_remote::{DirectoryId, RemoteError};

/// Structural tree errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Referenced node is not in the tree
    #[error("{0} not found")]
    NotFound(NodeRef),

    /// Identifier already present
    #[error("duplicate identifier {0}")]
    DuplicateId(NodeRef),

    /// Node refers to a parent directory that does not exist
    #[error("{node} refers to missing parent {parent}")]
    DanglingParent {
        /// Orphaned node
        node: NodeRef,
        /// Missing parent
        parent: DirectoryId,
    },

    /// Records describe a parent chain that loops
    #[error("parent chain of {0} forms a cycle")]
    Cycle(DirectoryId),
}

/// Catalog store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Operation referenced a stale or unknown identifier
    #[error("{0} not found")]
    NotFound(NodeRef),

    /// Move validator rejected a reparent
    #[error("invalid move: {0}")]
    InvalidMove(#[from] MoveRejection),

    /// Remote call failed; the optimistic change was reverted
    #[error("remote failure: {0}")]
    RemoteFailure(#[from] RemoteError),

    /// Malformed input (empty name, pending target, inconsistent records)
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// Result arrived after its scope was cancelled and was not applied
    #[error("operation cancelled; refresh to resynchronise")]
    Cancelled,

    /// Store was disposed
    #[error("catalog store disposed")]
    Disposed,
}

impl CatalogError {
    /// Whether the failure was detected before any remote call
    #[inline]
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidMove(_) | Self::ValidationFailure(_) | Self::Disposed
        )
    }

    /// Check if retrying the same call could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteFailure(e) if e.is_retryable())
    }
}

impl From<TreeError> for CatalogError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound(node) => Self::NotFound(node),
            other => Self::ValidationFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_remote::LayerId;

    #[test]
    fn tree_not_found_maps_to_not_found() {
        let err: CatalogError = TreeError::NotFound(NodeRef::Layer(LayerId::new(3))).into();
        assert_eq!(err, CatalogError::NotFound(NodeRef::Layer(LayerId::new(3))));
    }

    #[test]
    fn structural_errors_map_to_validation() {
        let err: CatalogError = TreeError::Cycle(DirectoryId::new(1)).into();
        assert!(matches!(err, CatalogError::ValidationFailure(_)));
        assert!(err.is_synchronous());
    }

    #[test]
    fn remote_failures_are_async_and_maybe_retryable() {
        let err = CatalogError::from(RemoteError::Timeout);
        assert!(!err.is_synchronous());
        assert!(err.is_retryable());
    }
}
