//! Move validation
//!
//! A directory may not become its own parent, nor move under anything in
//! its own subtree. Layers have no subtree, so any layer move passes, and
//! so does any move to home.

use crate::model::{CatalogTree, NodeRef};
use crate::tree;
use sl_remote::DirectoryId;

/// Why a move was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    /// Target is the moving directory itself
    #[error("{0} cannot be moved into itself")]
    SelfParent(DirectoryId),

    /// Target lies inside the moving directory's subtree
    #[error("{moving} cannot be moved into its descendant {target}")]
    IntoOwnDescendant {
        /// Directory being moved
        moving: DirectoryId,
        /// Requested new parent
        target: DirectoryId,
    },
}

/// Stateless reparent check
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveValidator;

impl MoveValidator {
    /// Check that moving `moving` under `target` keeps the forest acyclic
    ///
    /// # Errors
    /// [`MoveRejection`] describing the violated rule
    pub fn check(
        tree: &CatalogTree,
        moving: NodeRef,
        target: Option<DirectoryId>,
    ) -> Result<(), MoveRejection> {
        let (NodeRef::Directory(moving), Some(target)) = (moving, target) else {
            return Ok(());
        };
        if moving == target {
            return Err(MoveRejection::SelfParent(moving));
        }
        let below = tree::find_descendants(tree, moving).unwrap_or_default();
        if below.contains(&NodeRef::Directory(target)) {
            return Err(MoveRejection::IntoOwnDescendant { moving, target });
        }
        Ok(())
    }
}
