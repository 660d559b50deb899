//! Reversible catalog mutations
//!
//! Every optimistic store operation is expressed as a [`CatalogCommand`].
//! The store applies it locally before calling the remote and keeps its
//! [`inverse`](CatalogCommand::inverse) to roll back if the remote refuses.

use crate::error::TreeError;
use crate::model::{CatalogTree, NodeRef};
use crate::tree::{self, Subtree};
use sl_remote::{CascadePolicy, DirectoryId, DirectoryRecord, LayerId, LayerRecord};

/// A single reversible change to a [`CatalogTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCommand {
    /// Add an empty directory
    InsertDirectory(DirectoryRecord),
    /// Remove a directory subtree
    RemoveSubtree {
        /// Captured contents, used by the inverse
        subtree: Subtree,
        /// What happens to contained layers
        policy: CascadePolicy,
    },
    /// Put a removed subtree back
    RestoreSubtree {
        /// Contents to reinsert
        subtree: Subtree,
        /// Policy the removal used
        policy: CascadePolicy,
    },
    /// Rename a directory
    RenameDirectory {
        /// Target directory
        id: DirectoryId,
        /// Name before
        from: String,
        /// Name after
        to: String,
    },
    /// Reparent a directory
    MoveDirectory {
        /// Target directory
        id: DirectoryId,
        /// Parent before
        from: Option<DirectoryId>,
        /// Parent after
        to: Option<DirectoryId>,
    },
    /// Rename a layer
    RenameLayer {
        /// Target layer
        id: LayerId,
        /// Name before
        from: String,
        /// Name after
        to: String,
    },
    /// Refile a layer
    MoveLayer {
        /// Target layer
        id: LayerId,
        /// Directory before
        from: Option<DirectoryId>,
        /// Directory after
        to: Option<DirectoryId>,
    },
    /// Delete a layer
    RemoveLayer(LayerRecord),
    /// Reinsert a deleted layer
    RestoreLayer(LayerRecord),
}

impl CatalogCommand {
    /// Apply to a snapshot, producing the next one
    ///
    /// # Errors
    /// Whatever the underlying tree operation reports
    pub fn apply(&self, tree: &CatalogTree) -> Result<CatalogTree, TreeError> {
        match self {
            Self::InsertDirectory(record) => {
                tree::insert(tree, record.id, record.name.clone(), record.parent)
            }
            Self::RemoveSubtree { subtree, policy } => {
                tree::remove_cascade(tree, subtree.root(), *policy)
            }
            Self::RestoreSubtree { subtree, .. } => tree::restore(tree, subtree),
            Self::RenameDirectory { id, to, .. } => tree::rename(tree, *id, to.clone()),
            Self::MoveDirectory { id, to, .. } => {
                tree::reparent(tree, NodeRef::Directory(*id), *to)
            }
            Self::RenameLayer { id, to, .. } => tree::rename_layer(tree, *id, to.clone()),
            Self::MoveLayer { id, to, .. } => tree::reparent(tree, NodeRef::Layer(*id), *to),
            Self::RemoveLayer(record) => tree::remove_layer(tree, record.id),
            Self::RestoreLayer(record) => {
                tree::insert_layer(tree, record.id, record.name.clone(), record.directory)
            }
        }
    }

    /// The command that undoes this one
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::InsertDirectory(record) => Self::RemoveSubtree {
                subtree: Subtree::leaf(record.clone()),
                policy: CascadePolicy::DeleteContents,
            },
            Self::RemoveSubtree { subtree, policy } => Self::RestoreSubtree {
                subtree: subtree.clone(),
                policy: *policy,
            },
            Self::RestoreSubtree { subtree, policy } => Self::RemoveSubtree {
                subtree: subtree.clone(),
                policy: *policy,
            },
            Self::RenameDirectory { id, from, to } => Self::RenameDirectory {
                id: *id,
                from: to.clone(),
                to: from.clone(),
            },
            Self::MoveDirectory { id, from, to } => Self::MoveDirectory {
                id: *id,
                from: *to,
                to: *from,
            },
            Self::RenameLayer { id, from, to } => Self::RenameLayer {
                id: *id,
                from: to.clone(),
                to: from.clone(),
            },
            Self::MoveLayer { id, from, to } => Self::MoveLayer {
                id: *id,
                from: *to,
                to: *from,
            },
            Self::RemoveLayer(record) => Self::RestoreLayer(record.clone()),
            Self::RestoreLayer(record) => Self::RemoveLayer(record.clone()),
        }
    }

    /// Node the command is about
    #[must_use]
    pub fn target(&self) -> NodeRef {
        match self {
            Self::InsertDirectory(record) => NodeRef::Directory(record.id),
            Self::RemoveSubtree { subtree, .. } | Self::RestoreSubtree { subtree, .. } => {
                NodeRef::Directory(subtree.root())
            }
            Self::RenameDirectory { id, .. } | Self::MoveDirectory { id, .. } => {
                NodeRef::Directory(*id)
            }
            Self::RenameLayer { id, .. } | Self::MoveLayer { id, .. } => NodeRef::Layer(*id),
            Self::RemoveLayer(record) | Self::RestoreLayer(record) => NodeRef::Layer(record.id),
        }
    }

    /// Every node whose local state the command changes
    #[must_use]
    pub fn affected(&self) -> Vec<NodeRef> {
        match self {
            Self::RemoveSubtree { subtree, .. } | Self::RestoreSubtree { subtree, .. } => {
                subtree.nodes()
            }
            other => vec![other.target()],
        }
    }

    /// Same command, leaving alone the layers `keep` rejects
    ///
    /// Only a subtree restore touches layers besides its target: detached
    /// layers stay reachable after the removal and may have moved on since.
    #[must_use]
    pub fn retain_layers(&self, keep: impl Fn(LayerId) -> bool) -> Self {
        match self {
            Self::RestoreSubtree { subtree, policy } => Self::RestoreSubtree {
                subtree: subtree.retain_layers(keep),
                policy: *policy,
            },
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CatalogTree {
        let t = CatalogTree::new();
        let t = tree::insert(&t, DirectoryId::new(1), "maps", None).unwrap();
        let t = tree::insert(&t, DirectoryId::new(2), "archive", None).unwrap();
        let t = tree::insert(&t, DirectoryId::new(3), "old", Some(DirectoryId::new(1))).unwrap();
        tree::insert_layer(&t, LayerId::new(7), "rivers", Some(DirectoryId::new(3))).unwrap()
    }

    fn round_trip(command: &CatalogCommand, tree: &CatalogTree) {
        let forward = command.apply(tree).unwrap();
        let back = command.inverse().apply(&forward).unwrap();
        assert_eq!(back.flatten(), tree.flatten());
    }

    #[test]
    fn every_command_is_undone_by_its_inverse() {
        let tree = sample();
        let subtree = tree::subtree(&tree, DirectoryId::new(1)).unwrap();
        let commands = vec![
            CatalogCommand::InsertDirectory(DirectoryRecord::new(
                DirectoryId::provisional(1),
                "new",
                Some(DirectoryId::new(2)),
            )),
            CatalogCommand::RemoveSubtree {
                subtree: subtree.clone(),
                policy: CascadePolicy::DeleteContents,
            },
            CatalogCommand::RemoveSubtree {
                subtree,
                policy: CascadePolicy::DetachLayers,
            },
            CatalogCommand::RenameDirectory {
                id: DirectoryId::new(1),
                from: "maps".into(),
                to: "zones".into(),
            },
            CatalogCommand::MoveDirectory {
                id: DirectoryId::new(3),
                from: Some(DirectoryId::new(1)),
                to: Some(DirectoryId::new(2)),
            },
            CatalogCommand::RenameLayer {
                id: LayerId::new(7),
                from: "rivers".into(),
                to: "lakes".into(),
            },
            CatalogCommand::MoveLayer {
                id: LayerId::new(7),
                from: Some(DirectoryId::new(3)),
                to: None,
            },
            CatalogCommand::RemoveLayer(LayerRecord::new(
                LayerId::new(7),
                "rivers",
                Some(DirectoryId::new(3)),
            )),
        ];
        for command in &commands {
            round_trip(command, &tree);
        }
    }

    #[test]
    fn restore_can_leave_a_layer_where_it_is() {
        let tree = sample();
        let removal = CatalogCommand::RemoveSubtree {
            subtree: tree::subtree(&tree, DirectoryId::new(1)).unwrap(),
            policy: CascadePolicy::DetachLayers,
        };
        let removed = removal.apply(&tree).unwrap();
        let moved = tree::reparent(&removed, NodeRef::Layer(LayerId::new(7)), Some(DirectoryId::new(2))).unwrap();

        let undo = removal.inverse().retain_layers(|layer| layer != LayerId::new(7));
        let restored = undo.apply(&moved).unwrap();

        assert!(restored.directory(DirectoryId::new(3)).is_some());
        assert_eq!(restored.layer(LayerId::new(7)).unwrap().directory(), Some(DirectoryId::new(2)));
        assert!(!undo.affected().contains(&NodeRef::Layer(LayerId::new(7))));
    }

    #[test]
    fn subtree_commands_affect_every_node() {
        let tree = sample();
        let command = CatalogCommand::RemoveSubtree {
            subtree: tree::subtree(&tree, DirectoryId::new(1)).unwrap(),
            policy: CascadePolicy::DeleteContents,
        };
        assert_eq!(command.target(), NodeRef::Directory(DirectoryId::new(1)));
        assert_eq!(command.affected().len(), 3);
    }
}
