//! Tree operations
//!
//! Pure functions over [`CatalogTree`]. Each takes a snapshot by reference
//! and returns a new one; the input is never touched. Sibling sets are kept
//! sorted by name on insert and reparent, while renames leave positions
//! alone until the next structural change.

use crate::error::TreeError;
use crate::model::{CatalogTree, DirectoryNode, LayerRef, NodeRef};
use im::Vector;
use sl_remote::{CascadePolicy, DirectoryId, DirectoryRecord, LayerId, LayerRecord};
use std::collections::{BTreeSet, VecDeque};

/// Insert a new directory under `parent` (home when `None`)
///
/// # Errors
/// - [`TreeError::DuplicateId`] if `id` already exists
/// - [`TreeError::NotFound`] if `parent` does not exist
pub fn insert(
    tree: &CatalogTree,
    id: DirectoryId,
    name: impl Into<String>,
    parent: Option<DirectoryId>,
) -> Result<CatalogTree, TreeError> {
    require_parent(tree, parent)?;
    let mut next = tree.clone();
    next.attach_directory(DirectoryNode::new(id, name, parent))?;
    Ok(next)
}

/// Remove a directory together with every directory and layer below it
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn remove(tree: &CatalogTree, id: DirectoryId) -> Result<CatalogTree, TreeError> {
    remove_cascade(tree, id, CascadePolicy::DeleteContents)
}

/// Remove a directory and its sub-directories, handling contained layers per `policy`
///
/// With [`CascadePolicy::DetachLayers`] the layers of the removed subtree
/// move to home instead of being deleted.
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn remove_cascade(
    tree: &CatalogTree,
    id: DirectoryId,
    policy: CascadePolicy,
) -> Result<CatalogTree, TreeError> {
    let descendants = find_descendants(tree, id)?;

    let mut next = tree.clone();
    next.unlink(NodeRef::Directory(id));
    next.directories.remove(&id);

    let mut detached = Vec::new();
    for node in descendants {
        match node {
            NodeRef::Directory(dir) => {
                next.directories.remove(&dir);
            }
            NodeRef::Layer(layer) => match policy {
                CascadePolicy::DeleteContents => {
                    next.layers.remove(&layer);
                }
                CascadePolicy::DetachLayers => detached.push(layer),
            },
        }
    }

    if !detached.is_empty() {
        let mut home = next.root_layers.clone();
        for layer in detached {
            if let Some(entry) = next.layers.get_mut(&layer) {
                entry.directory = None;
                home.push_back(layer);
            }
        }
        next.set_layer_slot(None, home);
    }

    Ok(next)
}

/// Rename a directory in place
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn rename(
    tree: &CatalogTree,
    id: DirectoryId,
    name: impl Into<String>,
) -> Result<CatalogTree, TreeError> {
    let mut next = tree.clone();
    let node = next
        .directories
        .get_mut(&id)
        .ok_or(TreeError::NotFound(NodeRef::Directory(id)))?;
    node.name = name.into();
    Ok(next)
}

/// Move a directory (with its whole subtree) or a single layer under `new_parent`
///
/// No validation beyond existence: callers run
/// [`MoveValidator`](crate::MoveValidator) first.
///
/// # Errors
/// [`TreeError::NotFound`] if `node` or `new_parent` does not exist
pub fn reparent(
    tree: &CatalogTree,
    node: NodeRef,
    new_parent: Option<DirectoryId>,
) -> Result<CatalogTree, TreeError> {
    if !tree.contains(node) {
        return Err(TreeError::NotFound(node));
    }
    require_parent(tree, new_parent)?;

    let mut next = tree.clone();
    next.unlink(node);
    match node {
        NodeRef::Directory(id) => {
            if let Some(dir) = next.directories.get_mut(&id) {
                dir.parent = new_parent;
            }
            let mut siblings = next.directory_slot(new_parent).cloned().unwrap_or_default();
            siblings.push_back(id);
            next.set_directory_slot(new_parent, siblings);
        }
        NodeRef::Layer(id) => {
            if let Some(layer) = next.layers.get_mut(&id) {
                layer.directory = new_parent;
            }
            let mut siblings = next.layer_slot(new_parent).cloned().unwrap_or_default();
            siblings.push_back(id);
            next.set_layer_slot(new_parent, siblings);
        }
    }
    Ok(next)
}

/// Every directory and layer strictly below `id`
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn find_descendants(
    tree: &CatalogTree,
    id: DirectoryId,
) -> Result<BTreeSet<NodeRef>, TreeError> {
    if tree.directory(id).is_none() {
        return Err(TreeError::NotFound(NodeRef::Directory(id)));
    }

    let mut found = BTreeSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        let Some(node) = tree.directory(current) else {
            continue;
        };
        found.extend(node.layers().map(NodeRef::Layer));
        for child in node.child_directories() {
            if found.insert(NodeRef::Directory(child)) {
                stack.push(child);
            }
        }
    }
    Ok(found)
}

/// Insert a layer into `directory` (home when `None`)
///
/// # Errors
/// - [`TreeError::DuplicateId`] if `id` already exists
/// - [`TreeError::NotFound`] if `directory` does not exist
pub fn insert_layer(
    tree: &CatalogTree,
    id: LayerId,
    name: impl Into<String>,
    directory: Option<DirectoryId>,
) -> Result<CatalogTree, TreeError> {
    require_parent(tree, directory)?;
    let mut next = tree.clone();
    next.attach_layer(LayerRef {
        id,
        name: name.into(),
        directory,
    })?;
    Ok(next)
}

/// Remove a single layer
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn remove_layer(tree: &CatalogTree, id: LayerId) -> Result<CatalogTree, TreeError> {
    if tree.layer(id).is_none() {
        return Err(TreeError::NotFound(NodeRef::Layer(id)));
    }
    let mut next = tree.clone();
    next.unlink(NodeRef::Layer(id));
    next.layers.remove(&id);
    Ok(next)
}

/// Rename a layer in place
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn rename_layer(
    tree: &CatalogTree,
    id: LayerId,
    name: impl Into<String>,
) -> Result<CatalogTree, TreeError> {
    let mut next = tree.clone();
    let layer = next
        .layers
        .get_mut(&id)
        .ok_or(TreeError::NotFound(NodeRef::Layer(id)))?;
    layer.name = name.into();
    Ok(next)
}

/// Swap a directory's identifier, e.g. provisional for canonical
///
/// Children and layers are re-pointed at the new id.
///
/// # Errors
/// - [`TreeError::NotFound`] if `from` does not exist
/// - [`TreeError::DuplicateId`] if `to` already exists
pub fn rekey_directory(
    tree: &CatalogTree,
    from: DirectoryId,
    to: DirectoryId,
) -> Result<CatalogTree, TreeError> {
    if from == to {
        return if tree.directory(from).is_some() {
            Ok(tree.clone())
        } else {
            Err(TreeError::NotFound(NodeRef::Directory(from)))
        };
    }
    if tree.directory(to).is_some() {
        return Err(TreeError::DuplicateId(NodeRef::Directory(to)));
    }

    let mut next = tree.clone();
    let mut node = next
        .directories
        .remove(&from)
        .ok_or(TreeError::NotFound(NodeRef::Directory(from)))?;
    node.id = to;

    for child in node.child_directories() {
        if let Some(dir) = next.directories.get_mut(&child) {
            dir.parent = Some(to);
        }
    }
    for layer in node.layers() {
        if let Some(entry) = next.layers.get_mut(&layer) {
            entry.directory = Some(to);
        }
    }

    let parent = node.parent;
    next.directories.insert(to, node);

    let siblings: Vector<DirectoryId> = next
        .directory_slot(parent)
        .map(|ids| ids.iter().map(|id| if *id == from { to } else { *id }).collect())
        .unwrap_or_default();
    next.set_directory_slot(parent, siblings);
    Ok(next)
}

/// A detached copy of a directory subtree, enough to put it back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    directories: Vec<DirectoryRecord>,
    layers: Vec<LayerRecord>,
}

impl Subtree {
    /// Subtree holding a single empty directory
    #[must_use]
    pub fn leaf(record: DirectoryRecord) -> Self {
        Self {
            directories: vec![record],
            layers: Vec::new(),
        }
    }

    /// Top directory of the subtree
    #[must_use]
    pub fn root(&self) -> DirectoryId {
        self.directories[0].id
    }

    /// Directories, parents before children
    #[must_use]
    pub fn directories(&self) -> &[DirectoryRecord] {
        &self.directories
    }

    /// Layers with their original owning directory
    #[must_use]
    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    /// Every node in the subtree, including the root
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.directories
            .iter()
            .map(|d| NodeRef::Directory(d.id))
            .chain(self.layers.iter().map(|l| NodeRef::Layer(l.id)))
            .collect()
    }

    /// Copy keeping only the layers `keep` accepts
    #[must_use]
    pub fn retain_layers(&self, keep: impl Fn(LayerId) -> bool) -> Self {
        Self {
            directories: self.directories.clone(),
            layers: self.layers.iter().filter(|l| keep(l.id)).cloned().collect(),
        }
    }
}

/// Capture the subtree rooted at `id`
///
/// # Errors
/// [`TreeError::NotFound`] if `id` does not exist
pub fn subtree(tree: &CatalogTree, id: DirectoryId) -> Result<Subtree, TreeError> {
    let root = tree
        .directory(id)
        .ok_or(TreeError::NotFound(NodeRef::Directory(id)))?;

    let mut directories = Vec::new();
    let mut layers = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        directories.push(node.to_record());
        layers.extend(
            node.layers()
                .filter_map(|layer| tree.layer(layer))
                .map(LayerRef::to_record),
        );
        queue.extend(node.child_directories().filter_map(|child| tree.directory(child)));
    }

    Ok(Subtree {
        directories,
        layers,
    })
}

/// Put a captured subtree back
///
/// Layers that still exist elsewhere (detached by the removal) are moved
/// back into their original directory.
///
/// # Errors
/// - [`TreeError::NotFound`] if the subtree's parent no longer exists
/// - [`TreeError::DuplicateId`] if a directory of the subtree is present
pub fn restore(tree: &CatalogTree, subtree: &Subtree) -> Result<CatalogTree, TreeError> {
    let mut next = tree.clone();
    for record in &subtree.directories {
        next = insert(&next, record.id, record.name.clone(), record.parent)?;
    }
    for record in &subtree.layers {
        next = if next.layer(record.id).is_some() {
            reparent(&next, NodeRef::Layer(record.id), record.directory)?
        } else {
            insert_layer(&next, record.id, record.name.clone(), record.directory)?
        };
    }
    Ok(next)
}

fn require_parent(tree: &CatalogTree, parent: Option<DirectoryId>) -> Result<(), TreeError> {
    match parent {
        Some(parent) if tree.directory(parent).is_none() => {
            Err(TreeError::NotFound(NodeRef::Directory(parent)))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(id: u64) -> DirectoryId {
        DirectoryId::new(id)
    }

    fn l(id: u64) -> LayerId {
        LayerId::new(id)
    }

    fn names(tree: &CatalogTree, parent: Option<DirectoryId>) -> Vec<String> {
        tree.subdirectories(parent)
            .iter()
            .map(|n| n.name().to_string())
            .collect()
    }

    /// home
    /// ├── 1 parcels
    /// │   ├── 2 north
    /// │   │   └── layer 20 wells
    /// │   └── layer 10 lots
    /// └── 3 roads
    fn sample() -> CatalogTree {
        let tree = CatalogTree::new();
        let tree = insert(&tree, d(1), "parcels", None).unwrap();
        let tree = insert(&tree, d(2), "north", Some(d(1))).unwrap();
        let tree = insert(&tree, d(3), "roads", None).unwrap();
        let tree = insert_layer(&tree, l(10), "lots", Some(d(1))).unwrap();
        insert_layer(&tree, l(20), "wells", Some(d(2))).unwrap()
    }

    #[test]
    fn insert_sorts_siblings() {
        let tree = sample();
        let tree = insert(&tree, d(4), "alpha", None).unwrap();
        assert_eq!(names(&tree, None), vec!["alpha", "parcels", "roads"]);
    }

    #[test]
    fn insert_breaks_name_ties_by_id() {
        let tree = insert(&CatalogTree::new(), d(9), "same", None).unwrap();
        let tree = insert(&tree, d(2), "same", None).unwrap();
        let ids: Vec<_> = tree.subdirectories(None).iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![d(2), d(9)]);
    }

    #[test]
    fn insert_rejects_duplicates_and_missing_parents() {
        let tree = sample();
        assert_eq!(
            insert(&tree, d(1), "again", None).unwrap_err(),
            TreeError::DuplicateId(NodeRef::Directory(d(1)))
        );
        assert_eq!(
            insert(&tree, d(7), "orphan", Some(d(99))).unwrap_err(),
            TreeError::NotFound(NodeRef::Directory(d(99)))
        );
    }

    #[test]
    fn insert_leaves_input_untouched() {
        let tree = sample();
        let _ = insert(&tree, d(4), "alpha", None).unwrap();
        assert!(tree.directory(d(4)).is_none());
    }

    #[test]
    fn remove_cascades_to_descendants() {
        let tree = remove(&sample(), d(1)).unwrap();
        assert!(tree.directory(d(1)).is_none());
        assert!(tree.directory(d(2)).is_none());
        assert!(tree.layer(l(10)).is_none());
        assert!(tree.layer(l(20)).is_none());
        assert_eq!(names(&tree, None), vec!["roads"]);
    }

    #[test]
    fn remove_with_detach_moves_layers_home() {
        let tree = remove_cascade(&sample(), d(1), CascadePolicy::DetachLayers).unwrap();
        assert!(tree.directory(d(2)).is_none());
        let home: Vec<_> = tree.home_layers().iter().map(|l| l.id()).collect();
        assert_eq!(home, vec![l(10), l(20)]);
        assert_eq!(tree.layer(l(20)).unwrap().directory(), None);
    }

    #[test]
    fn rename_keeps_position() {
        let tree = rename(&sample(), d(1), "zzz").unwrap();
        assert_eq!(names(&tree, None), vec!["zzz", "roads"]);
    }

    #[test]
    fn reparent_moves_subtree() {
        let tree = reparent(&sample(), NodeRef::Directory(d(1)), Some(d(3))).unwrap();
        assert_eq!(tree.directory(d(1)).unwrap().parent(), Some(d(3)));
        assert_eq!(tree.ancestors(d(2)), vec![d(1), d(3)]);
        assert_eq!(names(&tree, None), vec!["roads"]);
        assert_eq!(tree.layer(l(20)).unwrap().directory(), Some(d(2)));
    }

    #[test]
    fn reparent_layer_to_home() {
        let tree = reparent(&sample(), NodeRef::Layer(l(10)), None).unwrap();
        assert_eq!(tree.home_layers().len(), 1);
        assert!(tree.layers_in(Some(d(1))).is_empty());
    }

    #[test]
    fn reparent_unknown_is_not_found() {
        assert_eq!(
            reparent(&sample(), NodeRef::Layer(l(77)), None).unwrap_err(),
            TreeError::NotFound(NodeRef::Layer(l(77)))
        );
    }

    #[test]
    fn descendants_are_strictly_below() {
        let found = find_descendants(&sample(), d(1)).unwrap();
        let expected: BTreeSet<_> = [
            NodeRef::Directory(d(2)),
            NodeRef::Layer(l(10)),
            NodeRef::Layer(l(20)),
        ]
        .into_iter()
        .collect();
        assert_eq!(found, expected);
        assert!(find_descendants(&sample(), d(3)).unwrap().is_empty());
    }

    #[test]
    fn rekey_repoints_children() {
        let tree = rekey_directory(&sample(), d(1), d(100)).unwrap();
        assert!(tree.directory(d(1)).is_none());
        assert_eq!(tree.directory(d(2)).unwrap().parent(), Some(d(100)));
        assert_eq!(tree.layer(l(10)).unwrap().directory(), Some(d(100)));
        assert_eq!(names(&tree, None), vec!["parcels", "roads"]);
    }

    #[test]
    fn subtree_restore_round_trips() {
        let original = sample();
        let captured = subtree(&original, d(1)).unwrap();
        assert_eq!(captured.root(), d(1));
        assert_eq!(captured.nodes().len(), 4);

        for policy in [CascadePolicy::DeleteContents, CascadePolicy::DetachLayers] {
            let removed = remove_cascade(&original, d(1), policy).unwrap();
            let restored = restore(&removed, &captured).unwrap();
            assert_eq!(restored.flatten(), original.flatten());
        }
    }
}
