//! Catalog node model
//!
//! Directories and layers live in flat persistent maps keyed by id, with
//! parent pointers and ordered child-id sequences forming the hierarchy.
//! Cloning a [`CatalogTree`] is O(1) (`im` structural sharing), so every
//! operation in [`crate::tree`] can return a fresh snapshot.
//!
//! Nodes compare and hash by identifier only.

use crate::error::TreeError;
use im::{HashMap, Vector};
use sl_remote::{DirectoryId, DirectoryRecord, LayerId, LayerRecord};
use std::cmp::Ordering;
use std::collections::{HashMap as StdHashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Reference to either kind of catalog node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeRef {
    /// A directory
    Directory(DirectoryId),
    /// A layer
    Layer(LayerId),
}

impl NodeRef {
    /// Whether the referenced id is provisional
    #[must_use]
    pub fn is_provisional(self) -> bool {
        match self {
            Self::Directory(id) => id.is_provisional(),
            Self::Layer(id) => id.is_provisional(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(id) => id.fmt(f),
            Self::Layer(id) => id.fmt(f),
        }
    }
}

impl From<DirectoryId> for NodeRef {
    fn from(id: DirectoryId) -> Self {
        Self::Directory(id)
    }
}

impl From<LayerId> for NodeRef {
    fn from(id: LayerId) -> Self {
        Self::Layer(id)
    }
}

/// A named container in the catalog
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub(crate) id: DirectoryId,
    pub(crate) name: String,
    pub(crate) parent: Option<DirectoryId>,
    pub(crate) child_directories: Vector<DirectoryId>,
    pub(crate) layers: Vector<LayerId>,
}

impl DirectoryNode {
    pub(crate) fn new(id: DirectoryId, name: impl Into<String>, parent: Option<DirectoryId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
            child_directories: Vector::new(),
            layers: Vector::new(),
        }
    }

    /// Identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> DirectoryId {
        self.id
    }

    /// Display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent directory, `None` under home
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<DirectoryId> {
        self.parent
    }

    /// Sub-directory ids in display order
    pub fn child_directories(&self) -> impl Iterator<Item = DirectoryId> + '_ {
        self.child_directories.iter().copied()
    }

    /// Layer ids in display order
    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.iter().copied()
    }

    /// Flat record
    #[must_use]
    pub fn to_record(&self) -> DirectoryRecord {
        DirectoryRecord::new(self.id, self.name.clone(), self.parent)
    }
}

impl PartialEq for DirectoryNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DirectoryNode {}

impl Hash for DirectoryNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A named reference to an uploaded dataset
#[derive(Debug, Clone)]
pub struct LayerRef {
    pub(crate) id: LayerId,
    pub(crate) name: String,
    pub(crate) directory: Option<DirectoryId>,
}

impl LayerRef {
    /// Identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning directory, `None` when ungrouped
    #[inline]
    #[must_use]
    pub fn directory(&self) -> Option<DirectoryId> {
        self.directory
    }

    /// Flat record
    #[must_use]
    pub fn to_record(&self) -> LayerRecord {
        LayerRecord::new(self.id, self.name.clone(), self.directory)
    }
}

impl From<LayerRecord> for LayerRef {
    fn from(record: LayerRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            directory: record.directory,
        }
    }
}

impl PartialEq for LayerRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LayerRef {}

impl Hash for LayerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Snapshot of the whole catalog
///
/// The virtual home root is implicit: `root_directories` / `root_layers`
/// hold the entries whose parent is `None`.
#[derive(Debug, Clone, Default)]
pub struct CatalogTree {
    pub(crate) directories: HashMap<DirectoryId, DirectoryNode>,
    pub(crate) layers: HashMap<LayerId, LayerRef>,
    pub(crate) root_directories: Vector<DirectoryId>,
    pub(crate) root_layers: Vector<LayerId>,
}

impl CatalogTree {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from flat records
    ///
    /// Sibling sets come out sorted by name regardless of record order.
    ///
    /// # Errors
    /// - [`TreeError::DuplicateId`] if an id appears twice
    /// - [`TreeError::DanglingParent`] if a record names a missing parent
    /// - [`TreeError::Cycle`] if parent pointers loop
    pub fn from_records(
        directories: impl IntoIterator<Item = DirectoryRecord>,
        layers: impl IntoIterator<Item = LayerRecord>,
    ) -> Result<Self, TreeError> {
        let directories: Vec<DirectoryRecord> = directories.into_iter().collect();

        let mut known = HashSet::with_capacity(directories.len());
        for record in &directories {
            if !known.insert(record.id) {
                return Err(TreeError::DuplicateId(NodeRef::Directory(record.id)));
            }
        }

        let mut by_parent: StdHashMap<Option<DirectoryId>, Vec<&DirectoryRecord>> =
            StdHashMap::new();
        for record in &directories {
            if let Some(parent) = record.parent {
                if !known.contains(&parent) {
                    return Err(TreeError::DanglingParent {
                        node: NodeRef::Directory(record.id),
                        parent,
                    });
                }
            }
            by_parent.entry(record.parent).or_default().push(record);
        }

        // Breadth-first from home; anything left unattached sits on a loop.
        let mut tree = Self::new();
        let mut queue = VecDeque::from([None]);
        while let Some(parent) = queue.pop_front() {
            for record in by_parent.remove(&parent).unwrap_or_default() {
                tree.attach_directory(DirectoryNode::new(record.id, record.name.clone(), parent))?;
                queue.push_back(Some(record.id));
            }
        }
        if let Some(record) = by_parent.values().flatten().next() {
            return Err(TreeError::Cycle(record.id));
        }

        for record in layers {
            tree.attach_layer(LayerRef::from(record))?;
        }

        Ok(tree)
    }

    /// Directory by id
    #[inline]
    #[must_use]
    pub fn directory(&self, id: DirectoryId) -> Option<&DirectoryNode> {
        self.directories.get(&id)
    }

    /// Layer by id
    #[inline]
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&LayerRef> {
        self.layers.get(&id)
    }

    /// Whether a node exists
    #[must_use]
    pub fn contains(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Directory(id) => self.directories.contains_key(&id),
            NodeRef::Layer(id) => self.layers.contains_key(&id),
        }
    }

    /// Parent of a node: `None` if the node is unknown, `Some(None)` under home
    #[must_use]
    pub fn parent_of(&self, node: NodeRef) -> Option<Option<DirectoryId>> {
        match node {
            NodeRef::Directory(id) => self.directories.get(&id).map(|d| d.parent),
            NodeRef::Layer(id) => self.layers.get(&id).map(|l| l.directory),
        }
    }

    /// Sub-directories of `parent` (home when `None`) in display order
    #[must_use]
    pub fn subdirectories(&self, parent: Option<DirectoryId>) -> Vec<&DirectoryNode> {
        self.directory_slot(parent)
            .map(|ids| ids.iter().filter_map(|id| self.directories.get(id)).collect())
            .unwrap_or_default()
    }

    /// Layers of `parent` (home when `None`) in display order
    #[must_use]
    pub fn layers_in(&self, parent: Option<DirectoryId>) -> Vec<&LayerRef> {
        self.layer_slot(parent)
            .map(|ids| ids.iter().filter_map(|id| self.layers.get(id)).collect())
            .unwrap_or_default()
    }

    /// Ungrouped layers (the "home" list)
    #[must_use]
    pub fn home_layers(&self) -> Vec<&LayerRef> {
        self.layers_in(None)
    }

    /// Number of directories
    #[inline]
    #[must_use]
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Number of layers
    #[inline]
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Whether the catalog holds nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.layers.is_empty()
    }

    /// Ancestors of a directory, nearest first
    #[must_use]
    pub fn ancestors(&self, id: DirectoryId) -> Vec<DirectoryId> {
        let mut out = Vec::new();
        let mut cursor = self.directories.get(&id).and_then(|d| d.parent);
        while let Some(parent) = cursor {
            // Guards against a corrupted snapshot looping forever
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            cursor = self.directories.get(&parent).and_then(|d| d.parent);
        }
        out
    }

    /// Flatten to records, parents before children
    ///
    /// Feeding the output back into [`from_records`](Self::from_records)
    /// yields an equivalent tree.
    #[must_use]
    pub fn flatten(&self) -> (Vec<DirectoryRecord>, Vec<LayerRecord>) {
        let mut directories = Vec::with_capacity(self.directories.len());
        let mut layers = Vec::with_capacity(self.layers.len());

        let mut queue: VecDeque<Option<DirectoryId>> = VecDeque::from([None]);
        while let Some(parent) = queue.pop_front() {
            for node in self.subdirectories(parent) {
                directories.push(node.to_record());
                queue.push_back(Some(node.id));
            }
            layers.extend(self.layers_in(parent).into_iter().map(LayerRef::to_record));
        }

        (directories, layers)
    }

    // -- Internal mutation helpers (callers work on a private clone) --

    pub(crate) fn directory_slot(&self, parent: Option<DirectoryId>) -> Option<&Vector<DirectoryId>> {
        match parent {
            None => Some(&self.root_directories),
            Some(id) => self.directories.get(&id).map(|d| &d.child_directories),
        }
    }

    pub(crate) fn layer_slot(&self, parent: Option<DirectoryId>) -> Option<&Vector<LayerId>> {
        match parent {
            None => Some(&self.root_layers),
            Some(id) => self.directories.get(&id).map(|d| &d.layers),
        }
    }

    fn directory_slot_mut(&mut self, parent: Option<DirectoryId>) -> Option<&mut Vector<DirectoryId>> {
        match parent {
            None => Some(&mut self.root_directories),
            Some(id) => self.directories.get_mut(&id).map(|d| &mut d.child_directories),
        }
    }

    fn layer_slot_mut(&mut self, parent: Option<DirectoryId>) -> Option<&mut Vector<LayerId>> {
        match parent {
            None => Some(&mut self.root_layers),
            Some(id) => self.directories.get_mut(&id).map(|d| &mut d.layers),
        }
    }

    /// Insert a directory under its `parent` and re-sort the siblings
    pub(crate) fn attach_directory(&mut self, node: DirectoryNode) -> Result<(), TreeError> {
        let id = node.id;
        if self.directories.contains_key(&id) {
            return Err(TreeError::DuplicateId(NodeRef::Directory(id)));
        }
        let parent = node.parent;
        self.check_parent(NodeRef::Directory(id), parent)?;
        let mut siblings = self.directory_slot(parent).cloned().unwrap_or_default();
        siblings.push_back(id);

        self.directories.insert(id, node);
        self.set_directory_slot(parent, siblings);
        Ok(())
    }

    /// Insert a layer under its directory and re-sort the siblings
    pub(crate) fn attach_layer(&mut self, layer: LayerRef) -> Result<(), TreeError> {
        let id = layer.id;
        if self.layers.contains_key(&id) {
            return Err(TreeError::DuplicateId(NodeRef::Layer(id)));
        }
        let parent = layer.directory;
        self.check_parent(NodeRef::Layer(id), parent)?;
        let mut siblings = self.layer_slot(parent).cloned().unwrap_or_default();
        siblings.push_back(id);

        self.layers.insert(id, layer);
        self.set_layer_slot(parent, siblings);
        Ok(())
    }

    pub(crate) fn check_parent(
        &self,
        node: NodeRef,
        parent: Option<DirectoryId>,
    ) -> Result<(), TreeError> {
        match parent {
            Some(parent) if !self.directories.contains_key(&parent) => {
                Err(TreeError::DanglingParent { node, parent })
            }
            _ => Ok(()),
        }
    }

    /// Unlink a node from its parent's child list (records stay in the maps)
    pub(crate) fn unlink(&mut self, node: NodeRef) {
        match node {
            NodeRef::Directory(id) => {
                let parent = self.directories.get(&id).and_then(|d| d.parent);
                if let Some(slot) = self.directory_slot_mut(parent) {
                    *slot = slot.iter().copied().filter(|c| *c != id).collect();
                }
            }
            NodeRef::Layer(id) => {
                let parent = self.layers.get(&id).and_then(|l| l.directory);
                if let Some(slot) = self.layer_slot_mut(parent) {
                    *slot = slot.iter().copied().filter(|c| *c != id).collect();
                }
            }
        }
    }

    /// Replace a directory child list, sorted by name
    pub(crate) fn set_directory_slot(&mut self, parent: Option<DirectoryId>, ids: Vector<DirectoryId>) {
        let mut sorted: Vec<DirectoryId> = ids.into_iter().collect();
        sorted.sort_by(|a, b| {
            let name = |id: &DirectoryId| self.directories.get(id).map(|d| d.name.as_str());
            compare_slot_names(name(a), name(b)).then(a.cmp(b))
        });
        if let Some(slot) = self.directory_slot_mut(parent) {
            *slot = sorted.into_iter().collect();
        }
    }

    /// Replace a layer child list, sorted by name
    pub(crate) fn set_layer_slot(&mut self, parent: Option<DirectoryId>, ids: Vector<LayerId>) {
        let mut sorted: Vec<LayerId> = ids.into_iter().collect();
        sorted.sort_by(|a, b| {
            let name = |id: &LayerId| self.layers.get(id).map(|l| l.name.as_str());
            compare_slot_names(name(a), name(b)).then(a.cmp(b))
        });
        if let Some(slot) = self.layer_slot_mut(parent) {
            *slot = sorted.into_iter().collect();
        }
    }

    /// Re-sort the sub-directories of `parent`
    pub(crate) fn resort_directories(&mut self, parent: Option<DirectoryId>) {
        if let Some(ids) = self.directory_slot(parent).cloned() {
            self.set_directory_slot(parent, ids);
        }
    }

    /// Re-sort the layers of `parent`
    pub(crate) fn resort_layers(&mut self, parent: Option<DirectoryId>) {
        if let Some(ids) = self.layer_slot(parent).cloned() {
            self.set_layer_slot(parent, ids);
        }
    }
}

/// Sibling name order
///
/// Collates the way a root-locale collator does at tertiary strength:
/// letters compare ignoring case and accents first, then accents, then
/// lowercase before uppercase. Names that still tie fall back to code
/// point order, so distinct names never compare equal.
#[must_use]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented_letters(a).cmp(accented_letters(b)))
        .then_with(|| letter_case(a).cmp(letter_case(b)))
        .then_with(|| a.cmp(b))
}

fn base_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn accented_letters(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd().flat_map(char::to_lowercase)
}

fn letter_case(s: &str) -> impl Iterator<Item = bool> + '_ {
    s.nfd().map(char::is_uppercase)
}

fn compare_slot_names(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_names(a, b),
        _ => a.is_some().cmp(&b.is_some()),
    }
}

/// Whether a run of sibling names is in display order
#[must_use]
pub fn is_sorted_by_name<'a>(names: impl IntoIterator<Item = &'a str>) -> bool {
    let names: Vec<&str> = names.into_iter().collect();
    names.windows(2).all(|w| compare_names(w[0], w[1]) != Ordering::Greater)
}
