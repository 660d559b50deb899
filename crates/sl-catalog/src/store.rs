//! Catalog store
//!
//! Owns the current [`CatalogTree`] snapshot and runs every catalog
//! mutation against a [`CatalogRemote`].
//!
//! # Mutation protocol
//! 1. Validate synchronously (names, existence, [`MoveValidator`],
//!    provisional targets). Failures never reach the remote.
//! 2. Apply a [`CatalogCommand`] locally, stamp the affected nodes with a
//!    fresh revision and publish [`CatalogEvent::Changed`].
//! 3. Call the remote. The state lock is not held across the await.
//! 4. Settle: a cancelled scope drops the result entirely; otherwise the
//!    outcome is applied only if the node's revision is still the one
//!    stamped in step 2 (reconcile on success, inverse command on failure).
//!    A rollback also skips every other affected node stamped since.

use crate::command::CatalogCommand;
use crate::error::{CatalogError, TreeError};
use crate::events::CatalogEvent;
use crate::model::{CatalogTree, LayerRef, NodeRef};
use crate::tree;
use crate::validator::MoveValidator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sl_remote::{
    CancelScope, CancelToken, CascadePolicy, CatalogRemote, DirectoryId, DirectoryRecord,
    DirectoryUpdate, LayerId, LayerRecord, LayerUpdate, NewDirectory, RemoteResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Store tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogOptions {
    /// What deleting a directory does to the layers inside it
    pub cascade: CascadePolicy,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl CatalogOptions {
    /// Default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cascade policy
    #[inline]
    #[must_use]
    pub fn with_cascade(mut self, cascade: CascadePolicy) -> Self {
        self.cascade = cascade;
        self
    }

    /// Set event channel capacity
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            cascade: CascadePolicy::DeleteContents,
            event_capacity: 64,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    tree: CatalogTree,
    revisions: HashMap<NodeRef, u64>,
    next_revision: u64,
    disposed: bool,
}

impl State {
    fn stamp(&mut self, nodes: &[NodeRef]) -> u64 {
        self.next_revision += 1;
        for node in nodes {
            self.revisions.insert(*node, self.next_revision);
        }
        self.next_revision
    }

    fn is_current(&self, node: NodeRef, revision: u64) -> bool {
        self.revisions.get(&node) == Some(&revision)
    }
}

/// An applied local change awaiting the remote's verdict
#[derive(Debug)]
struct Ticket {
    node: NodeRef,
    revision: u64,
    token: CancelToken,
    undo: CatalogCommand,
}

/// Client-side mirror of the user's directory/layer catalog
#[derive(Debug)]
pub struct CatalogStore<R> {
    remote: R,
    options: CatalogOptions,
    state: Mutex<State>,
    scope: Mutex<CancelScope>,
    events: broadcast::Sender<CatalogEvent>,
    provisional: AtomicU64,
}

impl<R: CatalogRemote> CatalogStore<R> {
    /// Empty store over `remote`; call [`load`](Self::load) to populate it
    #[must_use]
    pub fn new(remote: R) -> Self {
        Self::with_options(remote, CatalogOptions::default())
    }

    /// Empty store with explicit options
    #[must_use]
    pub fn with_options(remote: R, options: CatalogOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            remote,
            options,
            state: Mutex::new(State::default()),
            scope: Mutex::new(CancelScope::new()),
            events,
            provisional: AtomicU64::new(1),
        }
    }

    /// Remote collaborator
    #[inline]
    #[must_use]
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Options in effect
    #[inline]
    #[must_use]
    pub fn options(&self) -> CatalogOptions {
        self.options
    }

    // ------------------------------------------------------------------
    // Lifecycle and observation
    // ------------------------------------------------------------------

    /// Replace the local tree with the remote listing
    ///
    /// Every in-flight mutation becomes stale: its eventual response is
    /// dropped instead of being applied on top of the fresh tree.
    ///
    /// # Errors
    /// - [`CatalogError::RemoteFailure`] if either listing fails
    /// - [`CatalogError::ValidationFailure`] if the records do not form a forest
    /// - [`CatalogError::Cancelled`] if the scope was cancelled meanwhile
    pub async fn load(&self) -> Result<(), CatalogError> {
        self.ensure_live()?;
        let token = self.token();
        tracing::info!("Loading catalog");

        let (directories, layers) = futures::try_join!(
            self.remote.list_directories(),
            self.remote.list_layers()
        )?;
        if token.is_cancelled() {
            tracing::debug!("Catalog listing arrived after cancellation; dropped");
            return Err(CatalogError::Cancelled);
        }

        let tree = CatalogTree::from_records(directories, layers.into_all())?;
        let event = CatalogEvent::Loaded {
            directories: tree.directory_count(),
            layers: tree.layer_count(),
        };
        {
            let mut state = self.state.lock();
            state.tree = tree;
            state.revisions.clear();
        }
        tracing::info!("Catalog loaded: {:?}", event);
        self.emit(event);
        Ok(())
    }

    /// Reload from the remote, e.g. after cancelled or stale operations
    ///
    /// # Errors
    /// Same as [`load`](Self::load)
    pub async fn refresh(&self) -> Result<(), CatalogError> {
        self.load().await
    }

    /// Current snapshot (cheap clone)
    #[must_use]
    pub fn snapshot(&self) -> CatalogTree {
        self.state.lock().tree.clone()
    }

    /// Ungrouped layers, derived from the same snapshot as the tree
    #[must_use]
    pub fn home_layers(&self) -> Vec<LayerRecord> {
        self.state
            .lock()
            .tree
            .home_layers()
            .into_iter()
            .map(LayerRef::to_record)
            .collect()
    }

    /// Receive every subsequent [`CatalogEvent`]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    /// Drop the results of every mutation issued so far
    ///
    /// Local optimistic changes stay as they are; call
    /// [`refresh`](Self::refresh) to resynchronise.
    pub fn cancel_pending(&self) {
        let old = std::mem::replace(&mut *self.scope.lock(), CancelScope::new());
        old.cancel();
        tracing::debug!("Cancelled pending catalog operations");
    }

    /// Cancel everything and refuse further operations
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
        }
        self.scope.lock().cancel();
        tracing::info!("Catalog store disposed");
        self.emit(CatalogEvent::Disposed);
    }

    /// Whether [`dispose`](Self::dispose) was called
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Mirror a layer that appeared remotely (for example after an upload)
    ///
    /// An already known layer is updated in place.
    ///
    /// # Errors
    /// - [`CatalogError::NotFound`] if the layer's directory is unknown
    /// - [`CatalogError::ValidationFailure`] for provisional ids
    pub fn adopt_layer(&self, record: LayerRecord) -> Result<(), CatalogError> {
        reject_provisional(NodeRef::Layer(record.id))?;
        let node = NodeRef::Layer(record.id);
        {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(CatalogError::Disposed);
            }
            state.tree = reconcile_layer(&state.tree, &record)?.0;
            state.stamp(&[node]);
        }
        tracing::debug!("Adopted {}", node);
        self.emit(CatalogEvent::Changed(node));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Directory operations
    // ------------------------------------------------------------------

    /// Create a directory under `parent` (home when `None`)
    ///
    /// The directory appears at once under a provisional id, which is
    /// swapped for the server's id when the remote answers. Returns the
    /// canonical id.
    ///
    /// # Errors
    /// - [`CatalogError::ValidationFailure`] for an empty name or provisional parent
    /// - [`CatalogError::NotFound`] for an unknown parent
    /// - [`CatalogError::RemoteFailure`] after rolling back
    /// - [`CatalogError::Cancelled`] after discarding the pending directory
    pub async fn create_directory(
        &self,
        name: &str,
        parent: Option<DirectoryId>,
    ) -> Result<DirectoryId, CatalogError> {
        validate_name(name)?;
        if let Some(parent) = parent {
            reject_provisional(NodeRef::Directory(parent))?;
        }
        let provisional = DirectoryId::provisional(self.provisional.fetch_add(1, Ordering::Relaxed));
        let ticket = self.begin(|_| {
            Ok(CatalogCommand::InsertDirectory(DirectoryRecord::new(
                provisional,
                name,
                parent,
            )))
        })?;
        tracing::info!("Creating directory {:?} under {:?}", name, parent);

        let request = NewDirectory {
            name: name.to_owned(),
            parent,
        };
        let result = self.remote.create_directory(&request).await;
        let settled = self.settle(ticket, result, |tree, record| {
            let tree = tree::rekey_directory(tree, provisional, record.id)?;
            reconcile_directory(&tree, record)
        });
        match settled {
            Ok(record) => Ok(record.id),
            Err(CatalogError::Cancelled) => {
                self.discard_provisional(provisional);
                Err(CatalogError::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    /// Rename a directory
    ///
    /// # Errors
    /// - [`CatalogError::ValidationFailure`] for an empty name or provisional id
    /// - [`CatalogError::NotFound`] for an unknown directory
    /// - [`CatalogError::RemoteFailure`] after rolling back
    pub async fn rename_directory(&self, id: DirectoryId, name: &str) -> Result<(), CatalogError> {
        validate_name(name)?;
        reject_provisional(NodeRef::Directory(id))?;

        let mut parent = None;
        let ticket = self.begin(|tree| {
            let node = tree
                .directory(id)
                .ok_or(CatalogError::NotFound(NodeRef::Directory(id)))?;
            parent = node.parent();
            Ok(CatalogCommand::RenameDirectory {
                id,
                from: node.name().to_owned(),
                to: name.to_owned(),
            })
        })?;
        tracing::info!("Renaming {} to {:?}", id, name);

        let update = DirectoryUpdate {
            name: name.to_owned(),
            parent,
        };
        let result = self.remote.update_directory(id, &update).await;
        self.settle(ticket, result, reconcile_directory)?;
        Ok(())
    }

    /// Move a directory with its subtree under `target` (home when `None`)
    ///
    /// Moving to the current parent is a no-op that skips the remote.
    ///
    /// # Errors
    /// - [`CatalogError::InvalidMove`] if the move would create a cycle
    /// - [`CatalogError::ValidationFailure`] for provisional ids
    /// - [`CatalogError::NotFound`] for an unknown directory or target
    /// - [`CatalogError::RemoteFailure`] after rolling back
    pub async fn move_directory(
        &self,
        id: DirectoryId,
        target: Option<DirectoryId>,
    ) -> Result<(), CatalogError> {
        let node = NodeRef::Directory(id);
        reject_provisional(node)?;
        if let Some(target) = target {
            reject_provisional(NodeRef::Directory(target))?;
        }

        let mut name = String::new();
        let ticket = self.begin_unless_noop(|tree| {
            let dir = tree.directory(id).ok_or(CatalogError::NotFound(node))?;
            require_directory(tree, target)?;
            MoveValidator::check(tree, node, target)?;
            if dir.parent() == target {
                return Ok(None);
            }
            name = dir.name().to_owned();
            Ok(Some(CatalogCommand::MoveDirectory {
                id,
                from: dir.parent(),
                to: target,
            }))
        })?;
        let Some(ticket) = ticket else {
            return Ok(());
        };
        tracing::info!("Moving {} under {:?}", id, target);

        let update = DirectoryUpdate {
            name,
            parent: target,
        };
        let result = self.remote.update_directory(id, &update).await;
        self.settle(ticket, result, reconcile_directory)?;
        Ok(())
    }

    /// Delete a directory and everything below it
    ///
    /// Contained layers are deleted or detached to home according to
    /// [`CatalogOptions::cascade`]; the remote is asked for the same policy.
    ///
    /// # Errors
    /// - [`CatalogError::ValidationFailure`] for a provisional id
    /// - [`CatalogError::NotFound`] for an unknown directory
    /// - [`CatalogError::RemoteFailure`] after restoring the subtree
    pub async fn delete_directory(&self, id: DirectoryId) -> Result<(), CatalogError> {
        reject_provisional(NodeRef::Directory(id))?;
        let policy = self.options.cascade;

        let ticket = self.begin(|tree| {
            Ok(CatalogCommand::RemoveSubtree {
                subtree: tree::subtree(tree, id)?,
                policy,
            })
        })?;
        tracing::info!("Deleting {} ({})", id, policy.as_str());

        let result = self.remote.delete_directory(id, policy).await;
        self.settle(ticket, result, |tree, ()| Ok((tree.clone(), NodeRef::Directory(id))))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Layer operations
    // ------------------------------------------------------------------

    /// Rename a layer
    ///
    /// # Errors
    /// - [`CatalogError::ValidationFailure`] for an empty name
    /// - [`CatalogError::NotFound`] for an unknown layer
    /// - [`CatalogError::RemoteFailure`] after rolling back
    pub async fn rename_layer(&self, id: LayerId, name: &str) -> Result<(), CatalogError> {
        validate_name(name)?;
        reject_provisional(NodeRef::Layer(id))?;

        let mut directory = None;
        let ticket = self.begin(|tree| {
            let layer = tree
                .layer(id)
                .ok_or(CatalogError::NotFound(NodeRef::Layer(id)))?;
            directory = layer.directory();
            Ok(CatalogCommand::RenameLayer {
                id,
                from: layer.name().to_owned(),
                to: name.to_owned(),
            })
        })?;
        tracing::info!("Renaming {} to {:?}", id, name);

        let update = LayerUpdate {
            name: name.to_owned(),
            directory,
        };
        let result = self.remote.update_layer(id, &update).await;
        self.settle(ticket, result, reconcile_layer)?;
        Ok(())
    }

    /// Refile a layer under `target` (home when `None`)
    ///
    /// # Errors
    /// - [`CatalogError::ValidationFailure`] for a provisional target
    /// - [`CatalogError::NotFound`] for an unknown layer or target
    /// - [`CatalogError::RemoteFailure`] after rolling back
    pub async fn move_layer(
        &self,
        id: LayerId,
        target: Option<DirectoryId>,
    ) -> Result<(), CatalogError> {
        let node = NodeRef::Layer(id);
        reject_provisional(node)?;
        if let Some(target) = target {
            reject_provisional(NodeRef::Directory(target))?;
        }

        let mut name = String::new();
        let ticket = self.begin_unless_noop(|tree| {
            let layer = tree.layer(id).ok_or(CatalogError::NotFound(node))?;
            require_directory(tree, target)?;
            MoveValidator::check(tree, node, target)?;
            if layer.directory() == target {
                return Ok(None);
            }
            name = layer.name().to_owned();
            Ok(Some(CatalogCommand::MoveLayer {
                id,
                from: layer.directory(),
                to: target,
            }))
        })?;
        let Some(ticket) = ticket else {
            return Ok(());
        };
        tracing::info!("Moving {} under {:?}", id, target);

        let update = LayerUpdate {
            name,
            directory: target,
        };
        let result = self.remote.update_layer(id, &update).await;
        self.settle(ticket, result, reconcile_layer)?;
        Ok(())
    }

    /// Delete a layer
    ///
    /// # Errors
    /// - [`CatalogError::NotFound`] for an unknown layer
    /// - [`CatalogError::RemoteFailure`] after restoring it
    pub async fn delete_layer(&self, id: LayerId) -> Result<(), CatalogError> {
        reject_provisional(NodeRef::Layer(id))?;

        let ticket = self.begin(|tree| {
            let layer = tree
                .layer(id)
                .ok_or(CatalogError::NotFound(NodeRef::Layer(id)))?;
            Ok(CatalogCommand::RemoveLayer(layer.to_record()))
        })?;
        tracing::info!("Deleting {}", id);

        let result = self.remote.delete_layer(id).await;
        self.settle(ticket, result, |tree, ()| Ok((tree.clone(), NodeRef::Layer(id))))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------

    fn ensure_live(&self) -> Result<(), CatalogError> {
        if self.state.lock().disposed {
            return Err(CatalogError::Disposed);
        }
        Ok(())
    }

    fn token(&self) -> CancelToken {
        self.scope.lock().token()
    }

    fn emit(&self, event: CatalogEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Drop a directory whose create result will never be applied
    fn discard_provisional(&self, id: DirectoryId) {
        let node = NodeRef::Directory(id);
        {
            let mut state = self.state.lock();
            if state.tree.directory(id).is_none() {
                return;
            }
            match tree::remove_cascade(&state.tree, id, CascadePolicy::DeleteContents) {
                Ok(tree) => state.tree = tree,
                Err(err) => {
                    tracing::error!("Could not discard {}: {}", node, err);
                    return;
                }
            }
            state.revisions.remove(&node);
        }
        tracing::debug!("Discarded {} after cancellation", node);
        self.emit(CatalogEvent::Changed(node));
    }

    fn begin(
        &self,
        build: impl FnOnce(&CatalogTree) -> Result<CatalogCommand, CatalogError>,
    ) -> Result<Ticket, CatalogError> {
        self.begin_unless_noop(|tree| build(tree).map(Some))?
            .ok_or(CatalogError::ValidationFailure("nothing to apply".into()))
    }

    /// Build, apply and stamp a command under one lock acquisition
    fn begin_unless_noop(
        &self,
        build: impl FnOnce(&CatalogTree) -> Result<Option<CatalogCommand>, CatalogError>,
    ) -> Result<Option<Ticket>, CatalogError> {
        let token = self.token();
        let (node, revision, undo) = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(CatalogError::Disposed);
            }
            let Some(command) = build(&state.tree)? else {
                return Ok(None);
            };
            state.tree = command.apply(&state.tree)?;
            let revision = state.stamp(&command.affected());
            (command.target(), revision, command.inverse())
        };
        self.emit(CatalogEvent::Changed(node));
        Ok(Some(Ticket {
            node,
            revision,
            token,
            undo,
        }))
    }

    /// Apply the remote's verdict for `ticket` if it is still relevant
    fn settle<T>(
        &self,
        ticket: Ticket,
        result: RemoteResult<T>,
        reconcile: impl FnOnce(&CatalogTree, &T) -> Result<(CatalogTree, NodeRef), TreeError>,
    ) -> Result<T, CatalogError> {
        let Ticket {
            node,
            revision,
            token,
            undo,
        } = ticket;

        if token.is_cancelled() {
            tracing::debug!("Result for {} arrived after cancellation; dropped", node);
            return Err(CatalogError::Cancelled);
        }

        let mut state = self.state.lock();
        let current = state.is_current(node, revision);
        match result {
            Ok(value) => {
                let event = if current {
                    match reconcile(&state.tree, &value) {
                        Ok((tree, canonical)) => {
                            state.tree = tree;
                            tracing::debug!("Reconciled {} as {}", node, canonical);
                            CatalogEvent::Reconciled { node, canonical }
                        }
                        Err(err) => {
                            tracing::warn!("Could not reconcile {}: {}", node, err);
                            CatalogEvent::StaleResponse(node)
                        }
                    }
                } else {
                    tracing::debug!("Stale response for {} ignored", node);
                    CatalogEvent::StaleResponse(node)
                };
                drop(state);
                self.emit(event);
                Ok(value)
            }
            Err(error) => {
                let event = if current {
                    // Nodes restamped since keep their newer state
                    let undo = undo.retain_layers(|layer| {
                        state.is_current(NodeRef::Layer(layer), revision)
                    });
                    match undo.apply(&state.tree) {
                        Ok(tree) => {
                            state.tree = tree;
                            // Responses to earlier calls must not roll back over this
                            state.stamp(&undo.affected());
                            tracing::warn!("Remote refused change to {}; rolled back: {}", node, error);
                            CatalogEvent::RolledBack {
                                node,
                                error: error.clone(),
                            }
                        }
                        Err(err) => {
                            tracing::error!("Rollback of {} failed: {}", node, err);
                            CatalogEvent::StaleResponse(node)
                        }
                    }
                } else {
                    tracing::debug!("Stale failure for {} ignored: {}", node, error);
                    CatalogEvent::StaleResponse(node)
                };
                drop(state);
                self.emit(event);
                Err(CatalogError::RemoteFailure(error))
            }
        }
    }
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::ValidationFailure("name must not be empty".into()));
    }
    Ok(())
}

fn reject_provisional(node: NodeRef) -> Result<(), CatalogError> {
    if node.is_provisional() {
        return Err(CatalogError::ValidationFailure(format!(
            "{node} is still being created"
        )));
    }
    Ok(())
}

fn require_directory(tree: &CatalogTree, id: Option<DirectoryId>) -> Result<(), CatalogError> {
    match id {
        Some(id) if tree.directory(id).is_none() => {
            Err(CatalogError::NotFound(NodeRef::Directory(id)))
        }
        _ => Ok(()),
    }
}

/// Bring a local directory in line with the remote's record
fn reconcile_directory(
    tree: &CatalogTree,
    record: &DirectoryRecord,
) -> Result<(CatalogTree, NodeRef), TreeError> {
    let node = tree
        .directory(record.id)
        .ok_or(TreeError::NotFound(NodeRef::Directory(record.id)))?;
    let mut next = tree.clone();
    if node.name() != record.name {
        next = tree::rename(&next, record.id, record.name.clone())?;
    }
    if node.parent() != record.parent {
        next = tree::reparent(&next, NodeRef::Directory(record.id), record.parent)?;
    }
    Ok((next, NodeRef::Directory(record.id)))
}

/// Bring a local layer in line with the remote's record, inserting it if unknown
fn reconcile_layer(
    tree: &CatalogTree,
    record: &LayerRecord,
) -> Result<(CatalogTree, NodeRef), TreeError> {
    let node = NodeRef::Layer(record.id);
    let Some(layer) = tree.layer(record.id) else {
        let next = tree::insert_layer(tree, record.id, record.name.clone(), record.directory)?;
        return Ok((next, node));
    };
    let mut next = tree.clone();
    if layer.name() != record.name {
        next = tree::rename_layer(&next, record.id, record.name.clone())?;
    }
    if layer.directory() != record.directory {
        next = tree::reparent(&next, node, record.directory)?;
    }
    Ok((next, node))
}
