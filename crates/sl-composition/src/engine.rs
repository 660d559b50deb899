//! Map composition engine
//!
//! Holds the ordered layer stack of one project. Index 0 draws first
//! (bottom); the last entry draws on top.
//!
//! Adds, removals, visibility and style changes are optimistic and undone
//! if the remote refuses. Reordering is pessimistic: the stack only moves
//! once the remote acknowledges, and the order it returns wins. Reorders
//! are serialised so two swaps never interleave.

use crate::entry::{LayerSource, ProjectLayerEntry};
use crate::error::CompositionError;
use crate::events::CompositionEvent;
use crate::render::{FeatureHit, MapPoint, RenderLayer, Renderer};
use im::Vector;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sl_remote::{
    CancelScope, CancelToken, Extent, NewProjectLayer, ProjectId, ProjectLayerId,
    ProjectLayerUpdate, ProjectRemote, ProjectUpdate, RemoteResult, StyleOptions,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Composition tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionOptions {
    /// Style given to data layers added without one
    pub default_style: StyleOptions,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl CompositionOptions {
    /// Default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default data-layer style
    #[inline]
    #[must_use]
    pub fn with_default_style(mut self, style: StyleOptions) -> Self {
        self.default_style = style;
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

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            default_style: StyleOptions::DEFAULT,
            event_capacity: 64,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    project: Option<ProjectId>,
    name: String,
    extent: Option<Extent>,
    entries: Vector<ProjectLayerEntry>,
    revisions: HashMap<(ProjectLayerId, Field), u64>,
    next_revision: u64,
    disposed: bool,
}

impl State {
    fn position(&self, id: ProjectLayerId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn entry_mut(&mut self, id: ProjectLayerId) -> Option<&mut ProjectLayerEntry> {
        let index = self.position(id)?;
        self.entries.get_mut(index)
    }

    fn stamp(&mut self, id: ProjectLayerId, field: Field) -> u64 {
        self.next_revision += 1;
        self.revisions.insert((id, field), self.next_revision);
        self.next_revision
    }

    fn is_current(&self, id: ProjectLayerId, field: Field, revision: u64) -> bool {
        self.revisions.get(&(id, field)) == Some(&revision)
    }

    fn forget(&mut self, id: ProjectLayerId) {
        self.revisions.retain(|(entry, _), _| *entry != id);
    }

    fn render_list(&self) -> Vec<RenderLayer> {
        self.entries.iter().map(RenderLayer::from).collect()
    }

    /// Reorder to match `order`; entries the remote did not list keep their
    /// relative order on top
    fn adopt_order(&mut self, order: &[ProjectLayerId]) {
        let mut remaining = self.entries.clone();
        let mut next = Vector::new();
        for id in order {
            if let Some(index) = remaining.iter().position(|entry| entry.id == *id) {
                next.push_back(remaining.remove(index));
            }
        }
        next.append(remaining);
        self.entries = next;
    }
}

/// Part of an entry whose optimistic changes are versioned on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Presence,
    Visible,
    Style,
}

/// Local inverse of an optimistic change
#[derive(Debug)]
enum Undo {
    Discard(ProjectLayerId),
    Reinsert {
        index: usize,
        entry: ProjectLayerEntry,
    },
    Visible {
        entry: ProjectLayerId,
        visible: bool,
    },
    Style {
        entry: ProjectLayerId,
        style: Option<StyleOptions>,
    },
}

impl Undo {
    fn field(&self) -> Field {
        match self {
            Self::Discard(_) | Self::Reinsert { .. } => Field::Presence,
            Self::Visible { .. } => Field::Visible,
            Self::Style { .. } => Field::Style,
        }
    }

    fn apply(self, state: &mut State) -> bool {
        match self {
            Self::Discard(id) => match state.position(id) {
                Some(index) => {
                    state.entries.remove(index);
                    true
                }
                None => false,
            },
            Self::Reinsert { index, entry } => {
                if state.position(entry.id).is_some() {
                    return false;
                }
                let index = index.min(state.entries.len());
                state.entries.insert(index, entry);
                true
            }
            Self::Visible { entry, visible } => {
                let Some(target) = state.entry_mut(entry) else {
                    return false;
                };
                target.visible = visible;
                true
            }
            Self::Style { entry, style } => {
                let Some(target) = state.entry_mut(entry) else {
                    return false;
                };
                target.style = style;
                true
            }
        }
    }
}

#[derive(Debug)]
struct Ticket {
    entry: ProjectLayerId,
    field: Field,
    revision: u64,
    token: CancelToken,
    undo: Undo,
}

/// Ordered, styled layer stack of one project
#[derive(Debug)]
pub struct MapComposition<R, V> {
    remote: R,
    renderer: V,
    options: CompositionOptions,
    state: Mutex<State>,
    order_lock: tokio::sync::Mutex<()>,
    scope: Mutex<CancelScope>,
    events: broadcast::Sender<CompositionEvent>,
    provisional: AtomicU64,
}

impl<R: ProjectRemote, V: Renderer> MapComposition<R, V> {
    /// Empty composition; call [`load`](Self::load) to open a project
    #[must_use]
    pub fn new(remote: R, renderer: V) -> Self {
        Self::with_options(remote, renderer, CompositionOptions::default())
    }

    /// Empty composition with explicit options
    #[must_use]
    pub fn with_options(remote: R, renderer: V, options: CompositionOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            remote,
            renderer,
            options,
            state: Mutex::new(State::default()),
            order_lock: tokio::sync::Mutex::new(()),
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

    /// Renderer
    #[inline]
    #[must_use]
    pub fn renderer(&self) -> &V {
        &self.renderer
    }

    /// Open `project`, replacing whatever was loaded
    ///
    /// # Errors
    /// - [`CompositionError::RemoteFailure`] if the project cannot be fetched
    /// - [`CompositionError::ValidationFailure`] for malformed entries
    /// - [`CompositionError::Cancelled`] if the scope was cancelled meanwhile
    pub async fn load(&self, project: ProjectId) -> Result<(), CompositionError> {
        self.ensure_live()?;
        let token = self.token();
        tracing::info!("Loading {}", project);

        let record = self.remote.get_project(project).await?;
        if token.is_cancelled() {
            tracing::debug!("Project {} arrived after cancellation; dropped", project);
            return Err(CompositionError::Cancelled);
        }
        let entries = record
            .project_layers
            .into_iter()
            .map(ProjectLayerEntry::try_from)
            .collect::<Result<Vector<_>, _>>()?;
        let count = entries.len();

        {
            let mut state = self.state.lock();
            state.project = Some(record.id);
            state.name = record.name;
            state.extent = record.extent;
            state.entries = entries;
            state.revisions.clear();
        }
        tracing::info!("Loaded {} with {} layers", project, count);
        self.redraw();
        self.emit(CompositionEvent::Loaded {
            project,
            entries: count,
        });
        Ok(())
    }

    /// Loaded project, if any
    #[must_use]
    pub fn project(&self) -> Option<ProjectId> {
        self.state.lock().project
    }

    /// Saved map extent of the loaded project
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        self.state.lock().extent
    }

    /// Entries bottom to top
    #[must_use]
    pub fn entries(&self) -> Vec<ProjectLayerEntry> {
        self.state.lock().entries.iter().cloned().collect()
    }

    /// Entry by id
    #[must_use]
    pub fn entry(&self, id: ProjectLayerId) -> Option<ProjectLayerEntry> {
        let state = self.state.lock();
        state.position(id).and_then(|index| state.entries.get(index).cloned())
    }

    /// What the renderer receives, including hidden entries
    #[must_use]
    pub fn render_list(&self) -> Vec<RenderLayer> {
        self.state.lock().render_list()
    }

    /// Receive every subsequent [`CompositionEvent`]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CompositionEvent> {
        self.events.subscribe()
    }

    /// Drop the results of every call issued so far
    pub fn cancel_pending(&self) {
        let old = std::mem::replace(&mut *self.scope.lock(), CancelScope::new());
        old.cancel();
        tracing::debug!("Cancelled pending composition operations");
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
        tracing::info!("Map composition disposed");
        self.emit(CompositionEvent::Disposed);
    }

    /// Whether [`dispose`](Self::dispose) was called
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Put `source` on top of the stack
    ///
    /// Data layers without a style get [`CompositionOptions::default_style`].
    /// The entry shows up at once under a provisional id and is returned
    /// with the server's id.
    ///
    /// # Errors
    /// - [`CompositionError::ValidationFailure`] if no project is loaded or a basemap is given a style
    /// - [`CompositionError::InvalidStyle`] for out-of-range style values
    /// - [`CompositionError::RemoteFailure`] after removing the entry again
    pub async fn add(
        &self,
        source: LayerSource,
        style: Option<StyleOptions>,
    ) -> Result<ProjectLayerEntry, CompositionError> {
        let style = match (&source, style) {
            (LayerSource::Basemap(_), Some(_)) => {
                return Err(CompositionError::ValidationFailure(
                    "basemap entries carry no style".into(),
                ))
            }
            (LayerSource::Basemap(_), None) => None,
            (LayerSource::DataLayer { .. }, style) => {
                let style = style.unwrap_or(self.options.default_style);
                style.validate()?;
                Some(style)
            }
        };

        let provisional =
            ProjectLayerId::provisional(self.provisional.fetch_add(1, Ordering::Relaxed));
        let entry = ProjectLayerEntry::new(provisional, source.clone(), style);
        let token = self.token();
        let (project, revision) = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(CompositionError::Disposed);
            }
            let project = state.project.ok_or_else(not_loaded)?;
            state.entries.push_back(entry);
            (project, state.stamp(provisional, Field::Presence))
        };
        tracing::info!("Adding {} to {}", source, project);
        self.redraw();
        self.emit(CompositionEvent::Added(provisional));

        let request = NewProjectLayer {
            project,
            layer_id: source.layer(),
            basemap: match &source {
                LayerSource::Basemap(kind) => Some(*kind),
                LayerSource::DataLayer { .. } => None,
            },
            visible: true,
            style,
        };
        let result = self.remote.create_project_layer(&request).await;
        let ticket = Ticket {
            entry: provisional,
            field: Field::Presence,
            revision,
            token,
            undo: Undo::Discard(provisional),
        };

        let mut confirmed = None;
        let record = self.settle(ticket, result, |state, record| {
            let index = state.position(provisional)?;
            let mut entry = ProjectLayerEntry::try_from(record.clone()).ok()?;
            // Local style wins if the remote echoes none
            if entry.style.is_none() && entry.source.is_stylable() {
                entry.style = style;
            }
            state.entries.set(index, entry.clone());
            state.forget(provisional);
            confirmed = Some(entry);
            Some(CompositionEvent::Confirmed {
                provisional,
                id: record.id,
            })
        })?;

        Ok(confirmed.unwrap_or_else(|| {
            ProjectLayerEntry::try_from(record.clone())
                .unwrap_or_else(|_| ProjectLayerEntry::new(record.id, source, style))
        }))
    }

    /// Take an entry off the stack
    ///
    /// # Errors
    /// - [`CompositionError::NotFound`] for an unknown entry
    /// - [`CompositionError::RemoteFailure`] after putting it back
    pub async fn remove(&self, id: ProjectLayerId) -> Result<(), CompositionError> {
        let ticket = self.begin(id, |state| {
            let index = state.position(id).ok_or(CompositionError::NotFound(id))?;
            let entry = state.entries.remove(index);
            Ok(Undo::Reinsert { index, entry })
        })?;
        tracing::info!("Removing {}", id);
        self.redraw();
        self.emit(CompositionEvent::Removed(id));

        let result = self.remote.delete_project_layer(id).await;
        self.settle(ticket, result, |_, ()| None)?;
        Ok(())
    }

    /// Swap an entry with the one drawn above it
    ///
    /// No-op on the top entry. The stack changes only after the remote
    /// acknowledges, and then takes the order the remote returns.
    ///
    /// # Errors
    /// - [`CompositionError::NotFound`] for an unknown entry
    /// - [`CompositionError::RemoteFailure`]; the stack is left untouched
    pub async fn move_up(&self, id: ProjectLayerId) -> Result<(), CompositionError> {
        self.reorder(id, Direction::Up).await
    }

    /// Swap an entry with the one drawn below it
    ///
    /// No-op on the bottom entry; otherwise as [`move_up`](Self::move_up).
    ///
    /// # Errors
    /// - [`CompositionError::NotFound`] for an unknown entry
    /// - [`CompositionError::RemoteFailure`]; the stack is left untouched
    pub async fn move_down(&self, id: ProjectLayerId) -> Result<(), CompositionError> {
        self.reorder(id, Direction::Down).await
    }

    /// Show or hide an entry; the entry keeps its place either way
    ///
    /// Setting the current value does nothing and makes no remote call.
    ///
    /// # Errors
    /// - [`CompositionError::NotFound`] for an unknown entry
    /// - [`CompositionError::RemoteFailure`] after restoring the old flag
    pub async fn set_visible(
        &self,
        id: ProjectLayerId,
        visible: bool,
    ) -> Result<(), CompositionError> {
        let Some(ticket) = self.begin_unless_noop(id, |state| {
            let entry = state.entry_mut(id).ok_or(CompositionError::NotFound(id))?;
            if entry.visible == visible {
                return Ok(None);
            }
            entry.visible = visible;
            Ok(Some(Undo::Visible {
                entry: id,
                visible: !visible,
            }))
        })?
        else {
            return Ok(());
        };
        tracing::debug!("Setting {} visible={}", id, visible);
        self.redraw();
        self.emit(CompositionEvent::VisibilityChanged { entry: id, visible });

        let result = self
            .remote
            .update_project_layer(id, &ProjectLayerUpdate::visible(visible))
            .await;
        self.settle(ticket, result, |state, record| {
            let entry = state.entry_mut(id)?;
            if entry.visible == record.visible {
                return None;
            }
            entry.visible = record.visible;
            Some(CompositionEvent::VisibilityChanged {
                entry: id,
                visible: record.visible,
            })
        })?;
        Ok(())
    }

    /// Replace a data layer's style
    ///
    /// Only the target entry changes, even when other entries show the
    /// same catalog layer.
    ///
    /// # Errors
    /// - [`CompositionError::NotStylable`] for basemaps
    /// - [`CompositionError::InvalidStyle`] for out-of-range values
    /// - [`CompositionError::NotFound`] for an unknown entry
    /// - [`CompositionError::RemoteFailure`] after restoring the old style
    pub async fn apply_style(
        &self,
        id: ProjectLayerId,
        style: StyleOptions,
    ) -> Result<(), CompositionError> {
        style.validate()?;
        let ticket = self.begin(id, |state| {
            let entry = state.entry_mut(id).ok_or(CompositionError::NotFound(id))?;
            if !entry.source.is_stylable() {
                return Err(CompositionError::NotStylable(id));
            }
            let previous = entry.style.replace(style);
            Ok(Undo::Style {
                entry: id,
                style: previous,
            })
        })?;
        tracing::debug!("Styling {}", id);
        self.redraw();
        self.emit(CompositionEvent::StyleChanged(id));

        let result = self
            .remote
            .update_project_layer(id, &ProjectLayerUpdate::style(style))
            .await;
        self.settle(ticket, result, |state, record| {
            let saved = record.style?;
            let entry = state.entry_mut(id)?;
            if entry.style == Some(saved) {
                return None;
            }
            entry.style = Some(saved);
            Some(CompositionEvent::StyleChanged(id))
        })?;
        Ok(())
    }

    /// Persist `extent` as the project's saved map extent
    ///
    /// Applied locally once the remote acknowledges.
    ///
    /// # Errors
    /// - [`CompositionError::ValidationFailure`] for an empty or inverted extent, or no project
    /// - [`CompositionError::RemoteFailure`]
    pub async fn set_extent(&self, extent: Extent) -> Result<(), CompositionError> {
        if !extent.is_valid() {
            return Err(CompositionError::ValidationFailure(format!(
                "extent {extent:?} is empty or inverted"
            )));
        }
        let token = self.token();
        let (project, name) = {
            let state = self.state.lock();
            if state.disposed {
                return Err(CompositionError::Disposed);
            }
            (state.project.ok_or_else(not_loaded)?, state.name.clone())
        };
        tracing::info!("Saving extent of {}", project);

        let update = ProjectUpdate {
            name,
            extent: Some(extent),
        };
        let record = self.remote.update_project(project, &update).await?;
        if token.is_cancelled() {
            return Err(CompositionError::Cancelled);
        }

        let saved = record.extent.unwrap_or(extent);
        {
            let mut state = self.state.lock();
            if state.project != Some(project) {
                return Ok(());
            }
            state.extent = Some(saved);
        }
        self.redraw();
        self.emit(CompositionEvent::ExtentSaved(saved));
        Ok(())
    }

    /// Features under `point` on visible entries, topmost first
    #[must_use]
    pub fn select_at(&self, point: MapPoint) -> Vec<FeatureHit> {
        let visible: Vec<ProjectLayerId> = self
            .state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.visible)
            .map(|entry| entry.id)
            .collect();
        self.renderer
            .pick(point)
            .into_iter()
            .filter(|hit| visible.contains(&hit.entry))
            .collect()
    }

    // ------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------

    async fn reorder(&self, id: ProjectLayerId, direction: Direction) -> Result<(), CompositionError> {
        reject_provisional(id)?;
        let _order = self.order_lock.lock().await;
        let token = self.token();
        let project = {
            let state = self.state.lock();
            if state.disposed {
                return Err(CompositionError::Disposed);
            }
            let project = state.project.ok_or_else(not_loaded)?;
            let index = state.position(id).ok_or(CompositionError::NotFound(id))?;
            let at_boundary = match direction {
                Direction::Up => index + 1 >= state.entries.len(),
                Direction::Down => index == 0,
            };
            if at_boundary {
                tracing::debug!("{} already at the {:?} boundary", id, direction);
                return Ok(());
            }
            project
        };
        tracing::info!("Moving {} {:?}", id, direction);

        let order = match direction {
            Direction::Up => self.remote.move_project_layer_up(project, id).await,
            Direction::Down => self.remote.move_project_layer_down(project, id).await,
        };
        let order = order.map_err(|error| {
            tracing::warn!("Remote refused to move {}: {}", id, error);
            CompositionError::RemoteFailure(error)
        })?;
        if token.is_cancelled() {
            return Err(CompositionError::Cancelled);
        }

        let order = {
            let mut state = self.state.lock();
            state.adopt_order(&order);
            state.entries.iter().map(|entry| entry.id).collect()
        };
        self.redraw();
        self.emit(CompositionEvent::Reordered(order));
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), CompositionError> {
        if self.state.lock().disposed {
            return Err(CompositionError::Disposed);
        }
        Ok(())
    }

    fn token(&self) -> CancelToken {
        self.scope.lock().token()
    }

    fn emit(&self, event: CompositionEvent) {
        let _ = self.events.send(event);
    }

    fn redraw(&self) {
        let (layers, extent) = {
            let state = self.state.lock();
            (state.render_list(), state.extent)
        };
        self.renderer.draw(&layers, extent);
    }

    fn begin(
        &self,
        id: ProjectLayerId,
        change: impl FnOnce(&mut State) -> Result<Undo, CompositionError>,
    ) -> Result<Ticket, CompositionError> {
        self.begin_unless_noop(id, |state| change(state).map(Some))?
            .ok_or(CompositionError::ValidationFailure("nothing to apply".into()))
    }

    /// Apply a local change and stamp the entry under one lock acquisition
    fn begin_unless_noop(
        &self,
        id: ProjectLayerId,
        change: impl FnOnce(&mut State) -> Result<Option<Undo>, CompositionError>,
    ) -> Result<Option<Ticket>, CompositionError> {
        reject_provisional(id)?;
        let token = self.token();
        let mut state = self.state.lock();
        if state.disposed {
            return Err(CompositionError::Disposed);
        }
        let Some(undo) = change(&mut *state)? else {
            return Ok(None);
        };
        let field = undo.field();
        let revision = state.stamp(id, field);
        Ok(Some(Ticket {
            entry: id,
            field,
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
        confirm: impl FnOnce(&mut State, &T) -> Option<CompositionEvent>,
    ) -> Result<T, CompositionError> {
        let Ticket {
            entry,
            field,
            revision,
            token,
            undo,
        } = ticket;

        if token.is_cancelled() {
            tracing::debug!("Result for {} arrived after cancellation; dropped", entry);
            return Err(CompositionError::Cancelled);
        }

        let mut state = self.state.lock();
        let current = state.is_current(entry, field, revision);
        match result {
            Ok(value) => {
                let event = if current {
                    confirm(&mut *state, &value)
                } else {
                    tracing::debug!("Stale response for {} ignored", entry);
                    Some(CompositionEvent::StaleResponse(entry))
                };
                drop(state);
                if let Some(event) = event {
                    if !matches!(event, CompositionEvent::StaleResponse(_)) {
                        self.redraw();
                    }
                    self.emit(event);
                }
                Ok(value)
            }
            Err(error) => {
                let event = if current && undo.apply(&mut *state) {
                    state.stamp(entry, field);
                    tracing::warn!("Remote refused change to {}; rolled back: {}", entry, error);
                    Some(CompositionEvent::RolledBack {
                        entry,
                        error: error.clone(),
                    })
                } else {
                    tracing::debug!("Stale failure for {} ignored: {}", entry, error);
                    Some(CompositionEvent::StaleResponse(entry))
                };
                drop(state);
                if matches!(event, Some(CompositionEvent::RolledBack { .. })) {
                    self.redraw();
                }
                if let Some(event) = event {
                    self.emit(event);
                }
                Err(CompositionError::RemoteFailure(error))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

fn not_loaded() -> CompositionError {
    CompositionError::ValidationFailure("no project loaded".into())
}

fn reject_provisional(id: ProjectLayerId) -> Result<(), CompositionError> {
    if id.is_provisional() {
        return Err(CompositionError::ValidationFailure(format!(
            "{id} is still being created"
        )));
    }
    Ok(())
}
