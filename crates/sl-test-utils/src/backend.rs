//! In-memory stand-in for the GIS service
//!
//! Implements both remote contracts over plain maps, with two test hooks:
//! - failure injection: [`InMemoryBackend::fail_next`] makes the next call
//!   of a kind return the given error
//! - response gating: after [`InMemoryBackend::pause`] every call waits at
//!   the gate until [`InMemoryBackend::release`] lets it through, in
//!   arrival order

use async_trait::async_trait;
use parking_lot::Mutex;
use sl_remote::{
    BasemapKind, CascadePolicy, CatalogRemote, DirectoryId, DirectoryRecord, DirectoryUpdate,
    LayerId, LayerListing, LayerRecord, LayerSummary, LayerUpdate, NewDirectory,
    NewProjectLayer, ProjectId, ProjectLayerId, ProjectLayerRecord, ProjectLayerUpdate,
    ProjectRecord, ProjectRemote, ProjectUpdate, RemoteError, RemoteResult, StyleOptions,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Kinds of remote call, for failure injection and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    ListDirectories,
    CreateDirectory,
    UpdateDirectory,
    DeleteDirectory,
    ListLayers,
    UpdateLayer,
    DeleteLayer,
    GetProject,
    UpdateProject,
    ListProjectLayers,
    CreateProjectLayer,
    UpdateProjectLayer,
    DeleteProjectLayer,
    MoveUp,
    MoveDown,
}

#[derive(Debug, Default)]
struct Data {
    next_id: u64,
    directories: BTreeMap<DirectoryId, DirectoryRecord>,
    layers: BTreeMap<LayerId, LayerRecord>,
    projects: BTreeMap<ProjectId, ProjectRecord>,
    failures: HashMap<Call, VecDeque<RemoteError>>,
    calls: Vec<Call>,
    last_cascade: Option<CascadePolicy>,
}

impl Data {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn require_directory(&self, id: Option<DirectoryId>) -> RemoteResult<()> {
        match id {
            Some(id) if !self.directories.contains_key(&id) => {
                Err(RemoteError::NotFound(id.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn drop_entries_for(&mut self, layers: &BTreeSet<LayerId>) {
        for project in self.projects.values_mut() {
            project.project_layers.retain(|entry| {
                entry
                    .layer
                    .as_ref()
                    .map_or(true, |summary| !layers.contains(&summary.id))
            });
        }
    }

    fn locate_entry(&mut self, id: ProjectLayerId) -> RemoteResult<(&mut ProjectRecord, usize)> {
        self.projects
            .values_mut()
            .find_map(|project| {
                let index = project.project_layers.iter().position(|e| e.id == id)?;
                Some((project, index))
            })
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn locate_entry_in(
        &mut self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<(&mut ProjectRecord, usize)> {
        let record = self
            .projects
            .get_mut(&project)
            .ok_or_else(|| RemoteError::NotFound(project.to_string()))?;
        let index = record
            .project_layers
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok((record, index))
    }
}

#[derive(Debug)]
struct Gate {
    paused: AtomicBool,
    waiting: AtomicUsize,
    permits: Semaphore,
}

#[derive(Debug)]
struct Inner {
    data: Mutex<Data>,
    gate: Gate,
}

/// Shared handle to an in-memory GIS service
///
/// Clones share state, so a test can keep one handle while a store owns
/// another.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(Data::default()),
                gate: Gate {
                    paused: AtomicBool::new(false),
                    waiting: AtomicUsize::new(0),
                    permits: Semaphore::new(0),
                },
            }),
        }
    }

    // -- seeding --

    pub fn add_directory(&self, name: &str, parent: Option<DirectoryId>) -> DirectoryId {
        let mut data = self.inner.data.lock();
        let id = DirectoryId::new(data.next_id());
        data.directories
            .insert(id, DirectoryRecord::new(id, name, parent));
        id
    }

    pub fn add_layer(&self, name: &str, directory: Option<DirectoryId>) -> LayerId {
        let mut data = self.inner.data.lock();
        let id = LayerId::new(data.next_id());
        data.layers.insert(id, LayerRecord::new(id, name, directory));
        id
    }

    pub fn add_project(&self, name: &str) -> ProjectId {
        let mut data = self.inner.data.lock();
        let id = ProjectId::new(data.next_id());
        data.projects.insert(
            id,
            ProjectRecord {
                id,
                name: name.to_owned(),
                extent: None,
                project_layers: Vec::new(),
            },
        );
        id
    }

    /// Append an entry to a seeded project; panics on unknown ids
    pub fn add_project_layer(
        &self,
        project: ProjectId,
        layer: Option<LayerId>,
        basemap: Option<BasemapKind>,
        style: Option<StyleOptions>,
    ) -> ProjectLayerId {
        let mut data = self.inner.data.lock();
        let id = ProjectLayerId::new(data.next_id());
        let summary = layer.map(|layer| LayerSummary {
            id: layer,
            name: data.layers[&layer].name.clone(),
        });
        let record = ProjectLayerRecord {
            id,
            project,
            layer: summary,
            basemap,
            visible: true,
            style,
        };
        data.projects
            .get_mut(&project)
            .expect("seeded project")
            .project_layers
            .push(record);
        id
    }

    // -- inspection --

    pub fn directories(&self) -> Vec<DirectoryRecord> {
        self.inner.data.lock().directories.values().cloned().collect()
    }

    pub fn directory(&self, id: DirectoryId) -> Option<DirectoryRecord> {
        self.inner.data.lock().directories.get(&id).cloned()
    }

    pub fn layers(&self) -> Vec<LayerRecord> {
        self.inner.data.lock().layers.values().cloned().collect()
    }

    pub fn layer(&self, id: LayerId) -> Option<LayerRecord> {
        self.inner.data.lock().layers.get(&id).cloned()
    }

    pub fn project(&self, id: ProjectId) -> Option<ProjectRecord> {
        self.inner.data.lock().projects.get(&id).cloned()
    }

    /// Entry ids of a project, bottom first
    pub fn order(&self, project: ProjectId) -> Vec<ProjectLayerId> {
        self.project(project)
            .map(|p| p.project_layers.iter().map(|e| e.id).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.data.lock().calls.clone()
    }

    pub fn call_count(&self, call: Call) -> usize {
        self.inner.data.lock().calls.iter().filter(|c| **c == call).count()
    }

    pub fn last_cascade(&self) -> Option<CascadePolicy> {
        self.inner.data.lock().last_cascade
    }

    // -- failure injection --

    /// Make the next `call` fail with `error`; queued per call kind
    pub fn fail_next(&self, call: Call, error: RemoteError) {
        self.inner
            .data
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    // -- gating --

    /// Hold every subsequent call at the gate
    pub fn pause(&self) {
        self.inner.gate.paused.store(true, Ordering::SeqCst);
    }

    /// Let the `n` oldest held calls through
    pub fn release(&self, n: usize) {
        self.inner.gate.permits.add_permits(n);
    }

    /// Stop gating and let everything through
    pub fn resume(&self) {
        self.inner.gate.paused.store(false, Ordering::SeqCst);
        let held = self.inner.gate.waiting.load(Ordering::SeqCst);
        self.inner.gate.permits.add_permits(held);
    }

    /// Calls currently held at the gate
    pub fn waiting(&self) -> usize {
        self.inner.gate.waiting.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` calls are held at the gate
    pub async fn wait_for_waiting(&self, n: usize) {
        while self.waiting() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Yield until no call is held at the gate
    pub async fn wait_for_drained(&self) {
        while self.waiting() > 0 {
            tokio::task::yield_now().await;
        }
    }

    async fn enter(&self, call: Call) -> RemoteResult<()> {
        self.inner.data.lock().calls.push(call);

        let gate = &self.inner.gate;
        if gate.paused.load(Ordering::SeqCst) {
            gate.waiting.fetch_add(1, Ordering::SeqCst);
            if let Ok(permit) = gate.permits.acquire().await {
                permit.forget();
            }
            gate.waiting.fetch_sub(1, Ordering::SeqCst);
        }

        let mut data = self.inner.data.lock();
        match data.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogRemote for InMemoryBackend {
    async fn list_directories(&self) -> RemoteResult<Vec<DirectoryRecord>> {
        self.enter(Call::ListDirectories).await?;
        Ok(self.directories())
    }

    async fn create_directory(&self, request: &NewDirectory) -> RemoteResult<DirectoryRecord> {
        self.enter(Call::CreateDirectory).await?;
        let mut data = self.inner.data.lock();
        data.require_directory(request.parent)?;
        let id = DirectoryId::new(data.next_id());
        let record = DirectoryRecord::new(id, request.name.clone(), request.parent);
        data.directories.insert(id, record.clone());
        Ok(record)
    }

    async fn update_directory(
        &self,
        id: DirectoryId,
        update: &DirectoryUpdate,
    ) -> RemoteResult<DirectoryRecord> {
        self.enter(Call::UpdateDirectory).await?;
        let mut data = self.inner.data.lock();
        if !data.directories.contains_key(&id) {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        data.require_directory(update.parent)?;

        let mut cursor = update.parent;
        while let Some(ancestor) = cursor {
            if ancestor == id {
                return Err(RemoteError::Rejected("move would create a cycle".into()));
            }
            cursor = data.directories.get(&ancestor).and_then(|d| d.parent);
        }

        let record = DirectoryRecord::new(id, update.name.clone(), update.parent);
        data.directories.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_directory(&self, id: DirectoryId, policy: CascadePolicy) -> RemoteResult<()> {
        self.enter(Call::DeleteDirectory).await?;
        let mut data = self.inner.data.lock();
        if !data.directories.contains_key(&id) {
            return Err(RemoteError::NotFound(id.to_string()));
        }

        let mut doomed = BTreeSet::from([id]);
        let mut frontier = vec![id];
        while let Some(parent) = frontier.pop() {
            let children: Vec<DirectoryId> = data
                .directories
                .values()
                .filter(|d| d.parent == Some(parent))
                .map(|d| d.id)
                .collect();
            for child in children {
                if doomed.insert(child) {
                    frontier.push(child);
                }
            }
        }
        data.directories.retain(|dir, _| !doomed.contains(dir));

        let contained: BTreeSet<LayerId> = data
            .layers
            .values()
            .filter(|l| l.directory.is_some_and(|d| doomed.contains(&d)))
            .map(|l| l.id)
            .collect();
        match policy {
            CascadePolicy::DeleteContents => {
                data.layers.retain(|layer, _| !contained.contains(layer));
                data.drop_entries_for(&contained);
            }
            CascadePolicy::DetachLayers => {
                for layer in &contained {
                    if let Some(record) = data.layers.get_mut(layer) {
                        record.directory = None;
                    }
                }
            }
        }
        data.last_cascade = Some(policy);
        Ok(())
    }

    async fn list_layers(&self) -> RemoteResult<LayerListing> {
        self.enter(Call::ListLayers).await?;
        let (grouped, ungrouped): (Vec<LayerRecord>, Vec<LayerRecord>) = self
            .layers()
            .into_iter()
            .partition(|layer| layer.directory.is_some());
        Ok(LayerListing { ungrouped, grouped })
    }

    async fn update_layer(&self, id: LayerId, update: &LayerUpdate) -> RemoteResult<LayerRecord> {
        self.enter(Call::UpdateLayer).await?;
        let mut data = self.inner.data.lock();
        if !data.layers.contains_key(&id) {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        data.require_directory(update.directory)?;
        let record = LayerRecord::new(id, update.name.clone(), update.directory);
        data.layers.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_layer(&self, id: LayerId) -> RemoteResult<()> {
        self.enter(Call::DeleteLayer).await?;
        let mut data = self.inner.data.lock();
        if data.layers.remove(&id).is_none() {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        data.drop_entries_for(&BTreeSet::from([id]));
        Ok(())
    }
}

#[async_trait]
impl ProjectRemote for InMemoryBackend {
    async fn get_project(&self, id: ProjectId) -> RemoteResult<ProjectRecord> {
        self.enter(Call::GetProject).await?;
        self.project(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    async fn update_project(
        &self,
        id: ProjectId,
        update: &ProjectUpdate,
    ) -> RemoteResult<ProjectRecord> {
        self.enter(Call::UpdateProject).await?;
        let mut data = self.inner.data.lock();
        let project = data
            .projects
            .get_mut(&id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        project.name.clone_from(&update.name);
        project.extent = update.extent;
        Ok(project.clone())
    }

    async fn list_project_layers(
        &self,
        project: ProjectId,
    ) -> RemoteResult<Vec<ProjectLayerRecord>> {
        self.enter(Call::ListProjectLayers).await?;
        self.project(project)
            .map(|p| p.project_layers)
            .ok_or_else(|| RemoteError::NotFound(project.to_string()))
    }

    async fn create_project_layer(
        &self,
        request: &NewProjectLayer,
    ) -> RemoteResult<ProjectLayerRecord> {
        self.enter(Call::CreateProjectLayer).await?;
        let mut data = self.inner.data.lock();
        if !data.projects.contains_key(&request.project) {
            return Err(RemoteError::NotFound(request.project.to_string()));
        }
        let layer = match (request.layer_id, request.basemap) {
            (Some(layer), None) => {
                let record = data
                    .layers
                    .get(&layer)
                    .ok_or_else(|| RemoteError::NotFound(layer.to_string()))?;
                Some(LayerSummary {
                    id: layer,
                    name: record.name.clone(),
                })
            }
            (None, Some(_)) => None,
            _ => {
                return Err(RemoteError::Rejected(
                    "exactly one of layer_id or basemap is required".into(),
                ))
            }
        };

        let id = ProjectLayerId::new(data.next_id());
        let record = ProjectLayerRecord {
            id,
            project: request.project,
            layer,
            basemap: request.basemap,
            visible: request.visible,
            style: request.style,
        };
        if let Some(project) = data.projects.get_mut(&request.project) {
            project.project_layers.push(record.clone());
        }
        Ok(record)
    }

    async fn update_project_layer(
        &self,
        id: ProjectLayerId,
        update: &ProjectLayerUpdate,
    ) -> RemoteResult<ProjectLayerRecord> {
        self.enter(Call::UpdateProjectLayer).await?;
        let mut data = self.inner.data.lock();
        let (project, index) = data.locate_entry(id)?;
        let entry = &mut project.project_layers[index];
        if let Some(style) = update.style {
            entry.style = Some(style);
        }
        if let Some(visible) = update.visible {
            entry.visible = visible;
        }
        Ok(entry.clone())
    }

    async fn delete_project_layer(&self, id: ProjectLayerId) -> RemoteResult<()> {
        self.enter(Call::DeleteProjectLayer).await?;
        let mut data = self.inner.data.lock();
        let (project, index) = data.locate_entry(id)?;
        project.project_layers.remove(index);
        Ok(())
    }

    async fn move_project_layer_up(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<Vec<ProjectLayerId>> {
        self.enter(Call::MoveUp).await?;
        let mut data = self.inner.data.lock();
        let (project, index) = data.locate_entry_in(project, id)?;
        if index + 1 < project.project_layers.len() {
            project.project_layers.swap(index, index + 1);
        }
        Ok(project.project_layers.iter().map(|e| e.id).collect())
    }

    async fn move_project_layer_down(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<Vec<ProjectLayerId>> {
        self.enter(Call::MoveDown).await?;
        let mut data = self.inner.data.lock();
        let (project, index) = data.locate_entry_in(project, id)?;
        if index > 0 {
            project.project_layers.swap(index, index - 1);
        }
        Ok(project.project_layers.iter().map(|e| e.id).collect())
    }
}
