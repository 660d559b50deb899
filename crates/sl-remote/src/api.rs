//! Remote collaborator contracts
//!
//! The stores only ever talk to the service through these traits. The HTTP
//! implementation lives in [`crate::http`]; tests use an in-memory backend.

use crate::error::RemoteError;
use crate::ids::{DirectoryId, LayerId, ProjectId, ProjectLayerId};
use crate::records::{
    CascadePolicy, DirectoryRecord, DirectoryUpdate, LayerListing, LayerRecord, LayerUpdate,
    NewDirectory, NewProjectLayer, ProjectLayerRecord, ProjectLayerUpdate, ProjectRecord,
    ProjectUpdate,
};
use async_trait::async_trait;

/// Result alias for remote calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Directory and layer endpoints
#[async_trait]
pub trait CatalogRemote: Send + Sync {
    /// Every directory visible to the user, flat
    async fn list_directories(&self) -> RemoteResult<Vec<DirectoryRecord>>;

    /// Create a directory; returns the canonical record with its server id
    async fn create_directory(&self, request: &NewDirectory) -> RemoteResult<DirectoryRecord>;

    /// Rename and/or reparent a directory
    async fn update_directory(
        &self,
        id: DirectoryId,
        update: &DirectoryUpdate,
    ) -> RemoteResult<DirectoryRecord>;

    /// Delete a directory, cascading to its contents per `policy`
    async fn delete_directory(&self, id: DirectoryId, policy: CascadePolicy) -> RemoteResult<()>;

    /// Every layer, split into ungrouped and grouped sets
    async fn list_layers(&self) -> RemoteResult<LayerListing>;

    /// Rename and/or refile a layer
    async fn update_layer(&self, id: LayerId, update: &LayerUpdate) -> RemoteResult<LayerRecord>;

    /// Delete a layer
    async fn delete_layer(&self, id: LayerId) -> RemoteResult<()>;
}

/// Project and project-layer endpoints
#[async_trait]
pub trait ProjectRemote: Send + Sync {
    /// Project detail including its ordered layer stack
    async fn get_project(&self, id: ProjectId) -> RemoteResult<ProjectRecord>;

    /// Update project name and saved extent
    async fn update_project(
        &self,
        id: ProjectId,
        update: &ProjectUpdate,
    ) -> RemoteResult<ProjectRecord>;

    /// Ordered layer stack of a project, bottom to top
    async fn list_project_layers(&self, project: ProjectId)
        -> RemoteResult<Vec<ProjectLayerRecord>>;

    /// Append a data layer or basemap to a project
    async fn create_project_layer(
        &self,
        request: &NewProjectLayer,
    ) -> RemoteResult<ProjectLayerRecord>;

    /// Partially update an entry (style, visibility)
    async fn update_project_layer(
        &self,
        id: ProjectLayerId,
        update: &ProjectLayerUpdate,
    ) -> RemoteResult<ProjectLayerRecord>;

    /// Remove an entry from its project
    async fn delete_project_layer(&self, id: ProjectLayerId) -> RemoteResult<()>;

    /// Swap the entry with the one drawn above it (toward the end of the
    /// stack); returns the resulting order of `project`
    async fn move_project_layer_up(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<Vec<ProjectLayerId>>;

    /// Swap the entry with the one drawn below it (toward index 0); returns
    /// the resulting order of `project`
    async fn move_project_layer_down(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<Vec<ProjectLayerId>>;
}
