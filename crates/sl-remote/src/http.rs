//! reqwest-backed implementation of the remote contracts
//!
//! Endpoint layout follows the GIS service REST API (`/gis/...`, trailing
//! slashes included).

use crate::api::{CatalogRemote, ProjectRemote, RemoteResult};
use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::ids::{DirectoryId, LayerId, ProjectId, ProjectLayerId};
use crate::records::{
    CascadePolicy, DirectoryRecord, DirectoryUpdate, LayerListing, LayerRecord, LayerUpdate,
    NewDirectory, NewProjectLayer, ProjectLayerRecord, ProjectLayerUpdate, ProjectRecord,
    ProjectUpdate,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Longest response body kept in [`RemoteError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Body of the move endpoints; the service may answer without one
#[derive(Debug, Deserialize)]
struct MoveResponse {
    #[serde(default)]
    order: Option<Vec<ProjectLayerId>>,
}

/// Which way an entry swaps in draw order
///
/// The service numbers its list top first, so its `move-up` swaps toward
/// index 0 of the stack (the bottom) and `move-down` toward the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Swap {
    TowardTop,
    TowardBottom,
}

impl Swap {
    fn path(self, id: ProjectLayerId) -> String {
        let endpoint = match self {
            Self::TowardTop => "move-down",
            Self::TowardBottom => "move-up",
        };
        format!("/gis/project-layer/{}/{endpoint}/", id.get())
    }
}

/// Order carried by a move response body, if it has a usable one
fn decode_order(body: &[u8]) -> Option<Vec<ProjectLayerId>> {
    serde_json::from_slice::<MoveResponse>(body)
        .ok()
        .and_then(|response| response.order)
}

/// HTTP client for the GIS service
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpRemote {
    /// Build a client from configuration
    ///
    /// # Errors
    /// Returns [`RemoteError::Transport`] if the TLS backend cannot be initialised.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Absolute URL for an API path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "remote request");
        let builder = self.client.request(method, self.url(path));
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> RemoteResult<T> {
        let response = Self::check(builder.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn send_empty(builder: RequestBuilder) -> RemoteResult<()> {
        Self::check(builder.send().await?).await.map(drop)
    }

    /// Post a swap; without an order in the body, list the project instead
    async fn swap(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
        swap: Swap,
    ) -> RemoteResult<Vec<ProjectLayerId>> {
        let response = Self::check(self.request(Method::POST, &swap.path(id)).send().await?).await?;
        let body = response.bytes().await?;
        if let Some(order) = decode_order(&body) {
            return Ok(order);
        }
        tracing::debug!(%id, %project, "move acknowledged without an order; listing");
        let records = self.list_project_layers(project).await?;
        Ok(records.into_iter().map(|record| record.id).collect())
    }

    async fn check(response: Response) -> RemoteResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        truncate_utf8(&mut body, MAX_ERROR_BODY);
        tracing::warn!(status = status.as_u16(), "remote call failed");

        if status == StatusCode::NOT_FOUND {
            Err(RemoteError::NotFound(body))
        } else {
            Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[async_trait]
impl CatalogRemote for HttpRemote {
    async fn list_directories(&self) -> RemoteResult<Vec<DirectoryRecord>> {
        Self::send_json(self.request(Method::GET, "/gis/directories/")).await
    }

    async fn create_directory(&self, request: &NewDirectory) -> RemoteResult<DirectoryRecord> {
        Self::send_json(self.request(Method::POST, "/gis/directories/").json(request)).await
    }

    async fn update_directory(
        &self,
        id: DirectoryId,
        update: &DirectoryUpdate,
    ) -> RemoteResult<DirectoryRecord> {
        let path = format!("/gis/directories/{}/", id.get());
        Self::send_json(self.request(Method::PUT, &path).json(update)).await
    }

    async fn delete_directory(&self, id: DirectoryId, policy: CascadePolicy) -> RemoteResult<()> {
        let path = format!("/gis/directories/{}/", id.get());
        let builder = self
            .request(Method::DELETE, &path)
            .query(&[("cascade", policy.as_str())]);
        Self::send_empty(builder).await
    }

    async fn list_layers(&self) -> RemoteResult<LayerListing> {
        Self::send_json(self.request(Method::GET, "/gis/layers/")).await
    }

    async fn update_layer(&self, id: LayerId, update: &LayerUpdate) -> RemoteResult<LayerRecord> {
        let path = format!("/gis/layer/{}/", id.get());
        Self::send_json(self.request(Method::PUT, &path).json(update)).await
    }

    async fn delete_layer(&self, id: LayerId) -> RemoteResult<()> {
        let path = format!("/gis/layer/{}/", id.get());
        Self::send_empty(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl ProjectRemote for HttpRemote {
    async fn get_project(&self, id: ProjectId) -> RemoteResult<ProjectRecord> {
        let path = format!("/gis/projects/{}/", id.get());
        Self::send_json(self.request(Method::GET, &path)).await
    }

    async fn update_project(
        &self,
        id: ProjectId,
        update: &ProjectUpdate,
    ) -> RemoteResult<ProjectRecord> {
        let path = format!("/gis/projects/{}/", id.get());
        Self::send_json(self.request(Method::PUT, &path).json(update)).await
    }

    async fn list_project_layers(
        &self,
        project: ProjectId,
    ) -> RemoteResult<Vec<ProjectLayerRecord>> {
        let builder = self
            .request(Method::GET, "/gis/project-layers/")
            .query(&[("project", project.get())]);
        Self::send_json(builder).await
    }

    async fn create_project_layer(
        &self,
        request: &NewProjectLayer,
    ) -> RemoteResult<ProjectLayerRecord> {
        Self::send_json(self.request(Method::POST, "/gis/project-layers/").json(request)).await
    }

    async fn update_project_layer(
        &self,
        id: ProjectLayerId,
        update: &ProjectLayerUpdate,
    ) -> RemoteResult<ProjectLayerRecord> {
        let path = format!("/gis/project-layers/{}/", id.get());
        Self::send_json(self.request(Method::PATCH, &path).json(update)).await
    }

    async fn delete_project_layer(&self, id: ProjectLayerId) -> RemoteResult<()> {
        let path = format!("/gis/project-layers/{}/", id.get());
        Self::send_empty(self.request(Method::DELETE, &path)).await
    }

    async fn move_project_layer_up(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<Vec<ProjectLayerId>> {
        self.swap(project, id, Swap::TowardTop).await
    }

    async fn move_project_layer_down(
        &self,
        project: ProjectId,
        id: ProjectLayerId,
    ) -> RemoteResult<Vec<ProjectLayerId>> {
        self.swap(project, id, Swap::TowardBottom).await
    }
}
