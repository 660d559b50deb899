//! Session wiring
//!
//! A [`Session`] owns one remote handle shared by the catalog store and
//! the map composition, built from a [`ClientConfig`].

use crate::config::ClientConfig;
use anyhow::Context;
use sl_catalog::CatalogStore;
use sl_composition::{MapComposition, Renderer};
use sl_remote::{CatalogRemote, HttpRemote, ProjectId, ProjectRemote};

/// Catalog and composition over one remote
#[derive(Debug)]
pub struct Session<R, V> {
    config: ClientConfig,
    catalog: CatalogStore<R>,
    composition: MapComposition<R, V>,
}

impl<V: Renderer> Session<HttpRemote, V> {
    /// Connect to the GIS service described by `config`
    ///
    /// # Errors
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn connect(config: ClientConfig, renderer: V) -> anyhow::Result<Self> {
        config.validate().context("refusing to connect")?;
        let remote = HttpRemote::new(&config.remote)
            .with_context(|| format!("building HTTP client for {}", config.remote.base_url))?;
        tracing::info!("Connecting to {}", config.remote.base_url);
        Ok(Self::with_remote(config, remote, renderer))
    }
}

impl<R, V> Session<R, V>
where
    R: CatalogRemote + ProjectRemote + Clone,
    V: Renderer,
{
    /// Session over an existing remote
    #[must_use]
    pub fn with_remote(config: ClientConfig, remote: R, renderer: V) -> Self {
        let catalog = CatalogStore::with_options(remote.clone(), config.catalog);
        let composition = MapComposition::with_options(remote, renderer, config.composition);
        Self {
            config,
            catalog,
            composition,
        }
    }

    /// Configuration the session was built from
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Catalog store
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &CatalogStore<R> {
        &self.catalog
    }

    /// Map composition
    #[inline]
    #[must_use]
    pub fn composition(&self) -> &MapComposition<R, V> {
        &self.composition
    }

    /// Load the catalog and open `project` concurrently
    ///
    /// # Errors
    /// Fails with context naming whichever side failed.
    pub async fn open(&self, project: ProjectId) -> anyhow::Result<()> {
        let (catalog, composition) = tokio::join!(self.catalog.load(), self.composition.load(project));
        catalog.context("loading catalog")?;
        composition.with_context(|| format!("opening {project}"))?;
        Ok(())
    }

    /// Drop pending results on both sides and reload from the remote
    ///
    /// # Errors
    /// Fails with context naming whichever reload failed.
    pub async fn resync(&self) -> anyhow::Result<()> {
        self.catalog.cancel_pending();
        self.composition.cancel_pending();
        self.catalog.refresh().await.context("reloading catalog")?;
        if let Some(project) = self.composition.project() {
            self.composition
                .load(project)
                .await
                .with_context(|| format!("reloading {project}"))?;
        }
        Ok(())
    }

    /// Tear down both stores
    pub fn close(&self) {
        self.catalog.dispose();
        self.composition.dispose();
        tracing::info!("Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use sl_remote::RemoteConfig;
    use sl_test_utils::{sample_project, Call, InMemoryBackend, RecordingRenderer};

    #[test]
    fn connect_rejects_invalid_config() {
        let config = ClientConfig::new().with_remote(RemoteConfig::new("not a url"));
        let err = Session::connect(config, RecordingRenderer::new()).unwrap_err();
        assert!(format!("{err:#}").contains("base_url"));
    }

    #[test]
    fn connect_builds_http_session() {
        let config = ClientConfig::new().with_remote(RemoteConfig::new("https://gis.example.com"));
        let session = Session::connect(config, RecordingRenderer::new()).unwrap();
        assert_eq!(
            session.catalog().remote().url("/gis/directories/"),
            "https://gis.example.com/gis/directories/"
        );
    }

    #[tokio::test]
    async fn open_loads_both_sides_from_one_remote() {
        let (backend, ids) = sample_project();
        let folder = backend.add_directory("rivers", None);
        let session = Session::with_remote(ClientConfig::default(), backend.clone(), RecordingRenderer::new());

        session.open(ids.project).await.unwrap();

        assert!(session.catalog().snapshot().directory(folder).is_some());
        assert_eq!(session.composition().entries().len(), 4);
        assert_eq!(backend.call_count(Call::GetProject), 1);
    }

    #[tokio::test]
    async fn open_reports_failing_side() {
        let (backend, ids) = sample_project();
        backend.fail_next(Call::ListLayers, sl_remote::RemoteError::Timeout);
        let session = Session::with_remote(ClientConfig::default(), backend, RecordingRenderer::new());

        let err = session.open(ids.project).await.unwrap_err();
        assert!(format!("{err:#}").starts_with("loading catalog"));
    }

    #[tokio::test]
    async fn resync_and_close() {
        let (backend, ids) = sample_project();
        let session: Session<InMemoryBackend, _> =
            Session::with_remote(ClientConfig::default(), backend.clone(), RecordingRenderer::new());
        session.open(ids.project).await.unwrap();

        backend.add_layer("late arrival", None);
        session.resync().await.unwrap();
        assert_eq!(session.catalog().home_layers().len(), 3);

        session.close();
        assert!(session.catalog().is_disposed());
        assert!(session.composition().is_disposed());
    }
}
