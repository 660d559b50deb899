//! SpatialLab remote collaborator
//!
//! Shared vocabulary between the client stores and the GIS service.
//!
//! # Core Concepts
//!
//! - Identifiers ([`DirectoryId`], [`LayerId`], [`ProjectId`], [`ProjectLayerId`])
//!   with a provisional range for optimistic records
//! - Flat wire records ([`DirectoryRecord`], [`LayerRecord`], [`ProjectLayerRecord`])
//! - [`StyleOptions`] and [`Color`] for vector layer styling
//! - [`CatalogRemote`] / [`ProjectRemote`]: the async contracts the stores call
//! - [`HttpRemote`]: reqwest implementation of both contracts
//! - [`CancelScope`]: drops late responses once their scope is gone
//!
//! # Example
//!
//! ```rust,ignore
//! use sl_remote::{CatalogRemote, HttpRemote, RemoteConfig};
//!
//! let remote = HttpRemote::new(&RemoteConfig::new("https://gis.example.com"))?;
//! let directories = remote.list_directories().await?;
//! ```

#![warn(unreachable_pub)]

mod api;
mod config;
mod error;
mod http;
mod ids;
mod records;
mod scope;
mod style;

pub use api::{CatalogRemote, ProjectRemote, RemoteResult};
pub use config::RemoteConfig;
pub use error::RemoteError;
pub use http::HttpRemote;
pub use ids::{DirectoryId, LayerId, ProjectId, ProjectLayerId, PROVISIONAL_BASE};
pub use records::{
    BasemapKind, CascadePolicy, DirectoryRecord, DirectoryUpdate, Extent, LayerListing,
    LayerRecord, LayerSummary, LayerUpdate, NewDirectory, NewProjectLayer, ProjectLayerRecord,
    ProjectLayerUpdate, ProjectRecord, ProjectUpdate,
};
pub use scope::{CancelScope, CancelToken};
pub use style::{Color, StyleError, StyleOptions};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
