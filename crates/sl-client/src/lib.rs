//! SpatialLab client
//!
//! Facade over the catalog store and the map composition:
//! - Reads a [`ClientConfig`] from TOML with environment overrides
//! - Installs the tracing subscriber
//! - Wires one remote into both stores through a [`Session`]
//!
//! # Example
//!
//! ```rust,ignore
//! use sl_client::{init_tracing, ClientConfig, Session};
//!
//! # async fn example(renderer: impl sl_composition::Renderer) -> anyhow::Result<()> {
//! let config = ClientConfig::load("spatiallab.toml")?;
//! init_tracing(&config.logging)?;
//!
//! let session = Session::connect(config, renderer)?;
//! session.open(project).await?;
//! session.catalog().create_directory("Surveys", None).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod session;
pub mod telemetry;

pub use config::{ClientConfig, ConfigError, LoggingConfig, ENV_ACCESS_TOKEN, ENV_API_URL};
pub use session::Session;
pub use telemetry::{init_tracing, ENV_LOG};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for SpatialLab clients
    pub use crate::{ClientConfig, Session};
    pub use sl_catalog::prelude::*;
    pub use sl_composition::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
