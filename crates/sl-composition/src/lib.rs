//! SpatialLab map composition
//!
//! The ordered, styled layer stack of a map project.
//!
//! # Core Concepts
//!
//! - [`ProjectLayerEntry`]: a data layer or basemap placed on a project,
//!   with its own visibility and style
//! - [`MapComposition`]: owns the stack, talks to a
//!   [`ProjectRemote`](sl_remote::ProjectRemote) and redraws through a
//!   [`Renderer`] after every change
//! - Draw order: index 0 is the bottom of the stack
//!
//! # Example
//!
//! ```rust,ignore
//! use sl_composition::{LayerSource, MapComposition};
//!
//! let map = MapComposition::new(remote, renderer);
//! map.load(project).await?;
//! let entry = map.add(LayerSource::data(layer, "Parcels"), None).await?;
//! map.move_down(entry.id()).await?;
//! ```

#![warn(unreachable_pub)]

pub mod engine;
pub mod entry;
pub mod error;
pub mod events;
pub mod render;

pub use engine::{CompositionOptions, MapComposition};
pub use entry::{LayerSource, ProjectLayerEntry};
pub use error::CompositionError;
pub use events::CompositionEvent;
pub use render::{FeatureHit, MapPoint, RenderLayer, Renderer};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with map composition
    pub use crate::{
        CompositionError, CompositionEvent, LayerSource, MapComposition, ProjectLayerEntry,
        Renderer,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
