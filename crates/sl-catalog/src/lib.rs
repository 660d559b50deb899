//! SpatialLab catalog
//!
//! Client-side mirror of the user's directory/layer hierarchy:
//! - [`CatalogTree`]: arena of directories and layers with parent/child index
//! - [`tree`]: pure operations returning new snapshots
//! - [`MoveValidator`]: rejects moves that would create a cycle
//! - [`CatalogStore`]: optimistic mutations against a [`CatalogRemote`](sl_remote::CatalogRemote)
//!   with reconciliation, rollback and cancellation
//!
//! # Example
//!
//! ```rust,ignore
//! use sl_catalog::CatalogStore;
//!
//! let store = CatalogStore::new(remote);
//! store.load().await?;
//! let id = store.create_directory("Surveys", None).await?;
//! store.move_directory(id, Some(parent)).await?;
//! ```

#![warn(unreachable_pub)]

pub mod command;
pub mod error;
pub mod events;
pub mod model;
pub mod store;
pub mod tree;
pub mod validator;

pub use command::CatalogCommand;
pub use error::{CatalogError, TreeError};
pub use events::CatalogEvent;
pub use model::{CatalogTree, DirectoryNode, LayerRef, NodeRef};
pub use store::{CatalogOptions, CatalogStore};
pub use tree::Subtree;
pub use validator::{MoveRejection, MoveValidator};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the catalog
    pub use crate::{
        CatalogError, CatalogEvent, CatalogOptions, CatalogStore, CatalogTree, MoveValidator,
        NodeRef,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
