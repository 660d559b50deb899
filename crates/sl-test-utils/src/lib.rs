//! Testing utilities for the SpatialLab workspace
//!
//! In-memory remote, recording renderer and seeded fixtures.

#![allow(missing_docs)]

pub mod backend;
pub mod fixtures;
pub mod render;

pub use backend::{Call, InMemoryBackend};
pub use fixtures::{red, sample_catalog, sample_project, SampleCatalog, SampleProject, SAMPLE_EXTENT};
pub use render::{Frame, RecordingRenderer};
