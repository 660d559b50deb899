//! Seeded backends shared by the store tests

use crate::backend::InMemoryBackend;
use sl_remote::{
    BasemapKind, Color, DirectoryId, Extent, LayerId, ProjectId, ProjectLayerId, StyleOptions,
};

/// A valid extent for tests
pub const SAMPLE_EXTENT: Extent = Extent::new(-10.0, -5.0, 10.0, 5.0);

/// Ids of the catalog seeded by [`sample_catalog`]
///
/// ```text
/// home
/// ├── parcels/
/// │   ├── north/
/// │   │   └── wells
/// │   └── lots
/// ├── roads/
/// └── orphan        (ungrouped layer)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SampleCatalog {
    pub parcels: DirectoryId,
    pub north: DirectoryId,
    pub roads: DirectoryId,
    pub lots: LayerId,
    pub wells: LayerId,
    pub orphan: LayerId,
}

pub fn sample_catalog() -> (InMemoryBackend, SampleCatalog) {
    let backend = InMemoryBackend::new();
    let parcels = backend.add_directory("parcels", None);
    let north = backend.add_directory("north", Some(parcels));
    let roads = backend.add_directory("roads", None);
    let lots = backend.add_layer("lots", Some(parcels));
    let wells = backend.add_layer("wells", Some(north));
    let orphan = backend.add_layer("orphan", None);
    (
        backend,
        SampleCatalog {
            parcels,
            north,
            roads,
            lots,
            wells,
            orphan,
        },
    )
}

/// Ids of the project seeded by [`sample_project`]
///
/// Stack, bottom first: `osm` basemap, `rivers`, `parcels`, `rivers` again
/// (the same catalog layer placed twice).
#[derive(Debug, Clone, Copy)]
pub struct SampleProject {
    pub project: ProjectId,
    pub rivers: LayerId,
    pub parcels: LayerId,
    pub basemap: ProjectLayerId,
    pub rivers_entry: ProjectLayerId,
    pub parcels_entry: ProjectLayerId,
    pub rivers_again: ProjectLayerId,
}

pub fn sample_project() -> (InMemoryBackend, SampleProject) {
    let backend = InMemoryBackend::new();
    let rivers = backend.add_layer("rivers", None);
    let parcels = backend.add_layer("parcels", None);
    let project = backend.add_project("Watershed");
    let basemap = backend.add_project_layer(project, None, Some(BasemapKind::OpenStreetMap), None);
    let rivers_entry =
        backend.add_project_layer(project, Some(rivers), None, Some(StyleOptions::DEFAULT));
    let parcels_entry =
        backend.add_project_layer(project, Some(parcels), None, Some(StyleOptions::DEFAULT));
    let rivers_again =
        backend.add_project_layer(project, Some(rivers), None, Some(StyleOptions::DEFAULT));
    (
        backend,
        SampleProject {
            project,
            rivers,
            parcels,
            basemap,
            rivers_entry,
            parcels_entry,
            rivers_again,
        },
    )
}

/// Solid red style
pub fn red() -> StyleOptions {
    StyleOptions::solid(Color::rgb(255, 0, 0))
}
