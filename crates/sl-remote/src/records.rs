//! Wire records exchanged with the GIS service
//!
//! Directory and layer records are flat: the hierarchy is carried by
//! `parent` / `directory` references and rebuilt client-side.

use crate::ids::{DirectoryId, LayerId, ProjectId, ProjectLayerId};
use crate::style::StyleOptions;
use serde::{Deserialize, Serialize};

/// Canonical directory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Server id
    pub id: DirectoryId,
    /// Display name
    pub name: String,
    /// Parent directory, `None` for the home root
    #[serde(default)]
    pub parent: Option<DirectoryId>,
}

impl DirectoryRecord {
    /// Create record
    #[inline]
    pub fn new(id: DirectoryId, name: impl Into<String>, parent: Option<DirectoryId>) -> Self {
        Self {
            id,
            name: name.into(),
            parent,
        }
    }
}

/// Canonical layer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Server id
    pub id: LayerId,
    /// Display name
    pub name: String,
    /// Owning directory, `None` when ungrouped
    #[serde(default)]
    pub directory: Option<DirectoryId>,
}

impl LayerRecord {
    /// Create record
    #[inline]
    pub fn new(id: LayerId, name: impl Into<String>, directory: Option<DirectoryId>) -> Self {
        Self {
            id,
            name: name.into(),
            directory,
        }
    }
}

/// Result of the layer list endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerListing {
    /// Layers with no directory
    #[serde(default)]
    pub ungrouped: Vec<LayerRecord>,
    /// Layers filed under some directory
    #[serde(default)]
    pub grouped: Vec<LayerRecord>,
}

impl LayerListing {
    /// All layers, ungrouped first
    pub fn into_all(self) -> impl Iterator<Item = LayerRecord> {
        self.ungrouped.into_iter().chain(self.grouped)
    }
}

/// Create-directory request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDirectory {
    /// Requested name
    pub name: String,
    /// Requested parent
    pub parent: Option<DirectoryId>,
}

/// Full directory update (name and placement)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryUpdate {
    /// New name
    pub name: String,
    /// New parent
    pub parent: Option<DirectoryId>,
}

/// Full layer update (name and placement)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerUpdate {
    /// New name
    pub name: String,
    /// New directory
    pub directory: Option<DirectoryId>,
}

/// What happens to the contents of a deleted directory
///
/// The same policy is applied locally and sent to the remote so both sides
/// cascade identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Sub-directories and their layers are deleted with the directory
    #[default]
    DeleteContents,
    /// Sub-directories are deleted, every layer in the subtree moves to home
    DetachLayers,
}

impl CascadePolicy {
    /// Query-string value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeleteContents => "delete_contents",
            Self::DetachLayers => "detach_layers",
        }
    }
}

/// Basemap backgrounds a project can include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BasemapKind {
    /// OpenStreetMap raster tiles
    #[serde(rename = "osm")]
    OpenStreetMap,
}

impl BasemapKind {
    /// Human-readable name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "Open Street Map",
        }
    }
}

/// Map extent `[min_x, min_y, max_x, max_y]` in map units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    /// West edge
    pub min_x: f64,
    /// South edge
    pub min_y: f64,
    /// East edge
    pub max_x: f64,
    /// North edge
    pub max_y: f64,
}

impl Extent {
    /// Create extent
    #[inline]
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Whether the extent encloses a positive area
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }
}

impl From<[f64; 4]> for Extent {
    fn from([min_x, min_y, max_x, max_y]: [f64; 4]) -> Self {
        Self::new(min_x, min_y, max_x, max_y)
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.min_x, e.min_y, e.max_x, e.max_y]
    }
}

/// Layer summary embedded in a project layer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    /// Layer id
    pub id: LayerId,
    /// Layer name
    pub name: String,
}

/// Canonical project layer record
///
/// Exactly one of `layer` / `basemap` is set on a well-formed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectLayerRecord {
    /// Entry id
    pub id: ProjectLayerId,
    /// Owning project
    pub project: ProjectId,
    /// Data layer, if this entry wraps one
    #[serde(default)]
    pub layer: Option<LayerSummary>,
    /// Basemap, if this entry wraps one
    #[serde(default)]
    pub basemap: Option<BasemapKind>,
    /// Visibility flag
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Persisted style
    #[serde(default)]
    pub style: Option<StyleOptions>,
}

fn default_visible() -> bool {
    true
}

/// Project with its ordered layer stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Project id
    pub id: ProjectId,
    /// Project name
    pub name: String,
    /// Saved viewport
    #[serde(default)]
    pub extent: Option<Extent>,
    /// Entries bottom to top
    #[serde(default)]
    pub project_layers: Vec<ProjectLayerRecord>,
}

/// Project update request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectUpdate {
    /// Project name
    pub name: String,
    /// Saved viewport
    pub extent: Option<Extent>,
}

/// Create-project-layer request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProjectLayer {
    /// Target project
    pub project: ProjectId,
    /// Data layer to wrap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<LayerId>,
    /// Basemap to wrap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basemap: Option<BasemapKind>,
    /// Initial visibility
    pub visible: bool,
    /// Initial style
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleOptions>,
}

/// Partial project layer update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectLayerUpdate {
    /// New style
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleOptions>,
    /// New visibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Catalog directory the entry is filed under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<DirectoryId>,
}

impl ProjectLayerUpdate {
    /// Style-only update
    #[must_use]
    pub fn style(style: StyleOptions) -> Self {
        Self {
            style: Some(style),
            ..Self::default()
        }
    }

    /// Visibility-only update
    #[must_use]
    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_layer_update_skips_absent_fields() {
        let json = serde_json::to_value(ProjectLayerUpdate::visible(false)).unwrap();
        assert_eq!(json, serde_json::json!({ "visible": false }));
    }

    #[test]
    fn project_record_decodes_basemap_entry() {
        let raw = r#"{
            "id": 3,
            "name": "Coastline",
            "extent": [0.0, 1.0, 10.0, 11.0],
            "project_layers": [
                { "id": 10, "project": 3, "basemap": "osm", "visible": true },
                { "id": 11, "project": 3, "layer": { "id": 5, "name": "rivers" } }
            ]
        }"#;
        let project: ProjectRecord = serde_json::from_str(raw).unwrap();

        assert_eq!(project.extent, Some(Extent::new(0.0, 1.0, 10.0, 11.0)));
        assert_eq!(project.project_layers[0].basemap, Some(BasemapKind::OpenStreetMap));
        assert!(project.project_layers[1].visible);
        assert_eq!(project.project_layers[1].layer.as_ref().unwrap().id, LayerId::new(5));
    }

    #[test]
    fn project_record_decodes_web_client_style() {
        let raw = r#"{
            "id": 4,
            "name": "Survey",
            "project_layers": [{
                "id": 12, "project": 4, "layer": { "id": 6, "name": "parcels" },
                "style": {"fillColor":"rgba(59, 130, 246, 0.2)","strokeColor":"rgba(59, 130, 246, 0.6)","lineWidth":1}
            }]
        }"#;
        let project: ProjectRecord = serde_json::from_str(raw).unwrap();

        assert_eq!(project.project_layers[0].style, Some(StyleOptions::DEFAULT));
    }

    #[test]
    fn extent_validity() {
        assert!(Extent::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Extent::new(1.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Extent::new(0.0, 0.0, f64::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn listing_chains_ungrouped_first() {
        let listing = LayerListing {
            ungrouped: vec![LayerRecord::new(LayerId::new(1), "a", None)],
            grouped: vec![LayerRecord::new(LayerId::new(2), "b", Some(DirectoryId::new(9)))],
        };
        let ids: Vec<_> = listing.into_all().map(|l| l.id).collect();
        assert_eq!(ids, vec![LayerId::new(1), LayerId::new(2)]);
    }
}
