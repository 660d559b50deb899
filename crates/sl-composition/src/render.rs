//! Renderer seam
//!
//! The composition engine never draws anything itself; it hands the full
//! ordered stack to a [`Renderer`] after every change.

use crate::entry::{LayerSource, ProjectLayerEntry};
use sl_remote::{Extent, ProjectLayerId, StyleOptions};

/// One layer as the renderer sees it, bottom of the stack first
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLayer {
    /// Entry the layer belongs to
    pub entry: ProjectLayerId,
    /// What to draw
    pub source: LayerSource,
    /// Hidden layers are passed along with `visible == false`
    pub visible: bool,
    /// Data layer style
    pub style: Option<StyleOptions>,
}

impl From<&ProjectLayerEntry> for RenderLayer {
    fn from(entry: &ProjectLayerEntry) -> Self {
        Self {
            entry: entry.id,
            source: entry.source.clone(),
            visible: entry.visible,
            style: entry.style,
        }
    }
}

/// Map coordinate in the project's CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPoint {
    /// Easting / longitude
    pub x: f64,
    /// Northing / latitude
    pub y: f64,
}

impl MapPoint {
    /// Create a point
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A feature under a picked point
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureHit {
    /// Entry the feature was drawn by
    pub entry: ProjectLayerId,
    /// Feature identifier within its layer
    pub feature: String,
}

/// Drawing backend
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Send + Sync {
    /// Redraw the whole stack
    fn draw(&self, layers: &[RenderLayer], extent: Option<Extent>);

    /// Features under `point`, topmost first
    fn pick(&self, point: MapPoint) -> Vec<FeatureHit>;
}
