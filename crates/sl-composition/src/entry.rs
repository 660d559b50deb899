//! Project layer entries
//!
//! One [`ProjectLayerEntry`] per row of a project's layer stack. Entries
//! keep their identity across reorderings; position lives in the owning
//! sequence, not in the entry.

use crate::error::CompositionError;
use sl_remote::{BasemapKind, LayerId, LayerSummary, ProjectLayerId, ProjectLayerRecord, StyleOptions};
use std::fmt;

/// What an entry draws
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LayerSource {
    /// A catalog layer's features
    DataLayer {
        /// Catalog layer
        layer: LayerId,
        /// Layer name at the time it was added
        name: String,
    },
    /// Background tiles
    Basemap(BasemapKind),
}

impl LayerSource {
    /// Data layer source
    #[inline]
    #[must_use]
    pub fn data(layer: LayerId, name: impl Into<String>) -> Self {
        Self::DataLayer {
            layer,
            name: name.into(),
        }
    }

    /// Whether a [`StyleOptions`] applies to this source
    #[inline]
    #[must_use]
    pub fn is_stylable(&self) -> bool {
        matches!(self, Self::DataLayer { .. })
    }

    /// Catalog layer, if any
    #[must_use]
    pub fn layer(&self) -> Option<LayerId> {
        match self {
            Self::DataLayer { layer, .. } => Some(*layer),
            Self::Basemap(_) => None,
        }
    }

    /// Name shown in the layer panel
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::DataLayer { name, .. } => name,
            Self::Basemap(kind) => kind.display_name(),
        }
    }
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A layer placed on a project map
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLayerEntry {
    pub(crate) id: ProjectLayerId,
    pub(crate) source: LayerSource,
    pub(crate) visible: bool,
    pub(crate) style: Option<StyleOptions>,
}

impl ProjectLayerEntry {
    /// New visible entry
    #[must_use]
    pub fn new(id: ProjectLayerId, source: LayerSource, style: Option<StyleOptions>) -> Self {
        Self {
            id,
            source,
            visible: true,
            style,
        }
    }

    /// Identifier (distinct from the catalog layer id)
    #[inline]
    #[must_use]
    pub fn id(&self) -> ProjectLayerId {
        self.id
    }

    /// What the entry draws
    #[inline]
    #[must_use]
    pub fn source(&self) -> &LayerSource {
        &self.source
    }

    /// Whether the entry is drawn
    #[inline]
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Current style; always `None` for basemaps
    #[inline]
    #[must_use]
    pub fn style(&self) -> Option<&StyleOptions> {
        self.style.as_ref()
    }
}

impl TryFrom<ProjectLayerRecord> for ProjectLayerEntry {
    type Error = CompositionError;

    fn try_from(record: ProjectLayerRecord) -> Result<Self, Self::Error> {
        let source = match (record.layer, record.basemap) {
            (Some(LayerSummary { id, name }), None) => LayerSource::DataLayer { layer: id, name },
            (None, Some(kind)) => LayerSource::Basemap(kind),
            _ => {
                return Err(CompositionError::ValidationFailure(format!(
                    "{} must reference exactly one of a layer or a basemap",
                    record.id
                )))
            }
        };
        let style = if source.is_stylable() { record.style } else { None };
        Ok(Self {
            id: record.id,
            source,
            visible: record.visible,
            style,
        })
    }
}
