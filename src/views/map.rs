//! Map markers and the initial viewport.

use crate::config::MapConfig;
use crate::core::{Coordinates, TreeId, TreeView};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapViewport {
    pub center: Coordinates,
    pub zoom: u8,
}

impl MapViewport {
    /// Falls back to the default center when the configured one is out of
    /// range.
    pub fn from_config(config: &MapConfig) -> Self {
        let defaults = MapConfig::default();
        let center = Coordinates::new(config.center_latitude, config.center_longitude)
            .or_else(|err| {
                tracing::warn!("map center ignored: {err}");
                Coordinates::new(defaults.center_latitude, defaults.center_longitude)
            })
            .unwrap_or(Coordinates {
                latitude: defaults.center_latitude,
                longitude: defaults.center_longitude,
            });
        Self {
            center,
            zoom: config.zoom,
        }
    }
}

impl Default for MapViewport {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

/// One pin with its popup content.
#[derive(Clone, Debug, PartialEq)]
pub struct MapMarker {
    pub tree: TreeId,
    pub position: Coordinates,
    /// Species common name, else the tree code.
    pub title: String,
    pub subtitle: Option<String>,
    /// Tree photo, else the species image.
    pub image_url: Option<String>,
    pub color: Option<String>,
}

impl MapMarker {
    /// `None` for trees without a usable position.
    pub fn from_view(view: &TreeView) -> Option<Self> {
        let position = view.coordinates()?;
        let species = view.species.as_ref();
        Some(Self {
            tree: view.id.clone(),
            position,
            title: view.display_name().to_string(),
            subtitle: species.and_then(|s| s.scientific_name.clone()),
            image_url: view
                .tree
                .image_url
                .clone()
                .or_else(|| species.and_then(|s| s.image_url.clone())),
            color: species.and_then(|s| s.color.clone()),
        })
    }
}

pub fn markers(trees: &[TreeView]) -> Vec<MapMarker> {
    trees.iter().filter_map(MapMarker::from_view).collect()
}
