//! Sector documents (`sectors` collection).

use serde::{Deserialize, Serialize};

use crate::geo::{GeoPoint, Polygon};

/// A named census sector with its boundary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sector {
    pub name: String,
    pub polygon: Polygon,
}

impl Sector {
    pub fn new(name: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            name: name.into(),
            polygon,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        self.polygon.contains(point)
    }
}
