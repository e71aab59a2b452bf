//! Species documents (`species` collection).

use serde::{Deserialize, Serialize};

/// A tree species as stored in the `species` collection.
///
/// The key lives outside the document; see [`crate::SpeciesId`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Species {
    pub common_name: String,
    pub scientific_name: Option<String>,
    /// Free-form foliage descriptor ("perenne", "caducifolio", ...).
    pub foliage: Option<String>,
    /// Display color used for markers and chips, as stored (usually `#rrggbb`).
    pub color: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Species {
    pub fn named(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            ..Self::default()
        }
    }
}
