//! Tree documents and the denormalized tree view.
//!
//! A [`Tree`] is exactly what the `trees` collection stores: scalar fields
//! plus two foreign keys. A [`TreeView`] is that document with its key and
//! the species/sector those keys resolved to at join time.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::geo::Coordinates;
use crate::identity::{SectorId, SpeciesId, TreeId};
use crate::sector::Sector;
use crate::species::Species;

/// Raw tree document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tree {
    #[serde(
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub species_id: Option<SpeciesId>,
    #[serde(
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub sector_id: Option<SectorId>,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<String>,
    /// Soft-deletion stamp. Trees carrying one are still delivered; hiding
    /// them is a presentation concern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_date: Option<String>,
    /// Trunk diameter in centimeters.
    #[serde(
        deserialize_with = "number_or_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub diameter: Option<f64>,
    #[serde(
        deserialize_with = "number_or_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        deserialize_with = "number_or_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Tree {
    /// Decodes a stored tree field by field.
    ///
    /// Fields that do not fit the model are dropped instead of the whole
    /// document; the second value lists what was dropped and why. A document
    /// that is not an object decodes as an empty tree.
    pub fn from_document(value: &Value) -> (Self, Option<String>) {
        let whole_error = match Tree::deserialize(value) {
            Ok(tree) => return (tree, None),
            Err(err) => err,
        };
        let Value::Object(fields) = value else {
            return (Tree::default(), Some(whole_error.to_string()));
        };

        let mut kept = Map::new();
        let mut dropped = Vec::new();
        for (field, raw) in fields {
            let single: Map<String, Value> = [(field.clone(), raw.clone())].into_iter().collect();
            match Tree::deserialize(&Value::Object(single)) {
                Ok(_) => {
                    kept.insert(field.clone(), raw.clone());
                }
                Err(err) => dropped.push(format!("`{field}` dropped: {err}")),
            }
        }
        let tree = Tree::deserialize(&Value::Object(kept)).unwrap_or_default();
        (tree, Some(dropped.join("; ")))
    }

    /// Position, if both coordinates are present and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Coordinates::new(lat, lng).ok(),
            _ => None,
        }
    }
}

/// Older clients wrote `""` for "not chosen"; treat it as absent.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<String>,
    T::Error: std::fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => T::try_from(s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Numbers may have been written as text by older forms (`"30"`, `"42,5"`).
fn number_or_text<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => {
            let normalized = text.trim().replace(',', ".");
            if normalized.is_empty() {
                return Ok(None);
            }
            normalized
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("`{text}` is not a number")))
        }
    }
}

/// A tree with its key and resolved foreign keys.
///
/// `species`/`sector` are `None` when the key is missing or did not resolve
/// in the snapshot the view was built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeView {
    pub id: TreeId,
    #[serde(flatten)]
    pub tree: Tree,
    pub species: Option<Species>,
    pub sector: Option<Sector>,
}

impl TreeView {
    pub fn new(id: TreeId, tree: Tree, species: Option<Species>, sector: Option<Sector>) -> Self {
        Self {
            id,
            tree,
            species,
            sector,
        }
    }

    pub fn species_id(&self) -> Option<&SpeciesId> {
        self.tree.species_id.as_ref()
    }

    pub fn sector_id(&self) -> Option<&SectorId> {
        self.tree.sector_id.as_ref()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.tree.coordinates()
    }

    /// Label for lists and marker titles: species common name, else code.
    pub fn display_name(&self) -> &str {
        match &self.species {
            Some(species) if !species.common_name.is_empty() => &species.common_name,
            _ => &self.tree.code,
        }
    }
}
