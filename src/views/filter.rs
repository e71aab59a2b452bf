//! Species filter for the tree list.

use crate::core::{SpeciesId, TreeView};

/// `None` lets every tree through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpeciesFilter(Option<String>);

impl SpeciesFilter {
    pub fn all() -> Self {
        Self(None)
    }

    pub fn only(species: &SpeciesId) -> Self {
        Self(Some(species.as_str().to_string()))
    }

    /// From a picker value, where the empty string means "all species".
    pub fn from_selection(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Self::all()
        } else {
            Self(Some(raw.to_string()))
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn matches(&self, tree: &TreeView) -> bool {
        match &self.0 {
            None => true,
            Some(wanted) => tree.species_id().map(SpeciesId::as_str) == Some(wanted.as_str()),
        }
    }

    /// Matching trees, order preserved.
    pub fn apply<'a>(&self, trees: &'a [TreeView]) -> Vec<&'a TreeView> {
        trees.iter().filter(|tree| self.matches(tree)).collect()
    }
}
