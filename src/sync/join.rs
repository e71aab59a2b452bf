//! The denormalizing join.

use crate::core::{Sector, SectorId, Species, SpeciesId, TreeView};

use super::tables::{LookupTable, TreeTable};

/// One view per raw tree, in the trees table's order.
///
/// Foreign keys that are missing or do not resolve in the current tables
/// yield `None`. Nothing is sorted, filtered or deduplicated here.
pub fn denormalize(
    trees: &TreeTable,
    species: &LookupTable<SpeciesId, Species>,
    sectors: &LookupTable<SectorId, Sector>,
) -> Vec<TreeView> {
    trees
        .rows()
        .iter()
        .map(|(id, tree)| {
            let embedded_species = tree
                .species_id
                .as_ref()
                .and_then(|key| species.get(key))
                .cloned();
            let embedded_sector = tree
                .sector_id
                .as_ref()
                .and_then(|key| sectors.get(key))
                .cloned();
            TreeView::new(id.clone(), tree.clone(), embedded_species, embedded_sector)
        })
        .collect()
}
