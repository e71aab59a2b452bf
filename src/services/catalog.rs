//! One-shot species/sector load for populating forms.

use crate::core::{CoreError, Coordinates, Sector, SectorId, Species, SpeciesId};
use crate::store::{Collection, DocumentStore};

/// Species and sectors as read once, in store order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    species: Vec<(SpeciesId, Species)>,
    sectors: Vec<(SectorId, Sector)>,
}

impl Catalog {
    pub fn load(store: &dyn DocumentStore) -> crate::Result<Self> {
        let species = read_decoded(store, Collection::Species)?;
        let sectors = read_decoded(store, Collection::Sectors)?;
        tracing::debug!(
            species = species.len(),
            sectors = sectors.len(),
            "catalog loaded"
        );
        Ok(Self { species, sectors })
    }

    pub fn species(&self) -> &[(SpeciesId, Species)] {
        &self.species
    }

    pub fn sectors(&self) -> &[(SectorId, Sector)] {
        &self.sectors
    }

    pub fn species_by_id(&self, id: &SpeciesId) -> Option<&Species> {
        self.species.iter().find(|(key, _)| key == id).map(|(_, s)| s)
    }

    /// First sector whose polygon contains `position`.
    pub fn sector_at(&self, position: Coordinates) -> Option<&SectorId> {
        locate_sector(&self.sectors, position)
    }
}

pub(crate) fn read_decoded<K, T>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> crate::Result<Vec<(K, T)>>
where
    K: TryFrom<String, Error = CoreError>,
    T: serde::de::DeserializeOwned,
{
    let snapshot = store.read_once(collection)?;
    let decoded = snapshot.decode_each(collection.as_str());
    for error in &decoded.rejected {
        tracing::warn!(
            collection = collection.as_str(),
            key = %error.key,
            "document skipped: {}",
            error.reason
        );
    }
    Ok(decoded.rows)
}

pub(crate) fn locate_sector(
    sectors: &[(SectorId, Sector)],
    position: Coordinates,
) -> Option<&SectorId> {
    sectors
        .iter()
        .find(|(_, sector)| sector.contains(position.into()))
        .map(|(id, _)| id)
}
