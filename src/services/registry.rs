//! Writes to the `trees` collection.
//!
//! Registration runs, in order: session check, validation, sector lookup,
//! photo pipeline, reverse geocoding, insert. Anything that fails before the
//! insert leaves the census untouched; a failed insert also deletes the photo
//! it uploaded. Nothing is retried.

use std::sync::Arc;

use crate::core::{
    Coordinates, Provenance, SectorId, Tree, TreeDraft, TreeId, TreePatch, ValidatedDraft,
};
use crate::services::catalog::{locate_sector, read_decoded};
use crate::services::clock::{self, SystemTimeSource, TimeSource};
use crate::services::geo::ReverseGeocoder;
use crate::services::media::{Photo, PhotoPipeline};
use crate::services::session::{Session, SessionError, SessionService};
use crate::store::{Collection, DocumentStore, StoreError};

pub struct TreeRegistry {
    store: Arc<dyn DocumentStore>,
    sessions: Arc<dyn SessionService>,
    photos: PhotoPipeline,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    clock: Arc<dyn TimeSource>,
}

impl TreeRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionService>,
        photos: PhotoPipeline,
    ) -> Self {
        Self {
            store,
            sessions,
            photos,
            geocoder: None,
            clock: Arc::new(SystemTimeSource),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn photo_quality(&self) -> u8 {
        self.photos.settings().quality
    }

    /// Inserts a new tree and returns its generated key.
    pub fn register(&self, draft: &TreeDraft, photo: Option<&Photo>) -> crate::Result<TreeId> {
        let session = self.session()?;
        let creator = session.creator()?;
        let now_ms = self.clock.now_ms();
        let valid = draft.validate(clock::today(now_ms))?;

        let sector_id = match valid.sector_id {
            Some(_) => None,
            None => self.resolve_sector(valid.position),
        };
        let stored_photo = photo
            .map(|photo| self.photos.store(&valid.code, photo, now_ms))
            .transpose()?;
        let address = self.address_for(valid.position);

        let code = valid.code.clone();
        let tree = ValidatedDraft::into_tree(
            valid,
            &creator,
            Provenance {
                sector_id,
                image_url: stored_photo.as_ref().map(|stored| stored.url.clone()),
                address,
                registered_at: clock::rfc3339(now_ms),
            },
        );
        let key = match to_document(&tree).and_then(|doc| self.store.push(Collection::Trees, doc)) {
            Ok(key) => key,
            Err(err) => {
                if let Some(stored) = &stored_photo {
                    self.photos.discard(stored);
                }
                return Err(err.into());
            }
        };
        let id = TreeId::parse(key)?;
        tracing::info!(tree = %id, code = %code, by = %creator, "tree registered");
        Ok(id)
    }

    /// Merges `patch` into an existing tree and stamps `modifyDate`. An empty
    /// patch writes nothing.
    pub fn update(&self, id: &TreeId, patch: TreePatch) -> crate::Result<()> {
        self.session()?;
        let now_ms = self.clock.now_ms();
        patch.validate(clock::today(now_ms))?;
        if patch.is_empty() {
            return Ok(());
        }
        let fields = patch.into_fields(&clock::rfc3339(now_ms));
        self.store.update(Collection::Trees, id.as_str(), fields)?;
        tracing::info!(tree = %id, "tree updated");
        Ok(())
    }

    pub fn delete(&self, id: &TreeId) -> crate::Result<()> {
        self.session()?;
        self.store.remove(Collection::Trees, id.as_str())?;
        tracing::info!(tree = %id, "tree deleted");
        Ok(())
    }

    fn session(&self) -> Result<Session, SessionError> {
        self.sessions
            .current_session()
            .ok_or(SessionError::NotSignedIn)
    }

    /// Best effort: a failed read leaves the tree without a sector.
    fn resolve_sector(&self, position: Coordinates) -> Option<SectorId> {
        match read_decoded(self.store.as_ref(), Collection::Sectors) {
            Ok(sectors) => locate_sector(&sectors, position).cloned(),
            Err(err) => {
                tracing::warn!("sector lookup failed, registering without sector: {err}");
                None
            }
        }
    }

    /// Best effort: no geocoder or a failed lookup leaves the address empty.
    fn address_for(&self, position: Coordinates) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.reverse(position) {
            Ok(address) => Some(address),
            Err(err) => {
                tracing::warn!(
                    lat = position.latitude,
                    lng = position.longitude,
                    "reverse geocoding failed: {err}"
                );
                None
            }
        }
    }
}

fn to_document(tree: &Tree) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(tree).map_err(|err| StoreError::Rejected {
        collection: Collection::Trees,
        reason: err.to_string(),
    })
}
