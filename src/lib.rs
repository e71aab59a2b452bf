//! Client library for an urban tree census.
//!
//! [`sync::TreeSynchronizer`] keeps a denormalized tree list live from the
//! `trees`, `species` and `sectors` collections of a [`store::DocumentStore`].
//! [`services`] holds the write side and the device seams; [`views`] the
//! list, statistics and map helpers.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
mod paths;
pub mod services;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod views;

/// Domain types, re-exported from `arbolado-core`.
pub mod core {
    pub use arbolado_core::*;
    pub use arbolado_core::enum_str;
}

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

pub use crate::core::{
    Coordinates, Creator, Sector, SectorId, Snapshot, Species, SpeciesId, Tree, TreeDraft,
    TreeId, TreePatch, TreeView,
};
pub use crate::store::{Collection, DocumentStore, MemoryStore, StoreError};
pub use crate::sync::{Subscription, TreeSynchronizer};
