//! Core domain types for the arbolado tree census.
//!
//! Module hierarchy follows type dependency order:
//! - error: Transience, Effect, CoreError
//! - identity: TreeId, SpeciesId, SectorId, Creator
//! - geo: Coordinates, GeoPoint, Polygon
//! - species / sector: catalog documents
//! - tree: Tree (stored) and TreeView (denormalized)
//! - snapshot: whole-collection snapshots and their decoding
//! - draft: registration/edit forms and validation

#![forbid(unsafe_code)]

#[macro_use]
mod macros;

pub mod draft;
pub mod error;
pub mod geo;
pub mod identity;
pub mod sector;
pub mod snapshot;
pub mod species;
pub mod tree;

pub use draft::{Provenance, TreeDraft, TreePatch, ValidatedDraft, format_birth_date};
pub use error::{CoreError, DecodeError, Effect, IdKind, InvalidField, InvalidId, Transience};
pub use geo::{Coordinates, GeoPoint, Polygon};
pub use identity::{Creator, SectorId, SpeciesId, TreeId};
pub use sector::Sector;
pub use snapshot::{Decoded, Snapshot};
pub use species::Species;
pub use tree::{Tree, TreeView};
