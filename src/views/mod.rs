//! Presentation helpers over the denormalized tree list.

pub mod filter;
pub mod map;
pub mod stats;

pub use filter::SpeciesFilter;
pub use map::{MapMarker, MapViewport, markers};
pub use stats::{CreatorTally, creator_tallies};
