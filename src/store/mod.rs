//! Document store seam.
//!
//! The census lives in a hosted realtime database: three keyed collections of
//! JSON documents with live listeners. Everything above this module talks to
//! it through [`DocumentStore`]; [`MemoryStore`] is the in-process
//! implementation used by tests and local tooling.

mod memory;

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::{Effect, Snapshot, Transience};

pub use memory::MemoryStore;

/// The collections the census reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Trees,
    Species,
    Sectors,
}

crate::core::enum_str! {
    impl Collection {
        pub fn as_str(&self) -> &'static str;
        pub fn parse_str(raw: &str) -> Option<Self>;
        variants {
            Trees => ["trees"],
            Species => ["species"],
            Sectors => ["sectors"],
        }
    }
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Species, Collection::Sectors, Collection::Trees];
}

/// Handle for one live listener registration.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Receives every full snapshot of a listened collection.
pub type SnapshotCallback = Box<dyn Fn(Snapshot) + Send + Sync>;
/// Receives listener failures (permission revoked, connection lost).
pub type ListenErrorCallback = Box<dyn Fn(StoreError) + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    #[error("permission denied on {collection}")]
    PermissionDenied { collection: Collection },
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("document `{key}` not found in {collection}")]
    NotFound { collection: Collection, key: String },
    #[error("document rejected by {collection}: {reason}")]
    Rejected { collection: Collection, reason: String },
}

impl StoreError {
    pub fn transience(&self) -> Transience {
        match self {
            StoreError::Unavailable { .. } => Transience::Retryable,
            StoreError::PermissionDenied { .. }
            | StoreError::NotFound { .. }
            | StoreError::Rejected { .. } => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            StoreError::Unavailable { .. } => Effect::Unknown,
            _ => Effect::None,
        }
    }
}

/// Keyed collections with live-subscription semantics.
pub trait DocumentStore: Send + Sync {
    /// Registers a live listener. The current snapshot is delivered right
    /// away, then every later one, until [`DocumentStore::unlisten`].
    fn listen(
        &self,
        collection: Collection,
        on_snapshot: SnapshotCallback,
        on_error: ListenErrorCallback,
    ) -> Result<ListenerId, StoreError>;

    /// Detaches a listener. Unknown or already-released ids are ignored.
    /// No callback of that listener starts after this returns.
    fn unlisten(&self, id: ListenerId);

    fn read_once(&self, collection: Collection) -> Result<Snapshot, StoreError>;

    /// Inserts a document under a freshly generated key.
    fn push(&self, collection: Collection, document: Value) -> Result<String, StoreError>;

    /// Shallow-merges `fields` into an existing document.
    fn update(
        &self,
        collection: Collection,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError>;

    fn remove(&self, collection: Collection, key: &str) -> Result<(), StoreError>;
}
