//! Full-collection snapshots as delivered by the document store.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CoreError, DecodeError};
use crate::identity::TreeId;
use crate::tree::Tree;

/// The complete state of one collection at one point in time.
///
/// Entries keep the store's enumeration order. A collection that does not
/// exist (the store's `null`) is an empty snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<(String, Value)>,
}

impl Snapshot {
    pub fn new(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Builds a snapshot from the store's JSON value for a collection: an
    /// object keyed by document key, or `null`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                entries: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Decodes entry by entry. Entries whose key or document does not fit
    /// are left out and reported in [`Decoded::rejected`]; the rest keep the
    /// store's order.
    pub fn decode_each<K, T>(&self, collection: &'static str) -> Decoded<K, T>
    where
        K: TryFrom<String, Error = CoreError>,
        T: DeserializeOwned,
    {
        let mut decoded = Decoded::default();
        for (key, value) in &self.entries {
            let doc = K::try_from(key.clone())
                .map_err(|err| err.to_string())
                .and_then(|id| {
                    T::deserialize(value)
                        .map(|doc| (id, doc))
                        .map_err(|err| err.to_string())
                });
            match doc {
                Ok(row) => decoded.rows.push(row),
                Err(reason) => decoded.rejected.push(DecodeError {
                    collection,
                    key: key.clone(),
                    reason,
                }),
            }
        }
        decoded
    }

    /// Decodes a trees snapshot. Every entry with a valid key is kept; fields
    /// that do not fit are dropped and the entry is listed in
    /// [`Decoded::repaired`].
    pub fn decode_trees(&self, collection: &'static str) -> Decoded<TreeId, Tree> {
        let mut decoded = Decoded::default();
        for (key, value) in &self.entries {
            let id = match TreeId::try_from(key.clone()) {
                Ok(id) => id,
                Err(err) => {
                    decoded.rejected.push(DecodeError {
                        collection,
                        key: key.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let (tree, dropped) = Tree::from_document(value);
            if let Some(reason) = dropped {
                decoded.repaired.push(DecodeError {
                    collection,
                    key: key.clone(),
                    reason,
                });
            }
            decoded.rows.push((id, tree));
        }
        decoded
    }
}

/// Outcome of decoding a snapshot entry by entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded<K, T> {
    pub rows: Vec<(K, T)>,
    /// Entries left out of `rows`.
    pub rejected: Vec<DecodeError>,
    /// Entries kept in `rows` with some fields dropped.
    pub repaired: Vec<DecodeError>,
}

impl<K, T> Default for Decoded<K, T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            rejected: Vec::new(),
            repaired: Vec::new(),
        }
    }
}

impl<K, T> Decoded<K, T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.repaired.is_empty()
    }
}
