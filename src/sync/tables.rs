//! Versioned lookup tables the join reads from.
//!
//! Each table is replaced wholesale by every snapshot of its collection and
//! bumps its version when it is. A [`JoinRevision`] names the three versions
//! a given output was computed from.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::core::{Tree, TreeId};

/// Id → document map rebuilt from each snapshot of a catalog collection.
#[derive(Debug)]
pub struct LookupTable<K, V> {
    entries: HashMap<K, V>,
    version: u64,
}

impl<K: Eq + Hash, V> LookupTable<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            version: 0,
        }
    }

    pub fn replace(&mut self, rows: Vec<(K, V)>) {
        self.entries = rows.into_iter().collect();
        self.version = self.version.saturating_add(1);
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 0 until the first snapshot has been applied.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<K: Eq + Hash, V> Default for LookupTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw trees in store enumeration order.
#[derive(Debug, Default)]
pub struct TreeTable {
    rows: Vec<(TreeId, Tree)>,
    version: u64,
}

impl TreeTable {
    pub fn replace(&mut self, rows: Vec<(TreeId, Tree)>) {
        self.rows = rows;
        self.version = self.version.saturating_add(1);
    }

    pub fn rows(&self) -> &[(TreeId, Tree)] {
        &self.rows
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// False until the first trees snapshot; nothing is emitted before then.
    pub fn is_observed(&self) -> bool {
        self.version > 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoinRevision {
    pub species: u64,
    pub sectors: u64,
    pub trees: u64,
}
