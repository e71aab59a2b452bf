//! In-process document store with live listeners.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::{
    Collection, DocumentStore, ListenErrorCallback, ListenerId, SnapshotCallback, StoreError,
};
use crate::core::Snapshot;

/// Keys are enumerated in lexicographic order, matching the hosted database;
/// pushed keys start with the creation time in milliseconds and therefore
/// sort by creation.
///
/// Listener callbacks run after the store lock is released, so a callback
/// may read from or write to the store. One thread at a time delivers: a
/// write made while another delivery is running marks its listeners pending
/// and returns, and the running delivery hands them the collection as it is
/// when their turn comes. A listener therefore never sees an older snapshot
/// after a newer one.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    collections: BTreeMap<Collection, BTreeMap<String, Value>>,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
    failing_listens: BTreeMap<Collection, StoreError>,
    failing_writes: Option<StoreError>,
    last_push_millis: u64,
    push_seq: u32,
    delivering: bool,
}

struct Listener {
    collection: Collection,
    on_snapshot: Arc<SnapshotCallback>,
    on_error: Arc<ListenErrorCallback>,
    active: Arc<AtomicBool>,
    pending: bool,
}

enum Delivery {
    Snapshot(Arc<SnapshotCallback>, Arc<AtomicBool>, Snapshot),
    Error(Arc<ListenErrorCallback>, Arc<AtomicBool>, StoreError),
}

impl Delivery {
    fn run(self) {
        match self {
            Delivery::Snapshot(callback, active, snapshot) => {
                if active.load(Ordering::Acquire) {
                    (callback.as_ref())(snapshot);
                }
            }
            Delivery::Error(callback, active, err) => {
                // The error is the listener's last word; it is cancelled either way.
                if active.swap(false, Ordering::AcqRel) {
                    (callback.as_ref())(err);
                }
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes (or overwrites) one document under a chosen key.
    pub fn put(&self, collection: Collection, key: &str, document: Value) {
        {
            let mut state = self.lock();
            state
                .collections
                .entry(collection)
                .or_default()
                .insert(key.to_string(), document);
            state.mark_pending(collection);
        }
        self.deliver_pending();
    }

    /// Replaces a whole collection; `Value::Null` empties it.
    pub fn replace(&self, collection: Collection, value: Value) {
        {
            let mut state = self.lock();
            let docs = match value {
                Value::Object(map) => map.into_iter().collect(),
                _ => BTreeMap::new(),
            };
            state.collections.insert(collection, docs);
            state.mark_pending(collection);
        }
        self.deliver_pending();
    }

    pub fn get(&self, collection: Collection, key: &str) -> Option<Value> {
        self.lock()
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(key).cloned())
    }

    /// Makes later `listen` calls on `collection` fail through their error
    /// channel instead of delivering a snapshot. `None` clears it.
    pub fn fail_listens(&self, collection: Collection, err: Option<StoreError>) {
        let mut state = self.lock();
        match err {
            Some(err) => state.failing_listens.insert(collection, err),
            None => state.failing_listens.remove(&collection),
        };
    }

    /// Makes every write fail with `err` until cleared with `None`.
    pub fn fail_writes(&self, err: Option<StoreError>) {
        self.lock().failing_writes = err;
    }

    /// Pushes `err` into the error channel of every live listener on
    /// `collection`, cancelling them.
    pub fn emit_error(&self, collection: Collection, err: StoreError) {
        let deliveries: Vec<Delivery> = {
            let mut state = self.lock();
            let ids: Vec<ListenerId> = state
                .listeners
                .iter()
                .filter(|(_, l)| l.collection == collection)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.listeners.remove(&id))
                .map(|l| Delivery::Error(l.on_error, l.active, err.clone()))
                .collect()
        };
        for delivery in deliveries {
            delivery.run();
        }
    }

    pub fn listener_count(&self, collection: Collection) -> usize {
        self.lock()
            .listeners
            .values()
            .filter(|l| l.collection == collection)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicking listener must not take the whole store down with it.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<T>(
        &self,
        collection: Collection,
        apply: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let out = {
            let mut state = self.lock();
            if let Some(err) = state.failing_writes.clone() {
                return Err(err);
            }
            let out = apply(&mut state)?;
            state.mark_pending(collection);
            out
        };
        self.deliver_pending();
        Ok(out)
    }

    /// Runs pending snapshot deliveries until none are left, unless another
    /// call is already doing so.
    fn deliver_pending(&self) {
        {
            let mut state = self.lock();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        let mut guard = DeliveringGuard {
            store: self,
            armed: true,
        };
        loop {
            let next = {
                let mut state = self.lock();
                match state.take_pending() {
                    Some(delivery) => delivery,
                    None => {
                        state.delivering = false;
                        guard.armed = false;
                        return;
                    }
                }
            };
            next.run();
        }
    }
}

/// Clears the delivering flag if a listener callback panics.
struct DeliveringGuard<'a> {
    store: &'a MemoryStore,
    armed: bool,
}

impl Drop for DeliveringGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.lock().delivering = false;
        }
    }
}

impl StoreState {
    fn docs_mut(&mut self, collection: Collection) -> &mut BTreeMap<String, Value> {
        self.collections.entry(collection).or_default()
    }

    /// Millisecond timestamp plus a per-millisecond sequence, hex encoded.
    fn next_push_key(&mut self) -> String {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let millis = u64::try_from(now_ms).unwrap_or(0).max(self.last_push_millis);
        if millis == self.last_push_millis {
            self.push_seq = self.push_seq.wrapping_add(1);
        } else {
            self.last_push_millis = millis;
            self.push_seq = 0;
        }
        format!("{millis:012x}{:06x}", self.push_seq)
    }

    fn snapshot(&self, collection: Collection) -> Snapshot {
        let entries = self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Snapshot::new(entries)
    }

    fn mark_pending(&mut self, collection: Collection) {
        for listener in self.listeners.values_mut() {
            if listener.collection == collection {
                listener.pending = true;
            }
        }
    }

    /// Next pending listener with the current state of its collection.
    fn take_pending(&mut self) -> Option<Delivery> {
        let listener = self.listeners.values_mut().find(|l| l.pending)?;
        listener.pending = false;
        let callback = Arc::clone(&listener.on_snapshot);
        let active = Arc::clone(&listener.active);
        let collection = listener.collection;
        Some(Delivery::Snapshot(callback, active, self.snapshot(collection)))
    }
}

impl DocumentStore for MemoryStore {
    fn listen(
        &self,
        collection: Collection,
        on_snapshot: SnapshotCallback,
        on_error: ListenErrorCallback,
    ) -> Result<ListenerId, StoreError> {
        let (id, failure) = {
            let mut state = self.lock();
            state.next_listener = state.next_listener.saturating_add(1);
            let id = ListenerId::new(state.next_listener);
            let on_error = Arc::new(on_error);
            let active = Arc::new(AtomicBool::new(true));
            let failure = match state.failing_listens.get(&collection).cloned() {
                Some(err) => Some(Delivery::Error(on_error, active, err)),
                None => {
                    state.listeners.insert(
                        id,
                        Listener {
                            collection,
                            on_snapshot: Arc::new(on_snapshot),
                            on_error,
                            active,
                            pending: true,
                        },
                    );
                    None
                }
            };
            (id, failure)
        };
        match failure {
            Some(delivery) => delivery.run(),
            None => self.deliver_pending(),
        }
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) {
        if let Some(listener) = self.lock().listeners.remove(&id) {
            listener.active.store(false, Ordering::Release);
        }
    }

    fn read_once(&self, collection: Collection) -> Result<Snapshot, StoreError> {
        let state = self.lock();
        if let Some(err) = state.failing_listens.get(&collection) {
            return Err(err.clone());
        }
        Ok(state.snapshot(collection))
    }

    fn push(&self, collection: Collection, document: Value) -> Result<String, StoreError> {
        self.write(collection, |state| {
            let key = state.next_push_key();
            state.docs_mut(collection).insert(key.clone(), document);
            Ok(key)
        })
    }

    fn update(
        &self,
        collection: Collection,
        key: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.write(collection, |state| {
            let Some(Value::Object(doc)) = state.docs_mut(collection).get_mut(key) else {
                return Err(StoreError::NotFound {
                    collection,
                    key: key.to_string(),
                });
            };
            for (field, value) in fields {
                if value.is_null() {
                    doc.remove(&field);
                } else {
                    doc.insert(field, value);
                }
            }
            Ok(())
        })
    }

    fn remove(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        // Removing a missing key is a no-op on the hosted database too.
        self.write(collection, |state| {
            state.docs_mut(collection).remove(key);
            Ok(())
        })
    }
}
