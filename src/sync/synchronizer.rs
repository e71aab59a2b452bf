//! Live denormalized tree list.
//!
//! Three sibling listeners (species, sectors, trees) write into versioned
//! lookup tables; every applied snapshot re-runs the join and hands the full
//! list to the consumer. A change to the catalog alone is enough to re-emit.
//!
//! Snapshots may arrive on any thread. Each applied snapshot bumps a sequence
//! number; one thread at a time calls the consumer, always with the join of
//! the newest tables, and keeps going until the last applied sequence has
//! been emitted. Snapshots that land meanwhile are folded into that next
//! emission instead of racing it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};

use crossbeam::channel::{Receiver, unbounded};
use thiserror::Error;

use crate::core::{
    DecodeError, Decoded, Effect, Sector, SectorId, Snapshot, Species, SpeciesId, Transience,
    TreeView,
};
use crate::store::{Collection, DocumentStore, ListenerId, StoreError};

use super::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use super::join::denormalize;
use super::tables::{JoinRevision, LookupTable, TreeTable};

type UpdateCallback = Box<dyn Fn(Vec<TreeView>) + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("could not listen to {collection}: {source}")]
    Listen {
        collection: Collection,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn transience(&self) -> Transience {
        match self {
            SyncError::Listen { source, .. } => source.transience(),
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Builds [`Subscription`]s over one store.
///
/// Each subscription owns its own tables; two consumers of the same data pay
/// for two sets of listeners.
#[derive(Clone)]
pub struct TreeSynchronizer {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn DiagnosticSink>,
}

impl TreeSynchronizer {
    pub fn new(store: Arc<dyn DocumentStore>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { store, sink }
    }

    /// Reports listener failures through `tracing`.
    pub fn with_tracing(store: Arc<dyn DocumentStore>) -> Self {
        Self::new(store, Arc::new(TracingSink))
    }

    /// Opens the three listeners and starts emitting.
    ///
    /// `on_update` receives the whole denormalized list, first when the
    /// initial trees snapshot arrives and then after every snapshot of any of
    /// the three collections. Calls never overlap and never go back to an
    /// older list. Snapshots arriving during a call are coalesced into the
    /// next one. It is never called while internal locks are held, so it may
    /// call [`Subscription::unsubscribe`].
    pub fn subscribe<F>(&self, on_update: F) -> Result<Subscription, SyncError>
    where
        F: Fn(Vec<TreeView>) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(JoinState::default()),
            idle: Condvar::new(),
            on_update: Box::new(on_update),
            sink: Arc::clone(&self.sink),
        });

        let mut listeners = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            match self.listen(collection, &shared) {
                Ok(id) => listeners.push(id),
                Err(source) => {
                    shared.lock().released = true;
                    for id in listeners {
                        self.store.unlisten(id);
                    }
                    return Err(SyncError::Listen { collection, source });
                }
            }
        }

        tracing::debug!(listeners = listeners.len(), "tree subscription opened");
        Ok(Subscription {
            store: Arc::clone(&self.store),
            shared,
            listeners: Mutex::new(listeners),
        })
    }

    /// Same as [`TreeSynchronizer::subscribe`], delivering into a channel.
    pub fn subscribe_channel(&self) -> Result<(Subscription, Receiver<Vec<TreeView>>), SyncError> {
        let (sender, receiver) = unbounded();
        let subscription = self.subscribe(move |trees| {
            if sender.send(trees).is_err() {
                tracing::trace!("tree list receiver dropped");
            }
        })?;
        Ok((subscription, receiver))
    }

    fn listen(&self, collection: Collection, shared: &Arc<Shared>) -> Result<ListenerId, StoreError> {
        let on_snapshot = {
            let weak = Arc::downgrade(shared);
            Box::new(move |snapshot: Snapshot| {
                if let Some(shared) = Weak::upgrade(&weak) {
                    shared.on_snapshot(collection, snapshot);
                }
            })
        };
        let on_error = {
            let weak = Arc::downgrade(shared);
            Box::new(move |error: StoreError| {
                if let Some(shared) = Weak::upgrade(&weak) {
                    shared.on_listen_error(collection, error);
                }
            })
        };
        self.store.listen(collection, on_snapshot, on_error)
    }
}

/// Live registration returned by [`TreeSynchronizer::subscribe`].
///
/// Dropping it releases the listeners.
pub struct Subscription {
    store: Arc<dyn DocumentStore>,
    shared: Arc<Shared>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl Subscription {
    /// Detaches all three listeners. Safe to call any number of times; once
    /// it returns, the consumer callback is not invoked again.
    ///
    /// If another thread is inside the consumer callback, waits for that call
    /// to finish. From inside the callback itself it returns at once and the
    /// current call is the last.
    pub fn unsubscribe(&self) {
        {
            let mut state = self.shared.lock();
            state.released = true;
            let me = thread::current().id();
            if state.emitter.is_some_and(|emitter| emitter != me) {
                let _idle = self
                    .shared
                    .idle
                    .wait_while(state, |state| state.emitter.is_some())
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        }
        let listeners = match self.listeners.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        if listeners.is_empty() {
            return;
        }
        for id in listeners {
            self.store.unlisten(id);
        }
        tracing::debug!("tree subscription released");
    }

    pub fn is_active(&self) -> bool {
        !self.shared.lock().released
    }

    /// The list most recently handed to the consumer, if any.
    pub fn latest(&self) -> Option<Vec<TreeView>> {
        self.shared.lock().latest.clone()
    }

    /// Table versions behind [`Subscription::latest`].
    pub fn revision(&self) -> JoinRevision {
        self.shared.lock().revision()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct Shared {
    state: Mutex<JoinState>,
    /// Signalled when an emitting thread leaves the consumer.
    idle: Condvar,
    on_update: UpdateCallback,
    sink: Arc<dyn DiagnosticSink>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, JoinState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn on_snapshot(&self, collection: Collection, snapshot: Snapshot) {
        let problems = {
            let mut state = self.lock();
            if state.released {
                return;
            }
            state.apply(collection, &snapshot)
        };
        for problem in problems {
            self.sink.report(problem);
        }
        self.emit();
    }

    /// Hands the newest join to the consumer until nothing newer is applied.
    /// Returns at once if another thread is already doing so.
    fn emit(&self) {
        let mut state = self.lock();
        if state.emitter.is_some() {
            return;
        }
        state.emitter = Some(thread::current().id());
        let _emitting = EmitterGuard(self);
        loop {
            let next = if state.released || state.emitted == state.applied {
                None
            } else {
                state.join()
            };
            let Some((seq, trees)) = next else {
                // The guard takes the lock on drop.
                drop(state);
                return;
            };
            state.emitted = seq;
            drop(state);
            (self.on_update)(trees);
            state = self.lock();
        }
    }

    fn on_listen_error(&self, collection: Collection, error: StoreError) {
        if self.lock().released {
            return;
        }
        self.sink.report(Diagnostic::ListenFailed { collection, error });
    }
}

/// Clears the emitter slot and wakes a waiting `unsubscribe`, also when the
/// consumer panics.
struct EmitterGuard<'a>(&'a Shared);

impl Drop for EmitterGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().emitter = None;
        self.0.idle.notify_all();
    }
}

#[derive(Default)]
struct JoinState {
    species: LookupTable<SpeciesId, Species>,
    sectors: LookupTable<SectorId, Sector>,
    trees: TreeTable,
    latest: Option<Vec<TreeView>>,
    /// Keys reported as bad by the previous snapshot of each collection.
    flagged: BTreeMap<Collection, BTreeSet<String>>,
    /// Sequence of the last applied snapshot.
    applied: u64,
    /// Sequence the last emitted list was joined at.
    emitted: u64,
    emitter: Option<ThreadId>,
    released: bool,
}

impl JoinState {
    /// Replaces one table and returns diagnostics for keys that were not
    /// already flagged.
    fn apply(&mut self, collection: Collection, snapshot: &Snapshot) -> Vec<Diagnostic> {
        let name = collection.as_str();
        let (rejected, repaired) = match collection {
            Collection::Species => {
                let decoded = snapshot.decode_each::<SpeciesId, Species>(name);
                let (rows, rejected, repaired) = split(decoded);
                self.species.replace(rows);
                (rejected, repaired)
            }
            Collection::Sectors => {
                let decoded = snapshot.decode_each::<SectorId, Sector>(name);
                let (rows, rejected, repaired) = split(decoded);
                self.sectors.replace(rows);
                (rejected, repaired)
            }
            Collection::Trees => {
                let (rows, rejected, repaired) = split(snapshot.decode_trees(name));
                self.trees.replace(rows);
                (rejected, repaired)
            }
        };
        self.applied += 1;
        tracing::debug!(
            collection = name,
            entries = snapshot.len(),
            skipped = rejected.len(),
            repaired = repaired.len(),
            revision = ?self.revision(),
            "snapshot applied"
        );

        let previous = self.flagged.remove(&collection).unwrap_or_default();
        let mut flagged = BTreeSet::new();
        let mut problems = Vec::new();
        let tagged = rejected
            .into_iter()
            .map(|e| (e, true))
            .chain(repaired.into_iter().map(|e| (e, false)));
        for (error, skipped) in tagged {
            flagged.insert(error.key.clone());
            if previous.contains(&error.key) {
                continue;
            }
            problems.push(if skipped {
                Diagnostic::DocumentRejected { collection, error }
            } else {
                Diagnostic::DocumentRepaired { collection, error }
            });
        }
        self.flagged.insert(collection, flagged);
        problems
    }

    /// `None` until trees have been observed.
    fn join(&mut self) -> Option<(u64, Vec<TreeView>)> {
        if !self.trees.is_observed() {
            return None;
        }
        let views = denormalize(&self.trees, &self.species, &self.sectors);
        self.latest = Some(views.clone());
        Some((self.applied, views))
    }

    fn revision(&self) -> JoinRevision {
        JoinRevision {
            species: self.species.version(),
            sectors: self.sectors.version(),
            trees: self.trees.version(),
        }
    }
}

fn split<K, T>(decoded: Decoded<K, T>) -> (Vec<(K, T)>, Vec<DecodeError>, Vec<DecodeError>) {
    (decoded.rows, decoded.rejected, decoded.repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use serde_json::{Map, Value, json};

    use crate::store::{ListenErrorCallback, SnapshotCallback};
    use crate::sync::CollectingSink;

    /// Store double that keeps callbacks so a test can fire them by hand,
    /// including after they were unlistened.
    #[derive(Default)]
    struct ScriptedStore {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        next: u64,
        callbacks: BTreeMap<u64, (Collection, Arc<SnapshotCallback>, Arc<ListenErrorCallback>)>,
        released: Vec<u64>,
        refuse: Option<Collection>,
    }

    impl ScriptedStore {
        fn fire(&self, collection: Collection, value: Value) {
            let callbacks: Vec<Arc<SnapshotCallback>> = self
                .state
                .lock()
                .unwrap()
                .callbacks
                .values()
                .filter(|(c, _, _)| *c == collection)
                .map(|(_, cb, _)| Arc::clone(cb))
                .collect();
            for cb in callbacks {
                (cb.as_ref())(Snapshot::from_value(value.clone()));
            }
        }

        fn fail(&self, collection: Collection, error: StoreError) {
            let callbacks: Vec<Arc<ListenErrorCallback>> = self
                .state
                .lock()
                .unwrap()
                .callbacks
                .values()
                .filter(|(c, _, _)| *c == collection)
                .map(|(_, _, cb)| Arc::clone(cb))
                .collect();
            for cb in callbacks {
                (cb.as_ref())(error.clone());
            }
        }
    }

    impl DocumentStore for ScriptedStore {
        fn listen(
            &self,
            collection: Collection,
            on_snapshot: SnapshotCallback,
            on_error: ListenErrorCallback,
        ) -> Result<ListenerId, StoreError> {
            let mut state = self.state.lock().unwrap();
            if state.refuse == Some(collection) {
                return Err(StoreError::PermissionDenied { collection });
            }
            state.next += 1;
            let id = state.next;
            state
                .callbacks
                .insert(id, (collection, Arc::new(on_snapshot), Arc::new(on_error)));
            Ok(ListenerId::new(id))
        }

        fn unlisten(&self, id: ListenerId) {
            // Callbacks stay reachable through `fire` to model late deliveries.
            self.state.lock().unwrap().released.push(id.get());
        }

        fn read_once(&self, _: Collection) -> Result<Snapshot, StoreError> {
            Ok(Snapshot::default())
        }

        fn push(&self, _: Collection, _: Value) -> Result<String, StoreError> {
            unreachable!("synchronizer never writes")
        }

        fn update(&self, _: Collection, _: &str, _: Map<String, Value>) -> Result<(), StoreError> {
            unreachable!("synchronizer never writes")
        }

        fn remove(&self, _: Collection, _: &str) -> Result<(), StoreError> {
            unreachable!("synchronizer never writes")
        }
    }

    fn harness() -> (
        Arc<ScriptedStore>,
        Arc<CollectingSink>,
        Subscription,
        Receiver<Vec<TreeView>>,
    ) {
        let store = Arc::new(ScriptedStore::default());
        let sink = Arc::new(CollectingSink::new());
        let sync = TreeSynchronizer::new(store.clone(), sink.clone());
        let (sub, rx) = sync.subscribe_channel().unwrap();
        (store, sink, sub, rx)
    }

    #[test]
    fn nothing_is_emitted_before_trees_arrive() {
        let (store, _sink, _sub, rx) = harness();
        store.fire(Collection::Species, json!({"s1": {"commonName": "Tajibo"}}));
        store.fire(Collection::Sectors, json!({"k1": {"name": "Centro"}}));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn trees_before_catalog_rejoin_when_catalog_arrives() {
        let (store, _sink, _sub, rx) = harness();
        store.fire(Collection::Trees, json!({"t1": {"speciesId": "s1", "sectorId": "k1"}}));
        let first = rx.try_recv().unwrap();
        assert_eq!(first[0].species, None);
        assert_eq!(first[0].sector, None);

        store.fire(Collection::Species, json!({"s1": {"commonName": "Tajibo"}}));
        let second = rx.try_recv().unwrap();
        assert_eq!(second[0].species, Some(Species::named("Tajibo")));
        assert_eq!(second[0].sector, None);
    }

    #[test]
    fn late_delivery_after_release_is_discarded() {
        let (store, _sink, sub, rx) = harness();
        store.fire(Collection::Trees, json!({"t1": {}}));
        assert!(rx.try_recv().is_ok());

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(store.state.lock().unwrap().released.len(), 3);
        assert!(!sub.is_active());

        store.fire(Collection::Trees, json!({"t1": {}, "t2": {}}));
        store.fire(Collection::Species, json!({}));
        assert!(rx.try_recv().is_err());
        assert_eq!(sub.latest().map(|l| l.len()), Some(1));
    }

    #[test]
    fn listen_failure_keeps_last_list_and_other_channels() {
        let (store, sink, sub, rx) = harness();
        store.fire(Collection::Trees, json!({"t1": {"speciesId": "s1"}}));
        rx.try_recv().unwrap();

        store.fail(
            Collection::Species,
            StoreError::PermissionDenied {
                collection: Collection::Species,
            },
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(sub.latest().map(|l| l.len()), Some(1));
        assert_eq!(sink.reports().len(), 1);
        assert_eq!(sink.reports()[0].collection(), Collection::Species);

        store.fire(Collection::Trees, json!({"t1": {}, "t2": {}}));
        assert_eq!(rx.try_recv().unwrap().len(), 2);
    }

    #[test]
    fn bad_documents_do_not_freeze_the_list() {
        let (store, sink, sub, rx) = harness();
        store.fire(
            Collection::Trees,
            json!({
                "t1": {"code": "A", "diameter": 30},
                "t2": {"code": "B", "diameter": "30"},
                "t3": {"code": "C", "diameter": "wide", "speciesId": "s1"}
            }),
        );
        let list = rx.try_recv().unwrap();
        let diameters: Vec<(&str, Option<f64>)> = list
            .iter()
            .map(|view| (view.tree.code.as_str(), view.tree.diameter))
            .collect();
        assert_eq!(diameters, [("A", Some(30.0)), ("B", Some(30.0)), ("C", None)]);
        assert_eq!(list[2].species_id().map(|id| id.as_str()), Some("s1"));
        assert_eq!(sink.reports().len(), 1);
        assert!(matches!(
            &sink.reports()[0],
            Diagnostic::DocumentRepaired {
                collection: Collection::Trees,
                error,
            } if error.key == "t3"
        ));

        store.fire(
            Collection::Species,
            json!({"s1": {"commonName": "Tajibo"}, "s2": {"commonName": 7}}),
        );
        let list = rx.try_recv().unwrap();
        assert_eq!(list[2].species, Some(Species::named("Tajibo")));
        assert_eq!(sink.reports()[1].key(), Some("s2"));
        assert!(matches!(sink.reports()[1], Diagnostic::DocumentRejected { .. }));

        // Still bad in the next snapshot: not reported again.
        store.fire(
            Collection::Trees,
            json!({
                "t1": {"code": "A"},
                "t3": {"code": "C", "diameter": "wide"},
                "t4": {"code": "D"}
            }),
        );
        assert_eq!(rx.try_recv().unwrap().len(), 3);
        assert_eq!(sink.reports().len(), 2);
        assert_eq!(sub.revision().trees, 2);
    }

    #[test]
    fn unsubscribe_waits_for_a_call_in_flight_on_another_thread() {
        use std::sync::mpsc;
        use std::time::Duration;

        let store = Arc::new(ScriptedStore::default());
        let sync = TreeSynchronizer::new(store.clone(), Arc::new(CollectingSink::new()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();
        let resume_rx = Mutex::new(resume_rx);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let calls = Arc::clone(&calls);
            sync.subscribe(move |list| {
                entered_tx.send(()).unwrap();
                resume_rx.lock().unwrap().recv().unwrap();
                calls.lock().unwrap().push(list.len());
            })
            .unwrap()
        };

        let firing = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.fire(Collection::Trees, json!({"t1": {}})))
        };
        entered_rx.recv().unwrap();

        let unsubscribed = Arc::new(Mutex::new(false));
        let releasing = {
            let unsubscribed = Arc::clone(&unsubscribed);
            thread::spawn(move || {
                sub.unsubscribe();
                *unsubscribed.lock().unwrap() = true;
                sub
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!*unsubscribed.lock().unwrap());

        resume_tx.send(()).unwrap();
        let sub = releasing.join().unwrap();
        firing.join().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![1]);

        store.fire(Collection::Trees, json!({"t1": {}, "t2": {}}));
        assert_eq!(*calls.lock().unwrap(), vec![1]);
        assert!(!sub.is_active());
    }

    #[test]
    fn snapshots_during_a_call_are_coalesced_into_the_next() {
        use std::sync::mpsc;

        let store = Arc::new(ScriptedStore::default());
        let sync = TreeSynchronizer::new(store.clone(), Arc::new(CollectingSink::new()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();
        let resume_rx = Mutex::new(resume_rx);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let calls = Arc::clone(&calls);
            sync.subscribe(move |list| {
                calls.lock().unwrap().push(list.len());
                if list.len() == 1 {
                    entered_tx.send(()).unwrap();
                    resume_rx.lock().unwrap().recv().unwrap();
                }
            })
            .unwrap()
        };

        let first = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.fire(Collection::Trees, json!({"t1": {}})))
        };
        entered_rx.recv().unwrap();
        // Applied while the first call is still running; the firing thread
        // returns without calling the consumer itself.
        store.fire(Collection::Trees, json!({"t1": {}, "t2": {}}));
        store.fire(Collection::Trees, json!({"t1": {}, "t2": {}, "t3": {}}));
        assert_eq!(*calls.lock().unwrap(), vec![1]);

        resume_tx.send(()).unwrap();
        first.join().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn refused_listen_releases_earlier_ones() {
        let store = Arc::new(ScriptedStore::default());
        store.state.lock().unwrap().refuse = Some(Collection::Trees);
        let sync = TreeSynchronizer::new(store.clone(), Arc::new(CollectingSink::new()));
        let err = sync.subscribe(|_| {}).err().unwrap();
        assert!(matches!(
            err,
            SyncError::Listen {
                collection: Collection::Trees,
                ..
            }
        ));
        assert_eq!(store.state.lock().unwrap().released, vec![1, 2]);
    }

    #[test]
    fn consumer_may_release_from_inside_its_callback() {
        let store = Arc::new(ScriptedStore::default());
        let sync = TreeSynchronizer::new(store.clone(), Arc::new(CollectingSink::new()));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));
        let sub = {
            let slot = Arc::clone(&slot);
            let calls = Arc::clone(&calls);
            sync.subscribe(move |_| {
                *calls.lock().unwrap() += 1;
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            })
            .unwrap()
        };
        *slot.lock().unwrap() = Some(sub);

        store.fire(Collection::Trees, json!({"t1": {}}));
        store.fire(Collection::Trees, json!({"t1": {}}));
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
