//! Shared census fixture: a memory store seeded with the Tajibo/Centro
//! scenario, a signed-in session and a registry over both.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use arbolado::config::PhotoConfig;
use arbolado::core::TreeView;
use arbolado::services::{
    Credentials, ManualClock, MemoryBlobStore, MemorySessionService, Passthrough, PhotoPipeline,
    SessionService, TreeRegistry,
};
use arbolado::sync::{CollectingSink, Subscription, TreeSynchronizer};
use arbolado::{Collection, MemoryStore};
use crossbeam::channel::Receiver;
use serde_json::{Value, json};

/// 2024-06-01T12:00:00Z
pub const NOW_MS: u64 = 1_717_243_200_000;

pub fn tajibo_species() -> Value {
    json!({"s1": {"commonName": "Tajibo"}})
}

pub fn centro_sectors() -> Value {
    json!({"k1": {"name": "Centro", "polygon": [[-17.4, -66.2], [-17.4, -66.1], [-17.3, -66.1], [-17.3, -66.2]]}})
}

pub fn tajibo_trees() -> Value {
    json!({"t1": {"speciesId": "s1", "sectorId": "k1", "code": "TAJ-01", "latitude": -17.37, "longitude": -66.17}})
}

pub struct Census {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<CollectingSink>,
    pub blobs: Arc<MemoryBlobStore>,
    pub sessions: Arc<MemorySessionService>,
    pub clock: ManualClock,
}

impl Census {
    pub fn empty() -> Self {
        let sessions = Arc::new(
            MemorySessionService::new().with_account("ana@alcaldia.bo", Some("ana"), "ceibo"),
        );
        Self {
            store: Arc::new(MemoryStore::new()),
            sink: Arc::new(CollectingSink::new()),
            blobs: Arc::new(MemoryBlobStore::new("https://blobs.test")),
            sessions,
            clock: ManualClock::new(NOW_MS),
        }
    }

    pub fn seeded() -> Self {
        let census = Self::empty();
        census.store.replace(Collection::Species, tajibo_species());
        census.store.replace(Collection::Sectors, centro_sectors());
        census.store.replace(Collection::Trees, tajibo_trees());
        census
    }

    pub fn sign_in(&self) {
        self.sessions
            .sign_in(&Credentials::new("ana", "ceibo").expect("credentials"))
            .expect("sign in");
    }

    pub fn synchronizer(&self) -> TreeSynchronizer {
        TreeSynchronizer::new(self.store.clone(), self.sink.clone())
    }

    pub fn subscribe(&self) -> (Subscription, Receiver<Vec<TreeView>>) {
        self.synchronizer().subscribe_channel().expect("subscribe")
    }

    pub fn registry(&self) -> TreeRegistry {
        let photos = PhotoPipeline::new(
            Arc::new(Passthrough),
            self.blobs.clone(),
            PhotoConfig::default(),
        );
        TreeRegistry::new(self.store.clone(), self.sessions.clone(), photos)
            .with_clock(Arc::new(self.clock.clone()))
    }
}

/// Everything emitted so far, oldest first.
pub fn drain(rx: &Receiver<Vec<TreeView>>) -> Vec<Vec<TreeView>> {
    rx.try_iter().collect()
}

/// The most recent emission, failing the test if there is none.
pub fn latest(rx: &Receiver<Vec<TreeView>>) -> Vec<TreeView> {
    drain(rx).pop().expect("an emission")
}

pub fn assert_quiet(rx: &Receiver<Vec<TreeView>>) {
    assert!(
        rx.recv_timeout(Duration::from_millis(20)).is_err(),
        "unexpected emission"
    );
}
