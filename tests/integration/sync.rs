use std::thread;

use arbolado::core::Species;
use arbolado::sync::Diagnostic;
use arbolado::{Collection, DocumentStore, StoreError};
use serde_json::json;

use crate::fixtures::{Census, assert_quiet, drain, latest, tajibo_trees};

#[test]
fn joins_species_and_sector_into_each_tree() {
    let census = Census::seeded();
    let (_sub, rx) = census.subscribe();

    let emissions = drain(&rx);
    assert_eq!(emissions.len(), 1, "one emission once all three arrived");
    let trees = &emissions[0];
    assert_eq!(trees.len(), 1);
    let t1 = &trees[0];
    assert_eq!(t1.id.as_str(), "t1");
    assert_eq!(t1.tree.code, "TAJ-01");
    assert_eq!(t1.tree.latitude, Some(-17.37));
    assert_eq!(t1.tree.longitude, Some(-66.17));
    assert_eq!(t1.species, Some(Species::named("Tajibo")));
    assert_eq!(t1.sector.as_ref().map(|s| s.name.as_str()), Some("Centro"));

    let wire = serde_json::to_value(t1).unwrap();
    assert_eq!(wire["id"], "t1");
    assert_eq!(wire["code"], "TAJ-01");
    assert_eq!(wire["species"]["commonName"], "Tajibo");
    assert_eq!(wire["sector"]["name"], "Centro");
}

#[test]
fn unresolved_species_is_absent() {
    let census = Census::empty();
    census.store.replace(Collection::Species, json!({}));
    census
        .store
        .replace(Collection::Trees, json!({"t1": {"speciesId": "s9", "code": "X"}}));
    let (_sub, rx) = census.subscribe();

    let trees = latest(&rx);
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].species, None);
    assert_eq!(trees[0].sector, None);
    assert_eq!(trees[0].tree.code, "X");
}

#[test]
fn deleted_tree_leaves_no_residue() {
    let census = Census::seeded();
    census
        .store
        .put(Collection::Trees, "t2", json!({"speciesId": "s1", "code": "TAJ-02"}));
    let (_sub, rx) = census.subscribe();
    assert_eq!(latest(&rx).len(), 2);

    census.store.remove(Collection::Trees, "t1").unwrap();
    let trees = latest(&rx);
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].id.as_str(), "t2");

    census.store.remove(Collection::Trees, "t2").unwrap();
    assert!(latest(&rx).is_empty());
}

#[test]
fn identical_snapshots_produce_equal_output() {
    let census = Census::seeded();
    let (_sub, rx) = census.subscribe();
    let first = latest(&rx);

    census.store.replace(Collection::Trees, tajibo_trees());
    let second = latest(&rx);
    assert_eq!(first, second);
}

#[test]
fn species_change_alone_reaches_every_referencing_tree() {
    let census = Census::seeded();
    census
        .store
        .put(Collection::Trees, "t2", json!({"speciesId": "s1", "code": "TAJ-02"}));
    let (_sub, rx) = census.subscribe();
    drain(&rx);

    census
        .store
        .put(Collection::Species, "s1", json!({"commonName": "Tajibo morado"}));
    let trees = latest(&rx);
    assert!(
        trees
            .iter()
            .all(|t| t.species.as_ref().map(|s| s.common_name.as_str()) == Some("Tajibo morado"))
    );

    census.store.replace(Collection::Sectors, json!(null));
    let trees = latest(&rx);
    assert!(trees.iter().all(|t| t.sector.is_none()));
}

#[test]
fn unsubscribe_detaches_everything_and_is_idempotent() {
    let census = Census::seeded();
    let (sub, rx) = census.subscribe();
    drain(&rx);
    for collection in Collection::ALL {
        assert_eq!(census.store.listener_count(collection), 1);
    }

    sub.unsubscribe();
    sub.unsubscribe();
    assert!(!sub.is_active());
    for collection in Collection::ALL {
        assert_eq!(census.store.listener_count(collection), 0);
    }

    census.store.replace(Collection::Trees, json!({}));
    census.store.replace(Collection::Species, json!({}));
    assert_quiet(&rx);
}

#[test]
fn dropping_the_subscription_releases_it() {
    let census = Census::seeded();
    let (sub, rx) = census.subscribe();
    drop(sub);
    for collection in Collection::ALL {
        assert_eq!(census.store.listener_count(collection), 0);
    }
    drain(&rx);
    census.store.replace(Collection::Trees, json!({}));
    assert!(drain(&rx).is_empty());
}

#[test]
fn listen_failure_keeps_last_known_state() {
    let census = Census::seeded();
    let (sub, rx) = census.subscribe();
    let before = latest(&rx);

    census.store.emit_error(
        Collection::Species,
        StoreError::PermissionDenied {
            collection: Collection::Species,
        },
    );
    assert_quiet(&rx);
    assert_eq!(sub.latest(), Some(before));
    let reports = census.sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(matches!(
        reports[0],
        Diagnostic::ListenFailed {
            collection: Collection::Species,
            ..
        }
    ));

    // The species channel is gone; trees keep flowing with the last species table.
    census.store.put(Collection::Species, "s1", json!({"commonName": "Otro"}));
    census.store.put(Collection::Trees, "t2", json!({"speciesId": "s1"}));
    let trees = latest(&rx);
    assert_eq!(trees.len(), 2);
    assert!(
        trees
            .iter()
            .all(|t| t.species.as_ref().map(|s| s.common_name.as_str()) == Some("Tajibo"))
    );
}

#[test]
fn refused_channel_is_reported_and_others_still_work() {
    let census = Census::seeded();
    census.store.fail_listens(
        Collection::Sectors,
        Some(StoreError::Unavailable {
            reason: "offline".into(),
        }),
    );
    let (_sub, rx) = census.subscribe();

    let trees = latest(&rx);
    assert_eq!(trees[0].sector, None);
    assert_eq!(trees[0].species, Some(Species::named("Tajibo")));
    let reports = census.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].collection(), Collection::Sectors);
}

#[test]
fn two_subscriptions_are_independent() {
    let census = Census::seeded();
    let (first, rx1) = census.subscribe();
    let (_second, rx2) = census.subscribe();
    drain(&rx1);
    drain(&rx2);

    first.unsubscribe();
    census.store.remove(Collection::Trees, "t1").unwrap();
    assert!(drain(&rx1).is_empty());
    assert!(latest(&rx2).is_empty());
}

#[test]
fn writes_from_another_thread_are_delivered() {
    let census = Census::seeded();
    let (_sub, rx) = census.subscribe();
    drain(&rx);

    let store = census.store.clone();
    thread::spawn(move || {
        store
            .push(Collection::Trees, json!({"speciesId": "s1", "code": "TAJ-09"}))
            .unwrap();
    })
    .join()
    .unwrap();

    let trees = latest(&rx);
    assert_eq!(trees.len(), 2);
    assert!(trees.iter().any(|t| t.id.as_str() == "t1"));
    let pushed = trees.iter().find(|t| t.tree.code == "TAJ-09").unwrap();
    assert_eq!(pushed.species, Some(Species::named("Tajibo")));
}

#[test]
fn concurrent_writers_end_on_the_stored_state() {
    let census = Census::seeded();
    let (_sub, rx) = census.subscribe();

    for round in 0..3 {
        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = census.store.clone();
                thread::spawn(move || {
                    for i in 0..25 {
                        let code = format!("R{round}-W{writer}-{i:02}");
                        store
                            .push(Collection::Trees, json!({"speciesId": "s1", "code": code}))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stored: Vec<String> = census
            .store
            .read_once(Collection::Trees)
            .unwrap()
            .entries()
            .map(|(key, _)| key.to_string())
            .collect();
        let emitted: Vec<String> = latest(&rx)
            .iter()
            .map(|t| t.id.as_str().to_string())
            .collect();
        assert_eq!(emitted, stored, "round {round}");
        assert_eq!(emitted.len(), 1 + 100 * (round + 1));
    }
}

#[test]
fn malformed_tree_is_kept_and_reported_once() {
    let census = Census::seeded();
    let (_sub, rx) = census.subscribe();
    drain(&rx);

    census
        .store
        .put(Collection::Trees, "t2", json!({"code": "TAJ-02", "diameter": "30"}));
    census
        .store
        .put(Collection::Trees, "t3", json!({"code": "TAJ-03", "diameter": [30]}));
    census
        .store
        .put(Collection::Trees, "t4", json!({"code": "TAJ-04", "speciesId": "s1"}));

    let emissions = drain(&rx);
    assert_eq!(emissions.len(), 3, "every write still reaches the consumer");
    let trees = emissions.last().unwrap();
    let codes: Vec<(&str, Option<f64>)> = trees
        .iter()
        .map(|t| (t.tree.code.as_str(), t.tree.diameter))
        .collect();
    assert_eq!(
        codes,
        [
            ("TAJ-01", None),
            ("TAJ-02", Some(30.0)),
            ("TAJ-03", None),
            ("TAJ-04", None)
        ]
    );

    let reports = census.sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(matches!(
        reports[0],
        Diagnostic::DocumentRepaired {
            collection: Collection::Trees,
            ..
        }
    ));
    assert_eq!(reports[0].key(), Some("t3"));
}
