use arbolado::core::{TreeDraft, TreeId, TreePatch};
use arbolado::services::{Catalog, Photo, RegistrationForm, Route, require_session};
use arbolado::views::{SpeciesFilter, creator_tallies, markers};
use arbolado::{Collection, DocumentStore, StoreError};

use crate::fixtures::{Census, drain, latest};

fn draft(code: &str) -> TreeDraft {
    TreeDraft {
        code: code.into(),
        species_id: "s1".into(),
        diameter: "35,5".into(),
        latitude: Some(-17.35),
        longitude: Some(-66.15),
        ..TreeDraft::default()
    }
}

#[test]
fn registered_tree_shows_up_denormalized() {
    let census = Census::seeded();
    census.sign_in();
    let (_sub, rx) = census.subscribe();
    drain(&rx);

    let id = census
        .registry()
        .register(&draft("TAJ-02"), Some(&Photo::jpeg(vec![0xff, 0xd8])))
        .unwrap();

    let trees = latest(&rx);
    let view = trees.iter().find(|t| t.id == id).expect("new tree listed");
    assert_eq!(view.tree.diameter, Some(35.5));
    assert_eq!(view.tree.created_by.as_deref(), Some("ana@alcaldia.bo"));
    assert_eq!(view.sector.as_ref().map(|s| s.name.as_str()), Some("Centro"));
    assert_eq!(view.species.as_ref().map(|s| s.common_name.as_str()), Some("Tajibo"));
    assert!(view.tree.image_url.as_deref().unwrap().ends_with(".jpg"));
}

#[test]
fn failed_write_keeps_the_form_and_list() {
    let census = Census::seeded();
    census.sign_in();
    let (_sub, rx) = census.subscribe();
    let before = latest(&rx);

    census.store.fail_writes(Some(StoreError::Rejected {
        collection: Collection::Trees,
        reason: "rules".into(),
    }));
    let registry = census.registry();
    let mut form = RegistrationForm::new();
    form.draft = draft("TAJ-03");
    assert!(form.submit(&registry).is_err());
    assert_eq!(form.draft.code, "TAJ-03");
    assert!(drain(&rx).is_empty());
    assert_eq!(census.store.read_once(Collection::Trees).unwrap().len(), before.len());
}

#[test]
fn edit_and_delete_flow_through_the_list() {
    let census = Census::seeded();
    census.sign_in();
    let (_sub, rx) = census.subscribe();
    drain(&rx);
    let registry = census.registry();
    let t1 = TreeId::parse("t1").unwrap();

    registry
        .update(
            &t1,
            TreePatch {
                address: Some("Plaza 14 de Septiembre".into()),
                ..TreePatch::default()
            },
        )
        .unwrap();
    let trees = latest(&rx);
    assert_eq!(trees[0].tree.address.as_deref(), Some("Plaza 14 de Septiembre"));
    assert_eq!(trees[0].tree.code, "TAJ-01");
    assert!(trees[0].tree.modify_date.is_some());

    registry.delete(&t1).unwrap();
    assert!(latest(&rx).is_empty());
}

#[test]
fn list_helpers_work_on_synchronized_output() {
    let census = Census::seeded();
    census.sign_in();
    let registry = census.registry();
    let mut unknown = draft("X-01");
    unknown.species_id = "s9".into();
    registry.register(&unknown, None).unwrap();
    census.clock.advance_ms(1);
    registry.register(&draft("TAJ-04"), None).unwrap();

    let (_sub, rx) = census.subscribe();
    let trees = latest(&rx);
    assert_eq!(trees.len(), 3);

    assert_eq!(SpeciesFilter::from_selection("s1").apply(&trees).len(), 2);
    assert_eq!(SpeciesFilter::from_selection("").apply(&trees).len(), 3);

    let tallies = creator_tallies(&trees);
    let total: usize = tallies.iter().map(|t| t.trees).sum();
    assert_eq!(total, 3);
    assert!(tallies.iter().any(|t| t.creator == "ana@alcaldia.bo" && t.trees == 2));

    let pins = markers(&trees);
    assert_eq!(pins.len(), 3);
    assert!(pins.iter().any(|m| m.title == "X-01"));
}

#[test]
fn catalog_feeds_the_form_pickers() {
    let census = Census::seeded();
    let catalog = Catalog::load(census.store.as_ref()).unwrap();
    assert_eq!(catalog.species().len(), 1);
    assert_eq!(catalog.sectors()[0].1.name, "Centro");
}

#[test]
fn screens_require_a_session() {
    let census = Census::seeded();
    assert_eq!(require_session(census.sessions.as_ref()), Err(Route::Login));
    census.sign_in();
    let session = require_session(census.sessions.as_ref()).unwrap();
    assert_eq!(session.email, "ana@alcaldia.bo");
}
