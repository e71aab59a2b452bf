use std::collections::BTreeMap;

use arbolado::core::{Sector, SectorId, Snapshot, Species, SpeciesId, Tree};
use arbolado::sync::{LookupTable, TreeTable, denormalize};
use proptest::prelude::*;
use serde_json::{Value, json};

fn key_strategy(prefix: &'static str) -> impl Strategy<Value = String> {
    (0u8..64).prop_map(move |n| format!("{prefix}{n}"))
}

fn tree_strategy() -> impl Strategy<Value = Value> {
    (
        proptest::option::of(key_strategy("s")),
        proptest::option::of(key_strategy("k")),
        "[A-Z]{3}-[0-9]{2}",
        proptest::option::of(-90.0f64..90.0),
        proptest::option::of(1.0f64..300.0),
    )
        .prop_map(|(species, sector, code, lat, diameter)| {
            let mut doc = json!({"code": code});
            if let Some(s) = species {
                doc["speciesId"] = json!(s);
            }
            if let Some(k) = sector {
                doc["sectorId"] = json!(k);
            }
            if let Some(lat) = lat {
                doc["latitude"] = json!(lat);
            }
            if let Some(d) = diameter {
                doc["diameter"] = json!(d);
            }
            doc
        })
}

fn collection(entries: BTreeMap<String, Value>) -> Snapshot {
    Snapshot::new(entries.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn one_view_per_tree_with_scalars_and_lookups_intact(
        trees in proptest::collection::btree_map(key_strategy("t"), tree_strategy(), 0..20),
        species in proptest::collection::btree_map(key_strategy("s"), "[a-z]{1,8}", 0..12),
        sectors in proptest::collection::btree_map(key_strategy("k"), "[a-z]{1,8}", 0..12),
    ) {
        let species_snapshot = collection(
            species.iter().map(|(k, name)| (k.clone(), json!({"commonName": name}))).collect(),
        );
        let sector_snapshot = collection(
            sectors.iter().map(|(k, name)| (k.clone(), json!({"name": name}))).collect(),
        );
        let tree_snapshot = collection(trees.clone());

        let mut species_table = LookupTable::new();
        species_table.replace(species_snapshot.decode_each::<SpeciesId, Species>("species").rows);
        let mut sector_table = LookupTable::new();
        sector_table.replace(sector_snapshot.decode_each::<SectorId, Sector>("sectors").rows);
        let mut tree_table = TreeTable::default();
        tree_table.replace(tree_snapshot.decode_trees("trees").rows);

        let views = denormalize(&tree_table, &species_table, &sector_table);
        prop_assert_eq!(views.len(), trees.len());

        for (view, (key, raw)) in views.iter().zip(trees.iter()) {
            prop_assert_eq!(view.id.as_str(), key.as_str());
            let stored: Tree = serde_json::from_value(raw.clone()).unwrap();
            prop_assert_eq!(&view.tree, &stored);

            let expected_species = view
                .species_id()
                .and_then(|id| species.get(id.as_str()))
                .map(|name| Species::named(name.clone()));
            prop_assert_eq!(&view.species, &expected_species);

            let expected_sector = view
                .sector_id()
                .and_then(|id| sectors.get(id.as_str()))
                .cloned();
            prop_assert_eq!(view.sector.as_ref().map(|s| s.name.clone()), expected_sector);
        }

        let again = denormalize(&tree_table, &species_table, &sector_table);
        prop_assert_eq!(views, again);
    }
}
