//! Property-based tests for the record store
//!
//! Invariants that should hold for ALL inputs:
//! - Determinism: identity depends only on visible fields, not on insert order
//! - Duplicates: re-inserting equal fields bumps the version, never the count
//! - Index completeness: every live record sits in exactly its own bucket
//! - Monotonicity: the revision never decreases

use proptest::prelude::*;
use record_store::{InsertOutcome, Record, RecordStore, View};
use std::collections::BTreeMap;

fn field_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,6}", "[A-Za-z0-9 ]{0,8}", 1..6)
}

fn person() -> impl Strategy<Value = (String, String)> {
    ("[A-Z][a-z]{1,5}", prop::sample::select(vec!["Male", "Female", "Other"]))
        .prop_map(|(name, gender)| (name, gender.to_string()))
}

fn indexed_store() -> RecordStore {
    let mut store = RecordStore::new();
    store.register_index("byGender", "gender");
    store
}

proptest! {
    #[test]
    fn prop_identity_ignores_field_order(fields in field_map()) {
        let forward: Vec<(String, String)> = fields.clone().into_iter().collect();
        let mut backward = forward.clone();
        backward.reverse();

        let mut a = Record::from_fields("/a", forward);
        let mut b = Record::from_fields("/b", backward);

        // the source is not part of the identity either
        prop_assert_eq!(a.compute_identity(false).to_string(), b.compute_identity(false).to_string());
    }

    #[test]
    fn prop_reserved_fields_do_not_change_identity(fields in field_map(), noise in "[a-z]{1,8}") {
        let mut plain = Record::from_fields("/a", fields.clone());
        let mut tagged = Record::from_fields("/a", fields).with_field("__note", noise.as_str());

        prop_assert_eq!(plain.compute_identity(false).to_string(), tagged.compute_identity(false).to_string());
    }

    #[test]
    fn prop_duplicate_bumps_version_not_count(fields in field_map(), repeats in 1usize..5) {
        let mut store = RecordStore::new();
        let first = store.insert(Record::from_fields("/a", fields.clone()));
        prop_assert!(first.is_inserted());

        for i in 0..repeats {
            match store.insert(Record::from_fields("/a", fields.clone())) {
                InsertOutcome::Duplicate { version, .. } => prop_assert_eq!(version, i as u64 + 2),
                InsertOutcome::Inserted(_) => prop_assert!(false, "duplicate inserted"),
            }
        }
        prop_assert_eq!(store.entry_count(), 1);
    }

    #[test]
    fn prop_index_completeness(people in prop::collection::vec(person(), 0..30), removals in prop::collection::vec(any::<prop::sample::Index>(), 0..10)) {
        let mut store = indexed_store();
        let mut live = Vec::new();
        for (name, gender) in &people {
            let record = Record::new("/a").with_field("name", name.as_str()).with_field("gender", gender.as_str());
            if let InsertOutcome::Inserted(id) = store.insert(record) {
                live.push(id);
            }
        }
        for index in removals {
            if live.is_empty() {
                break;
            }
            let id = live.remove(index.index(live.len()));
            store.remove(&id).unwrap();
        }

        let keys: Vec<String> = match store.view("byGender", None).unwrap() {
            View::Keys(keys) => keys.into_iter().map(str::to_string).collect(),
            View::Records(_) => unreachable!(),
        };

        let mut seen = 0;
        for key in &keys {
            let bucket = store.view("byGender", Some(key)).unwrap();
            // empty buckets are deleted
            prop_assert!(!bucket.is_empty());
            for record in bucket.records() {
                prop_assert_eq!(record.field("gender").map(|v| v.key()), Some(key.clone()));
            }
            seen += bucket.len();
        }
        prop_assert_eq!(seen, store.entry_count());
        prop_assert_eq!(store.entry_count(), live.len());
    }

    #[test]
    fn prop_revision_monotonic(people in prop::collection::vec(person(), 1..30)) {
        let mut store = indexed_store();
        let mut last = store.revision();

        for (name, gender) in &people {
            let record = Record::new("/a").with_field("name", name.as_str()).with_field("gender", gender.as_str());
            let outcome = store.insert(record);
            prop_assert!(store.revision() > last);
            last = store.revision();

            if outcome.is_inserted() && name.len() % 2 == 0 {
                store.remove(outcome.identity()).unwrap();
                prop_assert!(store.revision() > last);
                last = store.revision();
            }
        }
    }

    #[test]
    fn prop_unknown_index_always_fails(name in "[a-z]{1,12}", value in proptest::option::of("[a-z]{1,4}")) {
        let store = indexed_store();
        let unknown = format!("no{}", name);
        prop_assert!(store.view(&unknown, value.as_deref()).is_err());
    }
}
