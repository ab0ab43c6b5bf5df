use chrono::{TimeZone, Utc};
use docmem::{
    bson::{Bson, doc},
    prelude::*,
};
use serde::Deserialize;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    name: String,
    age: u32,
    tags: Vec<String>,
}

#[test]
fn normalize_keeps_scalars_and_nested_objects() {
    let joined = Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap();
    let fields = normalize_document(&doc! {
        "name": "Alice",
        "age": 30,
        "score": 1.5,
        "active": true,
        "nothing": Bson::Null,
        "address": { "city": "Oslo", "zip": 150 },
        "joined": joined,
        "tags": ["a", "b"],
    })
    .unwrap();

    assert_eq!(fields["name"], Value::from("Alice"));
    assert_eq!(fields["age"], Value::Number(30.0));
    assert_eq!(fields["score"], Value::Number(1.5));
    assert_eq!(fields["active"], Value::Bool(true));
    assert_eq!(fields["nothing"], Value::Null);
    assert_eq!(fields["address"].kind(), ValueKind::Object);
    assert_eq!(fields["address"].as_object().unwrap()["city"], Value::from("Oslo"));
    assert_eq!(fields["joined"].as_timestamp().unwrap().to_date(), joined);
    assert_eq!(fields["tags"].as_array().unwrap().len(), 2);
}

#[test]
fn normalize_reports_every_unassigned_field() {
    let result = normalize_document(&doc! {
        "a": Bson::Undefined,
        "b": { "c": Bson::Undefined },
        "d": 1,
    });

    assert_eq!(
        result,
        Err(DocumentStoreError::ContainsUnassignedField(vec![
            "a".to_string(),
            "b.c".to_string()
        ]))
    );
}

#[test]
fn json_input_is_normalized() {
    let value = normalize_json(&serde_json::json!({ "a": 1, "b": [true, null], "c": { "d": "x" } })).unwrap();
    let fields = value.as_object().unwrap();

    assert_eq!(fields["a"], Value::Number(1.0));
    assert_eq!(fields["b"], Value::Array(vec![Value::Bool(true), Value::Null]));
    assert_eq!(
        value.to_json().unwrap(),
        serde_json::json!({ "a": 1.0, "b": [true, null], "c": { "d": "x" } })
    );

    assert!(matches!(
        normalize_json(&serde_json::json!({ "a": [[1]] })),
        Err(DocumentStoreError::NestedArray(_))
    ));
}

#[test]
fn merge_scenario() {
    let store = InMemoryStore::new();

    store.put("Coll1", "Doc1", &doc! { "a": "1", "b": "2" }, SetOptions::default()).unwrap();
    store.put("Coll1", "Doc1", &doc! { "a": "2" }, SetOptions::merge()).unwrap();

    let mut expected = Map::new();
    expected.insert("a".to_string(), Value::from("2"));
    expected.insert("b".to_string(), Value::from("2"));

    assert_eq!(store.get("Coll1", "Doc1"), Some(Value::Object(expected)));
}

#[test]
fn patch_requires_an_existing_document() {
    let store = InMemoryStore::new();

    for (collection, id) in [("Coll1", "Doc1"), ("Coll1", ""), ("", "Doc1")] {
        assert_eq!(
            store.patch(collection, id, &doc! { "a": 1 }),
            Err(DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))
        );
    }
}

#[test]
fn replacing_a_missing_document_equals_merging_into_nothing() {
    let replace = InMemoryStore::new();
    let merge = InMemoryStore::new();
    let data = doc! { "a": "1", "nested": { "b": 2 } };

    replace.put("C", "D", &data, SetOptions::default()).unwrap();
    merge.put("C", "D", &data, SetOptions::merge()).unwrap();

    assert_eq!(replace.get("C", "D"), merge.get("C", "D"));
}

#[test]
fn nested_arrays_are_rejected() {
    let store = InMemoryStore::new();

    assert_eq!(
        store.put("C", "D", &doc! { "matrix": [[1, 2], [3]] }, SetOptions::default()),
        Err(DocumentStoreError::NestedArray("matrix[0]".to_string()))
    );
    assert!(store.get("C", "D").is_none());
}

#[test]
fn documents_deserialize_into_structs() {
    let store = InMemoryStore::new();
    let users = store.collection("users");

    users
        .set("alice", &doc! { "name": "Alice", "age": 30, "tags": ["admin"] }, SetOptions::default())
        .unwrap();

    let alice = users.get("alice").unwrap();
    assert_eq!(alice.id(), "alice");
    assert_eq!(
        alice.deserialize::<User>().unwrap(),
        User { name: "Alice".to_string(), age: 30, tags: vec!["admin".to_string()] }
    );

    assert!(matches!(
        alice.deserialize::<Vec<String>>(),
        Err(DocumentStoreError::Serialization(_))
    ));
}

#[test]
fn add_and_clear_data() {
    let store = InMemoryStore::new();
    let id = store.add("Test", &doc! { "doc": 1 }).unwrap();

    assert_eq!(id.len(), 32);
    assert!(store.get("Test", &id).is_some());
    assert_eq!(store.list_collections(), vec!["Test".to_string()]);

    store.clear_data();

    assert!(store.get("Test", &id).is_none());
    assert!(store.query("Test").get().unwrap().is_empty());
}

#[test]
fn store_handles_share_state() {
    let store = InMemoryStore::builder().config(&StoreConfig::default()).build();
    let other = store.clone();

    store.put("C", "D", &doc! { "a": 1 }, SetOptions::default()).unwrap();
    assert!(other.get("C", "D").is_some());

    other.remove("C", "D");
    assert!(store.get("C", "D").is_none());
}
