use chrono::{TimeZone, Utc};
use docmem::{
    bson::{Bson, bson, doc},
    prelude::*,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn scores() -> InMemoryStore {
    let store = InMemoryStore::new();
    let players = store.collection("players");

    for (id, name, score, tags) in [
        ("p1", "mia", 31, vec!["red", "fast"]),
        ("p2", "ole", 12, vec!["blue"]),
        ("p3", "ada", 57, vec!["red"]),
        ("p4", "kim", 12, vec![]),
        ("p5", "bo", 44, vec!["green", "fast"]),
    ] {
        players
            .set(id, &doc! { "name": name, "score": score, "tags": tags }, SetOptions::default())
            .unwrap();
    }

    store
}

fn ids(mut query: Query) -> Vec<String> {
    query
        .get()
        .unwrap()
        .into_iter()
        .map(|doc| doc.id().to_string())
        .collect()
}

#[test]
fn where_twice_yields_the_same_documents() {
    let store = InMemoryStore::new();
    store.put("Coll1", "Doc1", &doc! { "a": "1" }, SetOptions::default()).unwrap();
    store.put("Coll1", "Doc2", &doc! { "a": "2" }, SetOptions::default()).unwrap();

    let once = store.query("Coll1").filter("a", "==", "1").unwrap();
    let twice = once.clone().filter("a", "==", "1").unwrap();

    assert_eq!(ids(once), vec!["Doc1"]);
    assert_eq!(ids(twice), vec!["Doc1"]);
}

#[test]
fn every_operator_filters_as_documented() {
    let store = scores();
    let players = store.collection("players");

    assert_eq!(ids(players.filter("score", "==", 12).unwrap()), vec!["p2", "p4"]);
    assert_eq!(ids(players.filter("score", "!=", 12).unwrap()), vec!["p1", "p3", "p5"]);
    assert_eq!(ids(players.filter("score", "<", 31).unwrap()), vec!["p2", "p4"]);
    assert_eq!(ids(players.filter("score", "<=", 31).unwrap()), vec!["p1", "p2", "p4"]);
    assert_eq!(ids(players.filter("score", ">", 44).unwrap()), vec!["p3"]);
    assert_eq!(ids(players.filter("score", ">=", 44).unwrap()), vec!["p3", "p5"]);
    assert_eq!(ids(players.filter("name", ">", "kim").unwrap()), vec!["p1", "p2"]);
    assert_eq!(ids(players.filter("tags", "array-contains", "fast").unwrap()), vec!["p1", "p5"]);
    assert_eq!(
        ids(players.filter("tags", "array-contains-any", bson!(["blue", "green"])).unwrap()),
        vec!["p2", "p5"]
    );
    assert_eq!(ids(players.filter("name", "in", bson!(["ada", "bo", "zed"])).unwrap()), vec!["p3", "p5"]);
    assert_eq!(
        ids(players.filter("name", "not-in", bson!(["ada", "bo"])).unwrap()),
        vec!["p1", "p2", "p4"]
    );
}

#[test]
fn type_mismatches_are_false_not_errors() {
    let store = scores();
    let players = store.collection("players");

    assert!(ids(players.filter("score", "==", "12").unwrap()).is_empty());
    assert!(ids(players.filter("name", "<", 100).unwrap()).is_empty());
    assert!(ids(players.filter("score", "array-contains", 12).unwrap()).is_empty());
    assert!(ids(players.filter("missing", "not-in", bson!(["x"])).unwrap()).is_empty());
}

#[test]
fn filter_by_accepts_typed_predicates() {
    let store = scores();
    let query = store
        .query("players")
        .filter_by(Filter::gte("score", 30))
        .unwrap()
        .filter_by(Filter::array_contains("tags", "red"))
        .unwrap();

    assert_eq!(ids(query), vec!["p1", "p3"]);
}

#[test]
fn eleven_values_exceed_list_operators() {
    let store = scores();
    let values = (0..11).map(|n| Bson::from(n.to_string())).collect::<Vec<_>>();

    for op in ["in", "not-in", "array-contains-any"] {
        assert_eq!(
            store.query("players").filter("name", op, values.clone()).err(),
            Some(DocumentStoreError::InvalidOperandCardinality(op.to_string()))
        );
    }

    assert_eq!(
        store.query("players").filter("name", "in", "ada").err(),
        Some(DocumentStoreError::InvalidOperandCardinality("in".to_string()))
    );
    assert!(store.query("players").filter("name", "in", values[..10].to_vec()).is_ok());
}

#[test]
fn timestamp_fields_require_date_operands() {
    let store = InMemoryStore::new();
    let events = store.collection("events");
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    for (id, hours) in [("e1", 0), ("e2", 2), ("e3", 5)] {
        events
            .set(id, &doc! { "at": start + chrono::Duration::hours(hours) }, SetOptions::default())
            .unwrap();
    }

    assert_eq!(
        events.filter("at", "==", "2024-03-01T08:00:00Z").err(),
        Some(DocumentStoreError::TimestampComparisonRequiresDate("at".to_string()))
    );
    assert!(matches!(
        events.filter("at", ">", 0),
        Err(DocumentStoreError::TimestampComparisonRequiresDate(_))
    ));

    assert_eq!(ids(events.filter("at", "==", start).unwrap()), vec!["e1"]);
    assert_eq!(
        ids(events.filter("at", ">", start + chrono::Duration::hours(1)).unwrap()),
        vec!["e2", "e3"]
    );
    assert_eq!(ids(events.order_by("at", "desc").unwrap()), vec!["e3", "e2", "e1"]);
}

#[test]
fn ascending_reversed_equals_descending() {
    let store = scores();

    for field in ["name", "score", "tags", "missing"] {
        let mut asc = ids(store.query("players").order_by(field, "asc").unwrap());
        let desc = ids(store.query("players").order_by(field, "desc").unwrap());
        asc.reverse();

        assert_eq!(asc, desc, "order_by({field})");
    }

    // Tied scores (p2, p4) come out in reverse insertion order.
    assert_eq!(
        ids(store.query("players").order_by("score", "desc").unwrap()),
        vec!["p3", "p5", "p1", "p4", "p2"]
    );
}

#[test]
fn limit_returns_min_of_size_and_n() {
    let store = scores();

    for n in [-3_i64, 0, 1, 3, 5, 8] {
        let expected = n.clamp(0, 5) as usize;
        let mut query = store.query("players").limit(n).unwrap();
        assert_eq!(query.get().unwrap().size(), expected);
    }
}

#[test]
fn steps_chain_in_any_order() {
    let store = scores();

    let fastest = store
        .query("players")
        .order_by("score", "desc")
        .unwrap()
        .filter("tags", "array-contains", "fast")
        .unwrap()
        .limit(1)
        .unwrap();
    assert_eq!(ids(fastest), vec!["p5"]);

    let page = store
        .query("players")
        .order_by("name", "asc")
        .unwrap()
        .offset(2)
        .unwrap()
        .limit(2)
        .unwrap();
    assert_eq!(ids(page), vec!["p4", "p1"]);
}

#[test]
fn queries_need_a_collection() {
    let store = scores();

    assert_eq!(store.query("").get().err(), Some(DocumentStoreError::NotCollectionScoped));
    assert_eq!(
        store.query("").filter("a", "==", 1).err(),
        Some(DocumentStoreError::NotCollectionScoped)
    );
    assert!(matches!(
        store.query("players").filter("", "==", 1),
        Err(DocumentStoreError::InvalidArgument(_))
    ));
}

#[test]
fn dotted_fields_reach_into_nested_objects() {
    let store = InMemoryStore::new();
    store.put("C", "a", &doc! { "address": { "city": "Oslo" } }, SetOptions::default()).unwrap();
    store.put("C", "b", &doc! { "address": { "city": "Bergen" } }, SetOptions::default()).unwrap();

    assert_eq!(ids(store.query("C").filter("address.city", "==", "Oslo").unwrap()), vec!["a"]);
    assert_eq!(ids(store.query("C").order_by("address.city", "asc").unwrap()), vec!["b", "a"]);
}
