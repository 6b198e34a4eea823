use serde_json::json;
use syncgraph::GraphStore;

fn build_store(ids: &[&str]) -> GraphStore {
    let mut store = GraphStore::new();
    for id in ids {
        store.insert(id, json!({ "name": id }));
    }
    store
}

#[test]
fn test_insert_and_get() {
    let mut store = GraphStore::new();
    store.insert("a", json!({ "name": "Test" }));
    let node = store.get("a").expect("node");
    assert_eq!(node.id, "a");
    assert_eq!(node.value["name"], "Test");
    assert!(node.edges.is_empty());
    assert!(node.timestamp > 0);
}

#[test]
fn test_get_absent_returns_none() {
    let store = GraphStore::new();
    assert!(store.get("missing").is_none());
}

#[test]
fn test_insert_overwrites_and_keeps_edges() {
    let mut store = build_store(&["a", "b"]);
    assert!(store.link("a", "b"));
    store.insert("a", json!({ "name": "renamed" }));
    let node = store.get("a").expect("node");
    assert_eq!(node.value["name"], "renamed");
    assert_eq!(node.edges, vec!["b".to_string()]);
}

#[test]
fn test_link_requires_both_endpoints() {
    let mut store = build_store(&["a"]);
    assert!(!store.link("a", "ghost"));
    assert!(!store.link("ghost", "a"));
    assert!(store.get("a").expect("node").edges.is_empty());
}

#[test]
fn test_link_deduplicates() {
    let mut store = build_store(&["a", "b"]);
    assert!(store.link("a", "b"));
    assert!(!store.link("a", "b"));
    assert_eq!(store.get("a").expect("node").edges.len(), 1);
}

#[test]
fn test_remove_prunes_dangling_edges() {
    let mut store = build_store(&["a", "b", "c"]);
    store.link("a", "b");
    store.link("c", "b");
    store.link("b", "c");
    store.remove("b");
    assert!(store.get("b").is_none());
    for id in ["a", "c"] {
        let node = store.get(id).expect("node");
        assert!(
            !node.edges.iter().any(|edge| edge == "b"),
            "{id} still references removed node"
        );
    }
}

#[test]
fn test_remove_absent_is_noop() {
    let mut store = build_store(&["a"]);
    assert!(store.remove("ghost").is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_repeated_operations_are_idempotent() {
    let mut store = GraphStore::new();
    store.insert_at("a", json!({ "n": 1 }), 10);
    store.insert_at("b", json!({ "n": 2 }), 11);
    store.link("a", "b");

    let mut replay = store.clone();
    replay.insert_at("a", json!({ "n": 1 }), 10);
    replay.link("a", "b");
    replay.remove("ghost");
    assert_eq!(store, replay);

    replay.remove("b");
    replay.remove("b");
    assert!(replay.get("b").is_none());
    assert!(replay.get("a").expect("node").edges.is_empty());
}

#[test]
fn test_last_timestamp_tracks_max() {
    let mut store = GraphStore::new();
    assert_eq!(store.last_timestamp(), 0);
    store.insert_at("a", json!({}), 5);
    store.insert_at("b", json!({}), 9);
    store.insert_at("c", json!({}), 7);
    assert_eq!(store.last_timestamp(), 9);
}
