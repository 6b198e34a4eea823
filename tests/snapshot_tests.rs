use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use syncgraph::{
    CrossInstanceNotifier, GraphStore, MemoryBlobStore, PersistenceGateway, snapshot,
};

fn populated_store() -> GraphStore {
    let mut store = GraphStore::new();
    store.insert_at("user_1", json!({ "name": "Ada", "age": 36 }), 100);
    store.insert_at("user_2", json!({ "name": "Grácè", "tags": ["a", "b"] }), 200);
    store.insert_at("note", json!({ "body": { "text": "nested", "depth": 2 } }), 300);
    store.link("user_1", "user_2");
    store.link("user_2", "note");
    store
}

#[test]
fn test_snapshot_round_trip() {
    let store = populated_store();
    let bytes = store.serialize().expect("serialize");
    let mut restored = GraphStore::new();
    restored.deserialize(&bytes).expect("deserialize");
    assert_eq!(store, restored);
}

#[test]
fn test_empty_snapshot_round_trip() {
    let store = GraphStore::new();
    let bytes = store.serialize().expect("serialize");
    let mut restored = GraphStore::new();
    restored.deserialize(&bytes).expect("deserialize");
    assert!(restored.is_empty());
}

#[test]
fn test_corrupt_snapshot_is_serialization_error() {
    let mut store = GraphStore::new();
    let err = store.deserialize(b"not a snapshot").expect_err("corrupt bytes");
    assert!(matches!(err, syncgraph::SyncGraphError::Serialization(_)));
}

#[test]
fn test_content_hash_ignores_insertion_order() {
    let mut forward = GraphStore::new();
    forward.insert_at("a", json!({ "n": 1 }), 10);
    forward.insert_at("b", json!({ "n": 2 }), 20);
    let mut reversed = GraphStore::new();
    reversed.insert_at("b", json!({ "n": 2 }), 20);
    reversed.insert_at("a", json!({ "n": 1 }), 10);
    assert_eq!(
        forward.content_hash().expect("hash"),
        reversed.content_hash().expect("hash")
    );
}

#[test]
fn test_content_hash_detects_divergence() {
    let mut left = GraphStore::new();
    left.insert_at("a", json!({ "n": 1 }), 10);
    let mut right = GraphStore::new();
    right.insert_at("a", json!({ "n": 2 }), 10);
    assert_ne!(
        left.content_hash().expect("hash"),
        right.content_hash().expect("hash")
    );
}

#[test]
fn test_content_id_is_stable_per_value() {
    let id_a = snapshot::content_id(&json!({ "name": "Test" })).expect("id");
    let id_b = snapshot::content_id(&json!({ "name": "Test" })).expect("id");
    let id_c = snapshot::content_id(&json!({ "name": "Other" })).expect("id");
    assert_eq!(id_a, id_b);
    assert_ne!(id_a, id_c);
    assert_eq!(id_a.len(), 16);
}

#[test]
fn test_blob_name_format() {
    assert_eq!(snapshot::blob_name("mydb"), "mydb_graph.msgpack");
}

#[test]
fn test_gateway_round_trip() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let gateway = PersistenceGateway::new("mydb", blobs.clone(), None);
    let store = populated_store();
    gateway.save_graph(&store).expect("save");
    assert!(blobs.contains("mydb_graph.msgpack"));
    assert_eq!(gateway.load_graph(), store);
}

#[test]
fn test_gateway_missing_blob_degrades_to_empty() {
    let gateway = PersistenceGateway::new("mydb", Arc::new(MemoryBlobStore::new()), None);
    assert!(gateway.load_graph().is_empty());
}

#[test]
fn test_gateway_corrupt_blob_degrades_to_empty() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.put("mydb_graph.msgpack", vec![0xde, 0xad, 0xbe, 0xef]);
    let gateway = PersistenceGateway::new("mydb", blobs, None);
    assert!(gateway.load_graph().is_empty());
}

struct CountingNotifier {
    calls: AtomicUsize,
}

impl CrossInstanceNotifier for CountingNotifier {
    fn notify(&self, channel: &str) {
        assert_eq!(channel, "mydb");
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_gateway_notifies_after_save() {
    let notifier = Arc::new(CountingNotifier {
        calls: AtomicUsize::new(0),
    });
    let gateway = PersistenceGateway::new(
        "mydb",
        Arc::new(MemoryBlobStore::new()),
        Some(notifier.clone()),
    );
    gateway.save_graph(&populated_store()).expect("save");
    gateway.save_graph(&GraphStore::new()).expect("save");
    assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
}
