use std::time::{SystemTime, UNIX_EPOCH};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{errors::SyncGraphError, snapshot};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub value: Value,
    pub edges: Vec<String>,
    pub timestamp: i64,
}

/// In-memory node/edge table. Sole owner of `NodeRecord` memory: reads hand
/// out clones, never references that could outlive a later mutation.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: AHashMap<String, NodeRecord>,
    /// Highest timestamp ever stamped or applied; local stamps must exceed
    /// it so that back-to-back writes in one millisecond stay ordered.
    clock: i64,
}

impl PartialEq for GraphStore {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<NodeRecord> {
        self.nodes.get(id).cloned()
    }

    /// Overwrites the node value and stamps a logical write time: the wall
    /// clock, bumped past the newest timestamp this store has seen. Edges of
    /// an existing node survive the overwrite; only `remove` severs links.
    /// Returns the stamped timestamp.
    pub fn insert(&mut self, id: &str, value: Value) -> i64 {
        let timestamp = now_millis().max(self.clock + 1);
        self.insert_at(id, value, timestamp);
        timestamp
    }

    /// Overwrite with a caller-provided timestamp (replication apply path).
    pub fn insert_at(&mut self, id: &str, value: Value, timestamp: i64) {
        self.clock = self.clock.max(timestamp);
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.value = value;
                node.timestamp = timestamp;
            }
            None => {
                self.nodes.insert(
                    id.to_string(),
                    NodeRecord {
                        id: id.to_string(),
                        value,
                        edges: Vec::new(),
                        timestamp,
                    },
                );
            }
        }
    }

    /// Adds a directed edge. No-op returning false unless both endpoints
    /// exist and the edge is absent.
    pub fn link(&mut self, source: &str, target: &str) -> bool {
        if !self.nodes.contains_key(target) {
            debug!(node = target, "link to absent node ignored");
            return false;
        }
        let Some(node) = self.nodes.get_mut(source) else {
            debug!(node = source, "link from absent node ignored");
            return false;
        };
        if node.edges.iter().any(|edge| edge == target) {
            return false;
        }
        node.edges.push(target.to_string());
        true
    }

    /// Deletes the node and prunes every edge list referencing it, so no
    /// dangling reference survives the call.
    pub fn remove(&mut self, id: &str) -> Option<NodeRecord> {
        let removed = self.nodes.remove(id);
        if removed.is_none() {
            debug!(id, "remove of absent node ignored");
            return None;
        }
        for node in self.nodes.values_mut() {
            node.edges.retain(|edge| edge != id);
        }
        removed
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SyncGraphError> {
        snapshot::encode(&self.nodes)
    }

    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), SyncGraphError> {
        self.replace_all(snapshot::decode(bytes)?);
        Ok(())
    }

    /// Wholesale replacement of the node map (anti-entropy receive path).
    pub fn replace_all(&mut self, nodes: AHashMap<String, NodeRecord>) {
        self.nodes = nodes;
        self.clock = self.clock.max(self.last_timestamp());
    }

    pub fn export(&self) -> AHashMap<String, NodeRecord> {
        self.nodes.clone()
    }

    pub fn content_hash(&self) -> Result<String, SyncGraphError> {
        snapshot::content_hash(&self.nodes)
    }

    /// Largest write timestamp in the graph, 0 when empty.
    pub fn last_timestamp(&self) -> i64 {
        self.nodes.values().map(|node| node.timestamp).max().unwrap_or(0)
    }

    pub(crate) fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    pub(crate) fn nodes(&self) -> &AHashMap<String, NodeRecord> {
        &self.nodes
    }
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
