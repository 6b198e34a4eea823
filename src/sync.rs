//! Replication: change messages, LWW conflict resolution, and the
//! coordinator driving apply → persist → broadcast.
//!
//! One mutex serializes every mutating entry point, local or inbound; a
//! `syncReceive` arriving mid-mutation queues on the lock. The transport is
//! only ever called after the lock is released, so synchronous in-process
//! delivery cannot re-enter a held lock.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    engine::{QueryEngine, QueryRequest},
    errors::SyncGraphError,
    persist::{BlobStore, CrossInstanceNotifier, PersistenceGateway},
    snapshot,
    store::{self, GraphStore, NodeRecord},
    subscribe::SubscriberCallback,
    transport::{PeerTransport, SYNC_CHANNEL},
};

/// Wire unit of replication. Tagged to match the portable message shape:
/// `{type, id?, value?, sourceId?, targetId?, hash?, graph?, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeMessage {
    Insert {
        id: String,
        value: Value,
        timestamp: i64,
    },
    Update {
        id: String,
        value: Value,
        timestamp: i64,
    },
    Remove {
        id: String,
        value: Value,
        timestamp: i64,
    },
    Link {
        source_id: String,
        target_id: String,
        timestamp: i64,
    },
    /// Anti-entropy probe: content hash plus newest local write time.
    Sync { hash: String, timestamp: i64 },
    /// Full-graph push answering a divergent probe.
    SyncReceive {
        graph: AHashMap<String, NodeRecord>,
        timestamp: i64,
    },
}

/// Outcome of conflict resolution: the value/timestamp to store.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    pub timestamp: i64,
}

/// Last-write-wins over the node's single register. Incoming wins only when
/// the node is not yet materialized or strictly newer; ties keep the stored
/// value.
pub fn resolve_update(
    current: Option<&NodeRecord>,
    incoming_value: &Value,
    incoming_timestamp: i64,
) -> Option<Resolution> {
    match current {
        Some(node) if node.timestamp >= incoming_timestamp => None,
        _ => Some(Resolution {
            value: incoming_value.clone(),
            timestamp: incoming_timestamp,
        }),
    }
}

struct CoreState {
    store: GraphStore,
    engine: QueryEngine,
}

/// Owns the store/engine pair and reconciles it with remote replicas.
/// Local mutations run apply → persist → broadcast; inbound batches run
/// conflict resolution → apply → persist → notify.
pub struct SyncCoordinator {
    name: String,
    state: Mutex<CoreState>,
    gateway: PersistenceGateway,
    transport: Arc<dyn PeerTransport>,
}

impl SyncCoordinator {
    /// Loads the snapshot blob (degrading to an empty graph on any load
    /// problem) and binds the collaborators.
    pub fn open(
        name: &str,
        transport: Arc<dyn PeerTransport>,
        blobs: Arc<dyn BlobStore>,
        notifier: Option<Arc<dyn CrossInstanceNotifier>>,
    ) -> Self {
        let gateway = PersistenceGateway::new(name, blobs, notifier);
        let store = gateway.load_graph();
        Self {
            name: name.to_string(),
            state: Mutex::new(CoreState {
                store,
                engine: QueryEngine::new(),
            }),
            gateway,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores a value under a content-derived id and returns the id.
    pub fn put(&self, value: Value) -> Result<String, SyncGraphError> {
        let id = snapshot::content_id(&value)?;
        self.put_with_id(&id, value)?;
        Ok(id)
    }

    /// Stores a value under a caller-supplied id. Broadcasts `insert` for a
    /// new node, `update` for an overwrite.
    pub fn put_with_id(&self, id: &str, value: Value) -> Result<(), SyncGraphError> {
        let message = {
            let mut state = self.state.lock();
            let existed = state.store.contains(id);
            let timestamp = state.store.insert(id, value.clone());
            self.commit(&mut state)?;
            if existed {
                ChangeMessage::Update {
                    id: id.to_string(),
                    value,
                    timestamp,
                }
            } else {
                ChangeMessage::Insert {
                    id: id.to_string(),
                    value,
                    timestamp,
                }
            }
        };
        self.transport
            .broadcast(SYNC_CHANNEL, std::slice::from_ref(&message));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<NodeRecord> {
        self.state.lock().store.get(id)
    }

    /// Deletes the node and prunes referencing edges. Removing an absent id
    /// is a logged no-op.
    pub fn remove(&self, id: &str) -> Result<Option<NodeRecord>, SyncGraphError> {
        let (removed, message) = {
            let mut state = self.state.lock();
            match state.store.remove(id) {
                Some(removed) => {
                    self.commit(&mut state)?;
                    let message = ChangeMessage::Remove {
                        id: id.to_string(),
                        value: removed.value.clone(),
                        timestamp: removed.timestamp,
                    };
                    (Some(removed), Some(message))
                }
                None => (None, None),
            }
        };
        if let Some(message) = &message {
            self.transport
                .broadcast(SYNC_CHANNEL, std::slice::from_ref(message));
        }
        Ok(removed)
    }

    /// Adds a deduplicated directed edge; true when the graph changed.
    pub fn link(&self, source: &str, target: &str) -> Result<bool, SyncGraphError> {
        let message = {
            let mut state = self.state.lock();
            if !state.store.link(source, target) {
                return Ok(false);
            }
            self.commit(&mut state)?;
            ChangeMessage::Link {
                source_id: source.to_string(),
                target_id: target.to_string(),
                timestamp: store::now_millis(),
            }
        };
        self.transport
            .broadcast(SYNC_CHANNEL, std::slice::from_ref(&message));
        Ok(true)
    }

    pub fn map(&self, request: &QueryRequest) -> Result<Vec<NodeRecord>, SyncGraphError> {
        let state = self.state.lock();
        state.engine.execute(&state.store, request)
    }

    /// `map` over a loosely-typed request object.
    pub fn map_value(&self, request: &Value) -> Result<Vec<NodeRecord>, SyncGraphError> {
        self.map(&QueryRequest::from_value(request)?)
    }

    pub fn subscribe(
        &self,
        request: QueryRequest,
        callback: SubscriberCallback,
    ) -> Result<u64, SyncGraphError> {
        let mut state = self.state.lock();
        let CoreState { store, engine } = &mut *state;
        engine.subscribe(store, request, callback)
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        self.state.lock().engine.unsubscribe(id)
    }

    /// Snapshot copy of the node map.
    pub fn export(&self) -> AHashMap<String, NodeRecord> {
        self.state.lock().store.export()
    }

    pub fn content_hash(&self) -> Result<String, SyncGraphError> {
        self.state.lock().store.content_hash()
    }

    /// Ingests an inbound batch. `insert`/`remove`/`link` apply
    /// unconditionally; `update` goes through the LWW resolver; `sync`
    /// probes may answer with a full-graph push; `syncReceive` replaces the
    /// graph wholesale. Application is idempotent, so duplicated or
    /// reordered batches are tolerated.
    pub fn on_receive_changes(&self, changes: &[ChangeMessage]) -> Result<(), SyncGraphError> {
        let mut outbound: Vec<ChangeMessage> = Vec::new();
        {
            let mut state = self.state.lock();
            let mut applied = false;
            for change in changes {
                match change {
                    ChangeMessage::Insert {
                        id,
                        value,
                        timestamp,
                    } => {
                        state.store.insert_at(id, value.clone(), *timestamp);
                        applied = true;
                    }
                    ChangeMessage::Update {
                        id,
                        value,
                        timestamp,
                    } => match resolve_update(state.store.node(id), value, *timestamp) {
                        Some(resolution) => {
                            state
                                .store
                                .insert_at(id, resolution.value, resolution.timestamp);
                            applied = true;
                        }
                        None => debug!(%id, timestamp = *timestamp, "stale update dropped"),
                    },
                    ChangeMessage::Remove { id, .. } => {
                        if state.store.remove(id).is_some() {
                            applied = true;
                        }
                    }
                    ChangeMessage::Link {
                        source_id,
                        target_id,
                        ..
                    } => {
                        if state.store.link(source_id, target_id) {
                            applied = true;
                        }
                    }
                    ChangeMessage::Sync { hash, timestamp } => {
                        let local_hash = state.store.content_hash()?;
                        let local_timestamp = state.store.last_timestamp();
                        if local_hash != *hash && local_timestamp > *timestamp {
                            outbound.push(ChangeMessage::SyncReceive {
                                graph: state.store.export(),
                                timestamp: local_timestamp,
                            });
                        }
                    }
                    ChangeMessage::SyncReceive { graph, .. } => {
                        state.store.replace_all(graph.clone());
                        applied = true;
                    }
                }
            }
            if applied {
                self.commit(&mut state)?;
            }
        }
        if !outbound.is_empty() {
            self.transport.broadcast(SYNC_CHANNEL, &outbound);
        }
        Ok(())
    }

    /// Kicks anti-entropy against a newly connected peer.
    pub fn on_peer_joined(&self) {
        let probe = {
            let state = self.state.lock();
            match state.store.content_hash() {
                Ok(hash) => ChangeMessage::Sync {
                    hash,
                    timestamp: state.store.last_timestamp(),
                },
                Err(err) => {
                    warn!(%err, "content hash failed, skipping sync probe");
                    return;
                }
            }
        };
        self.transport
            .broadcast(SYNC_CHANNEL, std::slice::from_ref(&probe));
    }

    /// Persist, then notify subscribers. Called with the state lock held;
    /// a persistence failure propagates to the mutating caller and skips
    /// both notification and broadcast (the next successful commit rewrites
    /// the whole snapshot anyway).
    fn commit(&self, state: &mut CoreState) -> Result<(), SyncGraphError> {
        self.gateway.save_graph(&state.store)?;
        let CoreState { store, engine } = state;
        engine.notify_mutation(store);
        Ok(())
    }
}
