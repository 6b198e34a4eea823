//! Persistence collaborators.
//!
//! Durable blob I/O lives behind `BlobStore`; the core treats a save as a
//! synchronous call and uses exactly one blob per database instance. Load
//! problems are never fatal: a missing or corrupt snapshot degrades to an
//! empty graph with a warning.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::warn;

use crate::{errors::SyncGraphError, snapshot, store::GraphStore};

pub trait BlobStore: Send + Sync {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, SyncGraphError>;
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), SyncGraphError>;
}

/// Fire-and-forget "storage changed" signal to sibling instances sharing the
/// same origin; invoked after every successful persist.
pub trait CrossInstanceNotifier: Send + Sync {
    fn notify(&self, channel: &str);
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<AHashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.read().contains_key(name)
    }

    pub fn put(&self, name: &str, bytes: Vec<u8>) {
        self.blobs.write().insert(name.to_string(), bytes);
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, SyncGraphError> {
        Ok(self.blobs.read().get(name).cloned())
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), SyncGraphError> {
        self.blobs.write().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Binds a database name to its blob and notifier.
pub struct PersistenceGateway {
    blobs: Arc<dyn BlobStore>,
    notifier: Option<Arc<dyn CrossInstanceNotifier>>,
    blob_name: String,
    db_name: String,
}

impl PersistenceGateway {
    pub fn new(
        db_name: &str,
        blobs: Arc<dyn BlobStore>,
        notifier: Option<Arc<dyn CrossInstanceNotifier>>,
    ) -> Self {
        Self {
            blobs,
            notifier,
            blob_name: snapshot::blob_name(db_name),
            db_name: db_name.to_string(),
        }
    }

    /// Loads the snapshot; every failure path degrades to an empty graph.
    pub fn load_graph(&self) -> GraphStore {
        let bytes = match self.blobs.load(&self.blob_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return GraphStore::new(),
            Err(err) => {
                warn!(%err, blob = %self.blob_name, "snapshot load failed, starting empty");
                return GraphStore::new();
            }
        };
        let mut store = GraphStore::new();
        if let Err(err) = store.deserialize(&bytes) {
            warn!(%err, blob = %self.blob_name, "corrupt snapshot, starting empty");
            return GraphStore::new();
        }
        store
    }

    /// Rewrites the whole snapshot, then signals sibling instances.
    pub fn save_graph(&self, store: &GraphStore) -> Result<(), SyncGraphError> {
        let bytes = store.serialize()?;
        self.blobs.save(&self.blob_name, &bytes)?;
        if let Some(notifier) = &self.notifier {
            notifier.notify(&self.db_name);
        }
        Ok(())
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }
}
