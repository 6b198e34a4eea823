//! Embedded, peer-replicated graph store: LWW node records, a
//! predicate/traversal query language, single-blob snapshot persistence, and
//! hash-probe anti-entropy reconciliation.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod bench_utils;
pub mod engine;
pub mod errors;
pub mod persist;
pub mod predicate;
pub mod snapshot;
pub mod store;
pub mod subscribe;
pub mod sync;
pub mod transport;
pub mod traverse;

pub use crate::engine::{Order, QueryEngine, QueryRequest};
pub use crate::errors::SyncGraphError;
pub use crate::persist::{BlobStore, CrossInstanceNotifier, MemoryBlobStore, PersistenceGateway};
pub use crate::predicate::{FieldOp, Predicate};
pub use crate::store::{GraphStore, NodeRecord};
pub use crate::subscribe::{ChangeKind, SubscriberCallback};
pub use crate::sync::{ChangeMessage, Resolution, SyncCoordinator, resolve_update};
pub use crate::transport::{HubEndpoint, MemoryHub, NullTransport, PeerTransport, SYNC_CHANNEL};
