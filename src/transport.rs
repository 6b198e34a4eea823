//! Peer transport seam.
//!
//! The signaling/WebRTC mesh is a collaborator; the core only needs
//! fire-and-forget broadcast on one logical channel and a peer-joined
//! trigger. `MemoryHub` wires coordinators together in-process for tests and
//! simulations; delivery there is synchronous, so implementations must not
//! broadcast while holding their state lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::sync::{ChangeMessage, SyncCoordinator};

/// The single logical channel carrying `ChangeMessage` batches.
pub const SYNC_CHANNEL: &str = "syncGraph";

pub trait PeerTransport: Send + Sync {
    /// Fire-and-forget broadcast to all session peers. No acknowledgement,
    /// no cross-peer ordering.
    fn broadcast(&self, channel: &str, changes: &[ChangeMessage]);
}

/// Transport for a standalone instance; drops every broadcast.
#[derive(Debug, Default)]
pub struct NullTransport;

impl PeerTransport for NullTransport {
    fn broadcast(&self, _channel: &str, _changes: &[ChangeMessage]) {}
}

/// In-process mesh: every attached coordinator receives what the others
/// broadcast.
#[derive(Default)]
pub struct MemoryHub {
    peers: RwLock<Vec<(u64, Weak<SyncCoordinator>)>>,
    next_endpoint: AtomicU64,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers the coordinator behind an endpoint and announces the join:
    /// every already-attached peer and the newcomer trigger their sync
    /// probes, mirroring a peer-joined event on a real mesh.
    pub fn connect(&self, endpoint: &HubEndpoint, coordinator: &Arc<SyncCoordinator>) {
        let existing: Vec<Arc<SyncCoordinator>> = {
            let mut peers = self.peers.write();
            peers.retain(|(_, peer)| peer.strong_count() > 0);
            let existing = peers
                .iter()
                .filter_map(|(_, peer)| peer.upgrade())
                .collect();
            peers.push((endpoint.id, Arc::downgrade(coordinator)));
            existing
        };
        for peer in existing {
            peer.on_peer_joined();
        }
        coordinator.on_peer_joined();
    }

    fn deliver(&self, from: u64, channel: &str, changes: &[ChangeMessage]) {
        let targets: Vec<Arc<SyncCoordinator>> = self
            .peers
            .read()
            .iter()
            .filter(|(id, _)| *id != from)
            .filter_map(|(_, peer)| peer.upgrade())
            .collect();
        for peer in targets {
            if let Err(err) = peer.on_receive_changes(changes) {
                debug!(%err, channel, "peer failed to apply broadcast");
            }
        }
    }
}

/// One peer's handle onto a `MemoryHub`; construct the coordinator with it,
/// then `connect` the pair.
pub struct HubEndpoint {
    hub: Arc<MemoryHub>,
    id: u64,
}

impl HubEndpoint {
    pub fn new(hub: &Arc<MemoryHub>) -> Arc<Self> {
        Arc::new(Self {
            hub: Arc::clone(hub),
            id: hub.next_endpoint.fetch_add(1, Ordering::Relaxed),
        })
    }
}

impl PeerTransport for HubEndpoint {
    fn broadcast(&self, channel: &str, changes: &[ChangeMessage]) {
        self.hub.deliver(self.id, channel, changes);
    }
}
