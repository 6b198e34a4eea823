//! Live query subscriptions.
//!
//! Each subscription retains its last materialized result set. After every
//! committed mutation the engine recomputes the set and diffs it against the
//! retained one, by id and by deep value/edge equality (a bare timestamp
//! restamp is not a change). Callbacks fire synchronously on the mutating
//! thread.

use ahash::AHashMap;

use crate::{engine::QueryRequest, store::NodeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// Whole-set callbacks receive the full recomputed result whenever it
/// changed; per-change callbacks receive each classified record.
pub enum SubscriberCallback {
    Full(Box<dyn FnMut(&[NodeRecord]) + Send>),
    PerChange(Box<dyn FnMut(&NodeRecord, ChangeKind) + Send>),
}

pub(crate) struct Subscription {
    pub request: QueryRequest,
    pub last: Vec<NodeRecord>,
    pub callback: SubscriberCallback,
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: AHashMap<u64, Subscription>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn add(&mut self, subscription: Subscription) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, subscription);
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Subscription> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Diffs the fresh result against the retained one and invokes the callback,
/// then retains the fresh set.
pub(crate) fn deliver(subscription: &mut Subscription, fresh: Vec<NodeRecord>) {
    let previous: AHashMap<&str, &NodeRecord> = subscription
        .last
        .iter()
        .map(|record| (record.id.as_str(), record))
        .collect();
    let current: AHashMap<&str, &NodeRecord> = fresh
        .iter()
        .map(|record| (record.id.as_str(), record))
        .collect();

    let mut added = Vec::new();
    let mut updated = Vec::new();
    for record in &fresh {
        match previous.get(record.id.as_str()) {
            None => added.push(record.clone()),
            Some(old) if !same_content(old, record) => updated.push(record.clone()),
            Some(_) => {}
        }
    }
    let removed: Vec<NodeRecord> = subscription
        .last
        .iter()
        .filter(|record| !current.contains_key(record.id.as_str()))
        .cloned()
        .collect();

    if added.is_empty() && updated.is_empty() && removed.is_empty() {
        subscription.last = fresh;
        return;
    }
    match &mut subscription.callback {
        SubscriberCallback::Full(callback) => callback(&fresh),
        SubscriberCallback::PerChange(callback) => {
            for record in &removed {
                callback(record, ChangeKind::Removed);
            }
            for record in &added {
                callback(record, ChangeKind::Added);
            }
            for record in &updated {
                callback(record, ChangeKind::Updated);
            }
        }
    }
    subscription.last = fresh;
}

fn same_content(a: &NodeRecord, b: &NodeRecord) -> bool {
    a.value == b.value && a.edges == b.edges
}
