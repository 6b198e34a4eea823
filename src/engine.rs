//! Query execution and result shaping.
//!
//! Predicate evaluation is set-valued: every AST node maps a candidate id
//! set to the subset (or, for `$edge`, the descendant set) it selects. That
//! makes `$edge` compose — the sibling conditions of an `And` level narrow
//! the roots, the walk collects descendants, and the sub-predicate filters
//! them, recursively.

use std::cmp::Ordering;

use ahash::AHashSet;
use serde_json::Value;
use tracing::debug;

use crate::{
    errors::SyncGraphError,
    predicate::{self, Predicate},
    store::{GraphStore, NodeRecord},
    subscribe::{self, SubscriberCallback, Subscription, SubscriptionRegistry},
    traverse,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// A compiled query plus result shaping. Results are id-ordered unless a
/// sort field is given; cursors slice strictly after/before their id
/// post-sort; the limit truncates last.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub predicate: Option<Predicate>,
    pub field: Option<String>,
    pub order: Order,
    pub limit: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub strict: bool,
}

impl QueryRequest {
    /// Match-all request.
    pub fn all() -> Self {
        Self::default()
    }

    /// Request matching a bare query object.
    pub fn matching(query: &Value) -> Result<Self, SyncGraphError> {
        Ok(Self {
            predicate: Some(predicate::compile(query)?),
            ..Self::default()
        })
    }

    /// Compiles a loosely-typed request of shape
    /// `{ query?, field?, order?, strict?, $limit?, $after?, $before? }`.
    pub fn from_value(request: &Value) -> Result<Self, SyncGraphError> {
        let Value::Object(entries) = request else {
            return Err(SyncGraphError::invalid_query("request must be an object"));
        };
        let mut compiled = Self::default();
        for (key, entry) in entries {
            match key.as_str() {
                "query" => compiled.predicate = Some(predicate::compile(entry)?),
                "field" => {
                    compiled.field = Some(
                        entry
                            .as_str()
                            .ok_or_else(|| {
                                SyncGraphError::invalid_query("field expects a string")
                            })?
                            .to_string(),
                    );
                }
                "order" => {
                    compiled.order = match entry.as_str() {
                        Some("asc") => Order::Asc,
                        Some("desc") => Order::Desc,
                        _ => {
                            return Err(SyncGraphError::invalid_query(
                                "order expects \"asc\" or \"desc\"",
                            ));
                        }
                    };
                }
                "strict" => {
                    compiled.strict = entry.as_bool().ok_or_else(|| {
                        SyncGraphError::invalid_query("strict expects a boolean")
                    })?;
                }
                "$limit" => {
                    let limit = entry.as_u64().ok_or_else(|| {
                        SyncGraphError::invalid_query("$limit expects a non-negative integer")
                    })?;
                    compiled.limit = Some(limit as usize);
                }
                "$after" => compiled.after = Some(cursor_id(entry, "$after")?),
                "$before" => compiled.before = Some(cursor_id(entry, "$before")?),
                other => {
                    return Err(SyncGraphError::invalid_query(format!(
                        "unrecognized request key {other}"
                    )));
                }
            }
        }
        Ok(compiled)
    }
}

fn cursor_id(entry: &Value, key: &str) -> Result<String, SyncGraphError> {
    entry
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SyncGraphError::invalid_query(format!("{key} expects a node id")))
}

/// Evaluates compiled requests against a `GraphStore` and drives live
/// subscriptions.
#[derive(Default)]
pub struct QueryEngine {
    subscriptions: SubscriptionRegistry,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(
        &self,
        store: &GraphStore,
        request: &QueryRequest,
    ) -> Result<Vec<NodeRecord>, SyncGraphError> {
        execute_once(store, request)
    }

    /// Registers a subscription and materializes its initial result set.
    pub fn subscribe(
        &mut self,
        store: &GraphStore,
        request: QueryRequest,
        callback: SubscriberCallback,
    ) -> Result<u64, SyncGraphError> {
        let last = self.execute(store, &request)?;
        Ok(self.subscriptions.add(Subscription {
            request,
            last,
            callback,
        }))
    }

    /// Removes the registry entry; later mutations no longer recompute for it.
    pub fn unsubscribe(&mut self, id: u64) -> bool {
        self.subscriptions.remove(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Recomputes every subscription against the mutated store and delivers
    /// diffs. A subscription whose query fails is skipped, not dropped.
    pub fn notify_mutation(&mut self, store: &GraphStore) {
        for subscription in self.subscriptions.iter_mut() {
            match execute_once(store, &subscription.request) {
                Ok(fresh) => subscribe::deliver(subscription, fresh),
                Err(err) => debug!(%err, "subscription recompute failed"),
            }
        }
    }
}

fn execute_once(
    store: &GraphStore,
    request: &QueryRequest,
) -> Result<Vec<NodeRecord>, SyncGraphError> {
    let candidates: AHashSet<String> = store.nodes().keys().cloned().collect();
    let selected = match &request.predicate {
        None => candidates,
        Some(predicate) => eval_set(predicate, store, &candidates, request.strict)?,
    };
    let mut records: Vec<NodeRecord> = selected.iter().filter_map(|id| store.get(id)).collect();
    shape(&mut records, request);
    Ok(records)
}

/// Maps a candidate id set through one predicate level. Strict-mode
/// `FieldNotFound` excludes the offending node rather than aborting.
fn eval_set(
    predicate: &Predicate,
    store: &GraphStore,
    candidates: &AHashSet<String>,
    strict: bool,
) -> Result<AHashSet<String>, SyncGraphError> {
    match predicate {
        Predicate::Field { path, op } => {
            let mut selected = AHashSet::with_capacity(candidates.len());
            for id in candidates {
                let Some(record) = store.node(id) else {
                    continue;
                };
                match predicate::eval_field(path, op, record, strict) {
                    Ok(true) => {
                        selected.insert(id.clone());
                    }
                    Ok(false) => {}
                    Err(err) => debug!(%err, "node excluded from strict match"),
                }
            }
            Ok(selected)
        }
        Predicate::And(parts) => {
            let mut current = candidates.clone();
            for part in parts.iter().filter(|p| !matches!(p, Predicate::Edge(_))) {
                current = eval_set(part, store, &current, strict)?;
            }
            for part in parts {
                if let Predicate::Edge(sub) = part {
                    let reachable = traverse::descendants(store, &current);
                    current = eval_set(sub, store, &reachable, strict)?;
                }
            }
            Ok(current)
        }
        Predicate::Or(parts) => {
            let mut union = AHashSet::new();
            for part in parts {
                union.extend(eval_set(part, store, candidates, strict)?);
            }
            Ok(union)
        }
        Predicate::Not(inner) => {
            let excluded = eval_set(inner, store, candidates, strict)?;
            Ok(candidates
                .iter()
                .filter(|id| !excluded.contains(*id))
                .cloned()
                .collect())
        }
        Predicate::Edge(sub) => {
            let reachable = traverse::descendants(store, candidates);
            eval_set(sub, store, &reachable, strict)
        }
    }
}

fn shape(records: &mut Vec<NodeRecord>, request: &QueryRequest) {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(field) = &request.field {
        records.sort_by(|a, b| {
            let ordering = compare_by_field(a, b, field);
            match request.order {
                Order::Asc => ordering,
                Order::Desc => ordering.reverse(),
            }
        });
    }
    if let Some(after) = &request.after {
        match records.iter().position(|record| &record.id == after) {
            Some(position) => *records = records.split_off(position + 1),
            None => records.clear(),
        }
    }
    if let Some(before) = &request.before {
        match records.iter().position(|record| &record.id == before) {
            Some(position) => records.truncate(position),
            None => records.clear(),
        }
    }
    if let Some(limit) = request.limit {
        records.truncate(limit);
    }
}

/// String pairs sort lexicographically; everything else numerically with a
/// missing or non-numeric field treated as 0.
fn compare_by_field(a: &NodeRecord, b: &NodeRecord, field: &str) -> Ordering {
    let left = predicate::resolve_path(&a.value, field);
    let right = predicate::resolve_path(&b.value, field);
    match (left.and_then(Value::as_str), right.and_then(Value::as_str)) {
        (Some(l), Some(r)) => l.cmp(r),
        _ => {
            let l = left.and_then(Value::as_f64).unwrap_or(0.0);
            let r = right.and_then(Value::as_f64).unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
    }
}
