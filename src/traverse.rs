use std::collections::VecDeque;

use ahash::AHashSet;

use crate::store::GraphStore;

/// Breadth-first walk over outgoing edges from a root set. The visited set
/// is seeded with the roots, so cycles terminate and the roots themselves
/// are excluded from the result. Bounded by graph size; no depth ceiling.
pub fn descendants(store: &GraphStore, roots: &AHashSet<String>) -> AHashSet<String> {
    let mut visited: AHashSet<&str> = roots.iter().map(String::as_str).collect();
    let mut queue: VecDeque<&str> = visited.iter().copied().collect();
    let mut reachable: Vec<&str> = Vec::new();
    while let Some(id) = queue.pop_front() {
        let Some(record) = store.node(id) else {
            continue;
        };
        for edge in &record.edges {
            if visited.insert(edge.as_str()) {
                reachable.push(edge.as_str());
                queue.push_back(edge.as_str());
            }
        }
    }
    reachable.into_iter().map(str::to_string).collect()
}
