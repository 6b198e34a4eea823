//! Deterministic graph generators for benches and load tests.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;

use crate::store::GraphStore;

#[derive(Clone, Debug)]
pub struct GraphDataset {
    pub nodes: Vec<(String, serde_json::Value)>,
    pub links: Vec<(usize, usize)>,
}

impl GraphDataset {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

#[derive(Clone, Debug)]
pub enum GraphShape {
    Chain,
    Star,
    Random { links: usize },
}

pub fn generate_graph(shape: GraphShape, node_count: usize, seed: u64) -> GraphDataset {
    assert!(node_count > 1, "node_count must exceed 1");
    let nodes = (0..node_count)
        .map(|idx| {
            (
                format!("node_{idx}"),
                json!({ "idx": idx, "kind": "Node", "name": format!("Node{idx}") }),
            )
        })
        .collect();
    let links = match shape {
        GraphShape::Chain => (0..node_count - 1).map(|idx| (idx, idx + 1)).collect(),
        GraphShape::Star => (1..node_count).map(|leaf| (0, leaf)).collect(),
        GraphShape::Random { links } => generate_random_links(node_count, links, seed),
    };
    GraphDataset { nodes, links }
}

pub fn populate(store: &mut GraphStore, dataset: &GraphDataset) {
    for (id, value) in &dataset.nodes {
        store.insert(id, value.clone());
    }
    for &(from, to) in &dataset.links {
        store.link(&dataset.nodes[from].0, &dataset.nodes[to].0);
    }
}

fn generate_random_links(node_count: usize, link_count: usize, seed: u64) -> Vec<(usize, usize)> {
    assert!(
        link_count <= node_count * (node_count - 1),
        "link_count exceeds possible ordered pairs"
    );
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = ahash::AHashSet::with_capacity(link_count);
    let mut links = Vec::with_capacity(link_count);
    while links.len() < link_count {
        let from = rng.gen_range(0..node_count);
        let to = rng.gen_range(0..node_count);
        if from != to && seen.insert((from, to)) {
            links.push((from, to));
        }
    }
    links.sort_unstable();
    links
}
