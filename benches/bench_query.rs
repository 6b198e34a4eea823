use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use syncgraph::{
    GraphStore, QueryEngine, QueryRequest,
    bench_utils::{GraphShape, generate_graph, populate},
};

const CHAIN_SEED: u64 = 0xC3D9;
const RANDOM_SEED: u64 = 0xD4E1;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

fn bench_scales() -> &'static [usize] {
    &[1_000, 5_000, 10_000]
}

fn random_store(nodes: usize) -> GraphStore {
    let dataset = generate_graph(
        GraphShape::Random {
            links: nodes.saturating_mul(5),
        },
        nodes,
        RANDOM_SEED + nodes as u64,
    );
    let mut store = GraphStore::new();
    populate(&mut store, &dataset);
    store
}

fn chain_store(nodes: usize) -> GraphStore {
    let dataset = generate_graph(GraphShape::Chain, nodes, CHAIN_SEED + nodes as u64);
    let mut store = GraphStore::new();
    populate(&mut store, &dataset);
    store
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_filter");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let engine = QueryEngine::new();
    for &nodes in bench_scales() {
        let store = random_store(nodes);
        let request = QueryRequest::from_value(&json!({
            "query": { "idx": { "$gt": nodes / 2 } },
            "field": "idx",
            "$limit": 100,
        }))
        .expect("request");
        group.bench_function(BenchmarkId::from_parameter(nodes), |b| {
            b.iter(|| engine.execute(&store, &request).expect("execute"));
        });
    }
    group.finish();
}

fn bench_edge_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_traversal");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let engine = QueryEngine::new();
    for &nodes in bench_scales() {
        let store = chain_store(nodes);
        let request = QueryRequest::matching(&json!({
            "idx": 0,
            "$edge": { "idx": { "$gt": nodes - 10 } },
        }))
        .expect("request");
        group.bench_function(BenchmarkId::from_parameter(nodes), |b| {
            b.iter(|| engine.execute(&store, &request).expect("execute"));
        });
    }
    group.finish();
}

criterion_group!(
    name = query_benches;
    config = Criterion::default();
    targets = bench_filter, bench_edge_traversal
);
criterion_main!(query_benches);
