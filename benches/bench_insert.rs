use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use syncgraph::{
    GraphStore,
    bench_utils::{GraphDataset, GraphShape, generate_graph, populate},
};

const CHAIN_SEED: u64 = 0xA17C;
const RANDOM_SEED: u64 = 0xB25F;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

struct BenchCase {
    id: String,
    dataset: GraphDataset,
}

fn bench_scales() -> &'static [usize] {
    &[1_000, 5_000, 10_000]
}

fn bench_cases() -> Vec<BenchCase> {
    let mut cases = Vec::new();
    for &nodes in bench_scales() {
        cases.push(BenchCase {
            id: format!("chain_{nodes}"),
            dataset: generate_graph(GraphShape::Chain, nodes, CHAIN_SEED + nodes as u64),
        });
        cases.push(BenchCase {
            id: format!("random_{nodes}"),
            dataset: generate_graph(
                GraphShape::Random {
                    links: nodes.saturating_mul(5),
                },
                nodes,
                RANDOM_SEED + nodes as u64,
            ),
        });
    }
    cases
}

fn bench_populate(c: &mut Criterion) {
    let mut group = c.benchmark_group("populate");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for case in bench_cases() {
        group.bench_function(BenchmarkId::from_parameter(&case.id), |b| {
            b.iter(|| {
                let mut store = GraphStore::new();
                populate(&mut store, &case.dataset);
                store
            });
        });
    }
    group.finish();
}

fn bench_snapshot_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_round_trip");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for case in bench_cases() {
        let mut store = GraphStore::new();
        populate(&mut store, &case.dataset);
        group.bench_function(BenchmarkId::from_parameter(&case.id), |b| {
            b.iter(|| {
                let bytes = store.serialize().expect("serialize");
                let mut restored = GraphStore::new();
                restored.deserialize(&bytes).expect("deserialize");
                restored
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = insert_benches;
    config = Criterion::default();
    targets = bench_populate, bench_snapshot_round_trip
);
criterion_main!(insert_benches);
