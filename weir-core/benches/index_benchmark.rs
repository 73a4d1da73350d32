//! Criterion benchmarks comparing the two selection structures.
//!
//! Run with: cargo bench
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use weir_core::{ClientProfile, PullQueue, QueueConfig, ReqParams};

/// Builds a queue with `use_heap` chosen and a fixed clock (the benches
/// drive time explicitly so tag arithmetic stays deterministic).
fn build_queue(use_heap: bool) -> PullQueue<u64, u64> {
    let config = QueueConfig {
        use_heap,
        ..QueueConfig::default()
    };
    PullQueue::with_clock(
        Box::new(|client| match client % 3 {
            0 => ClientProfile::new(100.0, 1.0, 0.0),
            1 => ClientProfile::new(0.0, 2.0, 10_000.0),
            _ => ClientProfile::new(0.0, 1.0, 0.0),
        }),
        config,
        Arc::new(|| 0.0),
    )
    .expect("queue construction")
}

/// One enqueue-then-drain cycle across `clients` clients.
fn cycle(queue: &PullQueue<u64, u64>, clients: u64, per_client: u64) {
    let mut now = 0.0;
    for seq in 0..per_client {
        for client in 0..clients {
            queue.add_request_at(seq, client, ReqParams::default(), now, 0.0);
            now += 1e-4;
        }
    }
    let mut pulled = 0;
    let total = clients * per_client;
    while pulled < total {
        now += 1e-3;
        if queue.pull_request_at(now).is_ready() {
            pulled += 1;
        }
    }
}

fn bench_enqueue_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_drain");
    for clients in [4_u64, 16, 64] {
        let per_client = 8_u64;
        group.throughput(Throughput::Elements(clients * per_client));
        // A fresh queue per iteration: tag chains are stateful, so reusing
        // one would make later iterations pull further into the future.
        group.bench_with_input(
            BenchmarkId::new("heap", clients),
            &clients,
            |b, &clients| {
                b.iter_batched(
                    || build_queue(true),
                    |queue| cycle(&queue, clients, per_client),
                    BatchSize::SmallInput,
                );
            },
        );
        group.bench_with_input(
            BenchmarkId::new("flat", clients),
            &clients,
            |b, &clients| {
                b.iter_batched(
                    || build_queue(false),
                    |queue| cycle(&queue, clients, per_client),
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_enqueue_drain);
criterion_main!(benches);
