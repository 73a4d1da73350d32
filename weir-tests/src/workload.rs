//! Seeded randomized workloads against the scheduler.
//!
//! A workload interleaves enqueues from a mixed set of tenants with pulls at
//! a fixed cadence, all in simulated time from a seeded RNG, and records
//! every dispatch plus its queueing latency. The same trace can be replayed
//! against either selection-structure implementation, which is how the
//! equivalence property is checked.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hdrhistogram::Histogram;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use weir_core::{ClientProfile, Phase, PullQueue, PullResult, QueueConfig, ReqParams};

/// One dispatched request, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// The payload (the workload uses a global enqueue sequence number).
    pub payload: u64,
    /// The tenant the request belonged to.
    pub client: u64,
    /// The phase that released it.
    pub phase: Phase,
}

/// What a workload run produced.
pub struct WorkloadReport {
    /// Every dispatch, in order.
    pub dispatches: Vec<Dispatch>,
    /// Dispatch count per tenant.
    pub per_client: BTreeMap<u64, u64>,
    /// Queueing latency (enqueue to dispatch) in microseconds of simulated
    /// time.
    pub latencies: Histogram<u64>,
}

impl WorkloadReport {
    /// Dispatch count for one tenant.
    #[must_use]
    pub fn count_for(&self, client: u64) -> u64 {
        self.per_client.get(&client).copied().unwrap_or(0)
    }
}

/// The tenant mix used by [`run_workload`]: a reservation-backed tenant, a
/// heavyweight tenant, a rate-capped tenant, and a best-effort tenant.
#[must_use]
pub fn tenant_profile(client: u64) -> ClientProfile {
    match client % 4 {
        0 => ClientProfile::new(20.0, 1.0, 0.0),
        1 => ClientProfile::new(0.0, 3.0, 0.0),
        2 => ClientProfile::new(0.0, 1.0, 40.0),
        _ => ClientProfile::new(0.0, 1.0, 0.0),
    }
}

/// Runs a seeded workload: `steps` enqueues spread over simulated time with
/// pulls interleaved, followed by a drain phase.
///
/// Identical `(seed, steps)` always produce the identical arrival trace, so
/// runs differing only in `use_heap` are directly comparable.
///
/// # Panics
///
/// Panics if queue construction fails (the fixed config is valid) or if the
/// simulation exceeds its drain bound, which would mean dispatch stopped
/// making progress.
#[must_use]
pub fn run_workload(seed: u64, steps: u32, use_heap: bool) -> WorkloadReport {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let config = QueueConfig {
        use_heap,
        ..QueueConfig::default()
    };
    let queue: PullQueue<u64, u64> = PullQueue::with_clock(
        Box::new(|&client| tenant_profile(client)),
        config,
        // The workload passes explicit times; the construction clock is
        // never consulted.
        Arc::new(|| 0.0),
    )
    .expect("workload queue construction");

    let mut enqueue_times: HashMap<u64, f64> = HashMap::new();
    let mut dispatches = Vec::new();
    let mut per_client: BTreeMap<u64, u64> = BTreeMap::new();
    let mut latencies = Histogram::<u64>::new(3).expect("histogram creation");

    let mut record =
        |result: PullResult<u64, u64>,
         now: f64,
         enqueue_times: &HashMap<u64, f64>,
         dispatches: &mut Vec<Dispatch>,
         per_client: &mut BTreeMap<u64, u64>,
         latencies: &mut Histogram<u64>| {
            if let PullResult::Ready {
                client,
                request,
                phase,
            } = result
            {
                dispatches.push(Dispatch {
                    payload: request,
                    client,
                    phase,
                });
                *per_client.entry(client).or_insert(0) += 1;
                let waited = now - enqueue_times[&request];
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let waited_us = (waited.max(0.0) * 1e6) as u64;
                latencies.record(waited_us).expect("latency within bounds");
                true
            } else {
                false
            }
        };

    // Arrival phase: a couple of enqueues then a pull, time creeping
    // forward a random handful of milliseconds per step. Starting well past
    // t=0 keeps every fresh client's first tags clamped to its (unique)
    // arrival time, so replays under the two index structures never hit a
    // tie whose resolution could differ between them.
    let mut now = 10.0_f64;
    for seq in 0..u64::from(steps) {
        let client = rng.gen_range(0..8_u64);
        queue.add_request_at(seq, client, ReqParams::default(), now, 0.0);
        enqueue_times.insert(seq, now);

        if seq % 2 == 0 {
            let result = queue.pull_request_at(now);
            record(
                result,
                now,
                &enqueue_times,
                &mut dispatches,
                &mut per_client,
                &mut latencies,
            );
        }
        now += f64::from(rng.gen_range(1..5_u32)) * 1e-3;
    }

    // Drain phase: keep pulling (stepping over Future waits) until empty.
    let mut spins = 0_u32;
    while !queue.is_empty() {
        spins += 1;
        assert!(spins < 1_000_000, "drain phase stopped making progress");
        match queue.pull_request_at(now) {
            result @ PullResult::Ready { .. } => {
                record(
                    result,
                    now,
                    &enqueue_times,
                    &mut dispatches,
                    &mut per_client,
                    &mut latencies,
                );
            }
            PullResult::Future(at) => now = now.max(at),
            PullResult::None => break,
        }
        now += 1e-4;
    }

    WorkloadReport {
        dispatches,
        per_client,
        latencies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_dispatches_everything() {
        let report = run_workload(7, 200, true);
        assert_eq!(report.dispatches.len(), 200);
        let total: u64 = report.per_client.values().sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_workload_is_deterministic_per_seed() {
        let a = run_workload(11, 150, true);
        let b = run_workload(11, 150, true);
        assert_eq!(a.dispatches, b.dispatches);
    }

    #[test]
    fn test_workload_latency_histogram_populated() {
        let report = run_workload(3, 200, true);
        assert_eq!(report.latencies.len(), 200);
        // The capped tenant guarantees some nonzero queueing latency.
        assert!(report.latencies.max() > 0);
    }

    #[test]
    fn test_distinct_seeds_diverge() {
        let a = run_workload(1, 150, true);
        let b = run_workload(2, 150, true);
        assert_ne!(a.dispatches, b.dispatches);
    }
}
