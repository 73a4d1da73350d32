//! Time model for the scheduler.
//!
//! Tags are real-valued times in seconds, so the clock is a plain function
//! returning monotonically nondecreasing `f64` seconds. The clock is injected
//! at queue construction, which keeps every scheduling decision reproducible
//! under test: drive a simulated clock and the engine never touches the
//! system time.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

/// Scheduler time in seconds. Monotonically nondecreasing.
pub type Time = f64;

/// Sentinel for "unset". Never produced by a running clock.
pub const TIME_ZERO: Time = 0.0;

/// Sentinel for "never".
pub const TIME_MAX: Time = f64::INFINITY;

/// An injected clock.
///
/// Called under the scheduler's data lock; implementations must be fast,
/// total, and must not re-enter the scheduler.
pub type ClockFn = Arc<dyn Fn() -> Time + Send + Sync>;

/// Returns the default wall clock: seconds elapsed since the first call in
/// this process.
///
/// All queues sharing this clock observe the same epoch, so times taken from
/// one queue compare meaningfully against another's.
#[must_use]
pub fn wall_clock() -> ClockFn {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    Arc::new(move || epoch.elapsed().as_secs_f64())
}

/// The smaller of `current` and `possible`, treating [`TIME_ZERO`] in
/// `possible` as "no candidate".
pub(crate) fn min_not_zero(current: Time, possible: Time) -> Time {
    if possible == TIME_ZERO {
        current
    } else {
        current.min(possible)
    }
}
