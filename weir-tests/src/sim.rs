//! Programmable clock for driving queues in simulated time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use weir_core::{ClockFn, Time};

/// A shared clock that only moves when the test says so.
///
/// Internally the time is microseconds in an atomic, so clones observe the
/// same instant from any thread (the push façade's timer thread included).
#[derive(Clone, Default)]
pub struct SimClock {
    micros: Arc<AtomicU64>,
}

impl SimClock {
    /// A clock starting at t=0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current simulated time in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Micros stay far below 2^52.
    pub fn now(&self) -> Time {
        self.micros.load(Ordering::SeqCst) as f64 * 1e-6
    }

    /// Moves the clock to `t` seconds. The clock never moves backwards; a
    /// target in the past is ignored.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set(&self, t: Time) {
        let target = (t.max(0.0) * 1e6).round() as u64;
        self.micros.fetch_max(target, Ordering::SeqCst);
    }

    /// Advances the clock by `dt` seconds.
    pub fn advance(&self, dt: Time) {
        self.set(self.now() + dt);
    }

    /// A [`ClockFn`] view of this clock, for queue construction.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Micros stay far below 2^52.
    pub fn clock_fn(&self) -> ClockFn {
        let micros = Arc::clone(&self.micros);
        Arc::new(move || micros.load(Ordering::SeqCst) as f64 * 1e-6)
    }
}
