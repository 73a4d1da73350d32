//! Pull-mode queue: the caller polls for the next request.
//!
//! `add_request` only tags and stores; every dispatch decision happens
//! inside `pull_request`, driven by the caller's cadence. When nothing is
//! eligible the pull reports the next time something will be, so callers can
//! sleep instead of spinning.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::QueueConfig;
use crate::error::QueueResult;
use crate::profile::ProfileFn;
use crate::queue::{NextReq, Phase, QueueCore, QueueStats};
use crate::tag::ReqParams;
use crate::ticker::Ticker;
use crate::time::{wall_clock, ClockFn, Time};

/// Outcome of a [`PullQueue::pull_request`] call.
#[derive(Debug)]
pub enum PullResult<C, R> {
    /// No client has a pending request.
    None,
    /// Nothing is eligible yet; retry at (or after) the given time.
    Future(Time),
    /// A request was dispatched.
    Ready {
        /// The client whose request was released.
        client: C,
        /// The request payload.
        request: R,
        /// Which phase released it.
        phase: Phase,
    },
}

impl<C, R> PullResult<C, R> {
    /// True when nothing is pending at all.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// True when something is pending but not yet eligible.
    #[must_use]
    pub const fn is_future(&self) -> bool {
        matches!(self, Self::Future(_))
    }

    /// True when a request was dispatched.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// A dmClock scheduler the caller polls.
pub struct PullQueue<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    R: Send + 'static,
{
    inner: Arc<Mutex<QueueCore<C, R>>>,
    clock: ClockFn,
    /// Periodic cleaner; stopping it is tied to the queue's lifetime.
    _cleaner: Ticker,
}

impl<C, R> PullQueue<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    R: Send + 'static,
{
    /// Creates a pull queue using the default wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` violates the age constraints or the
    /// cleaner thread cannot be spawned.
    pub fn new(profile_of: ProfileFn<C>, config: QueueConfig) -> QueueResult<Self> {
        Self::with_clock(profile_of, config, wall_clock())
    }

    /// Creates a pull queue reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` violates the age constraints or the
    /// cleaner thread cannot be spawned.
    pub fn with_clock(
        profile_of: ProfileFn<C>,
        config: QueueConfig,
        clock: ClockFn,
    ) -> QueueResult<Self> {
        config.validate()?;
        let inner = Arc::new(Mutex::new(QueueCore::new(profile_of, &config)));

        let cleaner_inner = Arc::clone(&inner);
        let cleaner_clock = Arc::clone(&clock);
        let cleaner = Ticker::spawn("weir-cleaner", config.check_time, move || {
            let now = cleaner_clock();
            if let Ok(mut core) = cleaner_inner.lock() {
                core.clean(now);
            }
        })?;

        Ok(Self {
            inner,
            clock,
            _cleaner: cleaner,
        })
    }

    /// Enqueues `request` for `client` at the current clock time.
    pub fn add_request(&self, request: R, client: C, params: ReqParams) {
        self.add_request_at(request, client, params, (self.clock)(), 0.0);
    }

    /// Enqueues `request` for `client` with an explicit time and cost.
    ///
    /// `cost` is an additive charge on the reservation tag, in units of
    /// reservation credit; 0 charges the standard single increment.
    pub fn add_request_at(&self, request: R, client: C, params: ReqParams, time: Time, cost: f64) {
        self.lock().add_request(request, client, params, time, cost);
    }

    /// Attempts one dispatch at the current clock time.
    pub fn pull_request(&self) -> PullResult<C, R> {
        self.pull_request_at((self.clock)())
    }

    /// Attempts one dispatch as of `now`.
    pub fn pull_request_at(&self, now: Time) -> PullResult<C, R> {
        let mut core = self.lock();
        match core.next_request(now) {
            NextReq::None => PullResult::None,
            NextReq::Future(at) => PullResult::Future(at),
            NextReq::Returning(phase) => {
                let (slot, client, request) = core.pop_top(phase);
                if phase == Phase::Priority {
                    core.reduce_reservation_tags(slot);
                }
                PullResult::Ready {
                    client,
                    request,
                    phase,
                }
            }
        }
    }

    /// Drains one client's pending requests, returning the payloads in
    /// submission order. Unknown clients yield an empty vec; drop the result
    /// to discard.
    pub fn remove_by_client(&self, client: &C) -> Vec<R> {
        self.lock().remove_by_client(client)
    }

    /// Removes every queued request matching `filter`, across all clients.
    /// `backwards` visits each client's queue most-recent-first, which
    /// bounds the scan when matches cluster at the tail.
    pub fn remove_by_req_filter<F>(&self, filter: F, backwards: bool) -> Vec<R>
    where
        F: FnMut(&R) -> bool,
    {
        self.lock().remove_by_req_filter(filter, backwards)
    }

    /// True when no client has a pending request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of live client records (idle ones included).
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.lock().client_count()
    }

    /// Number of queued requests across all clients.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().request_count()
    }

    /// A snapshot of queue counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.lock().stats()
    }

    fn lock(&self) -> MutexGuard<'_, QueueCore<C, R>> {
        self.inner.lock().expect("queue mutex poisoned")
    }
}
