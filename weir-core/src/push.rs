//! Push-mode queue: the engine dispatches via callback.
//!
//! The downstream hands in two functions at construction: `can_handle`
//! (does the server have capacity right now?) and `handle` (take this
//! request). Every enqueue and every completion signal runs one scheduling
//! pass; when the pass decides a request is eligible it invokes `handle`
//! synchronously, still holding the data lock, so the sink observes
//! dispatches in exactly decision order.
//!
//! When a pass finds work that is only eligible in the future (a reservation
//! or limit deadline not yet matured), a dedicated sched-ahead thread sleeps
//! until that deadline and re-runs the pass, so capped work flows without
//! the caller polling.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::trace;

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::profile::ProfileFn;
use crate::queue::{NextReq, Phase, QueueCore, QueueStats};
use crate::tag::ReqParams;
use crate::ticker::Ticker;
use crate::time::{wall_clock, ClockFn, Time, TIME_ZERO};

/// Reports whether the downstream can take another request right now.
/// Called under the data lock; must be fast and must not re-enter the queue.
pub type CanHandleFn = Box<dyn Fn() -> bool + Send>;

/// Receives a dispatched request. Called under the data lock; must not
/// block indefinitely and must not re-enter the queue on the same thread.
pub type HandleFn<C, R> = Box<dyn FnMut(C, R, Phase) + Send>;

/// Engine plus sinks, guarded together by the data mutex.
struct PushInner<C, R> {
    core: QueueCore<C, R>,
    can_handle: CanHandleFn,
    handle: HandleFn<C, R>,
}

impl<C, R> PushInner<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug,
{
    /// One scheduling pass at `now`. Dispatches at most one request; returns
    /// the wakeup target when work exists but only matures later.
    fn schedule(&mut self, now: Time) -> Option<Time> {
        if !(self.can_handle)() {
            return None;
        }
        match self.core.next_request(now) {
            NextReq::None => None,
            NextReq::Future(at) => Some(at),
            NextReq::Returning(phase) => {
                let (slot, client, request) = self.core.pop_top(phase);
                (self.handle)(client, request, phase);
                if phase == Phase::Priority {
                    self.core.reduce_reservation_tags(slot);
                }
                None
            }
        }
    }
}

/// Sched-ahead state: the pending wakeup target ([`TIME_ZERO`] = unset) and
/// the shutdown flag.
struct SchedState {
    wake_at: Time,
    finishing: bool,
}

struct SchedAhead {
    state: Mutex<SchedState>,
    wake: Condvar,
}

/// A dmClock scheduler that pushes requests to a downstream sink.
pub struct PushQueue<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    R: Send + 'static,
{
    inner: Arc<Mutex<PushInner<C, R>>>,
    sched: Arc<SchedAhead>,
    clock: ClockFn,
    timer: Option<JoinHandle<()>>,
    /// Periodic cleaner; stopping it is tied to the queue's lifetime.
    _cleaner: Ticker,
}

impl<C, R> PushQueue<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    R: Send + 'static,
{
    /// Creates a push queue using the default wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` violates the age constraints or a
    /// background thread cannot be spawned.
    pub fn new(
        profile_of: ProfileFn<C>,
        can_handle: CanHandleFn,
        handle: HandleFn<C, R>,
        config: QueueConfig,
    ) -> QueueResult<Self> {
        Self::with_clock(profile_of, can_handle, handle, config, wall_clock())
    }

    /// Creates a push queue reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` violates the age constraints or a
    /// background thread cannot be spawned.
    pub fn with_clock(
        profile_of: ProfileFn<C>,
        can_handle: CanHandleFn,
        handle: HandleFn<C, R>,
        config: QueueConfig,
        clock: ClockFn,
    ) -> QueueResult<Self> {
        config.validate()?;
        let inner = Arc::new(Mutex::new(PushInner {
            core: QueueCore::new(profile_of, &config),
            can_handle,
            handle,
        }));
        let sched = Arc::new(SchedAhead {
            state: Mutex::new(SchedState {
                wake_at: TIME_ZERO,
                finishing: false,
            }),
            wake: Condvar::new(),
        });

        let cleaner_inner = Arc::clone(&inner);
        let cleaner_clock = Arc::clone(&clock);
        let cleaner = Ticker::spawn("weir-cleaner", config.check_time, move || {
            let now = cleaner_clock();
            if let Ok(mut inner) = cleaner_inner.lock() {
                inner.core.clean(now);
            }
        })?;

        let timer_inner = Arc::clone(&inner);
        let timer_sched = Arc::clone(&sched);
        let timer_clock = Arc::clone(&clock);
        let timer = std::thread::Builder::new()
            .name("weir-sched-ahead".to_string())
            .spawn(move || run_sched_ahead(&timer_inner, &timer_sched, &timer_clock))
            .map_err(|e| QueueError::ThreadSpawn {
                name: "weir-sched-ahead",
                message: e.to_string(),
            })?;

        Ok(Self {
            inner,
            sched,
            clock,
            timer: Some(timer),
            _cleaner: cleaner,
        })
    }

    /// Enqueues `request` for `client` at the current clock time, then runs
    /// a scheduling pass.
    pub fn add_request(&self, request: R, client: C, params: ReqParams) {
        self.add_request_at(request, client, params, (self.clock)(), 0.0);
    }

    /// Enqueues `request` for `client` with an explicit tag time and cost,
    /// then runs a scheduling pass at the current clock time.
    pub fn add_request_at(&self, request: R, client: C, params: ReqParams, time: Time, cost: f64) {
        let target = {
            let mut inner = self.lock();
            inner.core.add_request(request, client, params, time, cost);
            inner.schedule((self.clock)())
        };
        if let Some(at) = target {
            self.sched_at(at);
        }
    }

    /// Signals that the downstream finished a request (it may have capacity
    /// again); runs a scheduling pass.
    pub fn request_completed(&self) {
        let target = {
            let mut inner = self.lock();
            inner.schedule((self.clock)())
        };
        if let Some(at) = target {
            self.sched_at(at);
        }
    }

    /// Drains one client's pending requests, returning the payloads in
    /// submission order. Unknown clients yield an empty vec.
    pub fn remove_by_client(&self, client: &C) -> Vec<R> {
        self.lock().core.remove_by_client(client)
    }

    /// Removes every queued request matching `filter`, across all clients.
    /// `backwards` visits each client's queue most-recent-first.
    pub fn remove_by_req_filter<F>(&self, filter: F, backwards: bool) -> Vec<R>
    where
        F: FnMut(&R) -> bool,
    {
        self.lock().core.remove_by_req_filter(filter, backwards)
    }

    /// True when no client has a pending request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().core.is_empty()
    }

    /// Number of live client records (idle ones included).
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.lock().core.client_count()
    }

    /// Number of queued requests across all clients.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().core.request_count()
    }

    /// A snapshot of queue counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.lock().core.stats()
    }

    /// Arms (or lowers) the sched-ahead target.
    fn sched_at(&self, when: Time) {
        let mut state = self.sched.state.lock().expect("sched-ahead lock poisoned");
        if state.finishing {
            return;
        }
        if state.wake_at == TIME_ZERO || when < state.wake_at {
            trace!(when, "arming timed wakeup");
            state.wake_at = when;
            self.sched.wake.notify_one();
        }
    }

    fn lock(&self) -> MutexGuard<'_, PushInner<C, R>> {
        self.inner.lock().expect("queue mutex poisoned")
    }
}

impl<C, R> Drop for PushQueue<C, R>
where
    C: Eq + Hash + Clone + fmt::Debug + Send + 'static,
    R: Send + 'static,
{
    fn drop(&mut self) {
        if let Ok(mut state) = self.sched.state.lock() {
            state.finishing = true;
        }
        self.sched.wake.notify_all();
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

/// Body of the sched-ahead thread.
///
/// Waits for a target time to be set, sleeps until the target matures (a
/// signal can lower it mid-sleep), then clears it and runs a scheduling pass
/// under the data lock. The sched lock is never held across the data lock.
fn run_sched_ahead<C, R>(inner: &Mutex<PushInner<C, R>>, sched: &SchedAhead, clock: &ClockFn)
where
    C: Eq + Hash + Clone + fmt::Debug,
{
    let mut state = sched.state.lock().expect("sched-ahead lock poisoned");
    loop {
        if state.finishing {
            return;
        }
        if state.wake_at == TIME_ZERO {
            state = sched.wake.wait(state).expect("sched-ahead lock poisoned");
            continue;
        }

        let now = clock();
        if now < state.wake_at {
            let wait = Duration::from_secs_f64((state.wake_at - now).max(0.0) + 1e-6);
            let (guard, _) = sched
                .wake
                .wait_timeout(state, wait)
                .expect("sched-ahead lock poisoned");
            state = guard;
            continue;
        }

        // Target matured: clear it, run a pass, and re-arm if the pass
        // reports further future work.
        state.wake_at = TIME_ZERO;
        drop(state);
        let target = {
            let mut inner = inner.lock().expect("queue mutex poisoned");
            let now = clock();
            inner.schedule(now)
        };
        state = sched.state.lock().expect("sched-ahead lock poisoned");
        if let Some(at) = target {
            if state.wake_at == TIME_ZERO || at < state.wake_at {
                state.wake_at = at;
            }
        }
    }
}
