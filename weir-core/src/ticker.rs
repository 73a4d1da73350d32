//! Periodic background worker.
//!
//! A `Ticker` runs a job on its own named thread every `period`, sleeping on
//! a condvar so shutdown can interrupt a wait immediately. Dropping the
//! ticker stops the thread and joins it.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{QueueError, QueueResult};

struct TickerShared {
    finishing: Mutex<bool>,
    wake: Condvar,
}

/// Handle to a periodic worker thread.
pub(crate) struct Ticker {
    shared: Arc<TickerShared>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawns a thread named `name` running `job` every `period`.
    pub(crate) fn spawn<F>(name: &'static str, period: Duration, mut job: F) -> QueueResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(TickerShared {
            finishing: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut finishing = thread_shared
                    .finishing
                    .lock()
                    .expect("ticker lock poisoned");
                loop {
                    let (guard, timeout) = thread_shared
                        .wake
                        .wait_timeout(finishing, period)
                        .expect("ticker lock poisoned");
                    finishing = guard;
                    if *finishing {
                        return;
                    }
                    // A wakeup before the deadline is either spurious or a
                    // shutdown signal already handled above; only a full
                    // period triggers the job.
                    if timeout.timed_out() {
                        drop(finishing);
                        job();
                        finishing = thread_shared
                            .finishing
                            .lock()
                            .expect("ticker lock poisoned");
                        if *finishing {
                            return;
                        }
                    }
                }
            })
            .map_err(|e| QueueError::ThreadSpawn {
                name,
                message: e.to_string(),
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Ok(mut finishing) = self.shared.finishing.lock() {
            *finishing = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
