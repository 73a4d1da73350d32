//! Weir - a multi-tenant request scheduler implementing the dmClock
//! algorithm.
//!
//! Every client is assigned a QoS triple ([`ClientProfile`]): a
//! **reservation** (minimum guaranteed rate), a **weight** (proportional
//! share of surplus capacity), and a **limit** (maximum rate cap). Each
//! request is stamped with three tags derived from those rates, and every
//! dispatch decision runs two phases in priority order: reservations first,
//! then surplus by weight among requests within their limit.
//!
//! Two façades wrap the engine:
//!
//! - [`PullQueue`]: the caller polls with `pull_request` and receives either
//!   a request, a "try again at time t", or "nothing pending".
//! - [`PushQueue`]: the engine invokes a callback whenever the downstream
//!   has capacity and a request is eligible, with a timer thread covering
//!   deadlines that mature while the caller is quiet.
//!
//! Time is injected (seconds as `f64`), so the whole scheduler runs under
//! simulated clocks in tests.
//!
//! # Example
//!
//! ```rust
//! use weir_core::{ClientProfile, PullQueue, PullResult, QueueConfig, ReqParams};
//!
//! // Two tenants: one with a reservation floor, one weight-only.
//! let queue: PullQueue<u64, String> = PullQueue::new(
//!     Box::new(|client| match client {
//!         1 => ClientProfile::new(10.0, 1.0, 0.0),
//!         _ => ClientProfile::new(0.0, 2.0, 50.0),
//!     }),
//!     QueueConfig::default(),
//! )
//! .unwrap();
//!
//! queue.add_request("first".to_string(), 1, ReqParams::default());
//! match queue.pull_request() {
//!     PullResult::Ready { client, request, phase } => {
//!         println!("dispatched {request} for {client} via {phase:?}");
//!     }
//!     PullResult::Future(at) => println!("nothing until {at}"),
//!     PullResult::None => println!("empty"),
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod index;
mod ticker;

pub mod config;
pub mod error;
pub mod profile;
pub mod pull;
pub mod push;
pub mod queue;
pub mod tag;
pub mod time;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use profile::{ClientProfile, ProfileFn};
pub use pull::{PullQueue, PullResult};
pub use push::{CanHandleFn, HandleFn, PushQueue};
pub use queue::{Phase, QueueStats};
pub use tag::ReqParams;
pub use time::{wall_clock, ClockFn, Time, TIME_MAX, TIME_ZERO};
