//! Request tag arithmetic.
//!
//! Every request is stamped at enqueue with three times: the reservation tag
//! (earliest moment the request satisfies the client's minimum rate), the
//! proportion tag (virtual time under weighted fair queuing), and the limit
//! tag (earliest moment dispatch would not violate the client's cap). Tags
//! chain from the client's previous tag, so a saturated client's tags march
//! forward at exactly its configured rates.

use crate::profile::ClientProfile;
use crate::time::Time;

/// Largest tag value; produced for a dimension the client does not have
/// (zero reservation or zero weight).
pub(crate) const TAG_MAX: Time = f64::INFINITY;

/// Smallest tag value; produced for the limit tag of an uncapped client, so
/// the request is immediately within limit.
pub(crate) const TAG_MIN: Time = f64::NEG_INFINITY;

/// Distributed-completion hints accompanying a request.
///
/// In a fleet of schedulers a client reports how many of its requests
/// completed elsewhere since it last submitted here: `delta` counts all
/// completions, `rho` only reservation-phase completions. The tag
/// calculation advances this scheduler's view of the client by that many
/// increments. Zero (the default, and the only sensible value for a single
/// scheduler) is treated as one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReqParams {
    /// Completions observed elsewhere since the client's last submission.
    pub delta: u32,
    /// Reservation-phase completions observed elsewhere.
    pub rho: u32,
}

impl ReqParams {
    /// Creates hint parameters.
    #[must_use]
    pub const fn new(delta: u32, rho: u32) -> Self {
        Self { delta, rho }
    }
}

/// The tag triple computed for a request at enqueue, plus the `ready` flag
/// set once the scheduler observes the limit tag in the past.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RequestTag {
    pub(crate) reservation: Time,
    pub(crate) proportion: Time,
    pub(crate) limit: Time,
    pub(crate) ready: bool,
}

impl RequestTag {
    /// The seed tag for a freshly created client record.
    pub(crate) const fn zero() -> Self {
        Self {
            reservation: 0.0,
            proportion: 0.0,
            limit: 0.0,
            ready: false,
        }
    }

    /// Computes the tag for a request arriving at `time`.
    ///
    /// `prev` is the client's previous tag (the chain seed), `cost` an
    /// optional additive charge on the reservation tag in units of
    /// reservation credit.
    ///
    /// # Panics
    ///
    /// A client with neither a reservation nor a weight cannot be scheduled
    /// at all; tagging a request for one is a programming error upstream
    /// (the resolver handed out an unusable profile and the caller enqueued
    /// anyway), and asserts.
    pub(crate) fn new(
        prev: &RequestTag,
        profile: &ClientProfile,
        params: ReqParams,
        time: Time,
        cost: f64,
    ) -> Self {
        let tag = Self {
            reservation: cost
                + tag_calc(time, prev.reservation, profile.reservation_inv(), params.rho, true),
            proportion: tag_calc(time, prev.proportion, profile.weight_inv(), params.delta, true),
            limit: tag_calc(time, prev.limit, profile.limit_inv(), params.delta, false),
            ready: false,
        };
        assert!(
            tag.reservation < TAG_MAX || tag.proportion < TAG_MAX,
            "request tagged for a client with neither reservation nor weight"
        );
        tag
    }
}

/// One tag dimension.
///
/// An unenforced dimension (`increment == 0`) pins the tag at the extreme:
/// `TAG_MAX` keeps the client out of that phase entirely, `TAG_MIN` makes
/// every request immediately within limit. Otherwise the tag advances by one
/// increment per distributed completion (`dist`, zero treated as one) and is
/// clamped forward to `time` so an idle stretch never banks credit.
fn tag_calc(time: Time, prev: Time, increment: f64, dist: u32, extreme_is_high: bool) -> Time {
    if increment == 0.0 {
        return if extreme_is_high { TAG_MAX } else { TAG_MIN };
    }
    let incr = if dist == 0 {
        increment
    } else {
        increment * f64::from(dist)
    };
    time.max(prev + incr)
}
