//! Per-client quality-of-service profiles.

/// The QoS triple for one client: reservation (minimum guaranteed rate),
/// weight (proportional share of surplus), and limit (maximum rate cap),
/// all in requests per second.
///
/// A zero rate means "none" for that dimension: a zero reservation grants no
/// floor, a zero weight grants no share of surplus, and a zero limit caps
/// nothing. Reciprocals are precomputed once since the tag arithmetic uses
/// them on every enqueue; a zero reciprocal marks the dimension unenforced
/// and produces extremal tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientProfile {
    reservation: f64,
    weight: f64,
    limit: f64,
    reservation_inv: f64,
    weight_inv: f64,
    limit_inv: f64,
}

impl ClientProfile {
    /// Creates a profile from the three rates. Rates must be nonnegative.
    #[must_use]
    pub fn new(reservation: f64, weight: f64, limit: f64) -> Self {
        assert!(
            reservation >= 0.0 && weight >= 0.0 && limit >= 0.0,
            "QoS rates must be nonnegative"
        );
        Self {
            reservation,
            weight,
            limit,
            reservation_inv: if reservation == 0.0 { 0.0 } else { 1.0 / reservation },
            weight_inv: if weight == 0.0 { 0.0 } else { 1.0 / weight },
            limit_inv: if limit == 0.0 { 0.0 } else { 1.0 / limit },
        }
    }

    /// The reservation rate (requests per second; 0 = no floor).
    #[must_use]
    pub const fn reservation(&self) -> f64 {
        self.reservation
    }

    /// The weight (relative share of surplus; 0 = no share).
    #[must_use]
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// The limit rate (requests per second; 0 = uncapped).
    #[must_use]
    pub const fn limit(&self) -> f64 {
        self.limit
    }

    /// Reciprocal of the reservation rate, 0 when unenforced.
    #[must_use]
    pub const fn reservation_inv(&self) -> f64 {
        self.reservation_inv
    }

    /// Reciprocal of the weight, 0 when unenforced.
    #[must_use]
    pub const fn weight_inv(&self) -> f64 {
        self.weight_inv
    }

    /// Reciprocal of the limit rate, 0 when unenforced.
    #[must_use]
    pub const fn limit_inv(&self) -> f64 {
        self.limit_inv
    }
}

/// Resolves a client id to its QoS profile.
///
/// Invoked lazily, under the data lock, the first time a client submits (or
/// re-submits after its record was erased). Must be fast, total, and must
/// not re-enter the scheduler. Returning an all-zero profile produces a
/// client whose requests can never be dispatched; they sit queued until the
/// cleaner erases the record.
pub type ProfileFn<C> = Box<dyn Fn(&C) -> ClientProfile + Send>;
