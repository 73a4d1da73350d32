//! Queue configuration.

use std::time::Duration;

use crate::error::{QueueError, QueueResult};

/// Configuration shared by the pull and push queues.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a client may go without submitting before it is marked idle.
    ///
    /// An idle client keeps its record but loses its proportion-tag history:
    /// on its next submission the tag baseline is re-normalized against the
    /// currently contending clients.
    pub idle_age: Duration,

    /// How long a client may go without submitting before its record (and
    /// any still-pending requests) is erased entirely.
    ///
    /// Must be at least `idle_age`.
    pub erase_age: Duration,

    /// Interval between cleaner passes. Must be positive and shorter than
    /// `idle_age`.
    pub check_time: Duration,

    /// When nothing is eligible under reservation or weight, allow
    /// dispatching a request whose limit tag is still in the future.
    pub allow_limit_break: bool,

    /// Selects the indexed-heap selection structure (`true`) or the flat
    /// vector with minimum cursors (`false`). The heap is `O(log n)` per
    /// adjustment; the vector is `O(n)` but wins on small client counts.
    pub use_heap: bool,
}

impl QueueConfig {
    /// Creates a configuration with short ages, for tests.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            idle_age: Duration::from_secs(1),
            erase_age: Duration::from_secs(2),
            check_time: Duration::from_millis(250),
            allow_limit_break: false,
            use_heap: true,
        }
    }

    /// Sets `allow_limit_break`.
    #[must_use]
    pub const fn with_limit_break(mut self, allow: bool) -> Self {
        self.allow_limit_break = allow;
        self
    }

    /// Sets `use_heap`.
    #[must_use]
    pub const fn with_heap(mut self, use_heap: bool) -> Self {
        self.use_heap = use_heap;
        self
    }

    /// Checks the age constraints.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidConfig` if `erase_age < idle_age`, if
    /// `check_time >= idle_age`, or if `check_time` is zero.
    pub(crate) fn validate(&self) -> QueueResult<()> {
        if self.erase_age < self.idle_age {
            return Err(QueueError::InvalidConfig {
                message: format!(
                    "erase_age {:?} must be at least idle_age {:?}",
                    self.erase_age, self.idle_age
                ),
            });
        }
        if self.check_time >= self.idle_age {
            return Err(QueueError::InvalidConfig {
                message: format!(
                    "check_time {:?} must be shorter than idle_age {:?}",
                    self.check_time, self.idle_age
                ),
            });
        }
        if self.check_time.is_zero() {
            return Err(QueueError::InvalidConfig {
                message: "check_time must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            idle_age: Duration::from_secs(60 * 10),
            erase_age: Duration::from_secs(60 * 15),
            check_time: Duration::from_secs(60 * 6),
            allow_limit_break: false,
            use_heap: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(QueueConfig::default().validate().is_ok());
        assert!(QueueConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_erase_age_below_idle_age_rejected() {
        let config = QueueConfig {
            idle_age: Duration::from_secs(10),
            erase_age: Duration::from_secs(5),
            check_time: Duration::from_secs(1),
            ..QueueConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(QueueError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_check_time_must_be_below_idle_age() {
        let config = QueueConfig {
            idle_age: Duration::from_secs(10),
            erase_age: Duration::from_secs(20),
            check_time: Duration::from_secs(10),
            ..QueueConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(QueueError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_check_time_rejected() {
        let config = QueueConfig {
            check_time: Duration::ZERO,
            ..QueueConfig::for_testing()
        };
        assert!(matches!(
            config.validate(),
            Err(QueueError::InvalidConfig { .. })
        ));
    }
}
