//! Validity window of an attribute certificate.
//!
//! Both bounds are inclusive: an AC is valid at exactly `notBefore` and at
//! exactly `notAfter`. This matches how X.509 defines certificate validity
//! ("notBefore through notAfter, inclusive").

use crate::{error::DecodeError, time::Clock};
use std::time::SystemTime;

/// An inclusive `[not_before, not_after]` interval.
///
/// Construction rejects inverted windows, so every value of this type
/// satisfies `not_before <= not_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidityWindow {
    not_before: SystemTime,
    not_after: SystemTime,
}

impl ValidityWindow {
    /// Creates a window, failing if `not_before` is after `not_after`.
    pub fn new(not_before: SystemTime, not_after: SystemTime) -> Result<Self, DecodeError> {
        if not_before > not_after {
            return Err(DecodeError::InvertedValidity);
        }
        Ok(Self {
            not_before,
            not_after,
        })
    }

    /// Start of the window.
    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    /// End of the window.
    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    /// `not_before <= time <= not_after`.
    pub fn contains(&self, time: SystemTime) -> bool {
        time >= self.not_before && time <= self.not_after
    }

    /// Whether the window contains the clock's current time.
    pub fn contains_now(&self, clock: &dyn Clock) -> bool {
        self.contains(clock.now())
    }
}
