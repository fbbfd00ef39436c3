//! Clock sources.
//!
//! Validity checks never read the system clock directly; they ask a
//! [`Clock`], which keeps them deterministic under test.

use std::fmt::Debug;

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// The host's wall clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub SystemTime);

impl FixedClock {
    /// A clock frozen `secs` seconds after the UNIX epoch.
    pub fn from_unix(secs: u64) -> Self {
        Self(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_returns_reasonable_timestamp() {
        let secs = SystemClock.now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        // After 2020-01-01
        assert!(secs > 1_577_836_800);
    }

    #[test]
    fn it_stays_frozen() {
        let clock = FixedClock::from_unix(1_700_000_000);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(
            clock.now().duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1_700_000_000
        );
    }
}
