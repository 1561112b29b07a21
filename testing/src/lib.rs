//! # Turnstile Testing
//!
//! Test doubles for the environment a check-in session runs in: clocks that
//! stand still or move on command, key-value stores that live in memory or
//! fail on demand, and [`ReducerTest`] for driving a reducer one step.
//!
//! ```ignore
//! use turnstile_testing::{test_clock, InMemoryKeyValueStore};
//! use turnstile_runtime::Store;
//!
//! #[tokio::test]
//! async fn redeems_once() {
//!     let kv = InMemoryKeyValueStore::new();
//!     let repository = UsedTicketRepository::new(Arc::new(kv.clone()), RetryPolicy::none());
//!     let env = CheckinEnvironment::new(repository, Arc::new(RecordingSink::new()), Arc::new(test_clock()));
//!     let store = Store::new(CheckinState::default(), CheckinReducer::new(), env);
//!
//!     store.send(CheckinAction::manual("A1")).await?;
//!     assert!(kv.contains_key("usedTickets"));
//! }
//! ```

use chrono::{DateTime, Utc};
use turnstile_core::environment::Clock;

/// In-memory key-value stores
pub mod key_value_mocks;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Clock stuck at one instant
    ///
    /// ```
    /// use turnstile_testing::mocks::FixedClock;
    /// use turnstile_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Clock reading `time` forever
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can hand one clone to the
    /// environment and advance another.
    ///
    /// ```
    /// use turnstile_testing::mocks::ManualClock;
    /// use turnstile_core::environment::Clock;
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::starting_at(chrono::Utc::now());
    /// let before = clock.now();
    /// clock.advance(Duration::from_millis(1500));
    /// assert_eq!((clock.now() - before).num_milliseconds(), 1500);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if the lock is poisoned or `by` does not fit a `chrono::Duration`.
        #[allow(clippy::expect_used)] // Test helper
        pub fn advance(&self, by: std::time::Duration) {
            let delta = chrono::Duration::from_std(by).expect("duration fits chrono range");
            let mut time = self.time.write().expect("manual clock lock poisoned");
            *time += delta;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::expect_used)] // Test helper
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().expect("manual clock lock poisoned")
        }
    }

    /// Fixed clock at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// Manual clock starting at 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn manual_clock() -> ManualClock {
        ManualClock::starting_at(epoch())
    }

    #[allow(clippy::expect_used)]
    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("valid RFC 3339 literal")
            .with_timezone(&Utc)
    }
}

pub use key_value_mocks::{FailingKeyValueStore, InMemoryKeyValueStore};
pub use mocks::{manual_clock, test_clock, FixedClock, ManualClock};
pub use reducer_test::{assertions, ReducerTest};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fixed_clock_stands_still() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = manual_clock();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::from_secs(2));

        assert_eq!((clock.now() - start).num_seconds(), 2);
    }
}
