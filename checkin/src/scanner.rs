//! Throttling for scanned input.
//!
//! A QR decoder reports the same code many times per second while it is in
//! view. [`ScanCooldown`] lets one scan through per window and drops the rest.
//! Manual entry is never throttled.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default minimum interval between accepted scans
pub const DEFAULT_SCAN_COOLDOWN: Duration = Duration::from_millis(1500);

/// Minimum interval between accepted scan events
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanCooldown {
    window: Duration,
    last_accepted: Option<DateTime<Utc>>,
}

impl Default for ScanCooldown {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_COOLDOWN)
    }
}

impl ScanCooldown {
    /// Create a cooldown with the given window
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// The configured window
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Accept or drop a scan observed at `now`
    ///
    /// Accepting starts a new window. A clock that moved backwards starts a
    /// new window too, so a skewed clock cannot block scanning.
    pub fn try_accept(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_accepted {
            let elapsed = now.signed_duration_since(last);
            let inside = elapsed
                .to_std()
                .is_ok_and(|elapsed| elapsed < self.window);
            if inside {
                return false;
            }
        }

        self.last_accepted = Some(now);
        true
    }
}
