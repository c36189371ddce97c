//! Bounded retry for transient network errors.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

/// Default number of additional attempts after the first one.
pub const MAX_ATTEMPT: u32 = 5;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry policy applied to network operations.
///
/// Only errors reported as transient by [`crate::Error::is_transient`] are
/// retried. The operation runs at most `max_attempts + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first failure.
    pub max_attempts: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPT,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Run `op`, retrying transient failures up to the cap.
    ///
    /// Once the cap is exceeded the last transient error is returned as is.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt > self.max_attempts {
                        warn!("{}: giving up after {} retries: {}", label, self.max_attempts, e);
                        return Err(e);
                    }
                    warn!("{}: {}, performing attempt {}", label, e, attempt);
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                }
                Err(e) => {
                    debug!("{}: not retrying: {}", label, e);
                    return Err(e);
                }
            }
        }
    }
}
