//! Retry policy between sampling attempts
//!
//! Goroutines that are shutting down when a test ends are not leaks; they
//! just need a moment. The policy decides, per failed attempt, whether to
//! look again and how long to wait first.

use std::fmt;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 20;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Custom retry function: attempt index (0-based) → keep trying. The
/// function does its own waiting.
pub type RetryFn = Box<dyn FnMut(usize) -> bool>;

pub enum RetryPolicy {
    /// Same pause before every retry.
    Fixed { max_retries: usize, delay: Duration },
    /// Pause of 1µs doubled on every attempt, capped at `max_sleep`.
    Backoff { max_retries: usize, max_sleep: Duration },
    Custom(RetryFn),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed { max_retries: DEFAULT_MAX_RETRIES, delay: DEFAULT_RETRY_DELAY }
    }
}

impl RetryPolicy {
    /// Decide what to do after attempt `attempt` still found leaks.
    ///
    /// Returns the pause before the next attempt, or `None` to give up.
    pub fn next_delay(&mut self, attempt: usize) -> Option<Duration> {
        match self {
            RetryPolicy::Fixed { max_retries, delay } => (attempt < *max_retries).then_some(*delay),
            RetryPolicy::Backoff { max_retries, max_sleep } => {
                if attempt >= *max_retries {
                    return None;
                }
                let micros = u32::try_from(attempt).ok().and_then(|shift| 1u64.checked_shl(shift));
                Some(micros.map_or(*max_sleep, |us| Duration::from_micros(us).min(*max_sleep)))
            }
            RetryPolicy::Custom(retry) => retry(attempt).then_some(Duration::ZERO),
        }
    }

    /// Replace the retry bound, keeping the delay schedule. Custom policies
    /// own their bound and are left alone.
    pub fn set_max_retries(&mut self, n: usize) {
        match self {
            RetryPolicy::Fixed { max_retries, .. } | RetryPolicy::Backoff { max_retries, .. } => {
                *max_retries = n;
            }
            RetryPolicy::Custom(_) => {}
        }
    }

    /// Switch to exponential backoff capped at `max_sleep`, keeping the bound.
    pub fn set_max_sleep(&mut self, max_sleep: Duration) {
        let max_retries = match self {
            RetryPolicy::Fixed { max_retries, .. } | RetryPolicy::Backoff { max_retries, .. } => *max_retries,
            RetryPolicy::Custom(_) => return,
        };
        *self = RetryPolicy::Backoff { max_retries, max_sleep };
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::Fixed { max_retries, delay } => {
                f.debug_struct("Fixed").field("max_retries", max_retries).field("delay", delay).finish()
            }
            RetryPolicy::Backoff { max_retries, max_sleep } => f
                .debug_struct("Backoff")
                .field("max_retries", max_retries)
                .field("max_sleep", max_sleep)
                .finish(),
            RetryPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
