//! Exponential-backoff policy for transient-fault retries.
//!
//! Used by the remote client's synchronous submission path, which is
//! prone to gateway errors while an endpoint cold-starts.  Attempts are
//! zero-indexed; exhausting the policy is a terminal failure distinct
//! from any single request failure.

use std::time::Duration;

/// Tunable parameters for the exponential-backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Number of attempts before the policy is exhausted.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_retries: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given zero-indexed attempt:
    /// `initial_delay * 2^attempt`.
    ///
    /// Returns `None` once the attempt number reaches
    /// [`max_retries`](Self::max_retries) -- the caller must surface a
    /// retry-exhaustion error at that point.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(
            self.initial_delay
                .saturating_mul(2u32.saturating_pow(attempt)),
        )
    }

    /// Sum of the full delay schedule.
    pub fn total_delay(&self) -> Duration {
        (0..self.max_retries)
            .filter_map(|attempt| self.delay(attempt))
            .sum()
    }
}
