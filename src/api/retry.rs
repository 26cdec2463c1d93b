use std::time::Duration;

/// Backoff schedule for a single fetch
///
/// Passed by value into each request; nothing about a retry sequence
/// outlives the call that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base doubled per retry, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay to use when the server asked for one, still bounded by the cap
    pub fn server_delay(&self, requested: Duration) -> Duration {
        requested.min(self.max_delay)
    }

    /// Upper bound on time spent sleeping across all retries of one fetch
    pub fn max_total_wait(&self) -> Duration {
        (1..self.max_attempts).map(|n| self.delay_for(n)).sum()
    }
}

/// Retry classification for a completed HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Unauthorized,
    Retryable,
    Rejected,
}

pub fn classify(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        401 | 403 => StatusClass::Unauthorized,
        429 | 500..=599 => StatusClass::Retryable,
        _ => StatusClass::Rejected,
    }
}
