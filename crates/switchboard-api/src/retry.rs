//! Retry with exponential backoff for API requests.

use rand::Rng;
use switchboard_types::ApiError;

/// Configuration for retry behavior on transient API errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// A server-supplied `retry_after_ms` wins, capped at `max_delay_ms`.
    /// Otherwise `initial_delay_ms * backoff_factor^attempt`, capped, with
    /// ±25% jitter.
    pub fn delay_ms(&self, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
        if let Some(server_delay) = retry_after_ms {
            return server_delay.min(self.max_delay_ms);
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = (self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent))
            .min(self.max_delay_ms as f64);
        let jitter = rand::rng().random_range(0.75..=1.25);

        ((base * jitter) as u64).min(self.max_delay_ms)
    }
}

/// Returns `true` if the error is transient and the request should be retried.
pub fn is_retryable(error: &ApiError) -> bool {
    match error {
        ApiError::RateLimited { .. }
        | ApiError::Overloaded
        | ApiError::Network(_)
        | ApiError::Timeout => true,
        ApiError::Server { status, .. } => *status >= 500,
        ApiError::Auth { .. } | ApiError::BadRequest { .. } | ApiError::Decode(_) => false,
    }
}
