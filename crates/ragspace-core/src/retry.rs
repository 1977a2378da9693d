//! Transient-error classification and exponential backoff with jitter.
//!
//! Centralized so provider adapters never grow their own backoff loops.
//! Streaming calls are wrapped only around stream initiation, never
//! mid-stream.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{CoreError, CoreResult};

const TRANSIENT_HTTP_CODES: &[u16] = &[408, 429, 500, 502, 503, 504];
const PERMANENT_HTTP_CODES: &[u16] = &[400, 401, 403, 404];

const TRANSIENT_MESSAGE_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "unavailable",
    "deadline",
    "rate limit",
    "too many requests",
    "connection reset",
    "connection refused",
    "temporarily",
];

/// Classify an error as transient (retry) or permanent (fail fast).
pub fn is_transient(error: &CoreError) -> bool {
    if let Some(status) = error.provider_status() {
        if PERMANENT_HTTP_CODES.contains(&status) {
            return false;
        }
        if TRANSIENT_HTTP_CODES.contains(&status) {
            return true;
        }
    }

    // Only infrastructure errors are retry candidates.
    if !matches!(
        error,
        CoreError::Embedding { .. } | CoreError::Llm { .. } | CoreError::Database { .. }
    ) {
        return false;
    }

    let message = error.to_string().to_lowercase();
    TRANSIENT_MESSAGE_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_secs_f64(config.retry_base_delay_seconds.max(0.0)),
            max_delay: Duration::from_secs_f64(config.retry_max_delay_seconds.max(0.0)),
        }
    }
}

impl RetryPolicy {
    /// delay = min(base * 2^attempt, max) * jitter, jitter ∈ [0.5, 1.5).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter = rand::rng().random_range(0.5..1.5);
        exp.mul_f64(jitter)
    }

    /// Run `operation` up to `max_attempts` times, backing off between
    /// transient failures. Permanent errors return immediately.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut operation: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_transient(&error) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
