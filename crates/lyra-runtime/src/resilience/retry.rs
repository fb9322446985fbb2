//! Retry policy with exponential backoff.
//!
//! The delay before attempt `k + 1` is `min(base * multiplier^(k - 1), cap)`
//! with no jitter, so with the defaults a request that keeps failing waits
//! 1s, then 2s, before its third and last attempt.

use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::{humantime_duration, ConfigError};

/// Process-wide retry policy. Immutable once the fetcher is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// HTTP statuses that are retried instead of failing immediately.
    pub retry_on_status: BTreeSet<u16>,

    #[serde(with = "humantime_duration")]
    pub backoff_base: Duration,

    pub backoff_multiplier: f32,

    #[serde(with = "humantime_duration")]
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_on_status: [429, 500, 502, 503, 504].into_iter().collect(),
            backoff_base: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Delay before attempt `completed + 1`, given `completed >= 1` attempts.
    pub fn delay_after(&self, completed: u32) -> Duration {
        let exponent = completed.saturating_sub(1) as i32;
        let scaled = self.backoff_base.as_secs_f64() * (self.backoff_multiplier as f64).powi(exponent);
        Duration::from_secs_f64(scaled.min(self.backoff_max.as_secs_f64()))
    }

    /// Backoff schedule for `backon`: one delay per retry, no jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff_base)
            .with_max_delay(self.backoff_max)
            .with_factor(self.backoff_multiplier)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "http.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "http.retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.backoff_base > self.backoff_max {
            return Err(ConfigError::Invalid(
                "http.retry.backoff_base must not exceed backoff_max".to_string(),
            ));
        }
        if let Some(status) = self.retry_on_status.iter().find(|s| !(100..=599).contains(*s)) {
            return Err(ConfigError::Invalid(format!(
                "http.retry.retry_on_status contains invalid status {}",
                status
            )));
        }
        Ok(())
    }
}
