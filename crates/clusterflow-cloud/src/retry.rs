//! Backoff and bounded retry helpers

use clusterflow_config::{BackoffSettings, MIN_BACKOFF_UNITS, RetrySettings};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Retry policy for retryable delete failures
///
/// The delay is `unit * units`, starting at `initial_units` and squared after
/// every wait, so repeated failures back off faster than exponentially.
/// Without `cap` and `max_attempts` the wait is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub unit: Duration,
    pub initial_units: u64,
    pub cap: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_settings(&BackoffSettings::default())
    }
}

impl BackoffPolicy {
    pub fn from_settings(settings: &BackoffSettings) -> Self {
        Self {
            unit: Duration::from_millis(settings.unit_ms),
            initial_units: settings.initial_units,
            cap: settings.cap_secs.map(Duration::from_secs),
            max_attempts: settings.max_attempts,
        }
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.clone())
    }
}

/// Stateful squaring backoff
///
/// Starts from at least [`MIN_BACKOFF_UNITS`] so that every wait is longer
/// than the one before it until the cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    units: u64,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            units: policy.initial_units.max(MIN_BACKOFF_UNITS),
            policy,
            attempts: 0,
        }
    }

    /// Number of waits taken so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True once `max_attempts` waits have been taken
    pub fn exhausted(&self) -> bool {
        self.policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
    }

    /// Delay for the next wait; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let factor = u32::try_from(self.units).unwrap_or(u32::MAX);
        let mut delay = self.policy.unit.checked_mul(factor).unwrap_or(Duration::MAX);
        if let Some(cap) = self.policy.cap {
            delay = delay.min(cap);
        }

        self.units = self.units.saturating_mul(self.units);
        self.attempts += 1;
        delay
    }

    /// Sleep for the next delay and return it
    pub async fn wait(&mut self) -> Duration {
        let delay = self.next_delay();
        sleep(delay).await;
        delay
    }
}

/// Bounded retries gave up
#[derive(Error, Debug)]
#[error("{operation} did not succeed after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E> {
    pub operation: String,
    pub attempts: u32,
    pub last_error: E,
}

/// Fixed-attempt, fixed-interval retries for idempotent operations
#[derive(Debug, Clone, PartialEq)]
pub struct Retrier {
    attempts: u32,
    interval: Duration,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl Retrier {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(settings.attempts, Duration::from_millis(settings.interval_ms))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> std::result::Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => {
                    return Err(RetryError {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        "{} failed (attempt {}/{}): {}",
                        operation,
                        attempt,
                        self.attempts,
                        e
                    );
                    sleep(self.interval).await;
                    attempt += 1;
                }
            }
        }
    }
}
