//! Bounded retry with a pluggable delay strategy.
//!
//! The default policy is 3 attempts with a fixed 1s pause. Delays use
//! `tokio::time::sleep`, so a waiting retry never blocks the runtime.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use feesweep_core::config::{BackoffKind, RetryConfig};
use feesweep_core::{Result, SweepError};

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// `delay * multiplier^(attempt-1)`, capped at `max_delay_ms`.
    Exponential { multiplier: f64, max_delay_ms: u64 },
}

/// How many times to try an action and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay_ms: u64,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy. `max_attempts` must be at least 1.
    pub fn new(max_attempts: u32, delay_ms: u64) -> Result<Self> {
        if max_attempts == 0 {
            return Err(SweepError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay_ms,
            backoff: Backoff::Fixed,
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self> {
        let policy = Self::new(config.max_attempts, config.delay_ms)?;
        Ok(match config.backoff {
            BackoffKind::Fixed => policy,
            BackoffKind::Exponential => policy.with_backoff(Backoff::Exponential {
                multiplier: config.multiplier,
                max_delay_ms: config.max_delay_ms,
            }),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => Duration::from_millis(self.delay_ms),
            Backoff::Exponential {
                multiplier,
                max_delay_ms,
            } => {
                let exp = attempt.saturating_sub(1).min(30) as i32;
                let ms = (self.delay_ms as f64 * multiplier.max(1.0).powi(exp))
                    .min(max_delay_ms as f64);
                Duration::from_millis(ms as u64)
            }
        }
    }
}

/// The final failure of an exhausted retry loop.
#[derive(Debug, thiserror::Error)]
#[error("'{label}' failed after {attempts} attempts: {last}")]
pub struct RetryError<E> {
    pub label: String,
    pub attempts: u32,
    pub last: E,
}

impl From<RetryError<SweepError>> for SweepError {
    fn from(err: RetryError<SweepError>) -> Self {
        SweepError::RetryExhausted {
            label: err.label,
            attempts: err.attempts,
            last: Box::new(err.last),
        }
    }
}

/// Run `action` until it succeeds or `policy.max_attempts` calls have failed.
///
/// No sleep follows the final failed attempt.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut action: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match action().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!("🔁 '{}' succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                return Err(RetryError {
                    label: label.to_string(),
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "⚠️ '{}' attempt {}/{} failed: {} (retrying in {}ms)",
                    label,
                    attempt,
                    policy.max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
