//! Bounded retry with geometric backoff.
//!
//! One strategy serves two layers that must stay distinct: the per-call
//! transient retries inside every backend wrapper, and the outer retry across
//! bus republishes that advances a record's retry count. The strategy only
//! knows how to bound attempts and space them out; which layer it is applied
//! to is the caller's business.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on any computed backoff delay (24 hours).
const MAX_DELAY_MS: u64 = 86_400_000;

const fn default_attempts() -> u32 {
    3
}

const fn default_delay_ms() -> u64 {
    100
}

const fn default_backoff() -> f64 {
    2.0
}

/// Retry configuration: attempt budget, base delay, backoff factor.
///
/// The delay before attempt `n + 1` is `delay_ms × backoff^(n − 1)`, capped
/// at 24 hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Maximum number of attempts before giving up.
    ///
    /// Default: 3
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Base delay between attempts, in milliseconds.
    ///
    /// Default: 100
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Multiplicative growth of the delay between attempts.
    ///
    /// Default: 2.0
    #[serde(default = "default_backoff")]
    pub backoff: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
            backoff: default_backoff(),
        }
    }
}

/// A strategy whose bounds make no sense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidStrategy {
    #[error("retry attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff factor must be at least 1")]
    ShrinkingBackoff,
}

impl RetryStrategy {
    /// Check the configured bounds (attempts ≥ 1, backoff ≥ 1).
    pub const fn validate(&self) -> Result<(), InvalidStrategy> {
        if self.attempts == 0 {
            return Err(InvalidStrategy::ZeroAttempts);
        }
        if self.backoff < 1.0 {
            return Err(InvalidStrategy::ShrinkingBackoff);
        }
        Ok(())
    }

    /// Delay to wait after `attempt` failed attempts (1-indexed).
    ///
    /// `delay_ms × backoff^(attempt − 1)`, capped at 24 hours. Intentional
    /// precision loss: the result is a coarse wall-clock delay.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = self.backoff.max(1.0).powi(exponent as i32);
        let millis = ((self.delay_ms as f64) * factor).min(MAX_DELAY_MS as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }

    /// Run `op` up to `attempts` times, sleeping the geometric delay between
    /// failures, and return the last error once the budget is exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => return Err(err),
                Err(_) => {
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    #[test]
    fn default_strategy_is_valid() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.attempts, 3);
        assert_eq!(strategy.delay_ms, 100);
        assert!((strategy.backoff - 2.0).abs() < f64::EPSILON);
        assert!(strategy.validate().is_ok());
    }

    #[test]
    fn validate_rejects_nonsense_bounds() {
        let zero = RetryStrategy {
            attempts: 0,
            ..RetryStrategy::default()
        };
        assert_eq!(zero.validate(), Err(InvalidStrategy::ZeroAttempts));

        let shrinking = RetryStrategy {
            backoff: 0.5,
            ..RetryStrategy::default()
        };
        assert_eq!(shrinking.validate(), Err(InvalidStrategy::ShrinkingBackoff));
    }

    #[test]
    fn delay_grows_geometrically() {
        let strategy = RetryStrategy {
            attempts: 5,
            delay_ms: 100,
            backoff: 2.0,
        };

        assert_eq!(strategy.delay_for(1), Duration::from_millis(100));
        assert_eq!(strategy.delay_for(2), Duration::from_millis(200));
        assert_eq!(strategy.delay_for(3), Duration::from_millis(400));
        assert_eq!(strategy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let strategy = RetryStrategy {
            attempts: 100,
            delay_ms: 60_000,
            backoff: 10.0,
        };
        assert_eq!(strategy.delay_for(80), Duration::from_millis(MAX_DELAY_MS));
    }

    #[tokio::test]
    async fn run_returns_first_success() {
        let strategy = RetryStrategy {
            attempts: 5,
            delay_ms: 1,
            backoff: 1.0,
        };
        let calls = Arc::new(AtomicU32::new(0));

        let counted = calls.clone();
        let result: Result<u32, &str> = strategy
            .run(|| {
                let calls = counted.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_exhausts_the_budget() {
        let strategy = RetryStrategy {
            attempts: 3,
            delay_ms: 1,
            backoff: 1.0,
        };
        let calls = Arc::new(AtomicU32::new(0));

        let counted = calls.clone();
        let result: Result<(), &str> = strategy
            .run(|| {
                let calls = counted.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("always down")
                }
            })
            .await;

        assert_eq!(result, Err("always down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
