//! Retry Logic
//!
//! Linear back-off retry for calls to the identity provider. The wait before
//! attempt `n` (n >= 2) is `delay_multiplier_secs * (n - 1)` seconds, so the
//! first retry waits one multiplier.

use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Seconds multiplied by the retry number to get the wait before it.
    pub delay_multiplier_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        DEFAULT_RETRY_CONFIG
    }
}

/// Default retry configuration.
pub const DEFAULT_RETRY_CONFIG: RetryConfig = RetryConfig {
    max_attempts: 3,
    delay_multiplier_secs: 1.5,
};

impl RetryConfig {
    /// Create a retry configuration.
    pub fn new(max_attempts: u32, delay_multiplier_secs: f64) -> Self {
        Self {
            max_attempts,
            delay_multiplier_secs,
        }
    }

    /// Wait before the given (1-based) attempt.
    ///
    /// Saturates at `Duration::MAX` when the product does not fit.
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let secs = self.delay_multiplier_secs * f64::from(attempt - 1);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_attempts: u32,
    pub successful_retries: u32,
    pub failed_operations: u32,
}

/// Retry policy executing an operation until it succeeds or the attempt
/// budget is spent.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    stats: Mutex<RetryStats>,
}

impl RetryPolicy {
    /// Create a retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    /// The policy's configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retries.
    ///
    /// Waits suspend only the calling task. When every attempt fails the
    /// last error is returned as-is.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;

        loop {
            self.stats.lock().total_attempts += 1;

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        self.stats.lock().successful_retries += 1;
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        self.stats.lock().failed_operations += 1;
                        warn!(
                            attempt,
                            max_attempts = self.config.max_attempts,
                            error = %error,
                            "Operation failed after all attempts"
                        );
                        return Err(error);
                    }

                    attempt += 1;
                    let delay = self.config.delay_before_attempt(attempt);
                    debug!(
                        next_attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying operation after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Get retry statistics.
    pub fn get_stats(&self) -> RetryStats {
        self.stats.lock().clone()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
