//! Connectivity retry policy
//!
//! Connectivity loss is expected and self-healing in the target network, so
//! operations failing with [`E2eError::Connectivity`] are retried with a
//! fixed backoff, by default forever. Every other error propagates on the
//! first occurrence. What to do between attempts (reloading a page) belongs
//! to the operation; the policy only decides whether and when to try again.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use anoncheck_common::config::RetryConfig;

use crate::error::{E2eError, E2eResult};

/// An operation the policy can repeat, with its own recovery step
#[async_trait]
pub trait Recoverable: Send {
    type Output: Send;

    async fn attempt(&mut self) -> E2eResult<Self::Output>;

    /// Runs after the backoff, before the next attempt
    async fn recover(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until the operation succeeds
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl RetryPolicy {
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    /// Whether a failed attempt (1-based) should be followed by another
    pub fn should_retry(&self, error: &E2eError, attempt: u32) -> bool {
        error.is_connectivity() && self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Error to surface once attempts are spent
    pub fn exhausted(&self, operation: &str, attempts: u32, last: E2eError) -> E2eError {
        if last.is_connectivity() {
            E2eError::RetriesExhausted {
                operation: operation.to_string(),
                attempts,
                last: last.to_string(),
            }
        } else {
            last
        }
    }

    /// Attempt `target` until it succeeds or fails with a non-retryable error.
    ///
    /// A recovery step that itself loses connectivity is followed by the
    /// next attempt as usual; any other recovery failure ends the loop.
    pub async fn run_with_recovery<R: Recoverable>(
        &self,
        operation: &str,
        target: &mut R,
    ) -> E2eResult<R::Output> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match target.attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(&e, attempt) => {
                    warn!(operation, attempt, error = %e, "Connectivity lost, retrying in {:?}", self.backoff);
                    tokio::time::sleep(self.backoff).await;
                    match target.recover().await {
                        Ok(()) => {}
                        Err(e) if e.is_connectivity() => {
                            debug!(operation, error = %e, "Still offline during recovery");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(self.exhausted(operation, attempt, e)),
            }
        }
    }
}
