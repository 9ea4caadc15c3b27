//! Fixed-budget retry wrapper.

use crate::batch::Batch;
use crate::config::DispatchConfig;
use crate::worker::BatchWorker;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Never below 1.
    pub attempts: u32,
    /// Fixed pause between attempts; there is no backoff growth.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: crate::config::DEFAULT_RETRY_ATTEMPTS,
            delay: crate::config::DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based), or `None` when the
    /// budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts {
            None
        } else {
            Some(self.delay)
        }
    }
}

/// Wraps a [`BatchWorker`] with a [`RetryPolicy`].
pub struct RetryingWorker<W> {
    inner: W,
    policy: RetryPolicy,
}

impl<W> RetryingWorker<W> {
    pub fn new(inner: W, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Run `batch` through the inner worker until it succeeds or the budget is spent.
    ///
    /// Non-retryable errors from the inner worker are returned unchanged without further
    /// attempts.
    pub async fn attempt<P>(&self, batch: &Batch<P>) -> Result<Vec<W::Output>>
    where
        P: Send + Sync + 'static,
        W: BatchWorker<P>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.inner.submit(batch).await {
                Ok(results) => {
                    if attempt > 1 {
                        debug!(batch_index = batch.index, attempt, "batch recovered after retry");
                    }
                    return Ok(results);
                }
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            warn!(
                batch_index = batch.index,
                attempt,
                max_attempts = self.policy.attempts,
                error = %err,
                "batch attempt failed"
            );

            match self.policy.delay_after(attempt) {
                Some(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                None => {
                    return Err(Error::RetryExhausted {
                        index: batch.index,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl<P, W> BatchWorker<P> for RetryingWorker<W>
where
    P: Send + Sync + 'static,
    W: BatchWorker<P>,
{
    type Output = W::Output;

    async fn submit(&self, batch: &Batch<P>) -> Result<Vec<W::Output>> {
        self.attempt(batch).await
    }
}
