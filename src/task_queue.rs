//! Rate-limited execution of external calls
//!
//! Calls to slow or quota-bound collaborators (uploads, gateway fetches) go
//! through a [`TaskQueue`]: a token-bucket limiter paces attempts, a
//! semaphore caps concurrency, and retryable failures back off
//! exponentially with jitter. Ledger submissions never go through here.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::{future::Future, num::NonZeroU32, sync::Arc, time::Duration};
use tokio::sync::Semaphore;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::{debug, warn};

/// Errors that may succeed on a later attempt
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskQueueConfig {
    pub max_concurrency: usize,
    pub requests_per_second: u32,
    /// Retries after the first attempt
    pub max_retries: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            requests_per_second: 5,
            max_retries: 3,
            base_backoff_ms: 250,
            max_backoff_ms: 5_000,
        }
    }
}

pub struct TaskQueue {
    limiter: DefaultDirectRateLimiter,
    permits: Arc<Semaphore>,
    config: TaskQueueConfig,
}

impl TaskQueue {
    pub fn new(config: TaskQueueConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
        }
    }

    pub fn config(&self) -> &TaskQueueConfig {
        &self.config
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Delays between attempts: `2^n × base`, capped and jittered
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.config.base_backoff_ms.max(1) / 2)
            .max_delay(Duration::from_millis(self.config.max_backoff_ms))
            .map(jitter)
            .take(self.config.max_retries)
    }

    /// Run `task` under the limiter, retrying while its error is retryable
    pub async fn run<T, E, F, Fut>(&self, name: &str, mut task: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        // The semaphore is never closed
        let _permit = self.permits.acquire().await.ok();
        let mut delays = self.backoff();
        let mut attempt = 1usize;

        loop {
            self.limiter.until_ready().await;
            match task().await {
                Ok(value) => {
                    debug!(task = name, attempt, "Task completed");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            task = name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Task failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(task = name, attempt, error = %err, "Task retries exhausted");
                        return Err(err);
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.config)
            .field("available_permits", &self.available_permits())
            .finish()
    }
}
