use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{debug, warn};

use super::EmbeddingProvider;
use crate::error::MemoryResult;

/// Exponential backoff for transient embedding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Paces calls to another provider and retries transient failures.
///
/// Every attempt, retries included, waits for a token from the rate limiter.
pub struct RateLimitedProvider {
    inner: Arc<dyn EmbeddingProvider>,
    limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
}

impl RateLimitedProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, requests_per_minute: NonZeroU32, retry: RetryPolicy) -> Self {
        Self {
            inner,
            limiter: RateLimiter::direct(Quota::per_minute(requests_per_minute)),
            retry,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RateLimitedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut retry = 0;
        loop {
            self.limiter.until_ready().await;

            match self.inner.embed(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(err) if err.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.backoff(retry);
                    warn!(
                        provider = self.inner.name(),
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient embedding failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => {
                    debug!(provider = self.inner.name(), error = %err, "Embedding failed");
                    return Err(err);
                }
            }
        }
    }
}
