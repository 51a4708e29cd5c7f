use std::future::Future;
use std::time::Duration;

use crate::error::{MemoryError, MemoryResult};

/// Run a network call under a deadline. Exceeding it is reported as
/// [`MemoryError::Timeout`] naming `operation`.
pub async fn within<F, T>(operation: &'static str, limit: Duration, call: F) -> MemoryResult<T>
where
    F: Future<Output = MemoryResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(MemoryError::Timeout {
            operation,
            after: limit,
        }),
    }
}
