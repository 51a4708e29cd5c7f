//! Bounded worker pool with a per-batch barrier.
//!
//! A [`WorkerPool`] caps how many workers run at once. Work is grouped into a
//! [`WorkerBatch`]; [`WorkerBatch::join`] waits for every worker of the batch
//! and hands back their results, so callers cannot move on while work is
//! still outstanding. Dropping a batch aborts its unfinished workers.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// A pool running at most `size` workers at a time (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Start a new batch of workers sharing this pool's limit.
    pub fn batch<T>(&self) -> WorkerBatch<T>
    where
        T: Send + 'static,
    {
        WorkerBatch {
            permits: Arc::clone(&self.permits),
            tasks: JoinSet::new(),
        }
    }
}

/// Workers spawned for one unit of work.
pub struct WorkerBatch<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

impl<T> WorkerBatch<T>
where
    T: Send + 'static,
{
    /// Queue a worker. It starts once a pool slot is free.
    pub fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            work.await
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Barrier: wait for every worker, in completion order.
    ///
    /// A worker that panicked yields its [`JoinError`].
    pub async fn join(mut self) -> Vec<Result<T, JoinError>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            results.push(joined);
        }
        results
    }
}
