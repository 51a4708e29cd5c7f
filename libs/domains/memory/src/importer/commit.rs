use std::time::Duration;

use tracing::{debug, warn};

use super::run::ImportRun;
use crate::deadline;
use crate::index::VectorIndex;
use crate::models::{Durability, VectorPoint};

/// Write one chunk's points in a single upsert.
///
/// On failure the whole chunk counts as skipped and the error is offered to
/// `run` as a first-error candidate. Nothing is counted as imported unless
/// the write succeeds.
pub(crate) async fn commit_chunk<I>(
    index: &I,
    collection: &str,
    points: Vec<VectorPoint>,
    durability: Durability,
    upsert_timeout: Duration,
    run: &ImportRun,
) where
    I: VectorIndex + ?Sized,
{
    if points.is_empty() {
        return;
    }

    let count = points.len() as u64;
    match deadline::within(
        "upsert",
        upsert_timeout,
        index.upsert(collection, points, durability),
    )
    .await
    {
        Ok(()) => {
            debug!(collection, count, %durability, "Committed chunk");
            run.imported(count);
        }
        Err(err) => {
            warn!(collection, count, error = %err, "Chunk upsert failed, batch skipped");
            run.skipped(count, Some(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::identity::content_address;
    use crate::index::MockVectorIndex;
    use crate::payload::Payload;
    use mockall::predicate::{always, eq};

    fn points(n: i64) -> Vec<VectorPoint> {
        (1..=n)
            .map(|id| VectorPoint {
                id: content_address(1, id).unwrap(),
                vector: vec![1.0],
                payload: Payload::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_success_counts_every_point() {
        let mut index = MockVectorIndex::new();
        index
            .expect_upsert()
            .with(eq("memories"), always(), eq(Durability::NoWait))
            .times(1)
            .returning(|_, points, _| {
                assert_eq!(points.len(), 4);
                Ok(())
            });

        let run = ImportRun::default();
        commit_chunk(&index, "memories", points(4), Durability::NoWait, Duration::from_secs(1), &run).await;

        assert_eq!(run.counts(), (4, 0));
    }

    #[tokio::test]
    async fn test_failure_skips_whole_batch() {
        let mut index = MockVectorIndex::new();
        index
            .expect_upsert()
            .returning(|_, _, _| Err(MemoryError::Index("collection is read-only".into())));

        let run = ImportRun::default();
        commit_chunk(&index, "memories", points(3), Durability::Wait, Duration::from_secs(1), &run).await;

        let report = run.finish();
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 3);
        assert!(matches!(report.first_error, Some(MemoryError::Index(_))));
    }

    #[tokio::test]
    async fn test_empty_chunk_is_not_written() {
        let mut index = MockVectorIndex::new();
        index.expect_upsert().never();

        let run = ImportRun::default();
        commit_chunk(&index, "memories", Vec::new(), Durability::NoWait, Duration::from_secs(1), &run).await;

        assert_eq!(run.counts(), (0, 0));
    }
}
