use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::run::ImportRun;
use crate::deadline;
use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::MemoryError;
use crate::identity::content_address;
use crate::models::{MessageRecord, VectorPoint};
use crate::payload;
use crate::pool::WorkerPool;

/// Embed one chunk of records on the pool and wait for all of them.
///
/// Unusable records, in-run duplicates and failed embeddings are counted as
/// skipped on `run`. Returns the points that are ready to be written, in
/// completion order.
pub(crate) async fn embed_chunk(
    chunk: Vec<MessageRecord>,
    run: &Arc<ImportRun>,
    provider: &Arc<dyn EmbeddingProvider>,
    pool: &WorkerPool,
    embed_timeout: Duration,
) -> Vec<VectorPoint> {
    let mut batch = pool.batch::<Option<VectorPoint>>();

    for record in chunk {
        if !record.is_storable() {
            debug!(
                scope_id = record.scope_id,
                record_id = record.record_id,
                "Skipping record without text or id"
            );
            run.skipped(1, None);
            continue;
        }

        let address = match content_address(record.scope_id, record.record_id) {
            Ok(address) => address,
            Err(err) => {
                run.skipped(1, Some(err));
                continue;
            }
        };

        if !run.claim(address) {
            debug!(
                scope_id = record.scope_id,
                record_id = record.record_id,
                "Skipping duplicate record"
            );
            run.skipped(1, None);
            continue;
        }

        let run = Arc::clone(run);
        let provider = Arc::clone(provider);
        batch.spawn(async move {
            let embedded = deadline::within(
                "embed",
                embed_timeout,
                embed_one(provider.as_ref(), &record.text),
            )
            .await;

            match embedded {
                Ok(vector) => Some(VectorPoint {
                    id: address,
                    vector,
                    payload: payload::project(&record),
                }),
                Err(err) => {
                    debug!(
                        scope_id = record.scope_id,
                        record_id = record.record_id,
                        error = %err,
                        "Embedding failed, record skipped"
                    );
                    run.skipped(1, Some(err));
                    None
                }
            }
        });
    }

    let mut points = Vec::with_capacity(batch.len());
    for joined in batch.join().await {
        match joined {
            Ok(Some(point)) => points.push(point),
            Ok(None) => {}
            Err(err) => run.skipped(1, Some(MemoryError::Worker(err.to_string()))),
        }
    }
    points
}
