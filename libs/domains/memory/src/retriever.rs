use std::time::Duration;

use tracing::{debug, warn};

use crate::deadline;
use crate::embedding::EmbeddingProvider;
use crate::error::MemoryResult;
use crate::index::VectorIndex;
use crate::models::{MessageRecord, ScoredPoint, SearchRequest};
use crate::payload;

/// Clamp a caller supplied result limit to at least one.
pub fn effective_limit(limit: i64) -> u64 {
    u64::try_from(limit).ok().filter(|&k| k > 0).unwrap_or(1)
}

/// Semantic search over a single scope.
pub(crate) struct Retriever<'a, I: ?Sized> {
    pub index: &'a I,
    pub provider: &'a dyn EmbeddingProvider,
    pub collection: &'a str,
    pub operation_timeout: Duration,
}

impl<I> Retriever<'_, I>
where
    I: VectorIndex + ?Sized,
{
    /// Up to `limit` stored messages of `scope_id` closest to `query`, best
    /// first.
    ///
    /// A blank query or an unusable query embedding yields an empty list.
    /// Provider and index failures are returned as errors.
    pub(crate) async fn find_relevant(
        &self,
        scope_id: i64,
        query: &str,
        limit: i64,
    ) -> MemoryResult<Vec<MessageRecord>> {
        let query = query.trim();
        if query.is_empty() {
            debug!(scope_id, "Empty query, nothing to retrieve");
            return Ok(Vec::new());
        }

        let vectors = deadline::within(
            "embed",
            self.operation_timeout,
            self.provider.embed(&[query.to_string()]),
        )
        .await?;

        let Some(vector) = vectors
            .into_iter()
            .next()
            .filter(|v| !v.is_empty() && v.iter().all(|x| x.is_finite()))
        else {
            debug!(scope_id, "Query embedding is empty, nothing to retrieve");
            return Ok(Vec::new());
        };

        let request = SearchRequest {
            vector,
            scope_id,
            limit: effective_limit(limit),
            with_payload: true,
        };
        let hits = deadline::within(
            "search",
            self.operation_timeout,
            self.index.search(self.collection, request),
        )
        .await?;

        debug!(scope_id, hits = hits.len(), "Search finished");
        Ok(to_records(hits))
    }
}

/// Map hits back to records, dropping those with unusable payloads.
fn to_records(hits: Vec<ScoredPoint>) -> Vec<MessageRecord> {
    hits.into_iter()
        .filter_map(|hit| match payload::restore(&hit.payload) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(point_id = %hit.id, score = hit.score, error = %err, "Skipping search hit");
                None
            }
        })
        .collect()
}
