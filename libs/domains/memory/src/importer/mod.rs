//! Streaming bulk import.
//!
//! Records are decoded one at a time and gathered into chunks. Each chunk is
//! embedded on the worker pool, then written with a single upsert, before the
//! next chunk is read. Memory use is bounded by the chunk size and the pool
//! size, whatever the length of the input.

mod commit;
mod fanout;
mod run;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use crate::decoder::RecordDecoder;
use crate::embedding::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::models::{Durability, ImportReport, MessageRecord, Provenance, Role};
use crate::pool::WorkerPool;
use run::ImportRun;

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Tuning of a bulk import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub chunk_size: usize,
    pub concurrency: usize,
    pub durability: Durability,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            durability: Durability::NoWait,
        }
    }
}

impl ImportOptions {
    /// Build from raw configured values; non-positive values fall back to
    /// the defaults.
    pub fn from_raw(chunk_size: i64, concurrency: i64, durability: Durability) -> Self {
        let positive_or = |value: i64, default: usize| {
            if value > 0 {
                usize::try_from(value).unwrap_or(default)
            } else {
                default
            }
        };

        Self {
            chunk_size: positive_or(chunk_size, DEFAULT_CHUNK_SIZE),
            concurrency: positive_or(concurrency, DEFAULT_CONCURRENCY),
            durability,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size };
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 { DEFAULT_CONCURRENCY } else { concurrency };
        self
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }
}

/// Put a record into `scope_id` with the given provenance and settle its role.
///
/// An explicit role is kept; otherwise messages sent by `assistant_id` are
/// tagged as model output.
pub(crate) fn stamp(
    mut record: MessageRecord,
    scope_id: i64,
    provenance: Provenance,
    assistant_id: Option<i64>,
) -> MessageRecord {
    record.scope_id = scope_id;
    record.provenance = provenance;
    if record.role.is_none() {
        record.role = Some(match assistant_id {
            Some(id) if id == record.sender_id => Role::Model,
            _ => Role::User,
        });
    }
    record
}

/// Everything an import needs from the store.
pub(crate) struct ImportContext<'a, I: ?Sized> {
    pub index: &'a I,
    pub provider: &'a Arc<dyn EmbeddingProvider>,
    pub collection: &'a str,
    pub options: ImportOptions,
    pub operation_timeout: Duration,
    pub assistant_id: Option<i64>,
}

impl<I> ImportContext<'_, I>
where
    I: VectorIndex + ?Sized,
{
    /// Import every record of `source` into `scope_id`.
    ///
    /// Never fails: problems are counted and the first one is reported.
    pub(crate) async fn run<R>(&self, scope_id: i64, source: R) -> ImportReport
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        let run = Arc::new(ImportRun::default());
        let pool = WorkerPool::new(self.options.concurrency);
        let chunk_size = self.options.chunk_size.max(1);

        info!(
            scope_id,
            collection = self.collection,
            chunk_size,
            concurrency = pool.size(),
            durability = %self.options.durability,
            "Starting import"
        );

        let mut decoder = RecordDecoder::new(source);
        let mut buffer = Vec::with_capacity(chunk_size);
        let mut chunks = 0u64;

        while let Some(decoded) = decoder.next_record().await {
            match decoded {
                Ok(record) => {
                    buffer.push(stamp(record, scope_id, Provenance::Batch, self.assistant_id));
                    if buffer.len() >= chunk_size {
                        chunks += 1;
                        let chunk = std::mem::replace(&mut buffer, Vec::with_capacity(chunk_size));
                        self.process_chunk(chunks, chunk, &run, &pool).await;
                    }
                }
                Err(err) => {
                    debug!(scope_id, error = %err, "Skipping undecodable record");
                    run.skipped(1, Some(err.into()));
                }
            }
        }

        if !buffer.is_empty() {
            chunks += 1;
            self.process_chunk(chunks, buffer, &run, &pool).await;
        }

        let report = run.finish();
        if let Some(err) = &report.first_error {
            warn!(scope_id, error = %err, "Import finished with errors");
        }
        info!(
            scope_id,
            imported = report.imported,
            skipped = report.skipped,
            chunks,
            elements = decoder.elements_seen(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Import finished"
        );
        report
    }

    async fn process_chunk(
        &self,
        chunk_no: u64,
        chunk: Vec<MessageRecord>,
        run: &Arc<ImportRun>,
        pool: &WorkerPool,
    ) {
        let records = chunk.len();
        let points = fanout::embed_chunk(chunk, run, self.provider, pool, self.operation_timeout).await;
        let ready = points.len();

        commit::commit_chunk(
            self.index,
            self.collection,
            points,
            self.options.durability,
            self.operation_timeout,
            run,
        )
        .await;

        let (imported, skipped) = run.counts();
        debug!(chunk = chunk_no, records, ready, imported, skipped, "Chunk processed");
    }
}
