use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, info, instrument};

use crate::config::{MemoryConfig, StorageOptions};
use crate::deadline;
use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::{MemoryError, MemoryResult};
use crate::identity::{content_address, ContentAddress};
use crate::importer::{stamp, ImportContext, ImportOptions};
use crate::index::qdrant::QdrantIndex;
use crate::index::VectorIndex;
use crate::models::{CollectionSpec, Durability, ImportReport, MessageRecord, Provenance, VectorPoint};
use crate::payload;
use crate::retriever::Retriever;

/// Text embedded once to learn the vector dimension of a new collection.
pub const DIMENSION_PROBE: &str = "dimension probe";

/// Long-term message memory backed by a vector index.
///
/// Opening a store makes sure its collection exists. Every operation is
/// restricted to one scope; nothing written under one scope is visible from
/// another.
pub struct MemoryStore<I> {
    index: I,
    provider: Arc<dyn EmbeddingProvider>,
    collection: String,
    operation_timeout: Duration,
    import: ImportOptions,
    assistant_id: Option<i64>,
}

impl MemoryStore<QdrantIndex> {
    /// Connect to Qdrant and open the configured collection.
    pub async fn connect(config: &MemoryConfig, provider: Arc<dyn EmbeddingProvider>) -> MemoryResult<Self> {
        let index = QdrantIndex::new(&config.qdrant)?;
        Self::open(index, provider, config).await
    }
}

impl<I> MemoryStore<I>
where
    I: VectorIndex,
{
    /// Open the store, creating the collection on first use.
    ///
    /// Any failure here is a [`MemoryError::Setup`].
    pub async fn open(index: I, provider: Arc<dyn EmbeddingProvider>, config: &MemoryConfig) -> MemoryResult<Self> {
        let store = Self {
            index,
            provider,
            collection: config.collection.clone(),
            operation_timeout: config.operation_timeout,
            import: config.import,
            assistant_id: config.assistant_id,
        };
        store.ensure_collection(config.storage).await?;
        Ok(store)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn assistant_id(&self) -> Option<i64> {
        self.assistant_id
    }

    pub fn import_options(&self) -> ImportOptions {
        self.import
    }

    /// Replace the import tuning for subsequent imports.
    pub fn with_import_options(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }

    async fn ensure_collection(&self, storage: StorageOptions) -> MemoryResult<()> {
        let existing = deadline::within("list_collections", self.operation_timeout, self.index.list_collections())
            .await
            .map_err(|e| setup_error("listing collections", e))?;

        if existing.iter().any(|name| name == &self.collection) {
            debug!(collection = %self.collection, "Collection exists");
        } else {
            self.create_missing_collection(storage).await?;
        }

        // Checked on every open: a first setup may have stopped right after
        // creating the collection.
        deadline::within(
            "ensure_scope_index",
            self.operation_timeout,
            self.index.ensure_scope_index(&self.collection),
        )
        .await
        .map_err(|e| setup_error("indexing scope field", e))
    }

    async fn create_missing_collection(&self, storage: StorageOptions) -> MemoryResult<()> {
        let probe = deadline::within(
            "embed",
            self.operation_timeout,
            embed_one(self.provider.as_ref(), DIMENSION_PROBE),
        )
        .await
        .map_err(|e| setup_error("probing embedding dimension", e))?;

        let spec = CollectionSpec {
            name: self.collection.clone(),
            dimension: probe.len() as u64,
            on_disk: storage.on_disk,
            quantization: storage.quantization,
        };
        deadline::within("create_collection", self.operation_timeout, self.index.create_collection(&spec))
            .await
            .map_err(|e| setup_error("creating collection", e))?;

        info!(
            collection = %self.collection,
            dimension = spec.dimension,
            provider = self.provider.name(),
            "Memory collection created"
        );
        Ok(())
    }

    /// Remember a single live message, waiting until the index has it.
    ///
    /// Writing the same `(scope_id, record_id)` again overwrites it.
    #[instrument(skip(self, record), fields(record_id = record.record_id))]
    pub async fn add_one(&self, scope_id: i64, record: MessageRecord) -> MemoryResult<ContentAddress> {
        if record.text.trim().is_empty() {
            return Err(MemoryError::Validation("message text is empty".to_string()));
        }
        let id = content_address(scope_id, record.record_id)?;
        let record = stamp(record, scope_id, Provenance::Live, self.assistant_id);

        let vector = deadline::within(
            "embed",
            self.operation_timeout,
            embed_one(self.provider.as_ref(), &record.text),
        )
        .await?;

        let point = VectorPoint {
            id,
            vector,
            payload: payload::project(&record),
        };
        deadline::within(
            "upsert",
            self.operation_timeout,
            self.index.upsert(&self.collection, vec![point], Durability::Wait),
        )
        .await?;

        debug!(%id, "Message stored");
        Ok(id)
    }

    /// Import a JSON array of messages into `scope_id`.
    ///
    /// Never fails as a whole: undecodable records, failed embeddings and
    /// failed chunk writes are counted as skipped and the first error is
    /// returned in the report.
    pub async fn import_stream<R>(&self, scope_id: i64, source: R) -> ImportReport
    where
        R: AsyncBufRead + Unpin,
    {
        ImportContext {
            index: &self.index,
            provider: &self.provider,
            collection: &self.collection,
            options: self.import,
            operation_timeout: self.operation_timeout,
            assistant_id: self.assistant_id,
        }
        .run(scope_id, source)
        .await
    }

    /// [`import_stream`](Self::import_stream) over a file.
    pub async fn import_file(&self, scope_id: i64, path: impl AsRef<Path>) -> MemoryResult<ImportReport> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| MemoryError::Validation(format!("cannot open {}: {}", path.display(), e)))?;
        Ok(self.import_stream(scope_id, BufReader::new(file)).await)
    }

    /// Stored messages of `scope_id` most similar to `query`, best first.
    ///
    /// `limit` values below one are treated as one.
    pub async fn find_relevant(&self, scope_id: i64, query: &str, limit: i64) -> MemoryResult<Vec<MessageRecord>> {
        Retriever {
            index: &self.index,
            provider: self.provider.as_ref(),
            collection: &self.collection,
            operation_timeout: self.operation_timeout,
        }
        .find_relevant(scope_id, query, limit)
        .await
    }

    /// Forget every message of `scope_id`. Erasing an empty scope succeeds.
    #[instrument(skip(self))]
    pub async fn erase_scope(&self, scope_id: i64) -> MemoryResult<()> {
        deadline::within(
            "delete",
            self.operation_timeout,
            self.index.delete_scope(&self.collection, scope_id),
        )
        .await?;
        info!(collection = %self.collection, "Scope erased");
        Ok(())
    }

    /// Number of messages stored under `scope_id`.
    pub async fn count_scope(&self, scope_id: i64) -> MemoryResult<u64> {
        deadline::within(
            "count",
            self.operation_timeout,
            self.index.count_scope(&self.collection, scope_id),
        )
        .await
    }
}

fn setup_error(stage: &str, err: MemoryError) -> MemoryError {
    MemoryError::Setup(format!("{}: {}", stage, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::index::MockVectorIndex;
    use crate::models::Role;
    use crate::payload::field;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn embedder(dimension: usize) -> Arc<dyn EmbeddingProvider> {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_embed()
            .returning(move |texts| Ok(texts.iter().map(|_| vec![0.5; dimension]).collect()));
        Arc::new(provider)
    }

    fn existing_collection(index: &mut MockVectorIndex) {
        index
            .expect_list_collections()
            .times(1)
            .returning(|| Ok(vec!["chat_memory".to_string()]));
        index.expect_ensure_scope_index().returning(|_| Ok(()));
    }

    #[tokio::test]
    async fn test_open_creates_missing_collection_with_probed_dimension() {
        let mut index = MockVectorIndex::new();
        index
            .expect_list_collections()
            .returning(|| Ok(vec!["other".to_string()]));
        index
            .expect_create_collection()
            .withf(|spec| spec.name == "chat_memory" && spec.dimension == 8 && !spec.on_disk)
            .times(1)
            .returning(|_| Ok(()));
        index
            .expect_ensure_scope_index()
            .with(eq("chat_memory"))
            .times(1)
            .returning(|_| Ok(()));

        let store = MemoryStore::open(index, embedder(8), &MemoryConfig::default()).await.unwrap();
        assert_eq!(store.collection(), "chat_memory");
    }

    #[tokio::test]
    async fn test_open_indexes_scope_of_existing_collection() {
        let mut index = MockVectorIndex::new();
        index
            .expect_list_collections()
            .returning(|| Ok(vec!["chat_memory".to_string()]));
        index.expect_create_collection().never();
        index
            .expect_ensure_scope_index()
            .with(eq("chat_memory"))
            .times(1)
            .returning(|_| Ok(()));

        assert!(MemoryStore::open(index, embedder(8), &MemoryConfig::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_fails_when_scope_index_fails() {
        let mut index = MockVectorIndex::new();
        index
            .expect_list_collections()
            .returning(|| Ok(vec!["chat_memory".to_string()]));
        index
            .expect_ensure_scope_index()
            .returning(|_| Err(MemoryError::Index("index build rejected".into())));

        let result = MemoryStore::open(index, embedder(8), &MemoryConfig::default()).await;
        assert!(matches!(result, Err(MemoryError::Setup(msg)) if msg.contains("indexing scope field")));
    }

    #[tokio::test]
    async fn test_open_fails_when_index_unreachable() {
        let mut index = MockVectorIndex::new();
        index
            .expect_list_collections()
            .returning(|| Err(MemoryError::Index("connection refused".into())));

        let result = MemoryStore::open(index, embedder(8), &MemoryConfig::default()).await;
        assert!(matches!(result, Err(MemoryError::Setup(msg)) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_open_fails_when_probe_is_empty() {
        let mut index = MockVectorIndex::new();
        index.expect_list_collections().returning(|| Ok(vec![]));
        index.expect_create_collection().never();

        let mut provider = MockEmbeddingProvider::new();
        provider.expect_embed().returning(|_| Ok(vec![vec![]]));

        let result = MemoryStore::open(index, Arc::new(provider), &MemoryConfig::default()).await;
        assert!(matches!(result, Err(MemoryError::Setup(_))));
    }

    #[tokio::test]
    async fn test_add_one_waits_and_uses_content_address() {
        let mut index = MockVectorIndex::new();
        existing_collection(&mut index);
        index
            .expect_upsert()
            .withf(|collection, points, durability| {
                let point = &points[0];
                collection == "chat_memory"
                    && points.len() == 1
                    && *durability == Durability::Wait
                    && point.id == content_address(12, 34).unwrap()
                    && point.payload[field::SCOPE_ID] == 12
                    && point.payload[field::PROVENANCE] == "live"
                    && point.payload[field::ROLE] == "model"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let config = MemoryConfig::default().with_assistant_id(900);
        let store = MemoryStore::open(index, embedder(4), &config).await.unwrap();

        let record = MessageRecord::new(0, 34, "noted, see you then", Utc::now()).with_sender(900, "assistant");
        let id = store.add_one(12, record).await.unwrap();
        assert_eq!(id, content_address(12, 34).unwrap());
    }

    #[tokio::test]
    async fn test_add_one_rejects_unusable_records() {
        let mut index = MockVectorIndex::new();
        existing_collection(&mut index);
        index.expect_upsert().never();

        let store = MemoryStore::open(index, embedder(4), &MemoryConfig::default()).await.unwrap();

        let no_id = MessageRecord::new(1, 0, "text", Utc::now());
        let no_text = MessageRecord::new(1, 3, " ", Utc::now());
        assert!(matches!(store.add_one(1, no_id).await, Err(MemoryError::Validation(_))));
        assert!(matches!(store.add_one(1, no_text).await, Err(MemoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_add_one_propagates_upsert_failure() {
        let mut index = MockVectorIndex::new();
        existing_collection(&mut index);
        index
            .expect_upsert()
            .returning(|_, _, _| Err(MemoryError::Index("disk full".into())));

        let store = MemoryStore::open(index, embedder(4), &MemoryConfig::default()).await.unwrap();
        let record = MessageRecord::new(1, 3, "hello", Utc::now()).with_role(Role::User);
        assert!(matches!(store.add_one(1, record).await, Err(MemoryError::Index(_))));
    }

    #[tokio::test]
    async fn test_erase_scope_filters_by_scope() {
        let mut index = MockVectorIndex::new();
        existing_collection(&mut index);
        index
            .expect_delete_scope()
            .with(eq("chat_memory"), eq(-500))
            .times(1)
            .returning(|_, _| Ok(()));

        let store = MemoryStore::open(index, embedder(4), &MemoryConfig::default()).await.unwrap();
        assert!(store.erase_scope(-500).await.is_ok());
    }

    #[tokio::test]
    async fn test_erase_scope_propagates_failure() {
        let mut index = MockVectorIndex::new();
        existing_collection(&mut index);
        index
            .expect_delete_scope()
            .returning(|_, _| Err(MemoryError::Index("timeout".into())));

        let store = MemoryStore::open(index, embedder(4), &MemoryConfig::default()).await.unwrap();
        assert!(store.erase_scope(1).await.is_err());
    }

    #[tokio::test]
    async fn test_import_file_missing_path() {
        let mut index = MockVectorIndex::new();
        existing_collection(&mut index);

        let store = MemoryStore::open(index, embedder(4), &MemoryConfig::default()).await.unwrap();
        let result = store.import_file(1, "/nonexistent/export.json").await;
        assert!(matches!(result, Err(MemoryError::Validation(_))));
    }
}
