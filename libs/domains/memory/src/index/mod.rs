//! Vector index client seam.

pub mod qdrant;

use async_trait::async_trait;

use crate::error::MemoryResult;
use crate::models::{CollectionSpec, Durability, ScoredPoint, SearchRequest, VectorPoint};

/// Operations the memory store needs from a vector database.
///
/// Every query and delete is restricted to a single scope.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    // ===== Collections =====

    /// Names of all existing collections.
    async fn list_collections(&self) -> MemoryResult<Vec<String>>;

    /// Create a cosine-distance collection.
    async fn create_collection(&self, spec: &CollectionSpec) -> MemoryResult<()>;

    /// Make sure the scope field is indexed. A no-op when the index exists.
    async fn ensure_scope_index(&self, collection: &str) -> MemoryResult<()>;

    // ===== Points =====

    /// Insert or overwrite points by id.
    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
        durability: Durability,
    ) -> MemoryResult<()>;

    /// Nearest neighbours within one scope, best first.
    async fn search(&self, collection: &str, request: SearchRequest) -> MemoryResult<Vec<ScoredPoint>>;

    /// Remove every point of a scope. Always waits for acknowledgment.
    async fn delete_scope(&self, collection: &str, scope_id: i64) -> MemoryResult<()>;

    /// Exact number of points stored under a scope.
    async fn count_scope(&self, collection: &str, scope_id: i64) -> MemoryResult<u64>;
}
