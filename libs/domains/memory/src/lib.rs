//! Long-term chat memory on top of a vector index.
//!
//! Messages are embedded and stored as points keyed by a content address
//! derived from `(scope, record id)`, so writing a message twice overwrites
//! it. Retrieval embeds a query and returns the closest stored messages of a
//! single scope.
//!
//! # Architecture
//!
//! ```text
//!  live message ──► add_one ──► embed ──► upsert (wait) ─────────────┐
//!                                                                    ▼
//!  JSON export ──► RecordDecoder ──► chunk ──► WorkerPool ──► upsert ──► Qdrant
//!                                    (C recs)   (N embeds)   (no wait)   ▲
//!                                                                        │
//!  query ──► find_relevant ──► embed ──► scoped search ──► MessageRecord ┘
//!
//!  erase_scope ──► scoped delete (wait)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use core_config::FromEnv;
//! use domain_memory::{embedding, MemoryConfig, MemoryStore};
//!
//! let config = MemoryConfig::from_env()?;
//! let provider = embedding::provider_from_env(&embedding::EmbeddingSettings::from_env()?)?;
//! let store = MemoryStore::connect(&config, provider).await?;
//!
//! let report = store.import_file(chat_id, "export.json").await?;
//! let context = store.find_relevant(chat_id, "when is the offsite?", 5).await?;
//! ```

pub mod config;
pub mod deadline;
pub mod decoder;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod importer;
pub mod index;
pub mod models;
pub mod payload;
pub mod pool;
pub mod retriever;
pub mod store;

pub use config::{MemoryConfig, StorageOptions};
pub use decoder::{DecodeError, RecordDecoder};
pub use embedding::{EmbeddingProvider, EmbeddingSettings};
pub use error::{MemoryError, MemoryResult};
pub use identity::{content_address, ContentAddress};
pub use importer::ImportOptions;
pub use index::qdrant::{QdrantConfig, QdrantIndex};
pub use index::VectorIndex;
pub use models::{
    CollectionSpec, Durability, ImportReport, MessageEntity, MessageRecord, Provenance, Role,
    ScoredPoint, SearchRequest, VectorPoint,
};
pub use payload::{Payload, PayloadError, PAYLOAD_VERSION};
pub use pool::{WorkerBatch, WorkerPool};
pub use store::MemoryStore;
