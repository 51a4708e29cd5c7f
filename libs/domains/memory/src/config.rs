use std::time::Duration;

use core_config::{env_flag, env_or_default, env_parse, env_parse_optional, ConfigError, FromEnv};

use crate::importer::{ImportOptions, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use crate::index::qdrant::QdrantConfig;
use crate::models::Durability;

pub const DEFAULT_COLLECTION: &str = "chat_memory";
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Collection parameters applied only when the collection is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageOptions {
    pub on_disk: bool,
    pub quantization: bool,
}

/// Memory store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub qdrant: QdrantConfig,
    pub collection: String,
    /// Deadline of each individual network call.
    pub operation_timeout: Duration,
    pub import: ImportOptions,
    pub storage: StorageOptions,
    /// Sender id of the assistant itself, used to tag its messages.
    pub assistant_id: Option<i64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            import: ImportOptions::default(),
            storage: StorageOptions::default(),
            assistant_id: None,
        }
    }
}

impl MemoryConfig {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_import(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }

    pub fn with_assistant_id(mut self, assistant_id: i64) -> Self {
        self.assistant_id = Some(assistant_id);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

impl FromEnv for MemoryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = env_parse("MEMORY_OPERATION_TIMEOUT_SECS", DEFAULT_OPERATION_TIMEOUT_SECS)?;
        let durability = if env_flag("MEMORY_IMPORT_WAIT", false)? {
            Durability::Wait
        } else {
            Durability::NoWait
        };

        Ok(Self {
            qdrant: QdrantConfig::from_env()?,
            collection: env_or_default("MEMORY_COLLECTION", DEFAULT_COLLECTION),
            operation_timeout: Duration::from_secs(timeout_secs.max(1)),
            import: ImportOptions::from_raw(
                env_parse("MEMORY_IMPORT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE as i64)?,
                env_parse("MEMORY_IMPORT_CONCURRENCY", DEFAULT_CONCURRENCY as i64)?,
                durability,
            ),
            storage: StorageOptions {
                on_disk: env_flag("MEMORY_ON_DISK", false)?,
                quantization: env_flag("MEMORY_QUANTIZATION", false)?,
            },
            assistant_id: env_parse_optional("MEMORY_ASSISTANT_ID")?,
        })
    }
}
