use core_config::{env_optional, env_or_default, env_parse, ConfigError, FromEnv};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Qdrant connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QdrantConfig {
    /// gRPC endpoint.
    pub url: String,
    pub api_key: Option<String>,
    /// Transport timeout of the underlying client.
    pub timeout_secs: u64,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl FromEnv for QdrantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_or_default("QDRANT_URL", DEFAULT_QDRANT_URL),
            api_key: env_optional("QDRANT_API_KEY"),
            timeout_secs: env_parse("QDRANT_TIMEOUT_SECS", 30)?,
        })
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_QDRANT_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}
