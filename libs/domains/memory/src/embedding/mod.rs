mod gemini;
mod limited;
mod openai;
mod provider;

use std::num::NonZeroU32;
use std::sync::Arc;

use core_config::{env_or_default, env_parse, ConfigError, FromEnv};
use strum::{Display, EnumString};

pub use gemini::{GeminiConfig, GeminiProvider};
pub use limited::{RateLimitedProvider, RetryPolicy};
pub use openai::{OpenAIConfig, OpenAIProvider};
#[cfg(test)]
pub use provider::MockEmbeddingProvider;
pub use provider::{embed_one, EmbeddingProvider};

use crate::error::MemoryResult;

/// Which HTTP embedding backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

/// Provider selection plus pacing shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub requests_per_minute: NonZeroU32,
    pub retry: RetryPolicy,
}

impl FromEnv for EmbeddingSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let provider_raw = env_or_default("EMBEDDING_PROVIDER", "openai");
        let provider = provider_raw.parse().map_err(|_| ConfigError::ParseError {
            key: "EMBEDDING_PROVIDER".to_string(),
            details: format!("unknown provider '{}', expected openai or gemini", provider_raw),
        })?;

        let requests_per_minute = NonZeroU32::new(env_parse("EMBEDDING_REQUESTS_PER_MINUTE", 3000u32)?)
            .ok_or_else(|| ConfigError::ParseError {
                key: "EMBEDDING_REQUESTS_PER_MINUTE".to_string(),
                details: "must be greater than zero".to_string(),
            })?;

        Ok(Self {
            provider,
            requests_per_minute,
            retry: RetryPolicy {
                max_retries: env_parse("EMBEDDING_MAX_RETRIES", RetryPolicy::default().max_retries)?,
                ..RetryPolicy::default()
            },
        })
    }
}

/// Build the configured provider, wrapped in rate limiting and retries.
///
/// Backend credentials are read from the environment.
pub fn provider_from_env(settings: &EmbeddingSettings) -> MemoryResult<Arc<dyn EmbeddingProvider>> {
    let backend: Arc<dyn EmbeddingProvider> = match settings.provider {
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_env()?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_env()?),
    };

    Ok(Arc::new(RateLimitedProvider::new(
        backend,
        settings.requests_per_minute,
        settings.retry,
    )))
}
