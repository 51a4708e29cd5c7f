use async_trait::async_trait;
use core_config::{env_or_default, env_parse_optional, env_required};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::provider::{check_response_len, validate_inputs};
use super::EmbeddingProvider;
use crate::error::{MemoryError, MemoryResult};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// OpenAI embedding provider configuration
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Shortened output dimension (text-embedding-3 models only).
    pub dimensions: Option<u32>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimensions: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_env() -> MemoryResult<Self> {
        Ok(Self {
            api_key: env_required("OPENAI_API_KEY")?,
            base_url: env_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            model: env_or_default("OPENAI_EMBEDDING_MODEL", DEFAULT_OPENAI_MODEL),
            dimensions: env_parse_optional("OPENAI_EMBEDDING_DIMENSIONS")?,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

/// OpenAI embeddings provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> MemoryResult<Self> {
        Ok(Self::new(OpenAIConfig::from_env()?))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        validate_inputs(texts)?;

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(self.config.endpoint_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text));
        }

        let mut data = response.json::<EmbeddingResponse>().await?.data;
        check_response_len(self.name(), texts.len(), data.len())?;

        // Sort by index to maintain order
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: String) -> MemoryError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        MemoryError::RateLimited(body)
    } else {
        MemoryError::Provider {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("OPENAI_API_KEY", Some("sk-test")),
                ("OPENAI_BASE_URL", Some("http://localhost:8080/v1/")),
                ("OPENAI_EMBEDDING_MODEL", None),
                ("OPENAI_EMBEDDING_DIMENSIONS", Some("256")),
            ],
            || {
                let config = OpenAIConfig::from_env().unwrap();
                assert_eq!(config.api_key, "sk-test");
                assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
                assert_eq!(config.dimensions, Some(256));
                assert_eq!(config.endpoint_url(), "http://localhost:8080/v1/embeddings");
            },
        );
    }

    #[test]
    fn test_config_requires_api_key() {
        temp_env::with_var_unset("OPENAI_API_KEY", || {
            let err = OpenAIConfig::from_env().unwrap_err();
            assert!(matches!(err, MemoryError::Config(msg) if msg.contains("OPENAI_API_KEY")));
        });
    }

    #[test]
    fn test_request_shape() {
        let input = vec!["a".to_string(), "b".to_string()];
        let request = EmbeddingRequest {
            model: DEFAULT_OPENAI_MODEL,
            input: &input,
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], DEFAULT_OPENAI_MODEL);
        assert_eq!(json["input"][1], "b");
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "quota".into()),
            MemoryError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, String::new()),
            MemoryError::Provider { status: 502, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let provider = OpenAIProvider::new(OpenAIConfig::new("unused").with_base_url("http://127.0.0.1:9"));
        assert!(provider.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected_before_request() {
        let provider = OpenAIProvider::new(OpenAIConfig::new("unused").with_base_url("http://127.0.0.1:9"));
        let err = provider.embed(&["".to_string()]).await.unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
    }
}
