//! Gemini embedding provider.
//!
//! Calls the Generative Language API `batchEmbedContents` method, which embeds
//! up to 100 texts per request with an API key.

use async_trait::async_trait;
use core_config::{env_or_default, env_required};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::openai::status_error;
use super::provider::{check_response_len, validate_inputs};
use super::EmbeddingProvider;
use crate::error::MemoryResult;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "text-embedding-004";

/// Largest batch the API accepts.
const MAX_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    pub fn from_env() -> MemoryResult<Self> {
        Ok(Self {
            api_key: env_required("GEMINI_API_KEY")?,
            base_url: env_or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            model: env_or_default("GEMINI_EMBEDDING_MODEL", DEFAULT_GEMINI_MODEL),
        })
    }

    fn model_path(&self) -> String {
        format!("models/{}", self.model.trim_start_matches("models/"))
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model_path()
        )
    }
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> MemoryResult<Self> {
        Ok(Self::new(GeminiConfig::from_env()?))
    }

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        let model = self.config.model_path();
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &model,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.config.endpoint_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text));
        }

        let embeddings = response.json::<BatchEmbedResponse>().await?.embeddings;
        check_response_len(self.name(), texts.len(), embeddings.len())?;
        Ok(embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        validate_inputs(texts)?;

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let config = GeminiConfig::new("key");
        assert_eq!(
            config.endpoint_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:batchEmbedContents"
        );
    }

    #[test]
    fn test_model_path_accepts_prefixed_name() {
        let mut config = GeminiConfig::new("key");
        config.model = "models/gemini-embedding-001".into();
        assert_eq!(config.model_path(), "models/gemini-embedding-001");
    }

    #[test]
    fn test_request_shape() {
        let request = BatchEmbedRequest {
            requests: vec![EmbedContentRequest {
                model: "models/text-embedding-004",
                content: Content {
                    parts: vec![Part { text: "hello" }],
                },
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_response_with_missing_values_decodes_to_empty() {
        let response: BatchEmbedResponse =
            serde_json::from_str(r#"{"embeddings": [{"values": [0.5, 0.25]}, {}]}"#).unwrap();
        assert_eq!(response.embeddings[0].values, vec![0.5, 0.25]);
        assert!(response.embeddings[1].values.is_empty());
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("GEMINI_API_KEY", Some("g-key")),
                ("GEMINI_BASE_URL", None),
                ("GEMINI_EMBEDDING_MODEL", Some("gemini-embedding-001")),
            ],
            || {
                let config = GeminiConfig::from_env().unwrap();
                assert_eq!(config.api_key, "g-key");
                assert_eq!(config.base_url, DEFAULT_GEMINI_BASE_URL);
                assert_eq!(config.model, "gemini-embedding-001");
            },
        );
    }
}
