use async_trait::async_trait;

use crate::error::{MemoryError, MemoryResult};

/// Turns text into fixed-dimension vectors.
///
/// The output has one vector per input, index for index. Implementations
/// reject empty input strings and may return empty vectors, which callers
/// treat as a failure for that text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    async fn embed(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>>;
}

/// Reject blank inputs before they reach a provider.
pub(crate) fn validate_inputs(texts: &[String]) -> MemoryResult<()> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(pos) => Err(MemoryError::Validation(format!("embedding input #{} is empty", pos))),
        None => Ok(()),
    }
}

/// Check a provider answered once per input.
pub(crate) fn check_response_len(provider: &str, expected: usize, got: usize) -> MemoryResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(MemoryError::Embedding(format!(
            "{} returned {} embeddings for {} inputs",
            provider, got, expected
        )))
    }
}

/// Embed a single text. An empty vector is an error.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> MemoryResult<Vec<f32>> {
    let vector = provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .unwrap_or_default();

    if vector.is_empty() {
        return Err(MemoryError::EmptyEmbedding);
    }
    Ok(vector)
}
