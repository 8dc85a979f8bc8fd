//! Embedding provider abstraction.
//!
//! Defines the [`EmbeddingProvider`] trait and the OpenAI implementation.
//! Providers perform exactly one attempt per call and classify failures
//! into [`ProviderError`] kinds; retry and backoff live in
//! [`crate::retry`] so the policy is controlled centrally.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// A model that turns text into embedding vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
}

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    /// Build a provider with a fixed per-call timeout and no client-level
    /// retries.
    pub fn new(config: &ProviderConfig, api_key: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.embedding_model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body_text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::other(format!("invalid embeddings response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::other(format!(
                "embeddings response has {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        // The API documents input order, but sort by index to be explicit.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
