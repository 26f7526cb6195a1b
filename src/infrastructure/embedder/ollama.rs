//! Ollama embedder backend

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedder::{Embedder, EmbeddingOutput};
use crate::domain::EngineError;
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaEmbedder<C: HttpClientTrait> {
    client: C,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OllamaEmbedder<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self::with_base_url(client, model, DEFAULT_OLLAMA_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn from_config(client: C, config: &HashMap<String, String>) -> Result<Self, EngineError> {
        let model = config
            .get("model")
            .ok_or_else(|| EngineError::config("ollama embedder requires a 'model' setting"))?;

        Ok(match config.get("base_url") {
            Some(url) => Self::with_base_url(client, model.clone(), url.clone()),
            None => Self::new(client, model.clone()),
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![("Content-Type", "application/json")]
    }
}

#[async_trait]
impl<C: HttpClientTrait> Embedder for OllamaEmbedder<C> {
    async fn generate(&self, input: &str) -> Result<EmbeddingOutput, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": input,
        });

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        let response: OllamaEmbeddingResponse = serde_json::from_value(response).map_err(|e| {
            EngineError::provider("ollama", format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(EmbeddingOutput::new(response.embedding))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}
