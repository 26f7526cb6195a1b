//! OpenAI embedder backend

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedder::{Embedder, EmbeddingOutput};
use crate::domain::EngineError;
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug)]
pub struct OpenAiEmbedder<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OpenAiEmbedder<C> {
    pub fn new(client: C, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, model, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn from_config(client: C, config: &HashMap<String, String>) -> Result<Self, EngineError> {
        let api_key = config
            .get("api_key")
            .ok_or_else(|| EngineError::config("openai embedder requires an 'api_key' setting"))?;
        let model = config
            .get("model")
            .map(String::as_str)
            .unwrap_or(DEFAULT_EMBEDDING_MODEL);

        Ok(match config.get("base_url") {
            Some(url) => Self::with_base_url(client, api_key.clone(), model, url.clone()),
            None => Self::new(client, api_key.clone(), model),
        })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait> Embedder for OpenAiEmbedder<C> {
    async fn generate(&self, input: &str) -> Result<EmbeddingOutput, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [input],
        });

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        let response: OpenAiEmbeddingResponse = serde_json::from_value(response).map_err(|e| {
            EngineError::provider("openai", format!("Failed to parse embedding response: {}", e))
        })?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::provider("openai", "Response contained no embedding"))?;

        Ok(EmbeddingOutput::new(embedding.embedding))
    }
}

// OpenAI API types for embeddings

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}
