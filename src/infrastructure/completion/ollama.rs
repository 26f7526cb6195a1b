//! Ollama chat completion backend

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::completion::{CompletionOutput, CompletionService};
use crate::domain::EngineError;
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaCompletion<C: HttpClientTrait> {
    client: C,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OllamaCompletion<C> {
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
            .ok_or_else(|| EngineError::config("ollama service requires a 'model' setting"))?;

        Ok(match config.get("base_url") {
            Some(url) => Self::with_base_url(client, model.clone(), url.clone()),
            None => Self::new(client, model.clone()),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![("Content-Type", "application/json")]
    }
}

#[async_trait]
impl<C: HttpClientTrait> CompletionService for OllamaCompletion<C> {
    async fn complete(&self, prompt: &str) -> Result<CompletionOutput, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post_json(&self.chat_url(), self.headers(), &body)
            .await?;

        let response: OllamaChatResponse = serde_json::from_value(response).map_err(|e| {
            EngineError::provider("ollama", format!("Failed to parse chat response: {}", e))
        })?;

        Ok(CompletionOutput::new(response.message.content))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    content: String,
}
