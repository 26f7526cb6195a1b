//! OpenAI chat completion backend

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::completion::{CompletionOutput, CompletionService};
use crate::domain::EngineError;
use crate::infrastructure::http_client::HttpClientTrait;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

#[derive(Debug)]
pub struct OpenAiCompletion<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    model: String,
}

impl<C: HttpClientTrait> OpenAiCompletion<C> {
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
            .ok_or_else(|| EngineError::config("openai service requires an 'api_key' setting"))?;
        let model = config
            .get("model")
            .map(String::as_str)
            .unwrap_or(DEFAULT_COMPLETION_MODEL);

        Ok(match config.get("base_url") {
            Some(url) => Self::with_base_url(client, api_key.clone(), model, url.clone()),
            None => Self::new(client, api_key.clone(), model),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait> CompletionService for OpenAiCompletion<C> {
    async fn complete(&self, prompt: &str) -> Result<CompletionOutput, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post_json(&self.chat_url(), self.headers(), &body)
            .await?;

        let response: OpenAiChatResponse = serde_json::from_value(response).map_err(|e| {
            EngineError::provider("openai", format!("Failed to parse chat response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::provider("openai", "No choices in response"))?;

        Ok(CompletionOutput::new(
            choice.message.content.unwrap_or_default(),
        ))
    }
}

// OpenAI API types for chat completions

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}
