//! Completion capability contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::EngineError;

/// Result of a completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutput {
    pub text: String,
}

impl CompletionOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Provider that produces a completion for a fully rendered prompt
#[async_trait]
pub trait CompletionService: Send + Sync + std::fmt::Debug {
    async fn complete(&self, prompt: &str) -> Result<CompletionOutput, EngineError>;
}
