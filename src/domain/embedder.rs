//! Embedding capability contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::EngineError;

/// Result of generating an embedding for a single input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingOutput {
    pub vector: Vec<f32>,
}

impl EmbeddingOutput {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Provider that turns text into an embedding vector
#[async_trait]
pub trait Embedder: Send + Sync + std::fmt::Debug {
    async fn generate(&self, input: &str) -> Result<EmbeddingOutput, EngineError>;
}
