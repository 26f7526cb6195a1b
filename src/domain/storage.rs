//! Vector storage capability contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::EngineError;

/// One ranked reference returned by a cosine lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRef {
    pub reference: String,
    pub score: f32,
}

impl ScoredRef {
    pub fn new(reference: impl Into<String>, score: f32) -> Self {
        Self {
            reference: reference.into(),
            score,
        }
    }
}

/// Result of a storage operation
///
/// Lookups return ranked references with their similarity scores.
/// Inserts return an empty result; the durable write is the effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupOutput {
    pub refs: Vec<ScoredRef>,
}

impl LookupOutput {
    pub fn new(refs: Vec<ScoredRef>) -> Self {
        Self { refs }
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// References in rank order
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.refs.iter().map(|r| r.reference.as_str())
    }
}

/// Vector database holding embeddings grouped into named collections
///
/// Rows are tagged with the batch that produced them so stale imports
/// can be swept by `cleanup`.
#[async_trait]
pub trait VectorStorage: Send + Sync + std::fmt::Debug {
    async fn insert_embedding(
        &self,
        collection: &str,
        reference: &str,
        embedding: &[f32],
        batch: &str,
    ) -> Result<LookupOutput, EngineError>;

    /// Cosine similarity lookup: one entry per distinct reference carrying
    /// its best score, sorted descending, scores strictly above `threshold`,
    /// at most `limit` entries.
    async fn lookup_cosine(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<LookupOutput, EngineError>;

    /// Delete every row in the collection whose batch differs from `batch`
    async fn cleanup(&self, collection: &str, batch: &str) -> Result<(), EngineError>;
}
