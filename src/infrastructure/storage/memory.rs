//! In-memory vector storage for development and testing

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::storage::{LookupOutput, ScoredRef, VectorStorage};
use crate::domain::EngineError;

/// In-memory vector storage for development without PostgreSQL
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: RwLock<HashMap<String, Vec<StoredRow>>>,
}

#[derive(Debug, Clone)]
struct StoredRow {
    reference: String,
    embedding: Vec<f32>,
    batch: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStorage for MemoryStorage {
    async fn insert_embedding(
        &self,
        collection: &str,
        reference: &str,
        embedding: &[f32],
        batch: &str,
    ) -> Result<LookupOutput, EngineError> {
        let mut collections = self.collections.write().await;

        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredRow {
                reference: reference.to_string(),
                embedding: embedding.to_vec(),
                batch: batch.to_string(),
            });

        Ok(LookupOutput::default())
    }

    async fn lookup_cosine(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<LookupOutput, EngineError> {
        let collections = self.collections.read().await;
        let Some(rows) = collections.get(collection) else {
            return Ok(LookupOutput::default());
        };

        // best score per reference, rows from any batch
        let mut best: HashMap<&str, f32> = HashMap::new();
        for row in rows {
            let score = cosine_similarity(embedding, &row.embedding);
            if score > threshold {
                let entry = best.entry(row.reference.as_str()).or_insert(score);
                if score > *entry {
                    *entry = score;
                }
            }
        }

        let mut refs: Vec<ScoredRef> = best
            .into_iter()
            .map(|(reference, score)| ScoredRef::new(reference, score))
            .collect();
        refs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        refs.truncate(limit);

        Ok(LookupOutput { refs })
    }

    async fn cleanup(&self, collection: &str, batch: &str) -> Result<(), EngineError> {
        let mut collections = self.collections.write().await;

        if let Some(rows) = collections.get_mut(collection) {
            rows.retain(|row| row.batch == batch);
        }

        Ok(())
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_insert_then_lookup_finds_closest() {
        let storage = MemoryStorage::new();
        storage
            .insert_embedding("docs", "a.txt", &[1.0, 0.0], "b1")
            .await
            .unwrap();
        storage
            .insert_embedding("docs", "b.txt", &[0.0, 1.0], "b1")
            .await
            .unwrap();

        let out = storage
            .lookup_cosine("docs", &[0.9, 0.1], 10, 0.5)
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out.refs[0].reference, "a.txt");
        assert!(out.refs[0].score > 0.9);
    }

    #[tokio::test]
    async fn test_lookup_dedupes_by_reference() {
        let storage = MemoryStorage::new();
        // two chunks of the same document
        storage
            .insert_embedding("docs", "a.txt", &[1.0, 0.0], "b1")
            .await
            .unwrap();
        storage
            .insert_embedding("docs", "a.txt", &[0.8, 0.2], "b1")
            .await
            .unwrap();

        let out = storage
            .lookup_cosine("docs", &[1.0, 0.0], 10, 0.1)
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert!((out.refs[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_lookup_respects_threshold_and_limit() {
        let storage = MemoryStorage::new();
        storage
            .insert_embedding("docs", "close.txt", &[1.0, 0.0], "b1")
            .await
            .unwrap();
        storage
            .insert_embedding("docs", "near.txt", &[0.7, 0.7], "b1")
            .await
            .unwrap();
        storage
            .insert_embedding("docs", "far.txt", &[0.0, 1.0], "b1")
            .await
            .unwrap();

        let out = storage
            .lookup_cosine("docs", &[1.0, 0.0], 1, 0.5)
            .await
            .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out.refs[0].reference, "close.txt");

        // an exact-threshold score does not qualify
        let exact = storage
            .lookup_cosine("docs", &[0.0, 1.0], 10, 1.0)
            .await
            .unwrap();
        assert!(exact.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_unknown_collection_is_empty() {
        let storage = MemoryStorage::new();
        let out = storage
            .lookup_cosine("nope", &[1.0], 5, 0.0)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_keeps_only_given_batch() {
        let storage = MemoryStorage::new();
        storage
            .insert_embedding("docs", "old.txt", &[1.0, 0.0], "b1")
            .await
            .unwrap();
        storage
            .insert_embedding("docs", "new.txt", &[0.0, 1.0], "b2")
            .await
            .unwrap();

        storage.cleanup("docs", "b2").await.unwrap();

        let out = storage
            .lookup_cosine("docs", &[1.0, 0.0], 10, -1.0)
            .await
            .unwrap();
        assert_eq!(out.references().collect::<Vec<_>>(), vec!["new.txt"]);
    }
}
