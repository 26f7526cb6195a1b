//! pgvector-backed vector storage
//!
//! Each collection gets its own table, created lazily on first use. The
//! connection is also lazy so a configured but unused backend never blocks
//! startup on an unreachable database.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tokio::sync::OnceCell;
use tokio::time;

use crate::domain::storage::{LookupOutput, ScoredRef, VectorStorage};
use crate::domain::EngineError;

const DEFAULT_DIMENSIONS: u32 = 1536;
const STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PgvectorStorage {
    database_url: String,
    dimensions: u32,
    pool: OnceCell<PgPool>,
    created: Mutex<HashSet<String>>,
}

impl fmt::Debug for PgvectorStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgvectorStorage")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl PgvectorStorage {
    pub fn new(database_url: impl Into<String>, dimensions: u32) -> Self {
        Self {
            database_url: database_url.into(),
            dimensions,
            pool: OnceCell::new(),
            created: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(config: &HashMap<String, String>) -> Result<Self, EngineError> {
        let database_url = config.get("database_url").ok_or_else(|| {
            EngineError::config("pgvector storage requires a 'database_url' setting")
        })?;

        let dimensions = match config.get("dimensions") {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                EngineError::config(format!("Invalid pgvector 'dimensions' value '{}'", raw))
            })?,
            None => DEFAULT_DIMENSIONS,
        };

        Ok(Self::new(database_url.clone(), dimensions))
    }

    async fn pool(&self) -> Result<&PgPool, EngineError> {
        self.pool
            .get_or_try_init(|| async {
                match time::timeout(STORAGE_TIMEOUT, PgPool::connect(&self.database_url)).await {
                    Ok(Ok(pool)) => Ok(pool),
                    Ok(Err(e)) => Err(EngineError::provider(
                        "pgvector",
                        format!("Failed to connect: {}", e),
                    )),
                    Err(_) => Err(EngineError::Timeout(STORAGE_TIMEOUT)),
                }
            })
            .await
    }

    /// Create the collection table on first use
    async fn ensure_collection(&self, collection: &str) -> Result<String, EngineError> {
        let table = table_name(collection)?;

        if self.created.lock().unwrap_or_else(|e| e.into_inner()).contains(&table) {
            return Ok(table);
        }

        let pool = self.pool().await?.clone();

        run_query(
            sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(&pool),
            "Failed to create vector extension",
        )
        .await?;

        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                reference TEXT NOT NULL,
                batch TEXT NOT NULL,
                embedding vector({}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            table, self.dimensions
        );
        run_query(
            sqlx::query(&create).execute(&pool),
            "Failed to create collection table",
        )
        .await?;

        let batch_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_batch ON {} (batch)",
            table, table
        );
        run_query(
            sqlx::query(&batch_index).execute(&pool),
            "Failed to create batch index",
        )
        .await?;

        // IVFFlat requires some data to build, so ignore errors
        let vector_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_embedding ON {} USING ivfflat (embedding vector_cosine_ops)",
            table, table
        );
        let _ = sqlx::query(&vector_index).execute(&pool).await;

        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.clone());

        Ok(table)
    }
}

#[async_trait]
impl VectorStorage for PgvectorStorage {
    async fn insert_embedding(
        &self,
        collection: &str,
        reference: &str,
        embedding: &[f32],
        batch: &str,
    ) -> Result<LookupOutput, EngineError> {
        let table = self.ensure_collection(collection).await?;
        let pool = self.pool().await?;

        let query = format!(
            "INSERT INTO {} (reference, batch, embedding) VALUES ($1, $2, $3::vector)",
            table
        );
        run_query(
            sqlx::query(&query)
                .bind(reference)
                .bind(batch)
                .bind(embedding_to_pgvector(embedding))
                .execute(pool),
            "Insert failed",
        )
        .await?;

        Ok(LookupOutput::default())
    }

    async fn lookup_cosine(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<LookupOutput, EngineError> {
        let table = self.ensure_collection(collection).await?;
        let pool = self.pool().await?;

        // best score per reference above the threshold
        let query = format!(
            r#"
            SELECT reference, MAX(score) AS score
            FROM (
                SELECT reference, 1 - (embedding <=> $1::vector) AS score
                FROM {}
            ) scores
            WHERE score > $2
            GROUP BY reference
            ORDER BY score DESC
            LIMIT $3
            "#,
            table
        );

        let rows = run_query(
            sqlx::query(&query)
                .bind(embedding_to_pgvector(embedding))
                .bind(f64::from(threshold))
                .bind(limit as i64)
                .fetch_all(pool),
            "Lookup failed",
        )
        .await?;

        let refs = rows
            .into_iter()
            .map(|row| {
                let reference: String = row.get("reference");
                let score: f64 = row.get("score");
                ScoredRef::new(reference, score as f32)
            })
            .collect();

        Ok(LookupOutput { refs })
    }

    async fn cleanup(&self, collection: &str, batch: &str) -> Result<(), EngineError> {
        let table = self.ensure_collection(collection).await?;
        let pool = self.pool().await?;

        let query = format!("DELETE FROM {} WHERE batch <> $1", table);
        run_query(sqlx::query(&query).bind(batch).execute(pool), "Cleanup failed").await?;

        Ok(())
    }
}

/// Collection names become table names, so only identifier characters pass
fn table_name(collection: &str) -> Result<String, EngineError> {
    if collection.is_empty()
        || !collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(EngineError::param_type(
            "collection",
            "must contain only letters, digits and underscores",
        ));
    }

    Ok(format!("collection_{}", collection))
}

fn embedding_to_pgvector(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

async fn run_query<T>(
    fut: impl Future<Output = Result<T, sqlx::Error>>,
    context: &str,
) -> Result<T, EngineError> {
    match time::timeout(STORAGE_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(EngineError::provider(
            "pgvector",
            format!("{}: {}", context, e),
        )),
        Err(_) => Err(EngineError::Timeout(STORAGE_TIMEOUT)),
    }
}
