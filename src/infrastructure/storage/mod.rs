//! Vector storage backends

mod memory;
mod pgvector;

pub use memory::{cosine_similarity, MemoryStorage};
pub use pgvector::PgvectorStorage;
