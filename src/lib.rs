//! ragline
//!
//! A configuration-driven RAG pipeline engine:
//! - Declarative workflows wired to HTTP routes
//! - Pluggable embedding, completion, vector storage and importer providers
//! - Background ingestion with batch-scoped cleanup

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
