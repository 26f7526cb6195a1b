//! Importer capability contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::storage::LookupOutput;
use crate::domain::EngineError;

/// One source document produced by an importer run, already chunked
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedDocument {
    pub reference: String,
    pub chunks: Vec<String>,
    pub batch: String,
}

/// Result of resolving ranked references back to their contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportedDocs {
    /// Document contents, in the same order as the references they came from
    pub documents: Vec<String>,
    /// The documents joined with the step's separator
    pub combined: String,
}

impl ImportedDocs {
    pub fn new(documents: Vec<String>, separator: &str) -> Self {
        let combined = documents.join(separator);
        Self {
            documents,
            combined,
        }
    }
}

/// Data source that can stream chunked documents and resolve refs back to text
#[async_trait]
pub trait Importer: Send + Sync + std::fmt::Debug {
    /// Walk the source and send one `ImportedDocument` per source document
    /// into `sink`, each tagged with `batch`. Returns once the source is
    /// exhausted or the sink is closed.
    async fn run(
        &self,
        batch: &str,
        sink: mpsc::Sender<ImportedDocument>,
    ) -> Result<(), EngineError>;

    /// Read the contents behind each ranked reference, preserving rank order
    async fn resolve_refs(&self, refs: &LookupOutput) -> Result<Vec<String>, EngineError>;
}
