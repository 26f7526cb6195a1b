//! Provider resolution seam between workflow execution and the registry

use std::sync::Arc;

use crate::domain::completion::CompletionService;
use crate::domain::embedder::Embedder;
use crate::domain::importer::Importer;
use crate::domain::storage::VectorStorage;
use crate::domain::EngineError;

/// Resolves configured capability names to provider instances
///
/// Embedders, completion services and importers are stateless and built
/// fresh per resolution. Storage is stateful (connections, ensured tables)
/// and implementations return a shared instance per configured name.
pub trait ProviderResolver: Send + Sync + std::fmt::Debug {
    fn embedder(&self, name: &str) -> Result<Box<dyn Embedder>, EngineError>;

    fn completion(&self, name: &str) -> Result<Box<dyn CompletionService>, EngineError>;

    fn storage(&self, name: &str) -> Result<Arc<dyn VectorStorage>, EngineError>;

    fn importer(&self, name: &str) -> Result<Box<dyn Importer>, EngineError>;
}
