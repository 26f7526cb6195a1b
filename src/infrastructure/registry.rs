//! Provider registry
//!
//! Turns configured provider declarations into live instances. Embedders,
//! services and importers are cheap to build and get constructed per
//! resolution; storage backends hold connection state and are cached by
//! type and name so every step sees the same instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::engine_config::{EngineConfig, ImporterDecl, ProviderDecl};
use crate::domain::completion::CompletionService;
use crate::domain::embedder::Embedder;
use crate::domain::importer::Importer;
use crate::domain::resolver::ProviderResolver;
use crate::domain::storage::VectorStorage;
use crate::domain::EngineError;
use crate::infrastructure::completion::{OllamaCompletion, OpenAiCompletion};
use crate::infrastructure::embedder::{OllamaEmbedder, OpenAiEmbedder};
use crate::infrastructure::http_client::HttpClientTrait;
use crate::infrastructure::importer::FileImporter;
use crate::infrastructure::storage::{MemoryStorage, PgvectorStorage};

type StorageCache = HashMap<String, HashMap<String, Arc<dyn VectorStorage>>>;

#[derive(Debug)]
pub struct ProviderRegistry {
    http: Arc<dyn HttpClientTrait>,
    embedders: HashMap<String, ProviderDecl>,
    services: HashMap<String, ProviderDecl>,
    storage_decls: HashMap<String, ProviderDecl>,
    importers: HashMap<String, ImporterDecl>,
    storage_cache: Mutex<StorageCache>,
}

impl ProviderRegistry {
    pub fn new(config: &EngineConfig, http: Arc<dyn HttpClientTrait>) -> Self {
        Self {
            http,
            embedders: by_name(&config.embedders),
            services: by_name(&config.services),
            storage_decls: by_name(&config.storage),
            importers: config
                .importers
                .iter()
                .map(|decl| (decl.name.clone(), decl.clone()))
                .collect(),
            storage_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Construct every declared provider once, surfacing bad declarations
    /// at startup instead of on first use
    pub fn preflight(&self) -> Result<(), EngineError> {
        for name in self.embedders.keys() {
            self.embedder(name)?;
        }
        for name in self.services.keys() {
            self.completion(name)?;
        }
        for name in self.storage_decls.keys() {
            self.storage(name)?;
        }
        for name in self.importers.keys() {
            self.importer(name)?;
        }
        Ok(())
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, StorageCache> {
        self.storage_cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn by_name(decls: &[ProviderDecl]) -> HashMap<String, ProviderDecl> {
    decls
        .iter()
        .map(|decl| (decl.name.clone(), decl.clone()))
        .collect()
}

impl ProviderResolver for ProviderRegistry {
    fn embedder(&self, name: &str) -> Result<Box<dyn Embedder>, EngineError> {
        let decl = self
            .embedders
            .get(name)
            .ok_or_else(|| EngineError::not_found("embedder", name))?;

        match decl.kind.as_str() {
            "ollama" => Ok(Box::new(OllamaEmbedder::from_config(
                self.http.clone(),
                &decl.config,
            )?)),
            "openai" => Ok(Box::new(OpenAiEmbedder::from_config(
                self.http.clone(),
                &decl.config,
            )?)),
            other => Err(EngineError::not_found("embedder type", other)),
        }
    }

    fn completion(&self, name: &str) -> Result<Box<dyn CompletionService>, EngineError> {
        let decl = self
            .services
            .get(name)
            .ok_or_else(|| EngineError::not_found("service", name))?;

        match decl.kind.as_str() {
            "ollama" => Ok(Box::new(OllamaCompletion::from_config(
                self.http.clone(),
                &decl.config,
            )?)),
            "openai" => Ok(Box::new(OpenAiCompletion::from_config(
                self.http.clone(),
                &decl.config,
            )?)),
            other => Err(EngineError::not_found("service type", other)),
        }
    }

    fn storage(&self, name: &str) -> Result<Arc<dyn VectorStorage>, EngineError> {
        let decl = self
            .storage_decls
            .get(name)
            .ok_or_else(|| EngineError::not_found("storage", name))?;

        let mut cache = self.cache_lock();
        if let Some(existing) = cache.get(&decl.kind).and_then(|of_kind| of_kind.get(name)) {
            return Ok(existing.clone());
        }

        let instance: Arc<dyn VectorStorage> = match decl.kind.as_str() {
            "memory" => Arc::new(MemoryStorage::new()),
            "pgvector" => Arc::new(PgvectorStorage::from_config(&decl.config)?),
            other => return Err(EngineError::not_found("storage type", other)),
        };

        cache
            .entry(decl.kind.clone())
            .or_default()
            .insert(name.to_string(), instance.clone());

        Ok(instance)
    }

    fn importer(&self, name: &str) -> Result<Box<dyn Importer>, EngineError> {
        let decl = self
            .importers
            .get(name)
            .ok_or_else(|| EngineError::not_found("importer", name))?;

        match decl.kind.as_str() {
            "file" => Ok(Box::new(FileImporter::from_config(&decl.config)?)),
            other => Err(EngineError::not_found("importer type", other)),
        }
    }
}
