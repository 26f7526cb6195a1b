//! Filesystem importer
//!
//! Walks a directory tree, chunks every readable text file and streams the
//! results to the ingestion worker. References are the file paths, which is
//! also how `resolve.refs` loads documents back.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::importer::{ImportedDocument, Importer};
use crate::domain::storage::LookupOutput;
use crate::domain::EngineError;
use crate::infrastructure::importer::chunker::chunk_text;

const DEFAULT_CHUNK_SIZE: usize = 512;
const DEFAULT_CHUNK_OVERLAP: usize = 24;

#[derive(Debug, Clone)]
pub struct FileImporter {
    directory: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FileImporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    pub fn from_config(config: &HashMap<String, String>) -> Result<Self, EngineError> {
        let directory = config
            .get("directory")
            .ok_or_else(|| EngineError::config("file importer requires a 'directory' setting"))?;

        let chunk_size = parse_setting(config, "chunk_size", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parse_setting(config, "chunk_overlap", DEFAULT_CHUNK_OVERLAP)?;

        if chunk_size == 0 {
            return Err(EngineError::config("file importer 'chunk_size' must be positive"));
        }
        if chunk_overlap >= chunk_size {
            return Err(EngineError::config(
                "file importer 'chunk_overlap' must be smaller than 'chunk_size'",
            ));
        }

        Ok(Self::new(directory).with_chunking(chunk_size, chunk_overlap))
    }

    /// All file paths under the configured directory, walked iteratively
    async fn collect_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        let mut files = Vec::new();
        let mut pending = vec![self.directory.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                EngineError::provider("file", format!("Failed to read '{}': {}", dir.display(), e))
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                EngineError::provider("file", format!("Failed to read '{}': {}", dir.display(), e))
            })? {
                let file_type = entry.file_type().await.map_err(|e| {
                    EngineError::provider(
                        "file",
                        format!("Failed to stat '{}': {}", entry.path().display(), e),
                    )
                })?;

                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

fn parse_setting(
    config: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, EngineError> {
    match config.get(key) {
        Some(raw) => raw.parse().map_err(|_| {
            EngineError::config(format!("Invalid file importer '{}' value '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

#[async_trait]
impl Importer for FileImporter {
    async fn run(
        &self,
        batch: &str,
        sink: mpsc::Sender<ImportedDocument>,
    ) -> Result<(), EngineError> {
        let files = self.collect_files().await?;
        debug!(directory = %self.directory.display(), files = files.len(), "importing files");

        for path in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    // binary or unreadable files are skipped, not fatal
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };

            let chunks = chunk_text(&content, self.chunk_size, self.chunk_overlap);
            if chunks.is_empty() {
                continue;
            }

            let doc = ImportedDocument {
                reference: path.to_string_lossy().into_owned(),
                chunks,
                batch: batch.to_string(),
            };

            sink.send(doc)
                .await
                .map_err(|_| EngineError::provider("file", "document sink closed"))?;
        }

        Ok(())
    }

    async fn resolve_refs(&self, refs: &LookupOutput) -> Result<Vec<String>, EngineError> {
        let mut documents = Vec::with_capacity(refs.len());

        for reference in refs.references() {
            let content = tokio::fs::read_to_string(reference).await.map_err(|e| {
                EngineError::provider("file", format!("Failed to read '{}': {}", reference, e))
            })?;
            documents.push(content);
        }

        Ok(documents)
    }
}
