//! Importer backends

pub mod chunker;
mod file;

pub use chunker::chunk_text;
pub use file::FileImporter;
