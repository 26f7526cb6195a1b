//! Step result values and their text representations

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::domain::completion::CompletionOutput;
use crate::domain::embedder::EmbeddingOutput;
use crate::domain::importer::ImportedDocs;
use crate::domain::storage::LookupOutput;
use crate::domain::EngineError;

/// A workflow variable: one value of one known kind
///
/// Every step binds exactly one of these, and params referencing a variable
/// receive the whole value. Reading a value as the wrong kind is an error,
/// never a silent default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multivar {
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Embedding(EmbeddingOutput),
    Completion(CompletionOutput),
    Lookup(LookupOutput),
    Imported(ImportedDocs),
}

impl Multivar {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Kind tag used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
            Self::Embedding(_) => "embedding",
            Self::Completion(_) => "completion",
            Self::Lookup(_) => "lookup",
            Self::Imported(_) => "imported",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_embedding(&self) -> Option<&EmbeddingOutput> {
        match self {
            Self::Embedding(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_completion(&self) -> Option<&CompletionOutput> {
        match self {
            Self::Completion(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_lookup(&self) -> Option<&LookupOutput> {
        match self {
            Self::Lookup(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_imported(&self) -> Option<&ImportedDocs> {
        match self {
            Self::Imported(i) => Some(i),
            _ => None,
        }
    }

    pub fn expect_embedding(&self) -> Result<&EmbeddingOutput, EngineError> {
        self.as_embedding().ok_or_else(|| {
            EngineError::param_type(
                "embedding",
                format!("expected an embedding value, found {}", self.kind()),
            )
        })
    }

    pub fn expect_lookup(&self) -> Result<&LookupOutput, EngineError> {
        self.as_lookup().ok_or_else(|| {
            EngineError::param_type(
                "refs",
                format!("expected a lookup result, found {}", self.kind()),
            )
        })
    }

    /// Text form used wherever a param or prompt wants a string
    ///
    /// Only text-bearing kinds have one: `Text`, `Bytes` (lossy UTF-8) and
    /// `Imported` (the joined documents). Embeddings, completions and lookup
    /// results do not flatten to text.
    pub fn as_text_like(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Bytes(b) => Some(String::from_utf8_lossy(b)),
            Self::Imported(i) => Some(Cow::Borrowed(i.combined.as_str())),
            _ => None,
        }
    }

    /// Substitutable text for prompt rendering: as `as_text_like`, but empty
    /// text does not substitute
    pub fn text_repr(&self) -> Option<Cow<'_, str>> {
        self.as_text_like().filter(|t| !t.is_empty())
    }
}
