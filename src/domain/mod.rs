//! Domain layer - Core business logic and entities

pub mod completion;
pub mod embedder;
pub mod error;
pub mod importer;
pub mod ingestion;
pub mod resolver;
pub mod storage;
pub mod value;
pub mod workflow;

pub use completion::{CompletionOutput, CompletionService};
pub use embedder::{Embedder, EmbeddingOutput};
pub use error::EngineError;
pub use importer::{ImportedDocs, ImportedDocument, Importer};
pub use ingestion::{
    ChunkFailurePolicy, CycleReport, ImporterPlan, IngestWorker, DEFAULT_CYCLE_INTERVAL,
    DEFAULT_RETRY_BACKOFF,
};
pub use resolver::ProviderResolver;
pub use storage::{LookupOutput, ScoredRef, VectorStorage};
pub use value::Multivar;
pub use workflow::{
    Stage, Step, StepExecutor, StepKind, VarStore, Workflow, WorkflowOutcome, WorkflowRunner,
    BATCH_VAR, CHUNK_VAR, INPUT_VAR, REF_VAR, RESPONSE_VAR,
};
