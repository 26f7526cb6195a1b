//! Workflow definitions and execution

pub mod context;
pub mod dispatch;
pub mod entity;
pub mod runner;

pub use context::{BATCH_VAR, CHUNK_VAR, INPUT_VAR, REF_VAR, RESPONSE_VAR, VarStore};
pub use dispatch::StepExecutor;
pub use entity::{Stage, Step, StepKind, Workflow};
pub use runner::{WorkflowOutcome, WorkflowRunner};
