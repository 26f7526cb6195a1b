pub mod batch;
pub mod worker;

pub use batch::mint_batch_id;
pub use worker::{
    ChunkFailurePolicy, CycleReport, ImporterPlan, IngestWorker, DEFAULT_CYCLE_INTERVAL,
    DEFAULT_RETRY_BACKOFF,
};
