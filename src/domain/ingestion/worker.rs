//! Background import workers
//!
//! One worker per configured importer. Each cycle the producer side runs the
//! importer into a bounded channel while a consumer task runs the configured
//! steps for every chunk, then batch cleanup sweeps rows from older cycles.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::importer::ImportedDocument;
use crate::domain::ingestion::batch::mint_batch_id;
use crate::domain::resolver::ProviderResolver;
use crate::domain::value::Multivar;
use crate::domain::workflow::context::{BATCH_VAR, CHUNK_VAR, REF_VAR, VarStore};
use crate::domain::workflow::dispatch::StepExecutor;
use crate::domain::workflow::entity::Step;
use crate::domain::EngineError;

/// Pause between successful import cycles
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Pause before retrying after a failed cycle
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// The producer may stay at most one document ahead of the consumer
const DOCUMENT_CHANNEL_CAPACITY: usize = 1;

/// What to do when processing one chunk fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkFailurePolicy {
    /// Abort the whole cycle on the first failing chunk
    #[default]
    Abort,
    /// Log the failure and keep going with the remaining chunks
    Continue,
}

/// Everything a worker needs to know about one configured importer
#[derive(Debug, Clone)]
pub struct ImporterPlan {
    /// Name of the configured importer instance
    pub name: String,
    /// Steps to run for every chunk
    pub steps: Vec<Step>,
    /// Storage cleanup step run after each successful cycle
    pub cleanup: Option<Step>,
    pub on_chunk_error: ChunkFailurePolicy,
}

/// Counters from one completed import cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub documents: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
}

/// Periodically imports one source and processes its chunks
#[derive(Debug)]
pub struct IngestWorker {
    plan: ImporterPlan,
    providers: Arc<dyn ProviderResolver>,
    executor: StepExecutor,
    cancel: CancellationToken,
    cycle_interval: Duration,
    retry_backoff: Duration,
}

impl IngestWorker {
    pub fn new(
        plan: ImporterPlan,
        providers: Arc<dyn ProviderResolver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            plan,
            executor: StepExecutor::new(providers.clone()),
            providers,
            cancel,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Override the cycle and backoff pauses
    pub fn with_intervals(mut self, cycle_interval: Duration, retry_backoff: Duration) -> Self {
        self.cycle_interval = cycle_interval;
        self.retry_backoff = retry_backoff;
        self
    }

    /// Run the worker on a background task until its token is cancelled
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(importer = %self.plan.name, "importer worker started");

        loop {
            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                outcome = self.run_cycle() => outcome,
            };

            let pause = match outcome {
                Ok(report) => {
                    info!(
                        importer = %self.plan.name,
                        documents = report.documents,
                        chunks = report.chunks,
                        failed_chunks = report.failed_chunks,
                        "import cycle complete"
                    );
                    self.cycle_interval
                }
                Err(err) => {
                    error!(importer = %self.plan.name, error = %err, "import cycle failed");
                    self.retry_backoff
                }
            };

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = time::sleep(pause) => {}
            }
        }

        info!(importer = %self.plan.name, "importer worker stopped");
    }

    /// One full pass: mint a batch, import and process every chunk, clean up
    async fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        let importer = self.providers.importer(&self.plan.name)?;
        let batch = mint_batch_id();

        debug!(importer = %self.plan.name, batch = %batch, "starting import cycle");

        let (tx, rx) = mpsc::channel(DOCUMENT_CHANNEL_CAPACITY);
        let consumer = tokio::spawn(consume_documents(
            rx,
            self.executor.clone(),
            self.plan.steps.clone(),
            self.plan.on_chunk_error,
            self.plan.name.clone(),
        ));

        let produced = importer.run(&batch, tx).await;
        let consumed = match consumer.await {
            Ok(result) => result,
            Err(join_err) => Err(EngineError::provider(
                self.plan.name.clone(),
                format!("chunk consumer task failed: {}", join_err),
            )),
        };

        let report = match (produced, consumed) {
            (Ok(()), Ok(report)) => report,
            // a consumer abort closes the channel and fails the producer's
            // send as well; the chunk error is the cause to surface
            (_, Err(err)) => return Err(err),
            (Err(err), Ok(_)) => return Err(err),
        };

        self.run_cleanup(&batch).await;

        Ok(report)
    }

    /// Cleanup runs only after a fully successful cycle; its failure is
    /// logged and never fails the cycle
    async fn run_cleanup(&self, batch: &str) {
        let Some(cleanup) = &self.plan.cleanup else {
            return;
        };

        let mut vars = VarStore::new();
        vars.bind(BATCH_VAR, Multivar::text(batch));

        match self.executor.execute(cleanup, &vars).await {
            Ok(_) => info!(importer = %self.plan.name, "importer cleanup complete"),
            Err(err) => {
                error!(importer = %self.plan.name, error = %err, "importer cleanup failed");
            }
        }
    }
}

async fn consume_documents(
    mut rx: mpsc::Receiver<ImportedDocument>,
    executor: StepExecutor,
    steps: Vec<Step>,
    policy: ChunkFailurePolicy,
    importer: String,
) -> Result<CycleReport, EngineError> {
    let mut report = CycleReport::default();

    while let Some(doc) = rx.recv().await {
        report.documents += 1;

        for chunk in &doc.chunks {
            let mut vars = VarStore::new();
            vars.bind(CHUNK_VAR, Multivar::text(chunk.clone()));
            vars.bind(REF_VAR, Multivar::text(doc.reference.clone()));
            vars.bind(BATCH_VAR, Multivar::text(doc.batch.clone()));

            match executor.execute_all(&steps, &mut vars).await {
                Ok(()) => report.chunks += 1,
                Err(err) => match policy {
                    ChunkFailurePolicy::Abort => return Err(err),
                    ChunkFailurePolicy::Continue => {
                        report.failed_chunks += 1;
                        warn!(
                            importer = %importer,
                            reference = %doc.reference,
                            error = %err,
                            "chunk processing failed, continuing"
                        );
                    }
                },
            }
        }
    }

    Ok(report)
}
