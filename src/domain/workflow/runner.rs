//! Workflow execution

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::resolver::ProviderResolver;
use crate::domain::value::Multivar;
use crate::domain::workflow::context::{INPUT_VAR, RESPONSE_VAR, VarStore};
use crate::domain::workflow::dispatch::StepExecutor;
use crate::domain::workflow::entity::Workflow;
use crate::domain::EngineError;

/// Result of a completed workflow run
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// The value bound to `_response`
    pub response: Multivar,
    /// Every variable bound during the run
    pub vars: VarStore,
}

/// Runs configured workflows to completion
///
/// Runs are independent: each gets a fresh variable store and may execute
/// concurrently with any other run.
#[derive(Debug)]
pub struct WorkflowRunner {
    workflows: HashMap<String, Workflow>,
    executor: StepExecutor,
}

impl WorkflowRunner {
    pub fn new(
        workflows: impl IntoIterator<Item = Workflow>,
        providers: Arc<dyn ProviderResolver>,
    ) -> Self {
        Self {
            workflows: workflows
                .into_iter()
                .map(|w| (w.name.clone(), w))
                .collect(),
            executor: StepExecutor::new(providers),
        }
    }

    /// Run the named workflow with the given params
    ///
    /// Params must carry `_input`; it seeds the variable store. Steps run in
    /// declaration order and the first failure aborts the run. A successful
    /// run must have bound `_response`.
    pub async fn run_workflow(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<WorkflowOutcome, EngineError> {
        let workflow = self
            .workflows
            .get(name)
            .ok_or_else(|| EngineError::not_found("workflow", name))?;

        let input = params
            .get(INPUT_VAR)
            .ok_or(EngineError::MissingInput)?;

        if workflow.stages.is_empty() {
            return Err(EngineError::config(format!(
                "workflow '{}' contains no stages",
                workflow.name
            )));
        }

        let run_id = Uuid::new_v4();
        info!(workflow = %name, run_id = %run_id, "starting workflow run");

        let mut vars = VarStore::new();
        vars.bind(INPUT_VAR, Multivar::text(input));

        for stage in &workflow.stages {
            if stage.steps.is_empty() {
                warn!(
                    workflow = %name,
                    stage = %stage.name,
                    "workflow stage contains no steps, skipping"
                );
                continue;
            }

            self.executor.execute_all(&stage.steps, &mut vars).await?;
        }

        let response = vars
            .get(RESPONSE_VAR)
            .cloned()
            .ok_or(EngineError::NoOutputProduced)?;

        info!(workflow = %name, run_id = %run_id, "workflow run complete");

        Ok(WorkflowOutcome { response, vars })
    }

    /// Whether a workflow with this name is registered
    pub fn has_workflow(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }
}
