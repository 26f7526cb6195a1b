//! Shared application state

use std::sync::Arc;

use crate::domain::workflow::WorkflowRunner;

#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: Arc<WorkflowRunner>,
}

impl AppState {
    pub fn new(runner: Arc<WorkflowRunner>) -> Self {
        Self { runner }
    }
}
