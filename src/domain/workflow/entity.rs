//! Workflow, stage and step definitions

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named workflow: an ordered list of stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// A named group of steps, executed in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One capability invocation
///
/// `provider` names a configured instance of the step's kind, `action`
/// selects the operation, and `params` are resolved against the variable
/// store at execution time. The output is bound to `var` when set,
/// otherwise to the kind's default variable name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub action: String,
    #[serde(rename = "ref")]
    pub provider: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub var: Option<String>,
}

impl Step {
    /// Variable name the step's output is bound to
    pub fn output_var(&self) -> &str {
        self.var.as_deref().unwrap_or_else(|| self.kind.default_var())
    }
}

/// The capability kind a step dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Embedder,
    Storage,
    Service,
    Importer,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedder => "embedder",
            Self::Storage => "storage",
            Self::Service => "service",
            Self::Importer => "importer",
        }
    }

    /// Default output variable name for steps without an explicit `var`
    pub fn default_var(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
