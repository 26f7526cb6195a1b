//! Declarative pipeline configuration
//!
//! Everything the engine runs is declared here: HTTP routes, the workflows
//! they execute, provider instances and background importers. `validate`
//! catches dangling references before anything is wired up.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::domain::ingestion::{ChunkFailurePolicy, ImporterPlan};
use crate::domain::workflow::entity::{Step, StepKind, Workflow};
use crate::domain::EngineError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub embedders: Vec<ProviderDecl>,
    #[serde(default)]
    pub services: Vec<ProviderDecl>,
    #[serde(default)]
    pub storage: Vec<ProviderDecl>,
    #[serde(default)]
    pub importers: Vec<ImporterDecl>,
}

/// One HTTP route bound to a workflow
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDecl {
    pub path: String,
    pub workflow: RouteWorkflow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteWorkflow {
    #[serde(rename = "ref")]
    pub workflow_ref: String,
    /// Static params merged into every request for this route
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// A named provider instance of some backend type
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// A background importer together with its per-chunk steps
#[derive(Debug, Clone, Deserialize)]
pub struct ImporterDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub cleanup: Option<Step>,
    #[serde(default)]
    pub on_chunk_error: ChunkFailurePolicy,
}

impl ImporterDecl {
    pub fn plan(&self) -> ImporterPlan {
        ImporterPlan {
            name: self.name.clone(),
            steps: self.steps.clone(),
            cleanup: self.cleanup.clone(),
            on_chunk_error: self.on_chunk_error,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let declared = DeclaredNames::collect(self)?;
        let workflows = unique_names("workflow", self.workflows.iter().map(|w| w.name.as_str()))?;

        let mut paths = HashSet::new();
        for route in &self.routes {
            if !route.path.starts_with('/') {
                return Err(EngineError::config(format!(
                    "route path '{}' must start with '/'",
                    route.path
                )));
            }
            if !paths.insert(route.path.as_str()) {
                return Err(EngineError::config(format!(
                    "duplicate route path '{}'",
                    route.path
                )));
            }
            if !workflows.contains(route.workflow.workflow_ref.as_str()) {
                return Err(EngineError::config(format!(
                    "route '{}' references unknown workflow '{}'",
                    route.path, route.workflow.workflow_ref
                )));
            }
        }

        for workflow in &self.workflows {
            if workflow.stages.is_empty() {
                return Err(EngineError::config(format!(
                    "workflow '{}' has no stages",
                    workflow.name
                )));
            }
            for stage in &workflow.stages {
                let context = format!("workflow '{}' stage '{}'", workflow.name, stage.name);
                for step in &stage.steps {
                    declared.check_step(&context, step)?;
                }
            }
        }

        for importer in &self.importers {
            let context = format!("importer '{}'", importer.name);
            for step in &importer.steps {
                declared.check_step(&context, step)?;
            }
            if let Some(cleanup) = &importer.cleanup {
                if cleanup.kind != StepKind::Storage || cleanup.action != "cleanup" {
                    return Err(EngineError::config(format!(
                        "importer '{}' cleanup must be a storage cleanup step",
                        importer.name
                    )));
                }
                declared.check_step(&context, cleanup)?;
            }
        }

        Ok(())
    }
}

struct DeclaredNames<'a> {
    embedders: HashSet<&'a str>,
    services: HashSet<&'a str>,
    storage: HashSet<&'a str>,
    importers: HashSet<&'a str>,
}

impl<'a> DeclaredNames<'a> {
    fn collect(config: &'a EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            embedders: unique_names("embedder", config.embedders.iter().map(|p| p.name.as_str()))?,
            services: unique_names("service", config.services.iter().map(|p| p.name.as_str()))?,
            storage: unique_names("storage", config.storage.iter().map(|p| p.name.as_str()))?,
            importers: unique_names("importer", config.importers.iter().map(|p| p.name.as_str()))?,
        })
    }

    fn check_step(&self, context: &str, step: &Step) -> Result<(), EngineError> {
        let declared = match step.kind {
            StepKind::Embedder => &self.embedders,
            StepKind::Service => &self.services,
            StepKind::Storage => &self.storage,
            StepKind::Importer => &self.importers,
        };

        if !declared.contains(step.provider.as_str()) {
            return Err(EngineError::config(format!(
                "{} references unknown {} '{}'",
                context, step.kind, step.provider
            )));
        }

        Ok(())
    }
}

fn unique_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, EngineError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(EngineError::config(format!(
                "{} declared without a name",
                kind
            )));
        }
        if !seen.insert(name) {
            return Err(EngineError::config(format!(
                "duplicate {} name '{}'",
                kind, name
            )));
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::entity::Stage;
    use serde_json::json;

    fn step(kind: StepKind, action: &str, provider: &str) -> Step {
        Step {
            kind,
            action: action.to_string(),
            provider: provider.to_string(),
            params: HashMap::new(),
            var: None,
        }
    }

    fn provider(name: &str, kind: &str) -> ProviderDecl {
        ProviderDecl {
            name: name.to_string(),
            kind: kind.to_string(),
            config: HashMap::new(),
        }
    }

    fn valid_config() -> EngineConfig {
        EngineConfig {
            routes: vec![RouteDecl {
                path: "/answer".to_string(),
                workflow: RouteWorkflow {
                    workflow_ref: "rag".to_string(),
                    params: HashMap::new(),
                },
            }],
            workflows: vec![Workflow {
                name: "rag".to_string(),
                stages: vec![Stage {
                    name: "generate".to_string(),
                    steps: vec![step(StepKind::Service, "completion", "llm")],
                }],
            }],
            embedders: vec![provider("emb", "ollama")],
            services: vec![provider("llm", "ollama")],
            storage: vec![provider("vec", "memory")],
            importers: vec![ImporterDecl {
                name: "docs".to_string(),
                kind: "file".to_string(),
                config: HashMap::new(),
                steps: vec![step(StepKind::Embedder, "generate", "emb")],
                cleanup: Some(step(StepKind::Storage, "cleanup", "vec")),
                on_chunk_error: ChunkFailurePolicy::default(),
            }],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_duplicate_workflow_name_rejected() {
        let mut config = valid_config();
        config.workflows.push(config.workflows[0].clone());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate workflow name 'rag'"));
    }

    #[test]
    fn test_route_to_unknown_workflow_rejected() {
        let mut config = valid_config();
        config.routes[0].workflow.workflow_ref = "missing".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown workflow 'missing'"));
    }

    #[test]
    fn test_duplicate_route_path_rejected() {
        let mut config = valid_config();
        config.routes.push(config.routes[0].clone());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate route path"));
    }

    #[test]
    fn test_step_with_undeclared_provider_rejected() {
        let mut config = valid_config();
        config.workflows[0].stages[0].steps[0].provider = "ghost".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown service 'ghost'"));
    }

    #[test]
    fn test_workflow_without_stages_rejected() {
        let mut config = valid_config();
        config.workflows[0].stages.clear();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("has no stages"));
    }

    #[test]
    fn test_cleanup_must_be_storage_cleanup() {
        let mut config = valid_config();
        config.importers[0].cleanup = Some(step(StepKind::Storage, "insert.embedding", "vec"));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cleanup must be a storage cleanup"));
    }

    #[test]
    fn test_deserializes_renamed_fields() {
        let config: EngineConfig = serde_json::from_value(json!({
            "routes": [
                {"path": "/ask", "workflow": {"ref": "qa", "params": {"limit": "3"}}}
            ],
            "workflows": [
                {
                    "name": "qa",
                    "stages": [
                        {
                            "name": "answer",
                            "steps": [
                                {
                                    "type": "service",
                                    "action": "completion",
                                    "ref": "llm",
                                    "params": {"prompt": "$_input"},
                                    "var": "out"
                                }
                            ]
                        }
                    ]
                }
            ],
            "services": [{"name": "llm", "type": "openai", "config": {"model": "gpt-4o-mini"}}]
        }))
        .unwrap();

        assert_eq!(config.routes[0].workflow.workflow_ref, "qa");
        let step = &config.workflows[0].stages[0].steps[0];
        assert_eq!(step.kind, StepKind::Service);
        assert_eq!(step.provider, "llm");
        assert_eq!(step.var.as_deref(), Some("out"));
        assert_eq!(config.services[0].kind, "openai");
    }

    #[test]
    fn test_importer_defaults_to_abort_policy() {
        let config: EngineConfig = serde_json::from_value(json!({
            "importers": [{"name": "docs", "type": "file"}]
        }))
        .unwrap();

        assert_eq!(config.importers[0].on_chunk_error, ChunkFailurePolicy::Abort);
        assert!(config.importers[0].steps.is_empty());
        assert!(config.importers[0].cleanup.is_none());
    }
}
