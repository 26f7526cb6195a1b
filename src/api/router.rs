use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::error::ApiError;
use super::health;
use super::state::AppState;
use crate::config::engine_config::RouteDecl;
use crate::domain::value::Multivar;
use crate::domain::workflow::context::INPUT_VAR;

/// What a configured route executes: the workflow plus its static params
#[derive(Debug)]
struct RouteTarget {
    workflow: String,
    params: HashMap<String, String>,
}

/// Build the router: health probes plus one POST endpoint per configured route
pub fn create_router(state: AppState, routes: &[RouteDecl]) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::live_check));

    for route in routes {
        let target = Arc::new(RouteTarget {
            workflow: route.workflow.workflow_ref.clone(),
            params: route.workflow.params.clone(),
        });

        let handler = move |State(state): State<AppState>, body: Bytes| {
            let target = Arc::clone(&target);
            async move { execute_route(state, target, body).await }
        };

        router = router.route(&route.path, post(handler));
    }

    router.with_state(state).layer(TraceLayer::new_for_http())
}

/// Request body becomes `_input`, the workflow's `_response` becomes the
/// response body
async fn execute_route(
    state: AppState,
    target: Arc<RouteTarget>,
    body: Bytes,
) -> Result<Json<Multivar>, ApiError> {
    debug!(workflow = %target.workflow, bytes = body.len(), "handling route request");

    let mut params = target.params.clone();
    params.insert(
        INPUT_VAR.to_string(),
        String::from_utf8_lossy(&body).into_owned(),
    );

    let outcome = state.runner.run_workflow(&target.workflow, &params).await?;

    Ok(Json(outcome.response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::config::engine_config::RouteWorkflow;
    use crate::domain::completion::{CompletionOutput, CompletionService};
    use crate::domain::embedder::{Embedder, EmbeddingOutput};
    use crate::domain::importer::Importer;
    use crate::domain::resolver::ProviderResolver;
    use crate::domain::storage::{LookupOutput, VectorStorage};
    use crate::domain::workflow::entity::{Stage, Step, StepKind, Workflow};
    use crate::domain::workflow::WorkflowRunner;
    use crate::domain::EngineError;

    /// Completion service that echoes its prompt back
    #[derive(Debug)]
    struct EchoService;

    #[async_trait]
    impl CompletionService for EchoService {
        async fn complete(&self, prompt: &str) -> Result<CompletionOutput, EngineError> {
            Ok(CompletionOutput::new(format!("echo:{}", prompt)))
        }
    }

    #[derive(Debug)]
    struct EchoProviders;

    impl ProviderResolver for EchoProviders {
        fn embedder(&self, name: &str) -> Result<Box<dyn Embedder>, EngineError> {
            Err(EngineError::not_found("embedder", name))
        }

        fn completion(&self, _name: &str) -> Result<Box<dyn CompletionService>, EngineError> {
            Ok(Box::new(EchoService))
        }

        fn storage(&self, name: &str) -> Result<Arc<dyn VectorStorage>, EngineError> {
            Err(EngineError::not_found("storage", name))
        }

        fn importer(&self, name: &str) -> Result<Box<dyn Importer>, EngineError> {
            Err(EngineError::not_found("importer", name))
        }
    }

    fn answer_workflow() -> Workflow {
        Workflow {
            name: "answer".to_string(),
            stages: vec![Stage {
                name: "generate".to_string(),
                steps: vec![Step {
                    kind: StepKind::Service,
                    action: "completion".to_string(),
                    provider: "llm".to_string(),
                    params: [("prompt".to_string(), "Q: $_input".to_string())].into(),
                    var: Some("_response".to_string()),
                }],
            }],
        }
    }

    fn state() -> AppState {
        let runner = WorkflowRunner::new(vec![answer_workflow()], Arc::new(EchoProviders));
        AppState::new(Arc::new(runner))
    }

    fn target(params: &[(&str, &str)]) -> Arc<RouteTarget> {
        Arc::new(RouteTarget {
            workflow: "answer".to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_body_becomes_input_and_response_is_tagged() {
        let target = target(&[]);

        let Json(response) = execute_route(state(), target, Bytes::from("world"))
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["completion"]["text"], "echo:Q: world");
    }

    #[tokio::test]
    async fn test_body_overrides_configured_input_param() {
        let target = target(&[("_input", "configured default")]);

        let Json(response) = execute_route(state(), target, Bytes::from("live"))
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["completion"]["text"], "echo:Q: live");
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_an_api_error() {
        let target = Arc::new(RouteTarget {
            workflow: "missing".to_string(),
            params: HashMap::new(),
        });

        let err = execute_route(state(), target, Bytes::from("x")).await;
        assert!(err.is_err());
    }

    #[test]
    fn test_create_router_mounts_configured_routes() {
        let routes = vec![RouteDecl {
            path: "/answer".to_string(),
            workflow: RouteWorkflow {
                workflow_ref: "answer".to_string(),
                params: HashMap::new(),
            },
        }];

        // construction panics on malformed paths, so this is the check
        let _router = create_router(state(), &routes);
    }
}
