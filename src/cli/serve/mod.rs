//! Serve command - runs the HTTP server and background importers

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::ConfigArgs;
use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::domain::ingestion::IngestWorker;
use crate::domain::workflow::WorkflowRunner;
use crate::infrastructure::logging;
use crate::infrastructure::{HttpClient, ProviderRegistry};

/// Run the server until a shutdown signal arrives
pub async fn run(args: ConfigArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = super::load_config(&args)?;
    logging::init_logging(&config.logging);

    config.pipeline.validate()?;

    let registry = Arc::new(ProviderRegistry::new(
        &config.pipeline,
        Arc::new(HttpClient::new()),
    ));
    registry.preflight()?;

    let runner = WorkflowRunner::new(config.pipeline.workflows.clone(), registry.clone());
    let state = AppState::new(Arc::new(runner));

    let cancel = CancellationToken::new();
    let workers = spawn_importers(&config, &registry, &cancel);

    let app = create_router(state, &config.pipeline.routes);

    let addr = build_socket_addr(&config)?;
    info!("Starting server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    futures::future::join_all(workers).await;
    info!("Server shutdown complete");

    Ok(())
}

fn spawn_importers(
    config: &AppConfig,
    registry: &Arc<ProviderRegistry>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    config
        .pipeline
        .importers
        .iter()
        .map(|decl| IngestWorker::new(decl.plan(), registry.clone(), cancel.clone()).spawn())
        .collect()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
