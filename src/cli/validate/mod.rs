//! Validate command - checks configuration and provider wiring without serving

use std::sync::Arc;

use super::ConfigArgs;
use crate::infrastructure::{HttpClient, ProviderRegistry};

/// Load the configuration, cross-check every declaration and construct every
/// provider once. Exits non-zero on the first problem found.
pub async fn run(args: ConfigArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = super::load_config(&args)?;

    config.pipeline.validate()?;

    let registry = ProviderRegistry::new(&config.pipeline, Arc::new(HttpClient::new()));
    registry.preflight()?;

    let pipeline = &config.pipeline;
    println!(
        "configuration OK: {} workflow(s), {} route(s), {} provider(s), {} importer(s)",
        pipeline.workflows.len(),
        pipeline.routes.len(),
        pipeline.embedders.len() + pipeline.services.len() + pipeline.storage.len(),
        pipeline.importers.len(),
    );

    Ok(())
}
