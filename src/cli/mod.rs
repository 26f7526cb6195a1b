//! CLI module for ragline
//!
//! Provides subcommands for running and checking the engine:
//! - `serve`: HTTP server plus background importers (default)
//! - `validate`: load the configuration, resolve every provider, exit

pub mod serve;
pub mod validate;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;

/// ragline - configuration-driven RAG pipelines
#[derive(Parser)]
#[command(name = "ragline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server and background importers
    Serve(ConfigArgs),

    /// Check the configuration and provider wiring, then exit
    Validate(ConfigArgs),
}

/// Arguments shared by commands that load configuration
#[derive(Args, Clone)]
pub struct ConfigArgs {
    /// Config file to use instead of the config/ directory defaults
    #[arg(short, long)]
    pub config: Option<String>,
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<AppConfig> {
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    Ok(config)
}
