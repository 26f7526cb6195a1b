pub mod app_config;
pub mod engine_config;

pub use app_config::{AppConfig, LogFormat, LoggingConfig, ServerConfig};
pub use engine_config::{EngineConfig, ImporterDecl, ProviderDecl, RouteDecl, RouteWorkflow};
