//! Infrastructure layer - External service implementations

pub mod completion;
pub mod embedder;
pub mod http_client;
pub mod importer;
pub mod logging;
pub mod registry;
pub mod storage;

pub use http_client::{HttpClient, HttpClientTrait};
pub use logging::init_logging;
pub use registry::ProviderRegistry;
