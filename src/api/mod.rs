//! API layer - HTTP endpoints wired from route declarations

pub mod error;
pub mod health;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
