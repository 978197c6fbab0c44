pub mod config;
pub mod constants;
pub mod error;
pub mod pipeline;
pub mod types;

// Layered boundaries for application ports and infrastructure adapters
pub mod app;
pub mod infra;

// Logging and metrics setup
pub mod observability;

pub use config::Config;
pub use error::{PipelineError, Result};
