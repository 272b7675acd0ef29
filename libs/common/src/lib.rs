//! Shared plumbing for drive-monitoring services
//!
//! - `logging`: tracing subscriber with the bracketed-level console format
//! - `config_loader`: layered configuration (defaults, file, environment)
//! - `shutdown`: Ctrl+C / SIGTERM handling

pub mod config_loader;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};

// Re-export common dependencies
pub use serde;
pub use tokio;
