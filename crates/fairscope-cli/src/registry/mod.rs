mod run;
mod staged;
mod telemetry;

pub use run::{RunContext, RunPaths, start_run, write_markdown, write_report};
pub use staged::{write_json_atomic, write_text_atomic};
pub use telemetry::{LogSink, init_logging};

use thiserror::Error;

/// Registry-level errors for run artifacts.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
