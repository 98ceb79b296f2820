use thiserror::Error;

use crate::backend::BackendError;
use crate::export::JobRejected;
use crate::supervisor::SupervisorError;

/// Top-level error for the shell's command flows.
#[derive(Debug, Error)]
pub enum TelexportError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Worker error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Export rejected: {0}")]
    Rejected(#[from] JobRejected),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
