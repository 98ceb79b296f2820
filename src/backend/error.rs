use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
}
