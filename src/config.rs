//! Configuration loaded from `telexport.toml`.
//!
//! [`TelexportConfig`] holds everything needed to spawn and talk to the export
//! backend. Values missing from the file fall back to defaults that match a
//! development checkout (backend script in the working directory, uvicorn on
//! port 8000). The `TELEXPORT_BACKEND_URL` environment variable takes
//! precedence over the file for the backend URL.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration loaded from `telexport.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelexportConfig {
    /// Program used to start the backend process.
    #[serde(default = "default_backend_command")]
    pub backend_command: String,

    /// Arguments passed to the backend program.
    #[serde(default = "default_backend_args")]
    pub backend_args: Vec<String>,

    /// Working directory the backend is started in.
    #[serde(default = "default_backend_dir")]
    pub backend_dir: String,

    /// Base URL of the backend HTTP API.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Substrings that mark the backend ready when seen on its stdout.
    #[serde(default = "default_readiness_patterns")]
    pub readiness_patterns: Vec<String>,

    /// Seconds to wait for a readiness pattern before giving up.
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,

    /// Seconds between export status polls while a job runs.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum number of retained activity log entries.
    #[serde(default = "default_activity_log_cap")]
    pub activity_log_cap: usize,
}

fn default_backend_command() -> String {
    "python3".to_string()
}

fn default_backend_args() -> Vec<String> {
    vec!["web_server.py".to_string()]
}

fn default_backend_dir() -> String {
    ".".to_string()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

// The two startup phrases uvicorn prints, either of which marks readiness.
fn default_readiness_patterns() -> Vec<String> {
    vec![
        "Uvicorn running on".to_string(),
        "Application startup complete".to_string(),
    ]
}

fn default_readiness_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_activity_log_cap() -> usize {
    500
}

impl Default for TelexportConfig {
    fn default() -> Self {
        Self {
            backend_command: default_backend_command(),
            backend_args: default_backend_args(),
            backend_dir: default_backend_dir(),
            backend_url: default_backend_url(),
            readiness_patterns: default_readiness_patterns(),
            readiness_timeout_secs: default_readiness_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            activity_log_cap: default_activity_log_cap(),
        }
    }
}

impl TelexportConfig {
    /// Loads configuration from `telexport.toml` in the current directory,
    /// or from an explicit path. Missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new("telexport.toml"));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<TelexportConfig>(&contents)?
        } else {
            Self::default()
        };

        // Environment takes precedence over the file for the backend URL.
        if let Ok(url) = std::env::var("TELEXPORT_BACKEND_URL")
            && !url.is_empty()
        {
            config.backend_url = url;
        }

        Ok(config)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
