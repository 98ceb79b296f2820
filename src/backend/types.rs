//! Wire types for the export backend's HTTP API.
//!
//! All structs derive `Serialize` and `Deserialize` and mirror the JSON the
//! backend's `/api/export/*` and `/api/stats` endpoints exchange.

use serde::{Deserialize, Serialize};

/// Response body of `POST /api/export/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExportResponse {
    /// "success" when the job was accepted.
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Response body of `GET /api/export/status`.
///
/// `running == false` together with an absent `error` means the job finished
/// successfully. Progress is reported by the backend as a free integer and
/// clamped to 0–100 on our side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStatus {
    pub running: bool,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExportStatus {
    /// Progress as a UI-safe percentage.
    pub fn progress_pct(&self) -> u8 {
        self.progress.min(100) as u8
    }
}

/// Response body of `GET /api/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub exported_messages: u64,
    #[serde(default)]
    pub export_sessions: u64,
    #[serde(default)]
    pub last_export: Option<String>,
}

/// Error body the backend sends alongside non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// The most specific human-readable reason available.
    pub fn reason(&self) -> Option<&str> {
        self.detail.as_deref().or(self.message.as_deref())
    }
}
