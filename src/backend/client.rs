use std::time::Duration;

use reqwest::Client;

use super::error::BackendError;
use super::types::{ApiErrorBody, ExportStats, ExportStatus, StartExportResponse};

/// HTTP client for the export backend's REST API.
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client pointing at the given base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Ask the backend to start an export job.
    ///
    /// The backend answers 400 with "Export already running" when a job is
    /// already in flight; that surfaces as [`BackendError::Api`].
    pub async fn start_export(
        &self,
        force_reexport: bool,
    ) -> Result<StartExportResponse, BackendError> {
        let response = self
            .client
            .post(format!("{}/api/export/start", self.base_url))
            .query(&[("force_reexport", force_reexport)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), response).await);
        }

        Ok(response.json::<StartExportResponse>().await?)
    }

    /// Read the current export job status.
    pub async fn export_status(&self) -> Result<ExportStatus, BackendError> {
        let response = self
            .client
            .get(format!("{}/api/export/status", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), response).await);
        }

        Ok(response.json::<ExportStatus>().await?)
    }

    /// Fetch the export summary counters.
    pub async fn stats(&self) -> Result<ExportStats, BackendError> {
        let response = self
            .client
            .get(format!("{}/api/stats", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), response).await);
        }

        Ok(response.json::<ExportStats>().await?)
    }

    /// Build an `Api` error from a non-2xx response, extracting the backend's
    /// `detail`/`message` field when the body is parseable JSON.
    async fn api_error(status: u16, response: reqwest::Response) -> BackendError {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.reason().map(str::to_string))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    "unknown error".to_string()
                } else {
                    text
                }
            });
        BackendError::Api { status, message }
    }
}
