//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, history retrieval, artifact download and
//! the `/system_stats` health probe using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use newsframe_core::job::ArtifactLocator;

use crate::history::{self, HistoryEntry};
use crate::server::{ComfyUIApiError, ImageServer, SubmitResponse};

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    /// Sent with every submission so server-side events can be attributed.
    client_id: String,
}

/// Subset of the `/system_stats` response used for the startup probe.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub system: SystemInfo,
    #[serde(default)]
    pub devices: Vec<DeviceStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub comfyui_version: Option<String>,
    #[serde(default)]
    pub python_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStats {
    pub name: String,
    #[serde(default)]
    pub vram_total: u64,
    #[serde(default)]
    pub vram_free: u64,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    /// * `request_timeout` - Upper bound on any single HTTP request.
    pub fn new(api_url: &str, request_timeout: Duration) -> Result<Self, ComfyUIApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ComfyUIApiError::Request)?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": self.client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve the history entry for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. Returns `None` while
    /// the prompt is queued or running.
    pub async fn get_history(
        &self,
        prompt_id: &str,
    ) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        let body: serde_json::Value = Self::parse_response(response).await?;
        history::entry_for(&body, prompt_id).map_err(|e| {
            ComfyUIApiError::Malformed(format!("history entry for {prompt_id}: {e}"))
        })
    }

    /// Download a generated image.
    ///
    /// Sends a `GET /view?filename=..&subfolder=..&type=..` request.
    pub async fn view(&self, locator: &ArtifactLocator) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", locator.filename.as_str()),
                ("subfolder", locator.subfolder.as_str()),
                ("type", locator.kind.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch server and device information (`GET /system_stats`).
    pub async fn system_stats(&self) -> Result<SystemStats, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ImageServer for ComfyUIApi {
    async fn submit(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        self.submit_workflow(workflow).await
    }

    async fn history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        self.get_history(prompt_id).await
    }

    async fn view(&self, locator: &ArtifactLocator) -> Result<Vec<u8>, ComfyUIApiError> {
        ComfyUIApi::view(self, locator).await
    }
}
