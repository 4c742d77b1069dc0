//! The image server seam.
//!
//! [`crate::job::JobClient`] only talks to an [`ImageServer`]; production
//! uses [`crate::api::ComfyUIApi`], tests use scripted in-memory fakes.

use async_trait::async_trait;
use serde::Deserialize;

use newsframe_core::error::CoreError;
use newsframe_core::job::ArtifactLocator;

use crate::history::HistoryEntry;

/// Response returned by the ComfyUI `/prompt` endpoint after queuing a
/// workflow.
///
/// Fields are optional so that a reply missing `prompt_id` surfaces as a
/// protocol violation instead of a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation errors (non-empty means the graph was refused).
    #[serde(default)]
    pub node_errors: serde_json::Value,
}

/// Errors from the image server transport layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// Connection refused, DNS failure or request timeout.
    #[error("ComfyUI unreachable: {0}")]
    Unreachable(String),

    /// Any other HTTP client failure.
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body does not match the expected shape.
    #[error("Malformed ComfyUI response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ComfyUIApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

impl From<ComfyUIApiError> for CoreError {
    fn from(err: ComfyUIApiError) -> Self {
        match err {
            ComfyUIApiError::Unreachable(msg) => CoreError::ServerUnreachable(msg),
            ComfyUIApiError::Request(e) => CoreError::ServerUnreachable(e.to_string()),
            ComfyUIApiError::ApiError { status, body } => {
                CoreError::ServerRejected { status, body }
            }
            ComfyUIApiError::Malformed(msg) => CoreError::ProtocolViolation(msg),
        }
    }
}

impl ComfyUIApiError {
    /// Error classification while polling a job.
    ///
    /// A 5xx from `/history` is a transient server condition during a
    /// poll, so it maps to `ServerUnreachable` and goes through the retry
    /// budget. Everything else maps as the `From` conversion does.
    pub fn into_poll_error(self) -> CoreError {
        match self {
            Self::ApiError { status, body } if status >= 500 => {
                CoreError::ServerUnreachable(format!("HTTP {status}: {body}"))
            }
            other => other.into(),
        }
    }
}

/// Minimal operations the job client needs from an image server.
#[async_trait]
pub trait ImageServer: Send + Sync {
    /// Queue an API-format workflow graph (`POST /prompt`).
    async fn submit(&self, workflow: &serde_json::Value)
        -> Result<SubmitResponse, ComfyUIApiError>;

    /// Fetch the history entry for a prompt (`GET /history/{id}`).
    ///
    /// `Ok(None)` means the server has no entry yet (queued or running)
    /// or has evicted it.
    async fn history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, ComfyUIApiError>;

    /// Download an artifact's bytes (`GET /view`).
    async fn view(&self, locator: &ArtifactLocator) -> Result<Vec<u8>, ComfyUIApiError>;
}
