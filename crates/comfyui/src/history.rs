//! Typed view of ComfyUI `/history/{prompt_id}` entries.
//!
//! A history entry appears once the server has started recording a
//! prompt's execution. Queued and running prompts have no entry at all,
//! which is why an absent entry maps to [`JobResult::Pending`].

use std::collections::BTreeMap;

use serde::Deserialize;

use newsframe_core::job::{ArtifactLocator, JobResult};

/// `status_str` value ComfyUI uses for failed executions.
pub const STATUS_ERROR: &str = "error";

/// Status message type carrying the failure details.
const EXECUTION_ERROR_MESSAGE: &str = "execution_error";

/// Status message type emitted when a prompt is interrupted.
const EXECUTION_INTERRUPTED_MESSAGE: &str = "execution_interrupted";

/// Storage bucket of images written by `SaveImage` nodes.
const OUTPUT_KIND: &str = "output";

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// One prompt's record in the history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Per-node outputs keyed by node id.
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

/// Outputs recorded for one node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactLocator>,
}

/// Execution status block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// `[message_type, payload]` pairs in emission order.
    #[serde(default)]
    pub messages: Vec<(String, serde_json::Value)>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

impl HistoryEntry {
    /// Map the entry to a poll result.
    pub fn to_result(&self) -> JobResult {
        if self.is_error() {
            return JobResult::Failed {
                reason: self.error_reason(),
            };
        }

        if let Some(artifact) = self.first_image() {
            return JobResult::Complete {
                artifact: artifact.clone(),
            };
        }

        if self.status.as_ref().is_some_and(|s| s.completed) {
            return JobResult::Failed {
                reason: "Job completed without producing an image".to_string(),
            };
        }

        JobResult::Pending
    }

    fn is_error(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status_str.as_deref())
            .is_some_and(|s| s == STATUS_ERROR)
    }

    /// First saved image, in numeric node-id order.
    ///
    /// `output` images win over `temp` previews.
    pub fn first_image(&self) -> Option<&ArtifactLocator> {
        let mut node_ids: Vec<&String> = self.outputs.keys().collect();
        node_ids.sort_by_key(|id| (id.parse::<u64>().unwrap_or(u64::MAX), id.as_str()));

        let images: Vec<&ArtifactLocator> = node_ids
            .into_iter()
            .flat_map(|id| self.outputs[id].images.iter())
            .collect();

        images
            .iter()
            .find(|img| img.kind == OUTPUT_KIND)
            .or_else(|| images.first())
            .copied()
    }

    /// Human-readable failure reason from the status messages.
    pub fn error_reason(&self) -> String {
        let messages = self
            .status
            .as_ref()
            .map(|s| s.messages.as_slice())
            .unwrap_or_default();

        for (kind, payload) in messages {
            if kind == EXECUTION_ERROR_MESSAGE {
                let message = payload
                    .get("exception_message")
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .unwrap_or("unknown error");
                return match payload.get("node_type").and_then(|v| v.as_str()) {
                    Some(node_type) => format!("{node_type}: {message}"),
                    None => message.to_string(),
                };
            }
            if kind == EXECUTION_INTERRUPTED_MESSAGE {
                return "Execution interrupted".to_string();
            }
        }
        "Execution failed".to_string()
    }
}

/// Extract one prompt's entry from a `/history/{id}` response body.
///
/// The body is an object keyed by prompt id; it is empty (`{}`) while the
/// prompt is still queued or running.
pub fn entry_for(
    body: &serde_json::Value,
    prompt_id: &str,
) -> Result<Option<HistoryEntry>, serde_json::Error> {
    match body.get(prompt_id) {
        Some(value) => HistoryEntry::deserialize(value).map(Some),
        None => Ok(None),
    }
}
