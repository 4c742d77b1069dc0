//! Job handles, poll results and the client-side job state machine.
//!
//! The state machine lives here rather than in the ComfyUI crate so the
//! orchestrator and tests can reason about job lifecycles without pulling
//! in an HTTP client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Opaque identifier for one submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub id: JobId,
    pub submitted_at: Timestamp,
}

/// Location of a finished image on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactLocator {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage bucket on the server (`output`, `temp`, ...).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

impl ArtifactLocator {
    pub fn output(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: String::new(),
            kind: default_kind(),
        }
    }
}

impl fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subfolder.is_empty() {
            write!(f, "{}:{}", self.kind, self.filename)
        } else {
            write!(f, "{}:{}/{}", self.kind, self.subfolder, self.filename)
        }
    }
}

/// Result of a single status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Pending,
    Complete { artifact: ArtifactLocator },
    Failed { reason: String },
}

impl JobResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Terminal result of waiting on a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded(ArtifactLocator),
    Failed(String),
    /// The client stopped waiting. The server-side job may still finish.
    TimedOut,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Client-side lifecycle of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    /// States reachable from `self`. Terminal states return an empty slice.
    pub fn valid_transitions(self) -> &'static [JobState] {
        use JobState::*;
        match self {
            Idle => &[Submitted],
            // A job can finish before the first poll loop iteration.
            Submitted => &[Polling, Succeeded, Failed, TimedOut],
            Polling => &[Succeeded, Failed, TimedOut],
            Succeeded | Failed | TimedOut => &[],
        }
    }

    pub fn can_transition(self, to: JobState) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Validate a transition, returning a message for invalid ones.
    pub fn validate_transition(self, to: JobState) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!("Invalid job transition: {self:?} -> {to:?}"))
        }
    }

    /// The terminal state a poll result leads to, if any.
    pub fn for_result(result: &JobResult) -> Option<JobState> {
        match result {
            JobResult::Pending => None,
            JobResult::Complete { .. } => Some(JobState::Succeeded),
            JobResult::Failed { .. } => Some(JobState::Failed),
        }
    }
}
