use std::time::Duration;

use crate::types::JobId;

/// Error taxonomy shared by the prompt builder, the job client and the
/// orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller error. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The image server could not be reached.
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// The image server refused the request (malformed workflow, bad params).
    #[error("Server rejected request ({status}): {body}")]
    ServerRejected { status: u16, body: String },

    /// The server answered in a way its contract does not allow.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The finished artifact is no longer available on the server.
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    /// The client gave up waiting for a job.
    #[error("Timed out after {}s waiting for job {job_id}", waited.as_secs())]
    TimedOut { job_id: JobId, waited: Duration },
}

impl CoreError {
    /// Whether the failure may clear up on its own.
    ///
    /// `TimedOut` is retryable only in the sense that the next scheduled
    /// run starts fresh.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerUnreachable(_) | Self::TimedOut { .. })
    }

    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ServerUnreachable(_) => "server_unreachable",
            Self::ServerRejected { .. } => "server_rejected",
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::ArtifactMissing(_) => "artifact_missing",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}
