//! Job client: submit one generation job, poll it to a terminal state,
//! and fetch the finished artifact.
//!
//! A client tracks at most one in-flight job. Terminal poll results are
//! remembered per job id, so repeated polls of a finished job return the
//! same result even after the server evicts its history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use newsframe_core::clock::Clock;
use newsframe_core::error::CoreError;
use newsframe_core::job::{ArtifactLocator, JobHandle, JobOutcome, JobResult, JobState};
use newsframe_core::prompt::GenerationRequest;
use newsframe_core::types::JobId;

use crate::retry::{capped, RetryPolicy};
use crate::server::{ComfyUIApiError, ImageServer};
use crate::workflow::WorkflowTemplate;

/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default client-side wait budget for one job.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(900);

/// Floor applied to the poll interval so a zero interval cannot spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Number of finished jobs whose terminal result is remembered.
const TERMINAL_CACHE_CAPACITY: usize = 64;

/// The job this client is currently driving.
#[derive(Debug)]
struct ActiveJob {
    id: JobId,
    state: JobState,
}

#[derive(Debug, Default)]
struct Tracking {
    active: Option<ActiveJob>,
    terminal: VecDeque<(JobId, JobResult)>,
}

impl Tracking {
    fn terminal_for(&self, id: &str) -> Option<JobResult> {
        self.terminal
            .iter()
            .find(|(job_id, _)| job_id == id)
            .map(|(_, result)| result.clone())
    }

    fn remember(&mut self, id: &str, result: JobResult) {
        if self.terminal.len() == TERMINAL_CACHE_CAPACITY {
            self.terminal.pop_front();
        }
        self.terminal.push_back((id.to_string(), result));
    }

    /// Move the active job to `to` if it is `id` and the transition is valid.
    fn advance(&mut self, id: &str, to: JobState) {
        let Some(job) = self.active.as_mut().filter(|job| job.id == id) else {
            return;
        };
        if job.state == to {
            return;
        }
        match job.state.validate_transition(to) {
            Ok(()) => job.state = to,
            Err(msg) => tracing::debug!(job_id = %id, "{msg}"),
        }
    }
}

/// Drives generation jobs against an [`ImageServer`].
pub struct JobClient {
    server: Arc<dyn ImageServer>,
    clock: Arc<dyn Clock>,
    workflow: WorkflowTemplate,
    retry: RetryPolicy,
    tracking: Mutex<Tracking>,
}

impl JobClient {
    /// Create a client using the built-in workflow and default retry policy.
    pub fn new(server: Arc<dyn ImageServer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            server,
            clock,
            workflow: WorkflowTemplate::builtin(),
            retry: RetryPolicy::default(),
            tracking: Mutex::new(Tracking::default()),
        }
    }

    pub fn with_workflow(mut self, workflow: WorkflowTemplate) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// State of the most recently submitted job, or `Idle`.
    pub fn state(&self) -> JobState {
        self.lock()
            .active
            .as_ref()
            .map_or(JobState::Idle, |job| job.state)
    }

    /// Submit a generation request.
    ///
    /// Fails with `InvalidInput` before any network call when the prompt is
    /// empty or another job is still in flight. Submission is never retried.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<JobHandle, CoreError> {
        request.validate()?;

        if let Some(job) = self.lock().active.as_ref() {
            if !job.state.is_terminal() {
                return Err(CoreError::InvalidInput(format!(
                    "Job {} is still in flight ({:?})",
                    job.id, job.state
                )));
            }
        }

        let graph = self.workflow.render(request);
        let response = self.server.submit(&graph).await.map_err(|e| {
            tracing::warn!(error = %e, "Workflow submission failed");
            CoreError::from(e)
        })?;

        let Some(id) = response.prompt_id.filter(|id| !id.trim().is_empty()) else {
            return Err(CoreError::ProtocolViolation(format!(
                "Submit response has no prompt_id (node_errors: {})",
                response.node_errors
            )));
        };

        let handle = JobHandle {
            id: id.clone(),
            submitted_at: self.clock.wall(),
        };

        self.lock().active = Some(ActiveJob {
            id: id.clone(),
            state: JobState::Submitted,
        });

        tracing::info!(
            job_id = %id,
            queue_position = response.number.unwrap_or_default(),
            steps = request.steps,
            seed = request.seed.unwrap_or_default(),
            "Job submitted",
        );
        Ok(handle)
    }

    /// Query a job's status once.
    ///
    /// Once a terminal result has been observed for `handle`, later calls
    /// return it unchanged, even if the server has since evicted the entry
    /// or is unreachable. A server that later reports a different terminal
    /// result is a `ProtocolViolation`; the first result stays cached.
    pub async fn poll(&self, handle: &JobHandle) -> Result<JobResult, CoreError> {
        let fetched = self.server.history(&handle.id).await;
        let cached = self.lock().terminal_for(&handle.id);

        match (cached, fetched) {
            (Some(first), Ok(None)) | (Some(first), Err(_)) => Ok(first),
            (Some(first), Ok(Some(entry))) => {
                let latest = entry.to_result();
                if latest == first || latest == JobResult::Pending {
                    Ok(first)
                } else {
                    Err(CoreError::ProtocolViolation(format!(
                        "Job {} reported {latest:?} after {first:?}",
                        handle.id
                    )))
                }
            }
            (None, Err(e)) => Err(e.into_poll_error()),
            (None, Ok(None)) => {
                self.lock().advance(&handle.id, JobState::Polling);
                Ok(JobResult::Pending)
            }
            (None, Ok(Some(entry))) => {
                let result = entry.to_result();
                let mut tracking = self.lock();
                match JobState::for_result(&result) {
                    Some(terminal) => {
                        tracking.advance(&handle.id, terminal);
                        tracking.remember(&handle.id, result.clone());
                    }
                    None => tracking.advance(&handle.id, JobState::Polling),
                }
                Ok(result)
            }
        }
    }

    /// Poll until the job is terminal or `timeout` elapses.
    ///
    /// Never sleeps past the deadline, so it returns within `timeout` plus
    /// one in-flight poll. On timeout the server-side job is left running.
    /// A timeout too large to represent waits without a deadline.
    /// Transient `ServerUnreachable` polls are retried with linear backoff;
    /// exhausting the retry budget ends the wait as `TimedOut`. A
    /// non-retryable error marks the job `Failed` so the client can accept
    /// the next submission.
    pub async fn await_completion(
        &self,
        handle: &JobHandle,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<JobOutcome, CoreError> {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let started = self.clock.now();
        let deadline = started.checked_add(timeout);
        let mut failures = 0u32;
        let mut polls = 0u32;

        loop {
            polls += 1;
            let delay = match self.poll(handle).await {
                Ok(JobResult::Complete { artifact }) => {
                    tracing::info!(job_id = %handle.id, polls, artifact = %artifact, "Job succeeded");
                    return Ok(JobOutcome::Succeeded(artifact));
                }
                Ok(JobResult::Failed { reason }) => {
                    tracing::warn!(job_id = %handle.id, polls, reason = %reason, "Job failed");
                    return Ok(JobOutcome::Failed(reason));
                }
                Ok(JobResult::Pending) => {
                    failures = 0;
                    poll_interval
                }
                Err(e) if e.is_retryable() => {
                    failures += 1;
                    if !self.retry.allows(failures) {
                        tracing::warn!(
                            job_id = %handle.id,
                            failures,
                            error = %e,
                            "Poll retries exhausted",
                        );
                        return Ok(self.time_out(handle, started));
                    }
                    tracing::warn!(
                        job_id = %handle.id,
                        attempt = failures,
                        error = %e,
                        "Poll failed, retrying",
                    );
                    self.retry.delay_for(failures)
                }
                Err(e) => {
                    self.abandon(handle, &e);
                    return Err(e);
                }
            };

            let delay = match deadline {
                Some(deadline) => {
                    let now = self.clock.now();
                    if now >= deadline {
                        return Ok(self.time_out(handle, started));
                    }
                    capped(delay, deadline - now)
                }
                None => delay,
            };
            self.clock.sleep(delay).await;
        }
    }

    /// Download a finished artifact.
    pub async fn retrieve(&self, locator: &ArtifactLocator) -> Result<Vec<u8>, CoreError> {
        let bytes = match self.server.view(locator).await {
            Ok(bytes) => bytes,
            Err(ComfyUIApiError::ApiError { status: 404, .. }) => {
                return Err(CoreError::ArtifactMissing(locator.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.is_empty() {
            return Err(CoreError::ArtifactMissing(format!(
                "{locator} (empty body)"
            )));
        }

        tracing::debug!(artifact = %locator, bytes = bytes.len(), "Artifact retrieved");
        Ok(bytes)
    }

    // ---- private helpers ----

    fn time_out(&self, handle: &JobHandle, started: std::time::Instant) -> JobOutcome {
        self.lock().advance(&handle.id, JobState::TimedOut);
        let waited = self.clock.now().saturating_duration_since(started);
        tracing::warn!(
            job_id = %handle.id,
            waited_secs = waited.as_secs(),
            "Stopped waiting for job",
        );
        JobOutcome::TimedOut
    }

    fn abandon(&self, handle: &JobHandle, error: &CoreError) {
        self.lock().advance(&handle.id, JobState::Failed);
        tracing::warn!(job_id = %handle.id, error = %error, "Stopped tracking job after error");
    }

    fn lock(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_cache_evicts_oldest() {
        let mut tracking = Tracking::default();
        for i in 0..=TERMINAL_CACHE_CAPACITY {
            tracking.remember(&format!("job-{i}"), JobResult::Pending);
        }
        assert_eq!(tracking.terminal.len(), TERMINAL_CACHE_CAPACITY);
        assert!(tracking.terminal_for("job-0").is_none());
        assert!(tracking.terminal_for("job-1").is_some());
    }

    #[test]
    fn advance_ignores_other_jobs_and_invalid_moves() {
        let mut tracking = Tracking {
            active: Some(ActiveJob {
                id: "a".into(),
                state: JobState::Submitted,
            }),
            ..Default::default()
        };

        tracking.advance("b", JobState::Polling);
        assert_eq!(tracking.active.as_ref().unwrap().state, JobState::Submitted);

        tracking.advance("a", JobState::Succeeded);
        tracking.advance("a", JobState::Polling);
        assert_eq!(tracking.active.as_ref().unwrap().state, JobState::Succeeded);
    }
}
