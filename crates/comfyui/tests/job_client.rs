//! Integration tests for [`JobClient`] against a scripted in-memory server.
//!
//! Time is driven by [`ManualClock`], so timeout and backoff scenarios run
//! instantly and elapsed time can be asserted exactly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;

use newsframe_comfyui::history::HistoryEntry;
use newsframe_comfyui::job::JobClient;
use newsframe_comfyui::retry::RetryPolicy;
use newsframe_comfyui::server::{ComfyUIApiError, ImageServer, SubmitResponse};
use newsframe_core::clock::ManualClock;
use newsframe_core::error::CoreError;
use newsframe_core::headline::{Headline, NewsSource};
use newsframe_core::job::{ArtifactLocator, JobOutcome, JobResult, JobState};
use newsframe_core::prompt::{build, GenerationRequest};
use newsframe_core::style::{StyleCatalog, StyleName};

// ---------------------------------------------------------------------------
// Scripted server
// ---------------------------------------------------------------------------

type HistoryReply = Result<Option<HistoryEntry>, ComfyUIApiError>;

/// Replays scripted replies in order. An exhausted history script answers
/// "no entry yet"; an exhausted submit script answers with `job-1`.
#[derive(Default)]
struct ScriptedServer {
    submits: Mutex<VecDeque<Result<SubmitResponse, ComfyUIApiError>>>,
    histories: Mutex<VecDeque<HistoryReply>>,
    views: Mutex<VecDeque<Result<Vec<u8>, ComfyUIApiError>>>,
    submitted: Mutex<Vec<serde_json::Value>>,
    submit_calls: AtomicUsize,
    history_calls: AtomicUsize,
}

impl ScriptedServer {
    fn with_history(replies: Vec<HistoryReply>) -> Self {
        Self {
            histories: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    fn push_submit(&self, reply: Result<SubmitResponse, ComfyUIApiError>) {
        self.submits.lock().unwrap().push_back(reply);
    }

    fn push_view(&self, reply: Result<Vec<u8>, ComfyUIApiError>) {
        self.views.lock().unwrap().push_back(reply);
    }

    fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageServer for ScriptedServer {
    async fn submit(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(workflow.clone());
        self.submits.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(SubmitResponse {
                prompt_id: Some("job-1".into()),
                number: Some(0),
                node_errors: json!({}),
            })
        })
    }

    async fn history(&self, _prompt_id: &str) -> HistoryReply {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }

    async fn view(&self, _locator: &ArtifactLocator) -> Result<Vec<u8>, ComfyUIApiError> {
        self.views
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(b"\x89PNG\r\n\x1a\n".to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn complete(filename: &str) -> HistoryReply {
    Ok(Some(
        serde_json::from_value(json!({
            "outputs": { "9": { "images": [
                { "filename": filename, "subfolder": "", "type": "output" }
            ]}},
            "status": { "status_str": "success", "completed": true, "messages": [] }
        }))
        .unwrap(),
    ))
}

fn failed(message: &str) -> HistoryReply {
    Ok(Some(
        serde_json::from_value(json!({
            "outputs": {},
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [["execution_error", { "exception_message": message }]]
            }
        }))
        .unwrap(),
    ))
}

fn pending() -> HistoryReply {
    Ok(None)
}

fn unreachable() -> HistoryReply {
    Err(ComfyUIApiError::Unreachable("connection refused".into()))
}

fn request() -> GenerationRequest {
    let headline = Headline::new("Market rallies on rate cut", NewsSource::Reuters, None);
    build(
        &headline,
        StyleCatalog::builtin().get(StyleName::Illustration).unwrap(),
    )
    .unwrap()
    .with_seed(7)
}

fn client(server: Arc<ScriptedServer>, clock: Arc<ManualClock>) -> JobClient {
    JobClient::new(server, clock)
}

const SECOND: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Test: await_completion
// ---------------------------------------------------------------------------

/// Three pending polls then a completed entry: the fourth poll's locator
/// is returned and exactly three intervals elapse.
#[tokio::test]
async fn pending_three_times_then_complete() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        pending(),
        pending(),
        pending(),
        complete("news_image_00004_.png"),
    ]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server.clone(), clock.clone());

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        JobOutcome::Succeeded(ArtifactLocator::output("news_image_00004_.png"))
    );
    assert_eq!(server.history_calls(), 4);
    assert_eq!(clock.elapsed(), Duration::from_secs(3));
    assert_eq!(jobs.state(), JobState::Succeeded);
}

/// A job that never finishes times out without sleeping past the deadline.
#[tokio::test]
async fn timeout_never_sleeps_past_deadline() {
    let server = Arc::new(ScriptedServer::default());
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server.clone(), clock.clone());

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, Duration::from_secs(3), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::TimedOut);
    // Sleeps of 3 + 3 + 3 + 1; the last poll happens at the deadline.
    assert_eq!(clock.elapsed(), Duration::from_secs(10));
    assert_eq!(server.history_calls(), 5);
    assert_eq!(jobs.state(), JobState::TimedOut);
}

/// A failed execution is a terminal outcome, not an error.
#[tokio::test]
async fn failed_execution_is_failed_outcome() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        pending(),
        failed("CUDA out of memory"),
    ]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server, clock);

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Failed("CUDA out of memory".into()));
    assert_eq!(jobs.state(), JobState::Failed);
}

/// Consecutive unreachable polls beyond the retry limit end as TimedOut,
/// with linear backoff between attempts.
#[tokio::test]
async fn exhausted_retries_time_out() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        unreachable(),
        unreachable(),
        unreachable(),
    ]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server.clone(), clock.clone()).with_retry(RetryPolicy {
        limit: 2,
        backoff: Duration::from_millis(100),
    });

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::TimedOut);
    assert_eq!(server.history_calls(), 3);
    assert_eq!(clock.elapsed(), Duration::from_millis(300));
}

/// A transient failure followed by success resets the retry counter.
#[tokio::test]
async fn transient_failure_recovers() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        unreachable(),
        pending(),
        unreachable(),
        complete("a.png"),
    ]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server, clock).with_retry(RetryPolicy {
        limit: 1,
        backoff: Duration::from_millis(50),
    });

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Succeeded(ArtifactLocator::output("a.png")));
}

/// Non-retryable poll errors propagate immediately.
#[tokio::test]
async fn malformed_history_propagates() {
    let server = Arc::new(ScriptedServer::with_history(vec![Err(
        ComfyUIApiError::Malformed("outputs is not an object".into()),
    )]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server.clone(), clock.clone());

    let handle = jobs.submit(&request()).await.unwrap();
    let result = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(60))
        .await;

    assert_matches!(result, Err(CoreError::ProtocolViolation(_)));
    assert_eq!(server.history_calls(), 1);
    assert_eq!(clock.elapsed(), Duration::ZERO);
    assert_eq!(jobs.state(), JobState::Failed);
}

/// A non-retryable poll error ends tracking, so the next run can submit.
#[tokio::test]
async fn rejected_poll_frees_client_for_next_submit() {
    let server = Arc::new(ScriptedServer::with_history(vec![Err(
        ComfyUIApiError::ApiError {
            status: 400,
            body: "bad prompt id".into(),
        },
    )]));
    let jobs = client(server.clone(), Arc::new(ManualClock::default()));

    let handle = jobs.submit(&request()).await.unwrap();
    let result = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(60))
        .await;

    assert_matches!(result, Err(CoreError::ServerRejected { status: 400, .. }));
    assert_eq!(jobs.state(), JobState::Failed);

    server.push_submit(Ok(SubmitResponse {
        prompt_id: Some("job-2".into()),
        number: Some(0),
        node_errors: json!({}),
    }));
    let next = jobs.submit(&request()).await.unwrap();
    assert_eq!(next.id, "job-2");
    assert_eq!(jobs.state(), JobState::Submitted);
}

/// A 5xx from history during polling goes through the retry budget.
#[tokio::test]
async fn server_error_during_poll_is_retried() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        Err(ComfyUIApiError::ApiError {
            status: 503,
            body: "Service Unavailable".into(),
        }),
        complete("a.png"),
    ]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server.clone(), clock.clone()).with_retry(RetryPolicy {
        limit: 2,
        backoff: Duration::from_millis(100),
    });

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Succeeded(ArtifactLocator::output("a.png")));
    assert_eq!(server.history_calls(), 2);
    assert_eq!(clock.elapsed(), Duration::from_millis(100));
}

/// A timeout too large for the clock waits without a deadline instead of
/// overflowing.
#[tokio::test]
async fn unbounded_timeout_does_not_overflow() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        pending(),
        complete("a.png"),
    ]));
    let clock = Arc::new(ManualClock::default());
    let jobs = client(server, clock.clone());

    let handle = jobs.submit(&request()).await.unwrap();
    let outcome = jobs
        .await_completion(&handle, SECOND, Duration::from_secs(u64::MAX))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Succeeded(ArtifactLocator::output("a.png")));
    assert_eq!(clock.elapsed(), SECOND);
}

// ---------------------------------------------------------------------------
// Test: poll idempotence
// ---------------------------------------------------------------------------

/// Once terminal, poll keeps returning the same result after eviction or
/// while the server is unreachable.
#[tokio::test]
async fn terminal_poll_is_idempotent() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        complete("a.png"),
        pending(),
        unreachable(),
        complete("a.png"),
    ]));
    let jobs = client(server, Arc::new(ManualClock::default()));
    let handle = jobs.submit(&request()).await.unwrap();

    let expected = JobResult::Complete {
        artifact: ArtifactLocator::output("a.png"),
    };
    for _ in 0..4 {
        assert_eq!(jobs.poll(&handle).await.unwrap(), expected);
    }
}

/// A later Complete with a different locator is a protocol violation and
/// the first result is kept.
#[tokio::test]
async fn changed_locator_is_protocol_violation() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        complete("a.png"),
        complete("b.png"),
    ]));
    let jobs = client(server, Arc::new(ManualClock::default()));
    let handle = jobs.submit(&request()).await.unwrap();

    jobs.poll(&handle).await.unwrap();
    assert_matches!(jobs.poll(&handle).await, Err(CoreError::ProtocolViolation(_)));
    assert_eq!(
        jobs.poll(&handle).await.unwrap(),
        JobResult::Complete {
            artifact: ArtifactLocator::output("a.png"),
        }
    );
}

/// Failed after Complete is also a protocol violation.
#[tokio::test]
async fn failed_after_complete_is_protocol_violation() {
    let server = Arc::new(ScriptedServer::with_history(vec![
        complete("a.png"),
        failed("late error"),
    ]));
    let jobs = client(server, Arc::new(ManualClock::default()));
    let handle = jobs.submit(&request()).await.unwrap();

    jobs.poll(&handle).await.unwrap();
    assert_matches!(jobs.poll(&handle).await, Err(CoreError::ProtocolViolation(_)));
}

/// Before any terminal result, an unreachable server is reported as such.
#[tokio::test]
async fn poll_unreachable_before_terminal() {
    let server = Arc::new(ScriptedServer::with_history(vec![unreachable()]));
    let jobs = client(server, Arc::new(ManualClock::default()));
    let handle = jobs.submit(&request()).await.unwrap();

    assert_matches!(jobs.poll(&handle).await, Err(CoreError::ServerUnreachable(_)));
}

// ---------------------------------------------------------------------------
// Test: submit
// ---------------------------------------------------------------------------

/// An unreachable server on submit fails once, with no retry.
#[tokio::test]
async fn submit_unreachable_is_not_retried() {
    let server = Arc::new(ScriptedServer::default());
    server.push_submit(Err(ComfyUIApiError::Unreachable("connection refused".into())));
    let jobs = client(server.clone(), Arc::new(ManualClock::default()));

    assert_matches!(
        jobs.submit(&request()).await,
        Err(CoreError::ServerUnreachable(_))
    );
    assert_eq!(server.submit_calls(), 1);
    assert_eq!(jobs.state(), JobState::Idle);
}

/// Empty prompt text never reaches the server.
#[tokio::test]
async fn empty_prompt_rejected_before_network() {
    let server = Arc::new(ScriptedServer::default());
    let jobs = client(server.clone(), Arc::new(ManualClock::default()));

    let mut req = request();
    req.prompt_text = "   ".into();

    assert_matches!(jobs.submit(&req).await, Err(CoreError::InvalidInput(_)));
    assert_eq!(server.submit_calls(), 0);
}

/// HTTP 4xx on submit surfaces status and body.
#[tokio::test]
async fn submit_rejected_by_server() {
    let server = Arc::new(ScriptedServer::default());
    server.push_submit(Err(ComfyUIApiError::ApiError {
        status: 400,
        body: r#"{"error": {"type": "prompt_outputs_failed_validation"}}"#.into(),
    }));
    let jobs = client(server, Arc::new(ManualClock::default()));

    assert_matches!(
        jobs.submit(&request()).await,
        Err(CoreError::ServerRejected { status: 400, body }) if body.contains("validation")
    );
}

/// A 2xx reply without `prompt_id` is a protocol violation.
#[tokio::test]
async fn submit_without_prompt_id() {
    let server = Arc::new(ScriptedServer::default());
    server.push_submit(Ok(SubmitResponse::default()));
    let jobs = client(server, Arc::new(ManualClock::default()));

    assert_matches!(
        jobs.submit(&request()).await,
        Err(CoreError::ProtocolViolation(_))
    );
}

/// Only one job may be in flight; a finished job frees the client.
#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let server = Arc::new(ScriptedServer::with_history(vec![complete("a.png")]));
    let jobs = client(server.clone(), Arc::new(ManualClock::default()));

    let handle = jobs.submit(&request()).await.unwrap();
    assert_eq!(jobs.state(), JobState::Submitted);
    assert_matches!(jobs.submit(&request()).await, Err(CoreError::InvalidInput(_)));
    assert_eq!(server.submit_calls(), 1);

    jobs.poll(&handle).await.unwrap();
    assert_eq!(jobs.state(), JobState::Succeeded);

    server.push_submit(Ok(SubmitResponse {
        prompt_id: Some("job-2".into()),
        number: Some(1),
        node_errors: json!({}),
    }));
    let next = jobs.submit(&request()).await.unwrap();
    assert_eq!(next.id, "job-2");
}

/// The submitted graph carries the rendered prompt and seed.
#[tokio::test]
async fn submitted_graph_carries_request() {
    let server = Arc::new(ScriptedServer::default());
    let jobs = client(server.clone(), Arc::new(ManualClock::default()));
    let req = request();

    jobs.submit(&req).await.unwrap();

    let graphs = server.submitted.lock().unwrap();
    assert_eq!(graphs.len(), 1);
    assert_eq!(graphs[0]["6"]["inputs"]["text"], json!(req.prompt_text));
    assert_eq!(graphs[0]["3"]["inputs"]["seed"], json!(7));
}

// ---------------------------------------------------------------------------
// Test: retrieve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieve_returns_bytes() {
    let server = Arc::new(ScriptedServer::default());
    let jobs = client(server, Arc::new(ManualClock::default()));

    let bytes = jobs.retrieve(&ArtifactLocator::output("a.png")).await.unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}

/// A 404 from `/view` means the artifact is gone.
#[tokio::test]
async fn retrieve_not_found_is_artifact_missing() {
    let server = Arc::new(ScriptedServer::default());
    server.push_view(Err(ComfyUIApiError::ApiError {
        status: 404,
        body: String::new(),
    }));
    let jobs = client(server, Arc::new(ManualClock::default()));

    assert_matches!(
        jobs.retrieve(&ArtifactLocator::output("gone.png")).await,
        Err(CoreError::ArtifactMissing(_))
    );
}

/// An empty body is treated the same as a missing artifact.
#[tokio::test]
async fn retrieve_empty_body_is_artifact_missing() {
    let server = Arc::new(ScriptedServer::default());
    server.push_view(Ok(Vec::new()));
    let jobs = client(server, Arc::new(ManualClock::default()));

    assert_matches!(
        jobs.retrieve(&ArtifactLocator::output("a.png")).await,
        Err(CoreError::ArtifactMissing(_))
    );
}
