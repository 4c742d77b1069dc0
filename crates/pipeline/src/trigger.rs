//! Interval trigger for repeated runs.
//!
//! [`RunTrigger::start`] spawns a background task and returns a
//! [`TriggerHandle`]; [`TriggerHandle::stop`] cancels the wait and joins
//! the task. Each run is awaited before the next wait begins, so runs
//! never overlap. A run in progress when `stop` is called is allowed to
//! finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use newsframe_core::clock::Clock;

use crate::run::{RunOrchestrator, RunOutcome, RunReport};

/// Default delay between runs.
pub const DEFAULT_RUN_INTERVAL: Duration = Duration::from_secs(3600);

/// What the trigger did before it stopped.
#[derive(Debug, Clone, Default)]
pub struct TriggerSummary {
    pub runs: u64,
    pub persisted: u64,
    pub last: Option<RunReport>,
}

/// Configuration and collaborators for a run loop.
pub struct RunTrigger {
    orchestrator: Arc<RunOrchestrator>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    run_immediately: bool,
    max_runs: Option<u64>,
}

impl RunTrigger {
    pub fn new(orchestrator: Arc<RunOrchestrator>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            orchestrator,
            clock,
            interval,
            run_immediately: true,
            max_runs: None,
        }
    }

    /// Whether the first run happens at start or after one interval.
    pub fn run_immediately(mut self, yes: bool) -> Self {
        self.run_immediately = yes;
        self
    }

    /// Stop on its own after `n` runs.
    pub fn max_runs(mut self, n: u64) -> Self {
        self.max_runs = Some(n);
        self
    }

    /// Spawn the run loop.
    pub fn start(self) -> TriggerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run_loop(cancel.clone()));
        TriggerHandle { cancel, task }
    }

    async fn run_loop(self, cancel: CancellationToken) -> TriggerSummary {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            run_immediately = self.run_immediately,
            "Run trigger started",
        );

        let mut summary = TriggerSummary::default();
        let mut empty_ticks = 0u64;
        let mut first = true;

        loop {
            if self.max_runs.is_some_and(|max| summary.runs >= max) {
                break;
            }

            if !(first && self.run_immediately) {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.clock.sleep(self.interval) => {}
                }
            }
            first = false;

            if cancel.is_cancelled() {
                break;
            }

            let report = self.orchestrator.run_once(summary.runs).await;
            summary.runs += 1;

            match &report.outcome {
                RunOutcome::Skipped { reason } => {
                    empty_ticks += 1;
                    tracing::info!(empty_ticks, reason = %reason, "Tick skipped");
                }
                RunOutcome::Persisted { .. } => {
                    empty_ticks = 0;
                    summary.persisted += 1;
                }
                _ => empty_ticks = 0,
            }
            summary.last = Some(report);
        }

        tracing::info!(runs = summary.runs, persisted = summary.persisted, "Run trigger stopped");
        summary
    }
}

/// Control handle for a started trigger.
pub struct TriggerHandle {
    cancel: CancellationToken,
    task: JoinHandle<TriggerSummary>,
}

impl TriggerHandle {
    /// Request a stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(self) -> TriggerSummary {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the loop to exit on its own (e.g. after `max_runs`).
    pub async fn join(self) -> TriggerSummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Run trigger task panicked");
                TriggerSummary::default()
            }
        }
    }
}
