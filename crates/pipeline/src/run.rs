//! One run: fetch -> select -> choose style -> build -> seed -> submit ->
//! await -> retrieve -> persist.
//!
//! [`RunOrchestrator::run_once`] never returns an error. Every failure
//! becomes a [`RunOutcome`] in the [`RunReport`], so a scheduler can keep
//! going after a bad run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::Rng;

use newsframe_comfyui::job::{JobClient, DEFAULT_JOB_TIMEOUT, DEFAULT_POLL_INTERVAL};
use newsframe_core::clock::Clock;
use newsframe_core::headline::Headline;
use newsframe_core::job::{ArtifactLocator, JobHandle, JobOutcome};
use newsframe_core::prompt::{self, GenerationRequest};
use newsframe_core::selection;
use newsframe_core::style::{StyleCatalog, StyleName};
use newsframe_core::summary::generate_summary;
use newsframe_core::types::{JobId, Timestamp};
use newsframe_news::source::HeadlineSource;

use crate::composite::Compositor;
use crate::error::PipelineError;
use crate::retention;
use crate::store::{ArtifactMetadata, ArtifactStore, PersistedArtifact};

// ---------------------------------------------------------------------------
// Settings and report types
// ---------------------------------------------------------------------------

/// Tunables for a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub priority_keywords: Vec<String>,
    /// Styles cycled through by run index when no content cue applies.
    pub style_rotation: Vec<StyleName>,
    /// Delete artifacts older than this after each run.
    pub cleanup_max_age: Option<Duration>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            priority_keywords: selection::default_priority_keywords(),
            style_rotation: StyleName::ALL.to_vec(),
            cleanup_max_age: None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Nothing to do (no usable headline).
    Skipped { reason: String },
    /// The image and its sidecar were written.
    Persisted { image_path: PathBuf, sidecar_path: PathBuf },
    /// The server reported the job as failed.
    JobFailed { reason: String },
    /// The client stopped waiting before the job finished.
    TimedOut,
    /// Any other error, labelled by kind.
    Error { kind: &'static str, message: String },
}

impl RunOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Persisted { .. } => "persisted",
            Self::JobFailed { .. } => "job_failed",
            Self::TimedOut => "timed_out",
            Self::Error { .. } => "error",
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_index: u64,
    pub started_at: Timestamp,
    pub headline: Option<String>,
    pub style: Option<StyleName>,
    pub job_id: Option<JobId>,
    pub outcome: RunOutcome,
    /// Old artifacts removed by retention cleanup after this run.
    pub cleaned: usize,
}

/// Mutable progress of a run, folded into the report at the end.
#[derive(Debug, Default)]
struct Progress {
    headline: Option<String>,
    style: Option<StyleName>,
    job_id: Option<JobId>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct RunOrchestrator {
    source: Arc<dyn HeadlineSource>,
    jobs: Arc<JobClient>,
    store: ArtifactStore,
    catalog: StyleCatalog,
    clock: Arc<dyn Clock>,
    settings: RunSettings,
    compositor: Option<Compositor>,
}

impl RunOrchestrator {
    pub fn new(
        source: Arc<dyn HeadlineSource>,
        jobs: Arc<JobClient>,
        store: ArtifactStore,
        catalog: StyleCatalog,
        clock: Arc<dyn Clock>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            jobs,
            store,
            catalog,
            clock,
            settings,
            compositor: None,
        }
    }

    /// Render the headline and summary below each saved image.
    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = Some(compositor);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Perform one run. Never fails; see [`RunReport::outcome`].
    pub async fn run_once(&self, run_index: u64) -> RunReport {
        let started_at = self.clock.wall();
        let mut progress = Progress::default();

        tracing::info!(run_index, "Run started");

        let outcome = match self.execute(run_index, &mut progress).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(run_index, kind = e.kind(), error = %e, "Run failed");
                RunOutcome::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };

        let cleaned = self.cleanup().await;

        tracing::info!(
            run_index,
            outcome = outcome.label(),
            job_id = progress.job_id.as_deref().unwrap_or("-"),
            "Run finished",
        );

        RunReport {
            run_index,
            started_at,
            headline: progress.headline,
            style: progress.style,
            job_id: progress.job_id,
            outcome,
            cleaned,
        }
    }

    async fn execute(
        &self,
        run_index: u64,
        progress: &mut Progress,
    ) -> Result<RunOutcome, PipelineError> {
        let headlines = match self.source.fetch().await {
            Ok(headlines) => headlines,
            Err(e) => {
                tracing::warn!(run_index, error = %e, "Headline source failed; skipping run");
                return Ok(RunOutcome::Skipped {
                    reason: format!("headline source unavailable: {e}"),
                });
            }
        };
        let Some(headline) = selection::select(&headlines, &self.settings.priority_keywords)
        else {
            tracing::info!(run_index, "No candidate headlines; skipping run");
            return Ok(RunOutcome::Skipped {
                reason: "no candidate headlines".to_string(),
            });
        };
        progress.headline = Some(headline.text().to_string());

        let wanted = selection::choose_style(headline, run_index, &self.settings.style_rotation);
        let Some(style) = self.catalog.get_or_first(wanted) else {
            return Ok(RunOutcome::Skipped {
                reason: "style catalog is empty".to_string(),
            });
        };
        progress.style = Some(style.name);

        tracing::info!(
            run_index,
            source = %headline.source(),
            style = %style.name,
            headline = %headline.text(),
            "Headline selected",
        );

        let request = prompt::build(headline, style)?;
        let seed = style.seed.unwrap_or_else(random_seed);
        let request = request.with_seed(seed);

        let handle = self.jobs.submit(&request).await?;
        progress.job_id = Some(handle.id.clone());

        let outcome = self
            .jobs
            .await_completion(&handle, self.settings.poll_interval, self.settings.job_timeout)
            .await?;

        match outcome {
            JobOutcome::Succeeded(locator) => {
                let saved = self
                    .persist(headline, style.name, &request, &handle, &locator)
                    .await?;
                tracing::info!(
                    run_index,
                    job_id = %handle.id,
                    path = %saved.image_path.display(),
                    "Artifact persisted",
                );
                Ok(RunOutcome::Persisted {
                    image_path: saved.image_path,
                    sidecar_path: saved.sidecar_path,
                })
            }
            JobOutcome::Failed(reason) => Ok(RunOutcome::JobFailed { reason }),
            JobOutcome::TimedOut => Ok(RunOutcome::TimedOut),
        }
    }

    async fn persist(
        &self,
        headline: &Headline,
        style: StyleName,
        request: &GenerationRequest,
        handle: &JobHandle,
        locator: &ArtifactLocator,
    ) -> Result<PersistedArtifact, PipelineError> {
        let bytes = self.jobs.retrieve(locator).await?;
        let now = self.clock.wall();
        let summary = generate_summary(headline.text());

        let composite = match &self.compositor {
            Some(compositor) => Some(
                render_composite(compositor, &bytes, headline.text(), &summary).await,
            ),
            None => None,
        };
        let (bytes, composited) = match composite {
            Some(Ok(composite)) => (composite, true),
            Some(Err(e)) => {
                tracing::warn!(
                    job_id = %handle.id,
                    error = %e,
                    "Composite failed; saving plain image",
                );
                (bytes, false)
            }
            None => (bytes, false),
        };

        let metadata = ArtifactMetadata {
            headline: headline.text().to_string(),
            source: headline.source().display_name().to_string(),
            style: style.to_string(),
            prompt: request.prompt_text.clone(),
            negative_prompt: request.negative_prompt.clone(),
            seed: request.seed,
            steps: request.steps,
            width: request.resolution.width,
            height: request.resolution.height,
            job_id: handle.id.clone(),
            server_filename: locator.filename.clone(),
            summary,
            composited,
            created_at: now,
        };

        self.store.persist(now, headline.text(), &bytes, &metadata).await
    }

    /// Retention cleanup; failures are logged, never fatal.
    async fn cleanup(&self) -> usize {
        let Some(max_age) = self.settings.cleanup_max_age else {
            return 0;
        };
        let now = SystemTime::from(self.clock.wall());
        match retention::cleanup_older_than(self.store.dir(), max_age, now).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Retention cleanup failed");
                0
            }
        }
    }
}

/// Render the text band off the async runtime.
async fn render_composite(
    compositor: &Compositor,
    bytes: &[u8],
    headline: &str,
    summary: &str,
) -> Result<Vec<u8>, PipelineError> {
    let compositor = compositor.clone();
    let bytes = bytes.to_vec();
    let (headline, summary) = (headline.to_string(), summary.to_string());
    tokio::task::spawn_blocking(move || compositor.compose(&bytes, &headline, &summary))
        .await
        .map_err(|e| PipelineError::Composite(format!("Composite task failed: {e}")))?
}

fn random_seed() -> u64 {
    u64::from(rand::rng().random::<u32>())
}
