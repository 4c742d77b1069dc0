//! Wiring of configuration into a running pipeline.

use std::sync::Arc;

use newsframe_comfyui::api::ComfyUIApi;
use newsframe_comfyui::job::JobClient;
use newsframe_core::clock::{Clock, SystemClock};
use newsframe_news::rss::RssHeadlineSource;
use newsframe_news::source::{HeadlineSource, StaticHeadlineSource};
use newsframe_pipeline::run::{RunOrchestrator, RunReport, RunSettings};
use newsframe_pipeline::store::ArtifactStore;
use newsframe_pipeline::trigger::{RunTrigger, TriggerHandle};

use crate::config::{ConfigError, WorkerConfig};

/// A fully wired worker: one ComfyUI client, one headline source, one store.
pub struct Worker {
    api: Arc<ComfyUIApi>,
    orchestrator: Arc<RunOrchestrator>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Build every collaborator from `config`.
    ///
    /// Loads the style, feed and workflow files and the composite font
    /// referenced by the config; no network traffic happens here.
    pub fn build(config: WorkerConfig) -> Result<Self, ConfigError> {
        let catalog = config.load_styles()?;
        let workflow = config.load_workflow()?;

        let api = Arc::new(
            ComfyUIApi::new(&config.comfyui_url, config.http_timeout)
                .map_err(|e| ConfigError::Client(e.to_string()))?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let jobs = JobClient::new(api.clone(), clock.clone())
            .with_workflow(workflow)
            .with_retry(config.retry);

        let source: Arc<dyn HeadlineSource> = match &config.headline {
            Some(text) => {
                tracing::info!(headline = %text, "Using fixed headline");
                Arc::new(StaticHeadlineSource::single(text))
            }
            None => {
                let feeds = config.load_feeds()?;
                tracing::info!(feeds = feeds.len(), "Using RSS feeds");
                Arc::new(
                    RssHeadlineSource::new(feeds, config.http_timeout)
                        .map_err(|e| ConfigError::Client(e.to_string()))?
                        .with_per_feed_limit(config.headlines_per_feed),
                )
            }
        };

        let settings = RunSettings {
            poll_interval: config.poll_interval,
            job_timeout: config.job_timeout,
            priority_keywords: config.priority_keywords.clone(),
            style_rotation: config.style_rotation.clone(),
            cleanup_max_age: config.cleanup_max_age,
        };

        let mut orchestrator = RunOrchestrator::new(
            source,
            Arc::new(jobs),
            ArtifactStore::new(config.output_dir.clone()),
            catalog,
            clock.clone(),
            settings,
        );
        if let Some(compositor) = config.load_compositor()? {
            tracing::info!("Text composite enabled");
            orchestrator = orchestrator.with_compositor(compositor);
        }
        let orchestrator = Arc::new(orchestrator);

        Ok(Self {
            api,
            orchestrator,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Log what the server reports about itself.
    ///
    /// Returns `false` when the server could not be reached. A failed probe
    /// is not fatal; the run will surface the same error with context.
    pub async fn probe(&self) -> bool {
        match self.api.system_stats().await {
            Ok(stats) => {
                tracing::info!(
                    url = %self.api.api_url(),
                    comfyui_version = stats.system.comfyui_version.as_deref().unwrap_or("unknown"),
                    devices = stats.devices.len(),
                    "ComfyUI reachable",
                );
                for device in &stats.devices {
                    tracing::debug!(
                        device = %device.name,
                        vram_free = device.vram_free,
                        vram_total = device.vram_total,
                        "ComfyUI device",
                    );
                }
                true
            }
            Err(e) => {
                tracing::warn!(url = %self.api.api_url(), error = %e, "ComfyUI probe failed");
                false
            }
        }
    }

    /// Execute one run.
    pub async fn run_once(&self) -> RunReport {
        self.orchestrator.run_once(0).await
    }

    /// Start the interval trigger.
    pub fn start_schedule(&self) -> TriggerHandle {
        RunTrigger::new(
            self.orchestrator.clone(),
            self.clock.clone(),
            self.config.run_interval,
        )
        .run_immediately(self.config.run_immediately)
        .start()
    }
}
