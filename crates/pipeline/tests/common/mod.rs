//! Shared fakes for pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use newsframe_comfyui::history::HistoryEntry;
use newsframe_comfyui::job::JobClient;
use newsframe_comfyui::server::{ComfyUIApiError, ImageServer, SubmitResponse};
use newsframe_core::clock::ManualClock;
use newsframe_core::headline::{Headline, NewsSource};
use newsframe_core::job::ArtifactLocator;
use newsframe_core::style::StyleCatalog;
use newsframe_news::error::NewsError;
use newsframe_news::source::HeadlineSource;
use newsframe_pipeline::run::{RunOrchestrator, RunSettings};
use newsframe_pipeline::store::ArtifactStore;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRfake";

// ---------------------------------------------------------------------------
// Fake image server
// ---------------------------------------------------------------------------

/// How the fake server treats every job.
#[derive(Debug, Clone)]
pub enum ServerMode {
    Complete,
    Fail(String),
    NeverFinish,
    Unreachable,
    /// Submits succeed but every history request gets this HTTP status.
    Reject(u16),
}

pub struct FakeServer {
    mode: ServerMode,
    image: Vec<u8>,
    submits: AtomicUsize,
    pub graphs: Mutex<Vec<serde_json::Value>>,
}

impl FakeServer {
    pub fn new(mode: ServerMode) -> Self {
        Self {
            mode,
            image: PNG_BYTES.to_vec(),
            submits: AtomicUsize::new(0),
            graphs: Mutex::new(Vec::new()),
        }
    }

    /// Serve `bytes` from `/view` instead of the stub PNG header.
    pub fn with_image(mut self, bytes: Vec<u8>) -> Self {
        self.image = bytes;
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageServer for FakeServer {
    async fn submit(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        if matches!(self.mode, ServerMode::Unreachable) {
            return Err(ComfyUIApiError::Unreachable("connection refused".into()));
        }
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        self.graphs.lock().unwrap().push(workflow.clone());
        Ok(SubmitResponse {
            prompt_id: Some(format!("job-{n}")),
            number: Some(0),
            node_errors: json!({}),
        })
    }

    async fn history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, ComfyUIApiError> {
        let entry = match &self.mode {
            ServerMode::Complete => json!({
                "outputs": { "9": { "images": [
                    { "filename": format!("{prompt_id}.png"), "subfolder": "", "type": "output" }
                ]}},
                "status": { "status_str": "success", "completed": true, "messages": [] }
            }),
            ServerMode::Fail(message) => json!({
                "outputs": {},
                "status": {
                    "status_str": "error",
                    "messages": [["execution_error", { "exception_message": message }]]
                }
            }),
            ServerMode::NeverFinish => return Ok(None),
            ServerMode::Unreachable => {
                return Err(ComfyUIApiError::Unreachable("connection refused".into()))
            }
            ServerMode::Reject(status) => {
                return Err(ComfyUIApiError::ApiError {
                    status: *status,
                    body: "bad request".into(),
                })
            }
        };
        Ok(Some(serde_json::from_value(entry).unwrap()))
    }

    async fn view(&self, _locator: &ArtifactLocator) -> Result<Vec<u8>, ComfyUIApiError> {
        Ok(self.image.clone())
    }
}

// ---------------------------------------------------------------------------
// Fake headline source
// ---------------------------------------------------------------------------

pub struct FakeSource {
    headlines: Vec<Headline>,
    fail: bool,
    pub fetches: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn with(texts: &[&str]) -> Self {
        Self {
            headlines: texts
                .iter()
                .map(|t| Headline::new(t, NewsSource::Bbc, None))
                .collect(),
            fail: false,
            fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::with(&[])
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }
}

#[async_trait]
impl HeadlineSource for FakeSource {
    async fn fetch(&self) -> Result<Vec<Headline>, NewsError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(NewsError::Config("all feeds down".into()));
        }
        Ok(self.headlines.clone())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// A real, decodable PNG of one solid color.
pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 30, 30]),
    ))
    .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
    .unwrap();
    bytes
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
    ))
}

pub fn settings() -> RunSettings {
    RunSettings {
        poll_interval: Duration::from_secs(1),
        job_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn orchestrator(
    source: Arc<FakeSource>,
    server: Arc<FakeServer>,
    clock: Arc<ManualClock>,
    out_dir: &std::path::Path,
    catalog: StyleCatalog,
    settings: RunSettings,
) -> RunOrchestrator {
    let jobs = Arc::new(JobClient::new(server, clock.clone()));
    RunOrchestrator::new(
        source,
        jobs,
        ArtifactStore::new(out_dir),
        catalog,
        clock,
        settings,
    )
}
