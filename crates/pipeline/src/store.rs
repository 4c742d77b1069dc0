//! Artifact persistence: image bytes plus a JSON sidecar.
//!
//! Files are created with `create_new`, so an existing artifact is never
//! overwritten. On a name collision a short random suffix is appended.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use newsframe_core::naming::{artifact_filename, sidecar_filename};
use newsframe_core::types::{JobId, Timestamp};

use crate::error::PipelineError;

/// Extension used when the bytes are not a recognised image format.
pub const FALLBACK_EXTENSION: &str = "png";

/// Sidecar metadata written next to each artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub headline: String,
    pub source: String,
    pub style: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: Option<u64>,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    pub job_id: JobId,
    /// Filename the image had on the server.
    pub server_filename: String,
    pub summary: String,
    /// Whether the saved image carries the headline and summary band.
    #[serde(default)]
    pub composited: bool,
    pub created_at: Timestamp,
}

/// Paths of one persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifact {
    pub image_path: PathBuf,
    pub sidecar_path: PathBuf,
}

/// Output directory for generated images.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PipelineError::io(&self.dir, e))
    }

    /// Write `bytes` as `<timestamp>_<slug>.<ext>` plus its sidecar.
    pub async fn persist(
        &self,
        at: Timestamp,
        headline: &str,
        bytes: &[u8],
        metadata: &ArtifactMetadata,
    ) -> Result<PersistedArtifact, PipelineError> {
        self.ensure_dir().await?;

        let extension = sniff_extension(bytes);
        let name = artifact_filename(at, headline, extension);
        let image_path = match self.write_new(&name, bytes).await? {
            Some(path) => path,
            None => {
                let suffixed = with_suffix(&name, &short_id());
                tracing::debug!(original = %name, renamed = %suffixed, "Artifact name taken");
                self.write_new(&suffixed, bytes).await?.ok_or_else(|| {
                    PipelineError::io(
                        self.dir.join(&suffixed),
                        std::io::Error::from(ErrorKind::AlreadyExists),
                    )
                })?
            }
        };

        let image_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name);
        let sidecar_path = self.dir.join(sidecar_filename(&image_name));
        let written = match serde_json::to_vec_pretty(metadata) {
            Ok(json) => tokio::fs::write(&sidecar_path, json)
                .await
                .map_err(|e| PipelineError::io(&sidecar_path, e)),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            discard(&image_path).await;
            return Err(e);
        }

        Ok(PersistedArtifact {
            image_path,
            sidecar_path,
        })
    }

    /// Create `name` exclusively. `Ok(None)` if it already exists.
    async fn write_new(&self, name: &str, bytes: &[u8]) -> Result<Option<PathBuf>, PipelineError> {
        let path = self.dir.join(name);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(PipelineError::io(&path, e)),
        };

        let written = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        drop(file);
        if let Err(e) = written {
            discard(&path).await;
            return Err(PipelineError::io(&path, e));
        }
        Ok(Some(path))
    }
}

/// Remove a partially written file; failures are only logged.
async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Cannot remove partial artifact");
    }
}

/// File extension for the image format detected from magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Gif) => "gif",
        _ => FALLBACK_EXTENSION,
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// `a/b.png` + `x` -> `a/b_x.png`.
fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{name}_{suffix}"),
    }
}
