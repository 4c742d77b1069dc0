use std::path::PathBuf;

use newsframe_core::error::CoreError;
use newsframe_news::error::NewsError;

/// Errors raised inside a run. `run_once` turns every one of them into a
/// [`crate::run::RunOutcome`] rather than returning it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    News(#[from] NewsError),

    /// Filesystem failure on the output directory.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text composite could not be rendered.
    #[error("Composite failed: {0}")]
    Composite(String),

    /// Sidecar metadata could not be serialized.
    #[error("Metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(e) => e.kind(),
            Self::News(_) => "news",
            Self::Io { .. } => "io",
            Self::Composite(_) => "composite",
            Self::Metadata(_) => "metadata",
        }
    }
}
