//! Age-based cleanup of persisted artifacts.
//!
//! Deletes images and sidecars in the output directory whose modification
//! time is older than the retention period. Other files are left alone.

use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::PipelineError;

/// Extensions the cleanup is allowed to delete.
const MANAGED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "json"];

/// Delete managed files older than `max_age` relative to `now`.
///
/// Returns the number of files removed. Individual delete failures are
/// logged and skipped; only failing to list the directory is an error.
pub async fn cleanup_older_than(
    dir: &Path,
    max_age: Duration,
    now: SystemTime,
) -> Result<usize, PipelineError> {
    let Some(cutoff) = now.checked_sub(max_age) else {
        return Ok(0);
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(PipelineError::io(dir, e)),
    };

    let mut removed = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let path = entry.path();
        if !is_managed(&path) {
            continue;
        }

        let modified = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            Err(e) => Err(e),
        };
        let modified = match modified {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read file age");
                continue;
            }
        };

        if modified < cutoff {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cleanup: delete failed");
                }
            }
        }
    }

    if removed > 0 {
        tracing::info!(removed, dir = %dir.display(), "Cleanup: removed old artifacts");
    } else {
        tracing::debug!(dir = %dir.display(), "Cleanup: nothing to remove");
    }
    Ok(removed)
}

fn is_managed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| MANAGED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
