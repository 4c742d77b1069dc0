//! Newsframe worker: turns a news headline into a ComfyUI image.
//!
//! Runs once and exits, or repeats on an interval until Ctrl-C.
//!
//! # Environment variables
//!
//! | Variable                | Default                 | Description                               |
//! |-------------------------|-------------------------|-------------------------------------------|
//! | `COMFYUI_URL`           | `http://127.0.0.1:8188` | ComfyUI HTTP endpoint                     |
//! | `OUTPUT_DIR`            | `generated_images`      | Where images and sidecars are written     |
//! | `RUN_MODE`              | `once`                  | `once` or `schedule`                      |
//! | `RUN_INTERVAL_SECS`     | `3600`                  | Delay between scheduled runs              |
//! | `RUN_IMMEDIATELY`       | `true`                  | First scheduled run happens at start      |
//! | `HEADLINE`              | (unset)                 | Fixed headline instead of RSS feeds       |
//! | `POLL_INTERVAL_SECS`    | `2`                     | Delay between history polls               |
//! | `JOB_TIMEOUT_SECS`      | `900`                   | Give up on a job after this long          |
//! | `POLL_RETRY_LIMIT`      | `5`                     | Transient poll failures tolerated         |
//! | `POLL_RETRY_BACKOFF_MS` | `500`                   | Linear backoff unit between poll retries  |
//! | `HTTP_TIMEOUT_SECS`     | `30`                    | Per-request HTTP timeout                  |
//! | `STYLES_PATH`           | (built-in)              | JSON file of style profiles               |
//! | `FEEDS_PATH`            | (built-in)              | JSON file of RSS feeds                    |
//! | `WORKFLOW_PATH`         | (built-in)              | ComfyUI API-format workflow JSON          |
//! | `PRIORITY_KEYWORDS`     | (built-in)              | Comma-separated selection keywords        |
//! | `STYLE_ROTATION`        | all styles              | Comma-separated style names               |
//! | `HEADLINES_PER_FEED`    | `5`                     | Items taken from each feed                |
//! | `CLEANUP_MAX_AGE_DAYS`  | `0`                     | Retention for artifacts; `0` disables     |
//! | `COMPOSITE_TEXT`        | `false`                 | Draw headline and summary under the image |
//! | `COMPOSITE_FONT_PATH`   | (system fonts)          | TTF/OTF font for the composite            |
//! | `LOG_FORMAT`            | `pretty`                | `json` for structured log lines           |
//! | `RUST_LOG`              | `newsframe_*=info`      | Tracing filter                            |

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsframe_pipeline::run::RunOutcome;
use newsframe_worker::app::Worker;
use newsframe_worker::config::{RunMode, WorkerConfig};

const DEFAULT_LOG_FILTER: &str =
    "newsframe_worker=info,newsframe_pipeline=info,newsframe_comfyui=info,newsframe_news=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        comfyui_url = %config.comfyui_url,
        output_dir = %config.output_dir.display(),
        mode = ?config.run_mode,
        "Worker starting",
    );

    let worker = Worker::build(config).context("Failed to initialise worker")?;
    worker.probe().await;

    match worker.config().run_mode {
        RunMode::Once => {
            let report = worker.run_once().await;
            match report.outcome {
                RunOutcome::Persisted { image_path, .. } => {
                    tracing::info!(path = %image_path.display(), "Image generated");
                    Ok(())
                }
                RunOutcome::Skipped { reason } => {
                    tracing::warn!(reason = %reason, "Nothing generated");
                    Ok(())
                }
                RunOutcome::JobFailed { reason } => bail!("Generation failed: {reason}"),
                RunOutcome::TimedOut => bail!(
                    "Generation timed out after {}s",
                    worker.config().job_timeout.as_secs()
                ),
                RunOutcome::Error { kind, message } => bail!("Run failed ({kind}): {message}"),
            }
        }
        RunMode::Schedule => {
            let handle = worker.start_schedule();
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested, waiting for the current run");

            let summary = handle.stop().await;
            tracing::info!(
                runs = summary.runs,
                persisted = summary.persisted,
                "Worker stopped",
            );
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
