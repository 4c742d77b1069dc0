use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use newsframe_comfyui::retry::RetryPolicy;
use newsframe_comfyui::workflow::WorkflowTemplate;
use newsframe_core::selection::default_priority_keywords;
use newsframe_core::style::{StyleCatalog, StyleName};
use newsframe_news::feed::{default_feeds, feeds_from_json, FeedConfig, DEFAULT_HEADLINES_PER_FEED};
use newsframe_pipeline::composite::Compositor;

/// Errors from loading worker configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has a value that cannot be used.
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// A referenced JSON file could not be read or validated.
    #[error("Failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// The HTTP clients could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// One-shot or repeating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Schedule,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "schedule" => Ok(Self::Schedule),
            other => Err(format!("expected 'once' or 'schedule', got '{other}'")),
        }
    }
}

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local ComfyUI instance.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub comfyui_url: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub retry: RetryPolicy,
    /// Per-request HTTP timeout for ComfyUI and feed requests.
    pub http_timeout: Duration,
    pub run_mode: RunMode,
    pub run_interval: Duration,
    pub run_immediately: bool,
    /// Fixed headline; bypasses the RSS feeds.
    pub headline: Option<String>,
    pub styles_path: Option<PathBuf>,
    pub feeds_path: Option<PathBuf>,
    pub workflow_path: Option<PathBuf>,
    pub priority_keywords: Vec<String>,
    pub style_rotation: Vec<StyleName>,
    pub headlines_per_feed: usize,
    /// `None` disables retention cleanup.
    pub cleanup_max_age: Option<Duration>,
    /// Render headline and summary below the generated image.
    pub composite_text: bool,
    /// Font for the composite; system fonts are searched when unset.
    pub font_path: Option<PathBuf>,
}

const SECS_PER_DAY: u64 = 24 * 3600;

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `COMFYUI_URL`           | `http://127.0.0.1:8188`  |
    /// | `OUTPUT_DIR`            | `generated_images`       |
    /// | `POLL_INTERVAL_SECS`    | `2`                      |
    /// | `JOB_TIMEOUT_SECS`      | `900`                    |
    /// | `POLL_RETRY_LIMIT`      | `5`                      |
    /// | `POLL_RETRY_BACKOFF_MS` | `500`                    |
    /// | `HTTP_TIMEOUT_SECS`     | `30`                     |
    /// | `RUN_MODE`              | `once`                   |
    /// | `RUN_INTERVAL_SECS`     | `3600`                   |
    /// | `RUN_IMMEDIATELY`       | `true`                   |
    /// | `HEADLINE`              | unset (use feeds)        |
    /// | `STYLES_PATH`           | unset (built-in styles)  |
    /// | `FEEDS_PATH`            | unset (built-in feeds)   |
    /// | `WORKFLOW_PATH`         | unset (built-in graph)   |
    /// | `PRIORITY_KEYWORDS`     | built-in list            |
    /// | `STYLE_ROTATION`        | all styles               |
    /// | `HEADLINES_PER_FEED`    | `5`                      |
    /// | `CLEANUP_MAX_AGE_DAYS`  | `0` (disabled)           |
    /// | `COMPOSITE_TEXT`        | `false`                  |
    /// | `COMPOSITE_FONT_PATH`   | unset (system fonts)     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let comfyui_url = var("COMFYUI_URL").unwrap_or_else(|| "http://127.0.0.1:8188".into());
        if !(comfyui_url.starts_with("http://") || comfyui_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "COMFYUI_URL",
                value: comfyui_url,
                reason: "must be an http(s) URL".into(),
            });
        }

        let output_dir = var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("generated_images"));

        let poll_interval_secs: u64 = positive(parse(&var, "POLL_INTERVAL_SECS", 2)?, "POLL_INTERVAL_SECS")?;
        let job_timeout_secs: u64 = positive(parse(&var, "JOB_TIMEOUT_SECS", 900)?, "JOB_TIMEOUT_SECS")?;
        let retry_limit: u32 = parse(&var, "POLL_RETRY_LIMIT", 5)?;
        let retry_backoff_ms: u64 = parse(&var, "POLL_RETRY_BACKOFF_MS", 500)?;
        let http_timeout_secs: u64 = positive(parse(&var, "HTTP_TIMEOUT_SECS", 30)?, "HTTP_TIMEOUT_SECS")?;
        let run_mode: RunMode = parse(&var, "RUN_MODE", RunMode::Once)?;
        let run_interval_secs: u64 = positive(parse(&var, "RUN_INTERVAL_SECS", 3600)?, "RUN_INTERVAL_SECS")?;
        let run_immediately = parse_bool(&var, "RUN_IMMEDIATELY", true)?;
        let headlines_per_feed: usize = positive(
            parse(&var, "HEADLINES_PER_FEED", DEFAULT_HEADLINES_PER_FEED)?,
            "HEADLINES_PER_FEED",
        )?;
        let cleanup_days: u64 = parse(&var, "CLEANUP_MAX_AGE_DAYS", 0)?;
        let composite_text = parse_bool(&var, "COMPOSITE_TEXT", false)?;

        let priority_keywords = match var("PRIORITY_KEYWORDS") {
            Some(raw) => split_list(&raw)
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            None => default_priority_keywords(),
        };

        let style_rotation = match var("STYLE_ROTATION") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|name| {
                    name.parse::<StyleName>().map_err(|e| ConfigError::Invalid {
                        var: "STYLE_ROTATION",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => StyleName::ALL.to_vec(),
        };

        Ok(Self {
            comfyui_url,
            output_dir,
            poll_interval: Duration::from_secs(poll_interval_secs),
            job_timeout: Duration::from_secs(job_timeout_secs),
            retry: RetryPolicy {
                limit: retry_limit,
                backoff: Duration::from_millis(retry_backoff_ms),
            },
            http_timeout: Duration::from_secs(http_timeout_secs),
            run_mode,
            run_interval: Duration::from_secs(run_interval_secs),
            run_immediately,
            headline: var("HEADLINE"),
            styles_path: var("STYLES_PATH").map(PathBuf::from),
            feeds_path: var("FEEDS_PATH").map(PathBuf::from),
            workflow_path: var("WORKFLOW_PATH").map(PathBuf::from),
            priority_keywords,
            style_rotation,
            headlines_per_feed,
            cleanup_max_age: (cleanup_days > 0)
                .then(|| Duration::from_secs(cleanup_days.saturating_mul(SECS_PER_DAY))),
            composite_text,
            font_path: var("COMPOSITE_FONT_PATH").map(PathBuf::from),
        })
    }

    /// Style profiles from `STYLES_PATH`, or the built-in set.
    pub fn load_styles(&self) -> Result<StyleCatalog, ConfigError> {
        match &self.styles_path {
            Some(path) => {
                let json = read(path)?;
                StyleCatalog::from_json(&json).map_err(|e| load_error(path, e))
            }
            None => Ok(StyleCatalog::builtin()),
        }
    }

    /// Feeds from `FEEDS_PATH`, or the built-in four.
    pub fn load_feeds(&self) -> Result<Vec<FeedConfig>, ConfigError> {
        match &self.feeds_path {
            Some(path) => {
                let json = read(path)?;
                feeds_from_json(&json).map_err(|e| load_error(path, e))
            }
            None => Ok(default_feeds()),
        }
    }

    /// Workflow graph from `WORKFLOW_PATH`, or the built-in graph.
    pub fn load_workflow(&self) -> Result<WorkflowTemplate, ConfigError> {
        match &self.workflow_path {
            Some(path) => {
                let json = read(path)?;
                WorkflowTemplate::from_json(&json).map_err(|e| load_error(path, e))
            }
            None => Ok(WorkflowTemplate::builtin()),
        }
    }

    /// Text compositor, when `COMPOSITE_TEXT` is on.
    ///
    /// A configured font must load; otherwise the first usable system font
    /// is taken and having none is an error.
    pub fn load_compositor(&self) -> Result<Option<Compositor>, ConfigError> {
        if !self.composite_text {
            return Ok(None);
        }
        let compositor = match &self.font_path {
            Some(path) => Compositor::from_font_file(path).map_err(|e| load_error(path, e))?,
            None => Compositor::from_system_fonts().ok_or_else(|| ConfigError::Invalid {
                var: "COMPOSITE_FONT_PATH",
                value: String::new(),
                reason: "no system font found; set a TTF/OTF path".into(),
            })?,
        };
        Ok(Some(compositor))
    }
}

// ---- private helpers ----

fn parse<T, V>(var: &V, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool<V>(var: &V, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var: name,
                value: raw,
                reason: "expected a boolean".into(),
            }),
        },
        None => Ok(default),
    }
}

fn positive<T>(value: T, name: &'static str) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var: name,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn read(path: &PathBuf) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| load_error(path, e))
}

fn load_error(path: &PathBuf, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Load {
        path: path.clone(),
        message: err.to_string(),
    }
}
