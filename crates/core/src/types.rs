/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Server-issued job identifier (ComfyUI `prompt_id`).
pub type JobId = String;
