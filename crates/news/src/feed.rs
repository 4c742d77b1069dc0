//! Feed configuration.

use serde::{Deserialize, Serialize};

use newsframe_core::headline::NewsSource;

use crate::error::NewsError;

/// Entries read from each feed unless configured otherwise.
pub const DEFAULT_HEADLINES_PER_FEED: usize = 5;

/// One RSS/Atom feed to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub source: NewsSource,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FeedConfig {
    pub fn new(source: NewsSource, url: &str) -> Self {
        Self {
            source,
            url: url.to_string(),
            enabled: true,
        }
    }
}

/// The four built-in news feeds.
pub fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new(NewsSource::Bbc, "http://feeds.bbci.co.uk/news/rss.xml"),
        FeedConfig::new(NewsSource::Cnn, "http://rss.cnn.com/rss/edition.rss"),
        FeedConfig::new(NewsSource::Reuters, "http://feeds.reuters.com/reuters/topNews"),
        FeedConfig::new(
            NewsSource::AssociatedPress,
            "https://feeds.apnews.com/rss/apf-topnews",
        ),
    ]
}

/// Parse a JSON array of feeds, dropping disabled entries.
///
/// At least one enabled feed with an `http(s)` URL is required.
pub fn feeds_from_json(json: &str) -> Result<Vec<FeedConfig>, NewsError> {
    let feeds: Vec<FeedConfig> = serde_json::from_str(json)
        .map_err(|e| NewsError::Config(format!("feeds file is not valid JSON: {e}")))?;

    let enabled: Vec<FeedConfig> = feeds.into_iter().filter(|f| f.enabled).collect();
    if enabled.is_empty() {
        return Err(NewsError::Config("no enabled feeds".to_string()));
    }
    if let Some(bad) = enabled
        .iter()
        .find(|f| !(f.url.starts_with("http://") || f.url.starts_with("https://")))
    {
        return Err(NewsError::Config(format!(
            "feed URL must be http(s): {}",
            bad.url
        )));
    }
    Ok(enabled)
}
