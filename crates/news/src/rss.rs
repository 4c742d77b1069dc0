//! RSS/Atom headline source.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use newsframe_core::headline::Headline;

use crate::error::NewsError;
use crate::feed::{FeedConfig, DEFAULT_HEADLINES_PER_FEED};
use crate::source::{dedupe, HeadlineSource};

const USER_AGENT: &str = concat!("newsframe/", env!("CARGO_PKG_VERSION"));

/// Fetches every configured feed concurrently.
///
/// A feed that fails is logged and skipped; if all feeds fail the result
/// is an empty list rather than an error.
pub struct RssHeadlineSource {
    client: reqwest::Client,
    feeds: Vec<FeedConfig>,
    per_feed_limit: usize,
}

impl RssHeadlineSource {
    pub fn new(feeds: Vec<FeedConfig>, request_timeout: Duration) -> Result<Self, NewsError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NewsError::Config(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(client, feeds))
    }

    pub fn with_client(client: reqwest::Client, feeds: Vec<FeedConfig>) -> Self {
        Self {
            client,
            feeds,
            per_feed_limit: DEFAULT_HEADLINES_PER_FEED,
        }
    }

    pub fn with_per_feed_limit(mut self, limit: usize) -> Self {
        self.per_feed_limit = limit.max(1);
        self
    }

    pub fn feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    async fn fetch_feed(&self, feed: &FeedConfig) -> Result<Vec<Headline>, NewsError> {
        tracing::debug!(source = %feed.source, url = %feed.url, "Fetching feed");

        let response = self
            .client
            .get(&feed.url)
            .send()
            .await
            .map_err(|source| NewsError::Request {
                url: feed.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Status {
                url: feed.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| NewsError::Request {
            url: feed.url.clone(),
            source,
        })?;

        parse_feed(&body, feed, self.per_feed_limit)
    }
}

#[async_trait]
impl HeadlineSource for RssHeadlineSource {
    async fn fetch(&self) -> Result<Vec<Headline>, NewsError> {
        let results = join_all(self.feeds.iter().map(|feed| self.fetch_feed(feed))).await;

        let mut headlines = Vec::new();
        let mut failed = 0usize;
        for (feed, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(items) => {
                    tracing::debug!(source = %feed.source, count = items.len(), "Feed fetched");
                    headlines.extend(items);
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(source = %feed.source, error = %e, "Feed fetch failed");
                }
            }
        }

        let unique = dedupe(headlines);
        tracing::info!(
            feeds = self.feeds.len(),
            failed,
            headlines = unique.len(),
            "Fetched headlines",
        );
        Ok(unique)
    }
}

/// Parse a feed body into headlines.
///
/// Reads the first `limit` entries, then drops untitled and near-empty
/// ones. The entry's `published` date, falling back to `updated`, feeds
/// the recency tie-break.
pub fn parse_feed(body: &[u8], feed: &FeedConfig, limit: usize) -> Result<Vec<Headline>, NewsError> {
    let parsed = feed_rs::parser::parse(body).map_err(|e| NewsError::Parse {
        url: feed.url.clone(),
        message: e.to_string(),
    })?;

    Ok(parsed
        .entries
        .into_iter()
        .take(limit)
        .filter_map(|entry| {
            let title = entry.title?.content;
            let published = entry.published.or(entry.updated);
            Some(Headline::new(&title, feed.source, published))
        })
        .filter(Headline::is_substantial)
        .collect())
}
