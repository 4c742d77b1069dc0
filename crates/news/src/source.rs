//! The headline source seam.

use std::collections::HashSet;

use async_trait::async_trait;

use newsframe_core::headline::{Headline, NewsSource};

use crate::error::NewsError;

/// Supplies candidate headlines, polled on demand.
///
/// An empty list is a valid answer; the orchestrator skips the run.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Headline>, NewsError>;
}

/// Fixed, operator-supplied headlines.
#[derive(Debug, Clone)]
pub struct StaticHeadlineSource {
    headlines: Vec<Headline>,
}

impl StaticHeadlineSource {
    pub fn new(headlines: Vec<Headline>) -> Self {
        Self { headlines }
    }

    /// A single custom headline.
    pub fn single(text: &str) -> Self {
        Self::new(vec![Headline::new(text, NewsSource::Custom, None)])
    }
}

#[async_trait]
impl HeadlineSource for StaticHeadlineSource {
    async fn fetch(&self) -> Result<Vec<Headline>, NewsError> {
        Ok(self.headlines.clone())
    }
}

/// Drop near-empty titles and case-insensitive duplicates, keeping the
/// first occurrence.
pub fn dedupe(headlines: Vec<Headline>) -> Vec<Headline> {
    let mut seen = HashSet::new();
    headlines
        .into_iter()
        .filter(|h| h.is_substantial())
        .filter(|h| seen.insert(h.text().to_lowercase()))
        .collect()
}
