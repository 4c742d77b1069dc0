//! Headline records and text helpers.
//!
//! A [`Headline`] is built once per fetch cycle by a headline source and
//! discarded after the run. Keywords are extracted at construction time so
//! every consumer sees the same set.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Headlines shorter than this are treated as feed noise ("Live", "Video").
pub const MIN_HEADLINE_LENGTH: usize = 11;

/// Maximum headline length injected into a prompt.
pub const MAX_PROMPT_HEADLINE_LENGTH: usize = 100;

/// Words shorter than this never become keywords.
const MIN_KEYWORD_LENGTH: usize = 3;

/// Common English words that carry no visual meaning.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "against", "and", "are", "amid", "but", "for", "from", "has",
    "have", "her", "his", "how", "into", "its", "more", "new", "not", "off", "one", "our",
    "out", "over", "says", "she", "than", "that", "the", "their", "them", "they", "this",
    "was", "were", "what", "when", "who", "why", "will", "with", "you",
];

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Where a headline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsSource {
    Bbc,
    Cnn,
    Reuters,
    AssociatedPress,
    /// Supplied by the operator instead of a feed.
    Custom,
}

impl NewsSource {
    /// Display name used in logs and sidecar metadata.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Bbc => "BBC News",
            Self::Cnn => "CNN",
            Self::Reuters => "Reuters",
            Self::AssociatedPress => "Associated Press",
            Self::Custom => "Custom",
        }
    }
}

impl fmt::Display for NewsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ---------------------------------------------------------------------------
// Headline
// ---------------------------------------------------------------------------

/// A candidate news title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Headline {
    text: String,
    source: NewsSource,
    keywords: BTreeSet<String>,
    published: Option<Timestamp>,
}

impl Headline {
    /// Build a headline, normalizing whitespace and extracting keywords.
    pub fn new(text: &str, source: NewsSource, published: Option<Timestamp>) -> Self {
        let text = collapse_whitespace(text);
        let keywords = extract_keywords(&text);
        Self {
            text,
            source,
            keywords,
            published,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> NewsSource {
        self.source
    }

    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    pub fn published(&self) -> Option<Timestamp> {
        self.published
    }

    /// Whether this headline is long enough to be worth illustrating.
    pub fn is_substantial(&self) -> bool {
        self.text.chars().count() >= MIN_HEADLINE_LENGTH
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Extract lowercase significant words from a headline.
///
/// Punctuation is stripped from word edges, stopwords and short words are
/// dropped. The result is ordered so downstream output is deterministic.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '/' | '|'))
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LENGTH)
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}

/// Prepare headline text for prompt injection.
///
/// - double quotes are removed (they break CLIP weighting syntax)
/// - a trailing `" - Source"` attribution is dropped
/// - the result is capped at [`MAX_PROMPT_HEADLINE_LENGTH`] characters
///   with a `...` suffix
pub fn clean_for_prompt(text: &str) -> String {
    let unquoted: String = text.chars().filter(|c| *c != '"').collect();
    let mut clean = unquoted.trim();

    if let Some((head, _attribution)) = clean.rsplit_once(" - ") {
        if !head.trim().is_empty() {
            clean = head.trim();
        }
    }

    if clean.chars().count() > MAX_PROMPT_HEADLINE_LENGTH {
        let truncated: String = clean.chars().take(MAX_PROMPT_HEADLINE_LENGTH).collect();
        format!("{}...", truncated.trim_end())
    } else {
        clean.to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
