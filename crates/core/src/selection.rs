//! Headline selection heuristic and per-headline style choice.

use std::cmp::Ordering;

use crate::headline::Headline;
use crate::style::StyleName;

// ---------------------------------------------------------------------------
// Scoring constants
// ---------------------------------------------------------------------------

/// Points per priority keyword found in the headline.
pub const KEYWORD_MATCH_WEIGHT: i32 = 10;

/// Cap on the length bonus (one point per ten characters).
pub const MAX_LENGTH_BONUS: i32 = 5;

/// Headlines shorter than this lose [`SHORT_HEADLINE_PENALTY`] points.
pub const SHORT_HEADLINE_THRESHOLD: usize = 30;

pub const SHORT_HEADLINE_PENALTY: i32 = 5;

/// Keywords that tend to produce striking images.
pub const DEFAULT_PRIORITY_KEYWORDS: &[&str] = &[
    "breakthrough",
    "discover",
    "amazing",
    "incredible",
    "shocking",
    "bizarre",
    "unusual",
    "first",
    "largest",
    "smallest",
    "record",
    "viral",
    "trending",
    "exclusive",
    "mystery",
    "secret",
];

const FUNNY_WORDS: &[&str] = &["funny", "bizarre", "weird", "unusual", "odd"];
const ARTISTIC_WORDS: &[&str] = &["art", "culture", "design", "creative"];
const ILLUSTRATION_WORDS: &[&str] = &["breaking", "urgent", "news", "report"];

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Count priority keywords contained in the headline (case-insensitive).
pub fn keyword_matches(headline: &Headline, priority_keywords: &[String]) -> usize {
    let lower = headline.text().to_lowercase();
    priority_keywords
        .iter()
        .filter(|kw| !kw.is_empty() && lower.contains(kw.to_lowercase().as_str()))
        .count()
}

/// Interest score: keyword matches dominate, length adds a small bonus.
pub fn score(headline: &Headline, priority_keywords: &[String]) -> i32 {
    let matches = keyword_matches(headline, priority_keywords) as i32;
    let len = headline.text().chars().count();

    let mut score = matches * KEYWORD_MATCH_WEIGHT;
    score += ((len / 10) as i32).min(MAX_LENGTH_BONUS);
    if len < SHORT_HEADLINE_THRESHOLD {
        score -= SHORT_HEADLINE_PENALTY;
    }
    score
}

/// Pick the most interesting headline.
///
/// Ordering: higher score first, then more recent `published`, then the
/// earlier position in `headlines`. Headlines with no publish time sort
/// after dated ones on the recency tie-break.
pub fn select<'a>(headlines: &'a [Headline], priority_keywords: &[String]) -> Option<&'a Headline> {
    rank(headlines, priority_keywords).into_iter().next()
}

/// All headlines in selection order.
pub fn rank<'a>(headlines: &'a [Headline], priority_keywords: &[String]) -> Vec<&'a Headline> {
    let mut scored: Vec<(i32, usize, &Headline)> = headlines
        .iter()
        .enumerate()
        .map(|(index, h)| (score(h, priority_keywords), index, h))
        .collect();

    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| compare_recency(a.2, b.2))
            .then_with(|| a.1.cmp(&b.1))
    });

    scored.into_iter().map(|(_, _, h)| h).collect()
}

/// Newer first; undated last.
fn compare_recency(a: &Headline, b: &Headline) -> Ordering {
    match (a.published(), b.published()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Style choice
// ---------------------------------------------------------------------------

/// Choose a style from the headline's content, else rotate by run index.
///
/// Content cues win over rotation. An empty rotation falls back to
/// [`StyleName::Illustration`].
pub fn choose_style(headline: &Headline, run_index: u64, rotation: &[StyleName]) -> StyleName {
    let keywords = headline.keywords();
    let has_any = |words: &[&str]| words.iter().any(|w| keywords.contains(*w));

    if has_any(FUNNY_WORDS) {
        StyleName::Funny
    } else if has_any(ARTISTIC_WORDS) {
        StyleName::Artistic
    } else if has_any(ILLUSTRATION_WORDS) {
        StyleName::Illustration
    } else if rotation.is_empty() {
        StyleName::Illustration
    } else {
        rotation[(run_index % rotation.len() as u64) as usize]
    }
}

/// [`DEFAULT_PRIORITY_KEYWORDS`] as owned strings.
pub fn default_priority_keywords() -> Vec<String> {
    DEFAULT_PRIORITY_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
