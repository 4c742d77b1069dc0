//! Contextual one-paragraph summaries for headlines.
//!
//! Keyword-table driven: the summary names the kind of event, the scale
//! implied by any numbers, known locations, an impact cue and a temporal
//! cue. Stored in artifact sidecars so the image can be captioned later.

use std::sync::LazyLock;

use regex::Regex;

/// Context category keyed by a trigger word, with its description.
const CONTEXT_TYPES: &[(&str, &str)] = &[
    ("arrest", "law enforcement action"),
    ("protest", "public demonstration"),
    ("rally", "public gathering"),
    ("election", "democratic process"),
    ("court", "legal proceedings"),
    ("government", "official policy"),
    ("technology", "technological advancement"),
    ("economy", "economic impact"),
    ("health", "public health"),
    ("climate", "environmental impact"),
    ("sports", "athletic competition"),
    ("entertainment", "cultural event"),
];

/// Inflected forms mapped to their context trigger.
const CONTEXT_VARIATIONS: &[(&str, &str)] = &[
    ("arrested", "arrest"),
    ("protesting", "protest"),
    ("protesters", "protest"),
    ("rallying", "rally"),
    ("voting", "election"),
    ("technological", "technology"),
    ("economic", "economy"),
];

const LOCATIONS: &[(&str, &str)] = &[
    ("london", "United Kingdom capital city"),
    ("paris", "French capital city"),
    ("new york", "US major metropolitan area"),
    ("washington", "US capital region"),
    ("beijing", "Chinese capital city"),
    ("tokyo", "Japanese capital city"),
    ("berlin", "German capital city"),
    ("moscow", "Russian capital city"),
];

const NUMBER_WORDS: &[(&str, u64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("dozen", 12),
    ("hundred", 100),
    ("hundreds", 100),
    ("thousand", 1_000),
    ("thousands", 1_000),
    ("million", 1_000_000),
];

const HIGH_IMPACT_WORDS: &[&str] = &[
    "breaking",
    "major",
    "massive",
    "unprecedented",
    "historic",
    "crisis",
];

const POLICY_WORDS: &[&str] = &["government", "policy", "law", "legislation", "regulation"];

const TEMPORAL_CUES: &[(&str, &str)] = &[
    ("breaking", "This is a developing story with ongoing updates expected"),
    ("continues", "This represents an ongoing situation"),
    ("begins", "This marks the start of a new development"),
    ("ends", "This concludes a significant period or event"),
    ("announces", "This is a recent official announcement"),
    ("reports", "This information has been recently disclosed"),
];

const DEFAULT_TEMPORAL_CUE: &str = "This story is part of current news coverage";

static GROUPED_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(,\d{3})+$").expect("valid regex"));

/// Generate a contextual summary for a headline.
///
/// Always returns a non-empty string; headlines with no recognizable cues
/// get a generic "developing story" paragraph.
pub fn generate_summary(headline: &str) -> String {
    let clean = headline
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if clean.is_empty() {
        return "News update. This story is part of ongoing current events coverage.".to_string();
    }

    let words: Vec<String> = clean
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != ',')
                .to_lowercase()
        })
        .collect();
    let numbers = extract_numbers(&words);

    let mut parts: Vec<String> = Vec::new();

    if let Some(context) = context_type(&words) {
        parts.push(format!("This headline reports on a {context}"));
    }

    if numbers.iter().any(|&n| n > 100) {
        parts.push("involving a significant number of people".to_string());
    } else if numbers.iter().any(|&n| n > 10) {
        parts.push("affecting multiple individuals".to_string());
    }

    for (name, description) in locations(&clean) {
        match description {
            Some(desc) => parts.push(format!("taking place in {name} ({desc})")),
            None => parts.push(format!("occurring in {name}")),
        }
    }

    if let Some(impact) = assess_impact(&clean, &numbers) {
        parts.push(impact.to_string());
    }

    if parts.is_empty() {
        return format!(
            "Breaking news: {clean}. This developing story represents a significant current \
             event that may have broader implications for the affected community and \
             stakeholders."
        );
    }

    parts.push(temporal_cue(&words).to_string());
    format!("{}.", parts.join(". "))
}

fn extract_numbers(words: &[String]) -> Vec<u64> {
    words
        .iter()
        .filter_map(|word| {
            let bare = word.trim_end_matches(',');
            if !bare.is_empty() && bare.chars().all(|c| c.is_ascii_digit()) {
                bare.parse().ok()
            } else if GROUPED_NUMBER_RE.is_match(bare) {
                bare.replace(',', "").parse().ok()
            } else {
                NUMBER_WORDS
                    .iter()
                    .find(|(w, _)| *w == bare)
                    .map(|(_, n)| *n)
            }
        })
        .collect()
}

fn context_type(words: &[String]) -> Option<&'static str> {
    let lookup = |trigger: &str| {
        CONTEXT_TYPES
            .iter()
            .find(|(t, _)| *t == trigger)
            .map(|(_, desc)| *desc)
    };

    words
        .iter()
        .find_map(|w| lookup(w))
        .or_else(|| {
            words.iter().find_map(|w| {
                CONTEXT_VARIATIONS
                    .iter()
                    .find(|(variant, _)| variant == w)
                    .and_then(|(_, trigger)| lookup(trigger))
            })
        })
}

/// Known cities anywhere in the text, plus capitalized words after "in".
fn locations(text: &str) -> Vec<(String, Option<&'static str>)> {
    let lower = text.to_lowercase();
    let mut found: Vec<(String, Option<&'static str>)> = LOCATIONS
        .iter()
        .filter(|(name, _)| contains_phrase(&lower, name))
        .map(|(name, desc)| (title_case(name), Some(*desc)))
        .collect();

    let tokens: Vec<&str> = text.split_whitespace().collect();
    for pair in tokens.windows(2) {
        let candidate = pair[1].trim_matches(|c: char| !c.is_alphanumeric());
        let is_capitalized = candidate.chars().next().is_some_and(char::is_uppercase);
        if pair[0].eq_ignore_ascii_case("in") && is_capitalized && candidate.chars().count() > 2 {
            let already = found
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(candidate));
            if !already {
                found.push((candidate.to_string(), None));
            }
        }
    }
    found
}

fn assess_impact(text: &str, numbers: &[u64]) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let max = numbers.iter().copied().max().unwrap_or(0);

    if HIGH_IMPACT_WORDS.iter().any(|w| contains_phrase(&lower, w)) {
        Some("This appears to be a high-impact news event with potential widespread implications")
    } else if max > 1_000 {
        Some("The scale of this event suggests significant community or regional impact")
    } else if max > 100 {
        Some("This event involves substantial participation or impact")
    } else if POLICY_WORDS.iter().any(|w| contains_phrase(&lower, w)) {
        Some("This development may have policy implications and affect regulatory frameworks")
    } else {
        None
    }
}

fn temporal_cue(words: &[String]) -> &'static str {
    words
        .iter()
        .find_map(|w| {
            TEMPORAL_CUES
                .iter()
                .find(|(cue, _)| cue == w)
                .map(|(_, text)| *text)
        })
        .unwrap_or(DEFAULT_TEMPORAL_CUE)
}

/// Whole-word (or whole-phrase) containment on lowercase text.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
