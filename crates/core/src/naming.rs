//! Artifact naming convention.
//!
//! Generates collision-resistant filenames for persisted images from the
//! run timestamp and a slug of the headline.

use crate::types::Timestamp;

/// Maximum slug length in characters.
pub const MAX_SLUG_LENGTH: usize = 50;

/// Slug used when a headline has no usable characters.
pub const FALLBACK_SLUG: &str = "headline";

/// Timestamp layout: date, time, milliseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Turn a headline into a filesystem-safe slug.
///
/// ASCII alphanumerics are lowercased, every other run of characters becomes
/// a single `_`, leading/trailing separators are trimmed and the result is
/// capped at [`MAX_SLUG_LENGTH`].
///
/// # Examples
///
/// ```
/// use newsframe_core::naming::headline_slug;
///
/// assert_eq!(headline_slug("Market rallies on rate cut"), "market_rallies_on_rate_cut");
/// assert_eq!(headline_slug("UK: 'No deal' (again)!"), "uk_no_deal_again");
/// ```
pub fn headline_slug(headline: &str) -> String {
    let mut slug = String::with_capacity(headline.len());
    let mut pending_separator = false;

    for c in headline.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.len() > MAX_SLUG_LENGTH {
        slug.truncate(MAX_SLUG_LENGTH);
        while slug.ends_with('_') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Build an artifact filename: `{timestamp}_{slug}.{extension}`.
pub fn artifact_filename(at: Timestamp, headline: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        at.format(TIMESTAMP_FORMAT),
        headline_slug(headline),
        extension.trim_start_matches('.')
    )
}

/// Sidecar metadata filename for an artifact filename.
pub fn sidecar_filename(artifact_filename: &str) -> String {
    match artifact_filename.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.json"),
        None => format!("{artifact_filename}.json"),
    }
}
