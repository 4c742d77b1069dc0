//! Prompt Builder: (headline, style) -> [`GenerationRequest`].
//!
//! Pure and deterministic. The only failure is an empty headline.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::headline::{clean_for_prompt, Headline};
use crate::style::{
    Resolution, Sampler, StyleProfile, PLACEHOLDER_HEADLINE, PLACEHOLDER_KEYWORDS,
    PLACEHOLDER_RE, PLACEHOLDER_STYLE,
};

/// Everything the image server needs for one text-to-image job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt_text: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub resolution: Resolution,
    pub sampler: Sampler,
    pub seed: Option<u64>,
    pub cfg_scale: f32,
    pub scheduler: String,
}

impl GenerationRequest {
    /// Reject requests that must never reach the server.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.prompt_text.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "Prompt text must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy of this request with a concrete seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Build a generation request from a headline and a style profile.
pub fn build(headline: &Headline, style: &StyleProfile) -> Result<GenerationRequest, CoreError> {
    if headline.text().trim().is_empty() {
        return Err(CoreError::InvalidInput(
            "Headline text must not be empty".to_string(),
        ));
    }

    let headline_text = clean_for_prompt(headline.text());
    let keywords = headline
        .keywords()
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let template = if keywords.is_empty() {
        drop_keyword_segments(&style.prompt_template)
    } else {
        style.prompt_template.clone()
    };

    let rendered = PLACEHOLDER_RE.replace_all(&template, |caps: &regex::Captures| {
        match &caps[1] {
            PLACEHOLDER_HEADLINE => headline_text.clone(),
            PLACEHOLDER_KEYWORDS => keywords.clone(),
            PLACEHOLDER_STYLE => style.name.to_string(),
            // Validated profiles never contain other placeholders.
            _ => caps[0].to_string(),
        }
    });

    Ok(GenerationRequest {
        prompt_text: rendered.trim().to_string(),
        negative_prompt: style.negative_prompt.trim().to_string(),
        steps: style.limits.clamp_steps(style.steps),
        resolution: style.limits.clamp_resolution(style.resolution),
        sampler: style.sampler,
        seed: style.seed,
        cfg_scale: style.cfg_scale,
        scheduler: style.scheduler.clone(),
    })
}

/// Remove template segments that hold nothing but `{keywords}`.
///
/// Works on the template before substitution, so headline text is never
/// touched. An empty `{keywords}` otherwise leaves `", ,"` in the prompt.
fn drop_keyword_segments(template: &str) -> String {
    let placeholder = format!("{{{PLACEHOLDER_KEYWORDS}}}");
    template
        .split(',')
        .filter(|segment| {
            let only_keywords =
                segment.contains(&placeholder) && segment.replace(&placeholder, "").trim().is_empty();
            !only_keywords
        })
        .collect::<Vec<_>>()
        .join(",")
}
