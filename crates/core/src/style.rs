//! Style profiles: named prompt templates plus generation parameters.
//!
//! Profiles are loaded once at startup (built-in defaults or a JSON file)
//! and validated against the placeholder schema before any run starts.
//! A profile that would produce a malformed prompt is rejected here with
//! [`CoreError::InvalidInput`] rather than at generation time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Placeholder schema
// ---------------------------------------------------------------------------

/// Placeholder replaced by the cleaned headline text. Required.
pub const PLACEHOLDER_HEADLINE: &str = "headline";
/// Placeholder replaced by comma-joined headline keywords.
pub const PLACEHOLDER_KEYWORDS: &str = "keywords";
/// Placeholder replaced by the style name.
pub const PLACEHOLDER_STYLE: &str = "style";

/// Every placeholder a template may use.
pub const KNOWN_PLACEHOLDERS: &[&str] =
    &[PLACEHOLDER_HEADLINE, PLACEHOLDER_KEYWORDS, PLACEHOLDER_STYLE];

/// Regex pattern matching `{placeholder}` tokens in prompt templates.
pub const PLACEHOLDER_PATTERN: &str = r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}";

pub(crate) static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Maximum template length in characters.
pub const MAX_TEMPLATE_LENGTH: usize = 2_000;

/// Latent images must have edges divisible by this.
pub const LATENT_GRID: u32 = 8;

/// Extract all `{placeholder}` names from a template, sorted and de-duplicated.
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER_RE
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Validate a prompt template against the placeholder schema.
pub fn validate_template(template: &str) -> Result<(), CoreError> {
    if template.trim().is_empty() {
        return Err(CoreError::InvalidInput(
            "Prompt template must not be empty".to_string(),
        ));
    }
    if template.chars().count() > MAX_TEMPLATE_LENGTH {
        return Err(CoreError::InvalidInput(format!(
            "Prompt template exceeds maximum length of {MAX_TEMPLATE_LENGTH} characters"
        )));
    }

    let placeholders = extract_placeholders(template);
    if !placeholders.iter().any(|p| p == PLACEHOLDER_HEADLINE) {
        return Err(CoreError::InvalidInput(format!(
            "Prompt template must contain {{{PLACEHOLDER_HEADLINE}}}"
        )));
    }
    let unknown: Vec<&str> = placeholders
        .iter()
        .map(String::as_str)
        .filter(|p| !KNOWN_PLACEHOLDERS.contains(p))
        .collect();
    if !unknown.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "Unknown placeholder(s) {}. Must be one of: {}",
            unknown.join(", "),
            KNOWN_PLACEHOLDERS.join(", ")
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Style name
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleName {
    Illustration,
    Funny,
    Artistic,
    Realistic,
}

impl StyleName {
    pub const ALL: [StyleName; 4] = [
        Self::Illustration,
        Self::Funny,
        Self::Artistic,
        Self::Realistic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Illustration => "illustration",
            Self::Funny => "funny",
            Self::Artistic => "artistic",
            Self::Realistic => "realistic",
        }
    }
}

impl fmt::Display for StyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "Invalid style '{s}'. Must be one of: illustration, funny, artistic, realistic"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// KSampler algorithms supported by the built-in workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sampler {
    #[serde(rename = "euler")]
    Euler,
    #[serde(rename = "euler_ancestral")]
    EulerAncestral,
    #[serde(rename = "dpmpp_2m")]
    Dpmpp2m,
    #[serde(rename = "dpmpp_2m_sde")]
    Dpmpp2mSde,
    #[serde(rename = "ddim")]
    Ddim,
}

impl Sampler {
    /// Name expected by the ComfyUI `sampler_name` input.
    pub fn comfy_name(self) -> &'static str {
        match self {
            Self::Euler => "euler",
            Self::EulerAncestral => "euler_ancestral",
            Self::Dpmpp2m => "dpmpp_2m",
            Self::Dpmpp2mSde => "dpmpp_2m_sde",
            Self::Ddim => "ddim",
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution and limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Bounds a profile's steps and resolution are clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationLimits {
    pub min_steps: u32,
    pub max_steps: u32,
    pub min_edge: u32,
    pub max_edge: u32,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            min_steps: 1,
            max_steps: 150,
            min_edge: 256,
            max_edge: 2048,
        }
    }
}

impl GenerationLimits {
    pub fn clamp_steps(&self, steps: u32) -> u32 {
        steps.clamp(self.min_steps, self.max_steps)
    }

    /// Clamp an edge into bounds, then round down to the latent grid.
    pub fn clamp_edge(&self, edge: u32) -> u32 {
        let clamped = edge.clamp(self.min_edge, self.max_edge);
        let snapped = clamped - clamped % LATENT_GRID;
        snapped.max(LATENT_GRID)
    }

    pub fn clamp_resolution(&self, resolution: Resolution) -> Resolution {
        Resolution::new(
            self.clamp_edge(resolution.width),
            self.clamp_edge(resolution.height),
        )
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.min_steps == 0 || self.min_steps > self.max_steps {
            return Err(CoreError::InvalidInput(format!(
                "Invalid step bounds {}..={}",
                self.min_steps, self.max_steps
            )));
        }
        if self.min_edge < LATENT_GRID || self.min_edge > self.max_edge {
            return Err(CoreError::InvalidInput(format!(
                "Invalid edge bounds {}..={}",
                self.min_edge, self.max_edge
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Style profile
// ---------------------------------------------------------------------------

fn default_cfg_scale() -> f32 {
    7.0
}

fn default_scheduler() -> String {
    "karras".to_string()
}

/// A named template controlling prompt phrasing and generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleProfile {
    pub name: StyleName,
    pub prompt_template: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub steps: u32,
    pub resolution: Resolution,
    pub sampler: Sampler,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_scheduler")]
    pub scheduler: String,
    /// Fixed seed; `None` means a fresh random seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub limits: GenerationLimits,
}

impl StyleProfile {
    /// Check the template schema and numeric bounds.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_template(&self.prompt_template).map_err(|e| match e {
            CoreError::InvalidInput(msg) => {
                CoreError::InvalidInput(format!("Style '{}': {msg}", self.name))
            }
            other => other,
        })?;
        self.limits.validate()?;
        if self.steps == 0 {
            return Err(CoreError::InvalidInput(format!(
                "Style '{}': steps must be positive",
                self.name
            )));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(CoreError::InvalidInput(format!(
                "Style '{}': resolution must be non-zero",
                self.name
            )));
        }
        if !self.cfg_scale.is_finite() || self.cfg_scale <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "Style '{}': cfg_scale must be a positive number",
                self.name
            )));
        }
        if self.scheduler.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Style '{}': scheduler must not be empty",
                self.name
            )));
        }
        Ok(())
    }
}

const DEFAULT_NEGATIVE_PROMPT: &str =
    "ugly, deformed, blurry, bad anatomy, low quality, text, watermark";

fn builtin(name: StyleName, template: &str) -> StyleProfile {
    StyleProfile {
        name,
        prompt_template: template.to_string(),
        negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        steps: 25,
        resolution: Resolution::new(1024, 576),
        sampler: Sampler::Dpmpp2m,
        cfg_scale: default_cfg_scale(),
        scheduler: default_scheduler(),
        seed: None,
        limits: GenerationLimits::default(),
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The validated set of style profiles, keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleCatalog {
    profiles: BTreeMap<StyleName, StyleProfile>,
}

impl StyleCatalog {
    /// Build a catalog from profiles, validating each one.
    ///
    /// Duplicate names are rejected; so is an empty list.
    pub fn new(profiles: Vec<StyleProfile>) -> Result<Self, CoreError> {
        if profiles.is_empty() {
            return Err(CoreError::InvalidInput(
                "At least one style profile is required".to_string(),
            ));
        }
        let mut map = BTreeMap::new();
        for profile in profiles {
            profile.validate()?;
            let name = profile.name;
            if map.insert(name, profile).is_some() {
                return Err(CoreError::InvalidInput(format!(
                    "Duplicate style profile '{name}'"
                )));
            }
        }
        Ok(Self { profiles: map })
    }

    /// Parse and validate a JSON array of profiles.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let profiles: Vec<StyleProfile> = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidInput(format!("Invalid style profiles: {e}")))?;
        Self::new(profiles)
    }

    /// The four built-in profiles.
    pub fn builtin() -> Self {
        let profiles = vec![
            builtin(
                StyleName::Illustration,
                "editorial illustration of {headline}, {keywords}, news illustration, \
                 professional, high quality, detailed, digital art",
            ),
            builtin(
                StyleName::Funny,
                "{headline}, {keywords}, funny, cartoon style, humorous, meme-worthy, \
                 comedy, vibrant colors",
            ),
            builtin(
                StyleName::Artistic,
                "{headline}, {keywords}, artistic interpretation, abstract, creative, \
                 modern art, stylized",
            ),
            builtin(
                StyleName::Realistic,
                "{headline}, {keywords}, photorealistic, documentary style, journalistic, \
                 high resolution",
            ),
        ];
        let profiles = profiles.into_iter().map(|p| (p.name, p)).collect();
        Self { profiles }
    }

    pub fn get(&self, name: StyleName) -> Option<&StyleProfile> {
        self.profiles.get(&name)
    }

    /// Look up a profile, falling back to the first available one.
    pub fn get_or_first(&self, name: StyleName) -> Option<&StyleProfile> {
        self.profiles
            .get(&name)
            .or_else(|| self.profiles.values().next())
    }

    pub fn names(&self) -> impl Iterator<Item = StyleName> + '_ {
        self.profiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- Placeholders --

    #[test]
    fn extract_sorted_and_deduplicated() {
        assert_eq!(
            extract_placeholders("{style} {headline} and {headline}"),
            vec!["headline", "style"]
        );
    }

    #[test]
    fn template_without_headline_rejected() {
        assert_matches!(
            validate_template("a painting, {keywords}"),
            Err(CoreError::InvalidInput(msg)) if msg.contains("{headline}")
        );
    }

    #[test]
    fn template_with_unknown_placeholder_rejected() {
        assert_matches!(
            validate_template("{headline} in {city}"),
            Err(CoreError::InvalidInput(msg)) if msg.contains("city")
        );
    }

    #[test]
    fn empty_template_rejected() {
        assert!(validate_template("   ").is_err());
    }

    #[test]
    fn valid_template_accepted() {
        assert!(validate_template("{headline}, {keywords}, {style}").is_ok());
    }

    // -- Limits --

    #[test]
    fn clamp_steps_into_bounds() {
        let limits = GenerationLimits {
            min_steps: 10,
            max_steps: 40,
            ..Default::default()
        };
        assert_eq!(limits.clamp_steps(5), 10);
        assert_eq!(limits.clamp_steps(25), 25);
        assert_eq!(limits.clamp_steps(90), 40);
    }

    #[test]
    fn clamp_edge_snaps_to_grid() {
        let limits = GenerationLimits::default();
        assert_eq!(limits.clamp_edge(1000), 1000);
        assert_eq!(limits.clamp_edge(1001), 1000);
        assert_eq!(limits.clamp_edge(100), 256);
        assert_eq!(limits.clamp_edge(5000), 2048);
    }

    // -- Profiles --

    #[test]
    fn builtin_profiles_are_valid() {
        let catalog = StyleCatalog::builtin();
        assert_eq!(catalog.len(), 4);
        for name in StyleName::ALL {
            catalog.get(name).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn profile_with_inverted_limits_rejected() {
        let mut profile = StyleCatalog::builtin()
            .get(StyleName::Funny)
            .unwrap()
            .clone();
        profile.limits.min_steps = 50;
        profile.limits.max_steps = 10;
        assert_matches!(profile.validate(), Err(CoreError::InvalidInput(_)));
    }

    #[test]
    fn catalog_rejects_duplicates() {
        let p = StyleCatalog::builtin()
            .get(StyleName::Artistic)
            .unwrap()
            .clone();
        assert_matches!(
            StyleCatalog::new(vec![p.clone(), p]),
            Err(CoreError::InvalidInput(msg)) if msg.contains("Duplicate")
        );
    }

    #[test]
    fn catalog_rejects_empty() {
        assert!(StyleCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn catalog_from_json_applies_defaults() {
        let json = r#"[{
            "name": "realistic",
            "prompt_template": "{headline}, press photo",
            "steps": 30,
            "resolution": {"width": 768, "height": 512},
            "sampler": "euler_ancestral"
        }]"#;
        let catalog = StyleCatalog::from_json(json).unwrap();
        let profile = catalog.get(StyleName::Realistic).unwrap();
        assert_eq!(profile.sampler, Sampler::EulerAncestral);
        assert_eq!(profile.scheduler, "karras");
        assert_eq!(profile.cfg_scale, 7.0);
        assert_eq!(profile.seed, None);
        assert!(profile.negative_prompt.is_empty());
    }

    #[test]
    fn catalog_from_json_rejects_bad_template() {
        let json = r#"[{
            "name": "funny",
            "prompt_template": "cartoon of {topic}",
            "steps": 20,
            "resolution": {"width": 512, "height": 512},
            "sampler": "euler"
        }]"#;
        assert_matches!(
            StyleCatalog::from_json(json),
            Err(CoreError::InvalidInput(msg)) if msg.contains("funny")
        );
    }

    #[test]
    fn get_or_first_falls_back() {
        let only_funny = StyleCatalog::new(vec![StyleCatalog::builtin()
            .get(StyleName::Funny)
            .unwrap()
            .clone()])
        .unwrap();
        assert_eq!(
            only_funny.get_or_first(StyleName::Realistic).unwrap().name,
            StyleName::Funny
        );
    }

    #[test]
    fn style_name_parses_case_insensitively() {
        assert_eq!("Artistic".parse::<StyleName>().unwrap(), StyleName::Artistic);
        assert!("news".parse::<StyleName>().is_err());
    }
}
