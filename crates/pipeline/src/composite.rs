//! Headline and summary text rendered onto a band below the image.
//!
//! The generated image is centered at the top of a white canvas at least
//! [`MIN_CANVAS_WIDTH`] wide. Below it the wrapped headline is drawn in a
//! large font, then a separator rule, then the wrapped summary. The result
//! is always PNG.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};

use crate::error::PipelineError;

/// Narrowest canvas; smaller images are centered on it.
pub const MIN_CANVAS_WIDTH: u32 = 1024;

/// Height of the text band below the image.
pub const TEXT_BAND_HEIGHT: u32 = 300;

/// Space above the image and between image and band.
const PADDING: u32 = 20;

const MARGIN: u32 = 40;

const TITLE_PX: f32 = 28.0;
const TITLE_WRAP: usize = 60;
const TITLE_LINE_HEIGHT: u32 = 35;

const SUMMARY_PX: f32 = 18.0;
const SUMMARY_WRAP: usize = 80;
const SUMMARY_LINE_HEIGHT: u32 = 25;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TITLE_COLOR: Rgb<u8> = Rgb([0x1a, 0x1a, 0x1a]);
const SUMMARY_COLOR: Rgb<u8> = Rgb([0x40, 0x40, 0x40]);
const RULE_COLOR: Rgb<u8> = Rgb([0xcc, 0xcc, 0xcc]);

/// Fonts tried, in order, when no font file is configured.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Renders composites with one font.
#[derive(Clone)]
pub struct Compositor {
    font: FontArc,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor").finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// Parse a TrueType/OpenType font from raw bytes.
    pub fn from_font_bytes(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        FontArc::try_from_vec(bytes)
            .map(Self::new)
            .map_err(|e| PipelineError::Composite(format!("Invalid font: {e}")))
    }

    /// Load a font file.
    pub fn from_font_file(path: &Path) -> Result<Self, PipelineError> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_font_bytes(bytes)
    }

    /// First usable font among [`SYSTEM_FONT_CANDIDATES`].
    pub fn from_system_fonts() -> Option<Self> {
        SYSTEM_FONT_CANDIDATES.iter().find_map(|candidate| {
            let path = Path::new(candidate);
            if !path.is_file() {
                return None;
            }
            match Self::from_font_file(path) {
                Ok(compositor) => {
                    tracing::debug!(font = %path.display(), "Using system font");
                    Some(compositor)
                }
                Err(e) => {
                    tracing::debug!(font = %path.display(), error = %e, "Skipping font");
                    None
                }
            }
        })
    }

    /// Decode `image_bytes`, add the text band and encode as PNG.
    pub fn compose(
        &self,
        image_bytes: &[u8],
        headline: &str,
        summary: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        let main = image::load_from_memory(image_bytes)
            .map_err(|e| PipelineError::Composite(format!("Cannot decode image: {e}")))?
            .to_rgb8();

        let (width, height) = canvas_size(main.width(), main.height());
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        let x_offset = (width - main.width()) / 2;
        image::imageops::overlay(&mut canvas, &main, i64::from(x_offset), i64::from(PADDING));

        self.draw_text(&mut canvas, headline, summary, main.height() + 2 * PADDING);

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| PipelineError::Composite(format!("Cannot encode PNG: {e}")))?;
        Ok(png)
    }

    fn draw_text(&self, canvas: &mut RgbImage, headline: &str, summary: &str, band_top: u32) {
        let width = canvas.width();
        let height = canvas.height();
        let mut y = band_top + PADDING;

        for line in wrap_text(headline, TITLE_WRAP) {
            let x = self.centered_x(&line, TITLE_PX, width);
            let scale = PxScale::from(TITLE_PX);
            draw_text_mut(canvas, TITLE_COLOR, x, y as i32, scale, &self.font, &line);
            y += TITLE_LINE_HEIGHT;
        }

        y += 10;
        let (left, right) = (MARGIN as f32, width.saturating_sub(MARGIN) as f32);
        for dy in 0..2 {
            let rule_y = (y + dy) as f32;
            draw_line_segment_mut(canvas, (left, rule_y), (right, rule_y), RULE_COLOR);
        }
        y += 20;

        for line in wrap_text(summary, SUMMARY_WRAP) {
            if y > height.saturating_sub(30) {
                break;
            }
            let x = self.centered_x(&line, SUMMARY_PX, width);
            let scale = PxScale::from(SUMMARY_PX);
            draw_text_mut(canvas, SUMMARY_COLOR, x, y as i32, scale, &self.font, &line);
            y += SUMMARY_LINE_HEIGHT;
        }
    }

    fn centered_x(&self, line: &str, px: f32, width: u32) -> i32 {
        let (text_width, _) = text_size(PxScale::from(px), &self.font, line);
        (width.saturating_sub(text_width) / 2) as i32
    }
}

/// Canvas dimensions for an image of `width` x `height`.
pub fn canvas_size(width: u32, height: u32) -> (u32, u32) {
    (
        width.max(MIN_CANVAS_WIDTH),
        height + TEXT_BAND_HEIGHT + 2 * PADDING,
    )
}

/// Greedy word wrap at `width` characters. Words longer than a line are
/// split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
