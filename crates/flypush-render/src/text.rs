//! # Text Rasterization
//!
//! Font discovery and glyph layout for label text.
//!
//! Fonts are not bundled; they are discovered from the usual DejaVu/Vera
//! install locations at startup. Label printers live on managed lab
//! machines where DejaVu is effectively universal, and discovery keeps
//! the binary small and the licensing simple.

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use image::RgbImage;

use crate::error::{RenderError, RenderResult};
use flypush_core::formats;

// =============================================================================
// Font Discovery
// =============================================================================

/// Candidate (regular, bold) font file pairs, in preference order.
const FONT_CANDIDATES: &[(&str, &str)] = &[
    (
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/local/share/fonts/DejaVuSans.ttf",
        "/usr/local/share/fonts/DejaVuSans-Bold.ttf",
    ),
    (
        "/Library/Fonts/DejaVuSans.ttf",
        "/Library/Fonts/DejaVuSans-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/ttf-bitstream-vera/Vera.ttf",
        "/usr/share/fonts/truetype/ttf-bitstream-vera/VeraBd.ttf",
    ),
];

/// The font pair labels are set in.
pub struct LabelFont {
    regular: FontVec,
    bold: FontVec,
}

impl LabelFont {
    /// Finds the first usable font pair on this system.
    ///
    /// A missing bold face falls back to the regular face; a system with
    /// no candidate at all yields [`RenderError::FontUnavailable`].
    pub fn discover() -> RenderResult<Self> {
        for (regular_path, bold_path) in FONT_CANDIDATES {
            let Ok(regular_bytes) = std::fs::read(regular_path) else {
                continue;
            };
            let Ok(regular) = FontVec::try_from_vec(regular_bytes) else {
                continue;
            };

            let bold = std::fs::read(bold_path)
                .ok()
                .and_then(|bytes| FontVec::try_from_vec(bytes).ok());
            let bold = match bold {
                Some(font) => font,
                // Re-read the regular face as the bold stand-in
                None => match std::fs::read(regular_path)
                    .ok()
                    .and_then(|bytes| FontVec::try_from_vec(bytes).ok())
                {
                    Some(font) => font,
                    None => continue,
                },
            };

            tracing::debug!(path = regular_path, "Label font loaded");
            return Ok(LabelFont { regular, bold });
        }

        Err(RenderError::FontUnavailable)
    }

    /// Builds a font pair from raw TTF bytes.
    pub fn from_bytes(regular: Vec<u8>, bold: Vec<u8>) -> RenderResult<Self> {
        let regular = FontVec::try_from_vec(regular).map_err(|_| RenderError::FontUnavailable)?;
        let bold = FontVec::try_from_vec(bold).map_err(|_| RenderError::FontUnavailable)?;
        Ok(LabelFont { regular, bold })
    }

    fn face(&self, bold: bool) -> &FontVec {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    // =========================================================================
    // Measurement
    // =========================================================================

    /// Pixel scale for a physical text size in millimetres.
    pub fn scale_for_mm(size_mm: f64) -> PxScale {
        PxScale::from(formats::mm_to_px(size_mm) as f32)
    }

    /// Advance width of a line at the given scale.
    pub fn line_width(&self, text: &str, scale: PxScale, bold: bool) -> f32 {
        let scaled = self.face(bold).as_scaled(scale);
        let mut width = 0.0;
        let mut last = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            last = Some(id);
        }
        width
    }

    /// Full line height (ascent to descent plus gap) at the given scale.
    pub fn line_height(&self, scale: PxScale) -> f32 {
        let scaled = self.regular.as_scaled(scale);
        scaled.ascent() - scaled.descent() + scaled.line_gap()
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Draws one line of black text with its top-left corner at (x, y).
    ///
    /// Coverage is alpha-blended into the existing pixels; glyphs falling
    /// outside the image are clipped, never panic.
    pub fn draw_line(&self, img: &mut RgbImage, x: i32, y: i32, text: &str, scale: PxScale, bold: bool) {
        let scaled = self.face(bold).as_scaled(scale);
        let baseline = y as f32 + scaled.ascent();
        let mut caret = x as f32;
        let mut last = None;

        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let id = scaled.glyph_id(ch);
            if let Some(prev) = last {
                caret += scaled.kern(prev, id);
            }
            let glyph: Glyph = id.with_scale_and_position(scale, point(caret, baseline));
            if let Some(outlined) = scaled.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height()
                    {
                        let pixel = img.get_pixel_mut(px as u32, py as u32);
                        for channel in pixel.0.iter_mut() {
                            let shaded = f32::from(*channel) * (1.0 - coverage);
                            *channel = (*channel).min(shaded.round() as u8);
                        }
                    }
                });
            }
            caret += scaled.h_advance(id);
            last = Some(id);
        }
    }

    // =========================================================================
    // Wrapping
    // =========================================================================

    /// Greedy word wrap to a pixel width, capped at `max_lines`.
    ///
    /// A single word wider than the limit is kept on its own line and
    /// clipped by the image bounds when drawn; genotype strings contain
    /// no sensible break points inside a word.
    pub fn wrap(
        &self,
        text: &str,
        scale: PxScale,
        max_width: f32,
        max_lines: usize,
    ) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if self.line_width(&candidate, scale, false) <= max_width || current.is_empty() {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                if lines.len() == max_lines {
                    return lines;
                }
                current = word.to_string();
            }
        }

        if !current.is_empty() && lines.len() < max_lines {
            lines.push(current);
        }
        lines
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Font-dependent tests skip on systems with no DejaVu/Vera install.
    fn font() -> Option<LabelFont> {
        LabelFont::discover().ok()
    }

    #[test]
    fn test_scale_for_mm() {
        // 3 mm at 300 DPI is 35 px
        let scale = LabelFont::scale_for_mm(3.0);
        assert_eq!(scale.y.round() as u32, 35);
    }

    #[test]
    fn test_line_width_grows_with_text() {
        let Some(font) = font() else { return };
        let scale = LabelFont::scale_for_mm(3.0);
        let short = font.line_width("FLY", scale, false);
        let long = font.line_width("FLY-12345", scale, false);
        assert!(long > short);
        assert!(short > 0.0);
    }

    #[test]
    fn test_wrap_respects_width_and_line_cap() {
        let Some(font) = font() else { return };
        let scale = LabelFont::scale_for_mm(2.25);
        let text = "w1118; TM3 Sb / TM6B Tb ; some long genotype description here";

        let max_width = 200.0;
        let lines = font.wrap(text, scale, max_width, 3);
        assert!(!lines.is_empty());
        assert!(lines.len() <= 3);
        for line in &lines {
            // Single-word overflow is the only allowed exception
            if line.contains(' ') {
                assert!(font.line_width(line, scale, false) <= max_width);
            }
        }
    }

    #[test]
    fn test_draw_line_marks_pixels() {
        let Some(font) = font() else { return };
        let mut img = RgbImage::from_pixel(200, 60, image::Rgb([255, 255, 255]));
        font.draw_line(&mut img, 5, 5, "FLY-1", LabelFont::scale_for_mm(3.0), false);

        let dark = img.pixels().filter(|p| p.0[0] < 128).count();
        assert!(dark > 0, "text drew no dark pixels");
    }

    #[test]
    fn test_draw_line_clips_out_of_bounds() {
        let Some(font) = font() else { return };
        let mut img = RgbImage::from_pixel(20, 10, image::Rgb([255, 255, 255]));
        // Way outside the image; must not panic
        font.draw_line(&mut img, -100, -100, "clip", LabelFont::scale_for_mm(3.0), true);
        font.draw_line(&mut img, 500, 500, "clip", LabelFont::scale_for_mm(3.0), false);
    }
}
