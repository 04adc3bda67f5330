//! # Label Composition
//!
//! One RGB raster per payload, composed at [`WORKING_DPI`].
//!
//! ## Layouts
//! ```text
//! QR layout (code on the leading edge):
//! ┌──────────────────────────────────────────────┐
//! │ ░░░░░░░  FLY-1234                 (large)    │
//! │ ░░ QR ░  Cross #812               (small)    │
//! │ ░░░░░░░  2024-05-01               (large)    │
//! │ ░░░░░░░  Rack 4 / Tray 12         (small)    │
//! │          w1118; TM3 Sb / TM6B Tb  (medium,   │
//! │          wrapped up to 3 lines)              │
//! └──────────────────────────────────────────────┘
//!
//! Barcode layout (code across the bottom):
//! ┌──────────────────────────────────────────────┐
//! │ FLY-1234 (large)            2024-05-01       │
//! │ Cross #812 (small)     Rack 4 / Tray 12      │
//! │ w1118; TM3 Sb / TM6B Tb (medium, wrapped)    │
//! │      ▐│▐▐│││▐│▐▐││▐│▐│▐▐│││▐▐│▐│▐            │
//! │               FLY-1234 (small)               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The leading/trailing margins from the format shrink the drawable area;
//! the raster itself always spans the full label so the PDF embed needs
//! no offset bookkeeping.

use chrono::Utc;
use image::{GrayImage, Rgb, RgbImage};

use crate::code;
use crate::error::{RenderError, RenderResult};
use crate::text::LabelFont;
use flypush_core::formats::{mm_to_px, LabelFormat};
use flypush_core::{CodeType, LabelPayload};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

// Physical text sizes, in millimetres
const FONT_LARGE_MM: f64 = 3.0;
const FONT_MEDIUM_MM: f64 = 2.25;
const FONT_SMALL_MM: f64 = 1.9;

const PAD_MM: f64 = 1.0;
const QR_SIDE_MM: f64 = 20.0;
const BARCODE_WIDTH_MM: f64 = 50.0;
const BARCODE_HEIGHT_MM: f64 = 8.0;
const GENOTYPE_MAX_LINES: usize = 3;

// =============================================================================
// Composition
// =============================================================================

/// Composes one label payload to a full-size raster.
pub fn compose_label(
    payload: &LabelPayload,
    format: &LabelFormat,
    code_type: CodeType,
    font: &LabelFont,
) -> RenderResult<RgbImage> {
    if payload.stock_id.trim().is_empty() {
        return Err(RenderError::MissingField {
            field: "stock_id".to_string(),
        });
    }

    let mut img = RgbImage::from_pixel(format.px_width(), format.px_height(), WHITE);

    let date = payload
        .print_date
        .clone()
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    match code_type {
        CodeType::Qr => compose_qr_layout(&mut img, payload, format, &date, font)?,
        CodeType::Barcode => compose_barcode_layout(&mut img, payload, format, &date, font)?,
    }

    Ok(img)
}

fn compose_qr_layout(
    img: &mut RgbImage,
    payload: &LabelPayload,
    format: &LabelFormat,
    date: &str,
    font: &LabelFont,
) -> RenderResult<()> {
    let pad = mm_to_px(PAD_MM) as i32;
    let x0 = format.px_leading_margin() as i32;
    let x1 = (format.px_width() - format.px_trailing_margin()) as i32;
    let height = format.px_height() as i32;

    // QR on the leading edge, vertically centered
    let qr_target = (height - 2 * pad).min(mm_to_px(QR_SIDE_MM) as i32).max(1) as u32;
    let qr = code::qr_image(&format!("flypush://{}", payload.stock_id), qr_target)?;
    let qr_y = (height - qr.height() as i32) / 2;
    blit_gray(img, &qr, x0 + pad, qr_y.max(0));

    // Text rows to the right of the code
    let text_x = x0 + pad + qr.width() as i32 + pad;
    let max_width = (x1 - text_x - pad).max(0) as f32;

    let large = LabelFont::scale_for_mm(FONT_LARGE_MM);
    let medium = LabelFont::scale_for_mm(FONT_MEDIUM_MM);
    let small = LabelFont::scale_for_mm(FONT_SMALL_MM);

    let mut y = pad;
    font.draw_line(img, text_x, y, &payload.stock_id, large, true);
    y += font.line_height(large).ceil() as i32;

    if let Some(source) = payload.source_info.as_deref() {
        font.draw_line(img, text_x, y, source, small, false);
        y += font.line_height(small).ceil() as i32;
    }

    font.draw_line(img, text_x, y, date, large, false);
    y += font.line_height(large).ceil() as i32;

    if let Some(location) = payload.location_info.as_deref() {
        font.draw_line(img, text_x, y, location, small, false);
        y += font.line_height(small).ceil() as i32;
    }

    if !payload.genotype.is_empty() {
        for line in font.wrap(&payload.genotype, medium, max_width, GENOTYPE_MAX_LINES) {
            font.draw_line(img, text_x, y, &line, medium, false);
            y += font.line_height(medium).ceil() as i32;
        }
    }

    Ok(())
}

fn compose_barcode_layout(
    img: &mut RgbImage,
    payload: &LabelPayload,
    format: &LabelFormat,
    date: &str,
    font: &LabelFont,
) -> RenderResult<()> {
    let pad = mm_to_px(PAD_MM) as i32;
    let x0 = format.px_leading_margin() as i32;
    let x1 = (format.px_width() - format.px_trailing_margin()) as i32;
    let height = format.px_height() as i32;
    let drawable = (x1 - x0 - 2 * pad).max(1);

    let large = LabelFont::scale_for_mm(FONT_LARGE_MM);
    let medium = LabelFont::scale_for_mm(FONT_MEDIUM_MM);
    let small = LabelFont::scale_for_mm(FONT_SMALL_MM);

    // Bars across the bottom, centered, with the encoded value as
    // human-readable text beneath them
    let value_h = font.line_height(small).ceil() as i32;
    let value_y = height - pad - value_h;
    let bar_h = mm_to_px(BARCODE_HEIGHT_MM).min((height / 3) as u32);
    let bar_target = (drawable as u32).min(mm_to_px(BARCODE_WIDTH_MM));
    let bars = code::code128_image(&payload.stock_id, bar_target, bar_h)?;
    let bar_x = x0 + pad + (drawable - bars.width() as i32) / 2;
    let bar_y = value_y - 2 - bars.height() as i32;
    blit_gray(img, &bars, bar_x.max(0), bar_y.max(0));

    let value_w = font.line_width(&payload.stock_id, small, false);
    font.draw_line(
        img,
        x0 + pad + (drawable - value_w.ceil() as i32) / 2,
        value_y,
        &payload.stock_id,
        small,
        false,
    );

    // Text block above the bars: identity left, date/location right
    let mut y = pad;
    font.draw_line(img, x0 + pad, y, &payload.stock_id, large, true);
    let date_w = font.line_width(date, large, false);
    font.draw_line(img, x1 - pad - date_w.ceil() as i32, y, date, large, false);
    y += font.line_height(large).ceil() as i32;

    if payload.source_info.is_some() || payload.location_info.is_some() {
        if let Some(source) = payload.source_info.as_deref() {
            font.draw_line(img, x0 + pad, y, source, small, false);
        }
        if let Some(location) = payload.location_info.as_deref() {
            let loc_w = font.line_width(location, small, false);
            font.draw_line(img, x1 - pad - loc_w.ceil() as i32, y, location, small, false);
        }
        y += font.line_height(small).ceil() as i32;
    }

    if !payload.genotype.is_empty() {
        // Whatever vertical room remains above the bars limits the wrap
        let room = bar_y - pad - y;
        let lines_fit =
            (room as f32 / font.line_height(medium)).floor() as usize;
        let max_lines = lines_fit.min(GENOTYPE_MAX_LINES);
        if max_lines > 0 {
            for line in font.wrap(&payload.genotype, medium, drawable as f32, max_lines) {
                font.draw_line(img, x0 + pad, y, &line, medium, false);
                y += font.line_height(medium).ceil() as i32;
            }
        }
    }

    Ok(())
}

// =============================================================================
// Test Label
// =============================================================================

/// Composes the printer-alignment test page: full border, corner marks,
/// center crosshair, and the format's dimensions as text.
///
/// The border sits exactly on the drawable-area edge, so a clipped edge
/// on paper directly shows a margin or media mismatch.
pub fn compose_test_label(format: &LabelFormat, font: &LabelFont) -> RenderResult<RgbImage> {
    let w = format.px_width();
    let h = format.px_height();
    let mut img = RgbImage::from_pixel(w, h, WHITE);

    let x0 = format.px_leading_margin() as i32;
    let x1 = (w - format.px_trailing_margin()) as i32 - 1;
    let y0 = 0;
    let y1 = h as i32 - 1;

    rect_border(&mut img, x0, y0, x1, y1, 2);

    // Corner marks, 1/10 of the short edge long
    let mark = (h as i32 / 10).max(8);
    for &(cx, cy, dx, dy) in &[
        (x0, y0, 1, 1),
        (x1, y0, -1, 1),
        (x0, y1, 1, -1),
        (x1, y1, -1, -1),
    ] {
        hline(&mut img, cx, cx + dx * mark, cy + dy * 4, 2);
        vline(&mut img, cy, cy + dy * mark, cx + dx * 4, 2);
    }

    // Center crosshair
    let cx = (x0 + x1) / 2;
    let cy = (y0 + y1) / 2;
    hline(&mut img, cx - mark, cx + mark, cy, 1);
    vline(&mut img, cy - mark, cy + mark, cx, 1);

    // Dimension text just above center
    let small = LabelFont::scale_for_mm(FONT_SMALL_MM);
    let caption = format!(
        "{} - {:.1} x {:.1} mm @ {} DPI",
        format.key,
        format.width_mm,
        format.height_mm,
        flypush_core::WORKING_DPI
    );
    let caption_w = font.line_width(&caption, small, false);
    font.draw_line(
        &mut img,
        cx - (caption_w / 2.0).ceil() as i32,
        cy - mark - font.line_height(small).ceil() as i32 - 2,
        &caption,
        small,
        false,
    );

    Ok(img)
}

// =============================================================================
// Raster Helpers
// =============================================================================

/// Copies a grayscale symbology raster into the label, clipping at edges.
fn blit_gray(img: &mut RgbImage, src: &GrayImage, x: i32, y: i32) {
    for (sx, sy, pixel) in src.enumerate_pixels() {
        let tx = x + sx as i32;
        let ty = y + sy as i32;
        if tx >= 0 && ty >= 0 && (tx as u32) < img.width() && (ty as u32) < img.height() {
            let v = pixel.0[0];
            img.put_pixel(tx as u32, ty as u32, Rgb([v, v, v]));
        }
    }
}

fn hline(img: &mut RgbImage, x_from: i32, x_to: i32, y: i32, thickness: i32) {
    let (a, b) = if x_from <= x_to { (x_from, x_to) } else { (x_to, x_from) };
    for x in a..=b {
        for t in 0..thickness {
            put_black(img, x, y + t);
        }
    }
}

fn vline(img: &mut RgbImage, y_from: i32, y_to: i32, x: i32, thickness: i32) {
    let (a, b) = if y_from <= y_to { (y_from, y_to) } else { (y_to, y_from) };
    for y in a..=b {
        for t in 0..thickness {
            put_black(img, x + t, y);
        }
    }
}

fn rect_border(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, thickness: i32) {
    hline(img, x0, x1, y0, thickness);
    hline(img, x0, x1, y1 - thickness + 1, thickness);
    vline(img, y0, y1, x0, thickness);
    vline(img, y0, y1, x1 - thickness + 1, thickness);
}

fn put_black(img: &mut RgbImage, x: i32, y: i32) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, BLACK);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flypush_core::formats;

    fn font() -> Option<LabelFont> {
        LabelFont::discover().ok()
    }

    fn payload() -> LabelPayload {
        LabelPayload {
            stock_id: "FLY-1234".into(),
            genotype: "w1118; TM3 Sb / TM6B Tb".into(),
            source_info: Some("Cross #812".into()),
            location_info: Some("Rack 4 / Tray 12".into()),
            print_date: Some("2024-05-01".into()),
            copies: 1,
        }
    }

    #[test]
    fn test_raster_spans_full_label() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_11352").unwrap();
        let img = compose_label(&payload(), fmt, CodeType::Qr, &font).unwrap();
        assert_eq!(img.width(), fmt.px_width());
        assert_eq!(img.height(), fmt.px_height());
    }

    #[test]
    fn test_qr_and_barcode_layouts_differ() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_99012").unwrap();
        let qr = compose_label(&payload(), fmt, CodeType::Qr, &font).unwrap();
        let bars = compose_label(&payload(), fmt, CodeType::Barcode, &font).unwrap();
        assert_ne!(qr.as_raw(), bars.as_raw());
    }

    #[test]
    fn test_barcode_value_printed_beneath_bars() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_99012").unwrap();
        let img = compose_label(&payload(), fmt, CodeType::Barcode, &font).unwrap();

        // The bottom strip holds the human-readable value, so it must
        // contain glyph pixels
        let pad = mm_to_px(PAD_MM);
        let strip_h = font
            .line_height(LabelFont::scale_for_mm(FONT_SMALL_MM))
            .ceil() as u32;
        let y0 = img.height() - pad - strip_h;
        let dark = (y0..img.height() - pad)
            .flat_map(|y| (0..img.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y).0[0] < 200)
            .count();
        assert!(dark > 0, "no text rendered beneath the bars");
    }

    #[test]
    fn test_empty_stock_id_rejected() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_11352").unwrap();
        let bad = LabelPayload::new("  ");
        let err = compose_label(&bad, fmt, CodeType::Qr, &font).unwrap_err();
        assert!(matches!(err, RenderError::MissingField { .. }));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_11352").unwrap();
        // Fixed print_date makes two runs byte-identical
        let a = compose_label(&payload(), fmt, CodeType::Qr, &font).unwrap();
        let b = compose_label(&payload(), fmt, CodeType::Qr, &font).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_margins_stay_blank_in_qr_layout() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_11352").unwrap();
        let img = compose_label(&payload(), fmt, CodeType::Qr, &font).unwrap();

        // Nothing may be drawn inside the leading margin
        for x in 0..fmt.px_leading_margin() {
            for y in 0..img.height() {
                assert_eq!(img.get_pixel(x, y).0[0], 255, "margin pixel drawn at {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_test_label_draws_border() {
        let Some(font) = font() else { return };
        let fmt = formats::lookup("dymo_11352").unwrap();
        let img = compose_test_label(fmt, &font).unwrap();

        let x0 = fmt.px_leading_margin();
        // Border edge pixels are black
        assert_eq!(img.get_pixel(x0, 0).0[0], 0);
        assert_eq!(img.get_pixel(x0, img.height() - 1).0[0], 0);
    }
}
