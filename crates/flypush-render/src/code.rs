//! # Symbology Generation
//!
//! QR and Code 128 rasters, blitted module-by-module.
//!
//! Both generators work in whole pixels per module: the module size is
//! the largest integer that fits the target dimension, so bars and
//! modules stay crisp at 300 DPI instead of blurring through fractional
//! scaling.

use image::{GrayImage, Luma};
use qrcode::{Color, QrCode};

use crate::error::{RenderError, RenderResult};

const BLACK: Luma<u8> = Luma([0]);
const WHITE: Luma<u8> = Luma([255]);

/// Quiet-zone width around a QR code, in modules (spec minimum is 4;
/// 2 is plenty at label scanning distances and saves precious width).
const QR_QUIET_MODULES: usize = 2;

// =============================================================================
// QR
// =============================================================================

/// Renders a QR code as close to `target_side` pixels as whole modules
/// allow. The result is always square and at most `target_side` wide.
pub fn qr_image(data: &str, target_side: u32) -> RenderResult<GrayImage> {
    let code = QrCode::new(data.as_bytes()).map_err(|e| RenderError::Qr(e.to_string()))?;

    let modules = code.width();
    let total = modules + 2 * QR_QUIET_MODULES;
    let module_px = (target_side as usize / total).max(1) as u32;
    let side = module_px * total as u32;

    let colors = code.to_colors();
    let mut img = GrayImage::from_pixel(side, side, WHITE);

    for my in 0..modules {
        for mx in 0..modules {
            if colors[my * modules + mx] == Color::Dark {
                let x0 = (mx + QR_QUIET_MODULES) as u32 * module_px;
                let y0 = (my + QR_QUIET_MODULES) as u32 * module_px;
                for dy in 0..module_px {
                    for dx in 0..module_px {
                        img.put_pixel(x0 + dx, y0 + dy, BLACK);
                    }
                }
            }
        }
    }

    Ok(img)
}

// =============================================================================
// Code 128
// =============================================================================

/// Renders a Code 128 barcode at most `target_width` wide and exactly
/// `height` tall.
///
/// The value is encoded in character set B (full printable ASCII), which
/// covers every stock ID shape in practice.
pub fn code128_image(value: &str, target_width: u32, height: u32) -> RenderResult<GrayImage> {
    use barcoders::sym::code128::Code128;

    // Ɓ selects character set B (barcoders' charset escape)
    let encoded = Code128::new(format!("Ɓ{}", value))
        .map_err(|e| RenderError::Barcode(e.to_string()))?
        .encode();

    let module_px = (target_width as usize / encoded.len()).max(1) as u32;
    let width = module_px * encoded.len() as u32;

    let mut img = GrayImage::from_pixel(width, height, WHITE);
    for (i, module) in encoded.iter().enumerate() {
        if *module == 1 {
            let x0 = i as u32 * module_px;
            for dx in 0..module_px {
                for y in 0..height {
                    img.put_pixel(x0 + dx, y, BLACK);
                }
            }
        }
    }

    Ok(img)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_is_square_and_bounded() {
        let img = qr_image("flypush://FLY-1234", 236).unwrap();
        assert_eq!(img.width(), img.height());
        assert!(img.width() <= 236);
        assert!(img.width() > 0);

        let dark = img.pixels().filter(|p| p.0[0] == 0).count();
        let light = img.pixels().filter(|p| p.0[0] == 255).count();
        assert!(dark > 0 && light > 0);
    }

    #[test]
    fn test_qr_minimum_module_size() {
        // A tiny target still produces 1 px modules, never zero
        let img = qr_image("flypush://X", 4).unwrap();
        assert!(img.width() > 4);
    }

    #[test]
    fn test_code128_dimensions() {
        let img = code128_image("FLY-1234", 590, 94).unwrap();
        assert_eq!(img.height(), 94);
        assert!(img.width() <= 590);

        // Barcode starts and ends with a bar (start/stop patterns)
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(img.width() - 1, 0).0[0], 0);
    }

    #[test]
    fn test_code128_rejects_unencodable_input() {
        assert!(code128_image("naïve", 590, 94).is_err());
    }
}
