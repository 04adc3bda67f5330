//! # Label Formats
//!
//! The physical geometry of every supported label stock, and the unit
//! conversions the renderer and the agent share.
//!
//! ## Geometry Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Content vs Physical Page                           │
//! │                                                                         │
//! │  Content is always composed LANDSCAPE at WORKING_DPI:                  │
//! │                                                                         │
//! │      ◄──────────── width_mm ────────────►                              │
//! │    ▲ ┌────────────────────────────────────┐                            │
//! │    │ │ [QR]  FLY-1234        2024-05-01   │                            │
//! │ height │       w1118; TM3 / +             │                            │
//! │    │ │       Rack 4 / Tray 12             │                            │
//! │    ▼ └────────────────────────────────────┘                            │
//! │                                                                         │
//! │  Some stock feeds narrow-edge first (rotate_for_print = true):         │
//! │  the physical page is PORTRAIT and the content is rotated 90° at       │
//! │  print time. The rotation happens in PDF page geometry, never by       │
//! │  resampling pixels.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Margin Compensation
//! Label printers cannot print to the leading edge of the stock. The
//! leading/trailing margins shrink the drawable area so content is not
//! clipped, while the physical page keeps the full label size.

// =============================================================================
// Constants
// =============================================================================

/// Fixed working resolution for all label rasters, in dots per inch.
///
/// Both the preview image and the print raster are composed at this
/// resolution, so the two are pixel-identical by construction.
pub const WORKING_DPI: u32 = 300;

/// PDF points per millimetre (72 pt per inch).
pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Format applied when neither the request nor tenant settings name one.
pub const DEFAULT_FORMAT: &str = "dymo_11352";

// =============================================================================
// Unit Conversions
// =============================================================================

/// Millimetres to pixels at [`WORKING_DPI`], rounded to nearest.
pub fn mm_to_px(mm: f64) -> u32 {
    (mm / 25.4 * WORKING_DPI as f64).round() as u32
}

/// Millimetres to PDF points.
pub fn mm_to_pt(mm: f64) -> f64 {
    mm * POINTS_PER_MM
}

// =============================================================================
// Label Format
// =============================================================================

/// Static description of one label stock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelFormat {
    /// Stable key used in the API and stored on jobs.
    pub key: &'static str,

    /// Human-readable name for UI listings.
    pub display_name: &'static str,

    /// Content width in millimetres (landscape, the long edge).
    pub width_mm: f64,

    /// Content height in millimetres (landscape, the short edge).
    pub height_mm: f64,

    /// Unprintable zone at the leading (feed) edge.
    pub leading_margin_mm: f64,

    /// Unprintable zone at the trailing edge.
    pub trailing_margin_mm: f64,

    /// CUPS media name passed to `lp -o media=`.
    pub cups_page: &'static str,

    /// Physical page is portrait; rotate content 90° at print time.
    pub rotate_for_print: bool,
}

impl LabelFormat {
    /// Content width in pixels at [`WORKING_DPI`].
    pub fn px_width(&self) -> u32 {
        mm_to_px(self.width_mm)
    }

    /// Content height in pixels at [`WORKING_DPI`].
    pub fn px_height(&self) -> u32 {
        mm_to_px(self.height_mm)
    }

    /// Leading margin in pixels.
    pub fn px_leading_margin(&self) -> u32 {
        mm_to_px(self.leading_margin_mm)
    }

    /// Trailing margin in pixels.
    pub fn px_trailing_margin(&self) -> u32 {
        mm_to_px(self.trailing_margin_mm)
    }

    /// Physical print page size in PDF points (width, height).
    ///
    /// Portrait-feeding stock swaps the axes so the page matches the
    /// label exactly as it comes off the roll.
    pub fn print_page_pt(&self) -> (f64, f64) {
        if self.rotate_for_print {
            (mm_to_pt(self.height_mm), mm_to_pt(self.width_mm))
        } else {
            (mm_to_pt(self.width_mm), mm_to_pt(self.height_mm))
        }
    }

    /// Preview page size in PDF points (always landscape, as composed).
    pub fn preview_page_pt(&self) -> (f64, f64) {
        (mm_to_pt(self.width_mm), mm_to_pt(self.height_mm))
    }
}

// =============================================================================
// Format Table
// =============================================================================

/// Every label stock the system knows how to drive.
pub const LABEL_FORMATS: &[LabelFormat] = &[
    LabelFormat {
        key: "dymo_11352",
        display_name: "DYMO 11352 (25 x 54 mm)",
        width_mm: 54.0,
        height_mm: 25.4,
        leading_margin_mm: 3.0,
        trailing_margin_mm: 2.0,
        cups_page: "w72h154",
        rotate_for_print: true,
    },
    LabelFormat {
        key: "dymo_99010",
        display_name: "DYMO 99010 (28 x 89 mm)",
        width_mm: 89.0,
        height_mm: 28.0,
        leading_margin_mm: 2.0,
        trailing_margin_mm: 2.0,
        cups_page: "w79h252",
        rotate_for_print: false,
    },
    LabelFormat {
        key: "dymo_99012",
        display_name: "DYMO 99012 (36 x 89 mm)",
        width_mm: 89.0,
        height_mm: 36.0,
        leading_margin_mm: 2.0,
        trailing_margin_mm: 2.0,
        cups_page: "w102h252",
        rotate_for_print: false,
    },
    LabelFormat {
        key: "brother_29mm",
        display_name: "Brother 29 mm roll (29 x 90 mm)",
        width_mm: 90.0,
        height_mm: 29.0,
        leading_margin_mm: 1.5,
        trailing_margin_mm: 1.5,
        cups_page: "Custom.29x90mm",
        rotate_for_print: false,
    },
    LabelFormat {
        key: "brother_62mm",
        display_name: "Brother 62 mm roll (62 x 100 mm)",
        width_mm: 100.0,
        height_mm: 62.0,
        leading_margin_mm: 1.5,
        trailing_margin_mm: 1.5,
        cups_page: "Custom.62x100mm",
        rotate_for_print: false,
    },
];

/// Looks up a format by key.
pub fn lookup(key: &str) -> Option<&'static LabelFormat> {
    LABEL_FORMATS.iter().find(|f| f.key == key)
}

/// The default format's full description.
pub fn default_format() -> &'static LabelFormat {
    // DEFAULT_FORMAT is a table key, checked by test below
    lookup(DEFAULT_FORMAT).expect("default format missing from table")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_exists() {
        assert_eq!(default_format().key, DEFAULT_FORMAT);
    }

    #[test]
    fn test_lookup_unknown_is_none() {
        assert!(lookup("avery_5160").is_none());
    }

    #[test]
    fn test_mm_to_px_at_300_dpi() {
        // 25.4 mm = 1 inch = 300 px
        assert_eq!(mm_to_px(25.4), 300);
        assert_eq!(mm_to_px(54.0), 638);
    }

    #[test]
    fn test_dymo_11352_geometry() {
        let fmt = lookup("dymo_11352").unwrap();
        assert_eq!(fmt.px_width(), 638);
        assert_eq!(fmt.px_height(), 300);
        assert!(fmt.rotate_for_print);

        // Physical page is portrait: 25.4 mm wide, 54 mm tall
        let (w, h) = fmt.print_page_pt();
        assert!((w - 72.0).abs() < 0.01);
        assert!((h - 153.07).abs() < 0.01);

        // Preview stays landscape
        let (pw, ph) = fmt.preview_page_pt();
        assert!(pw > ph);
    }

    #[test]
    fn test_landscape_formats_keep_axes() {
        let fmt = lookup("brother_62mm").unwrap();
        let (w, h) = fmt.print_page_pt();
        assert!(w > h);
    }

    #[test]
    fn test_all_formats_are_landscape_content() {
        for fmt in LABEL_FORMATS {
            assert!(fmt.width_mm > fmt.height_mm, "{} not landscape", fmt.key);
            assert!(fmt.leading_margin_mm + fmt.trailing_margin_mm < fmt.width_mm);
        }
    }
}
