//! # flypush-render: Label Rendering
//!
//! Turns [`LabelPayload`]s into rasters and PDFs.
//!
//! ## Rendering Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Rendering Pipeline                                │
//! │                                                                         │
//! │  LabelPayload + LabelFormat + CodeType                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  compose: one RGB raster per payload, at WORKING_DPI (300)             │
//! │  ├── text: ab_glyph layout, word wrap, margin compensation             │
//! │  └── code: QR (qrcode) or Code 128 (barcoders), module blitting        │
//! │       │                                                                 │
//! │       ├────────────────► PNG (preview image endpoint)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pdf: pages = payloads × copies                                        │
//! │  ├── preview: landscape page, image drawn 1:1                          │
//! │  └── print:   portrait page sized to the physical label;               │
//! │               rotation in the content matrix, pixels untouched         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`text`] - Font discovery and text rasterization
//! - [`code`] - QR and Code 128 generation
//! - [`compose`] - Per-payload label composition
//! - [`pdf`] - Multi-page PDF packaging
//! - [`error`] - Render error types

pub mod code;
pub mod compose;
pub mod error;
pub mod pdf;
pub mod text;

pub use error::{RenderError, RenderResult};
pub use text::LabelFont;

use flypush_core::{formats, CodeType, LabelPayload, PrintJob};
use image::RgbImage;

/// Stateful renderer: holds the discovered font set.
///
/// Created once at startup so a missing font surfaces immediately, not on
/// the first print of the day.
pub struct Renderer {
    font: LabelFont,
}

impl Renderer {
    /// Discovers system fonts and builds a renderer.
    pub fn new() -> RenderResult<Self> {
        Ok(Renderer {
            font: LabelFont::discover()?,
        })
    }

    /// Builds a renderer from an explicit font (tests, embedded setups).
    pub fn with_font(font: LabelFont) -> Self {
        Renderer { font }
    }

    /// Composes a single payload to a raster.
    pub fn compose(
        &self,
        payload: &LabelPayload,
        format_key: &str,
        code_type: CodeType,
    ) -> RenderResult<RgbImage> {
        let format = formats::lookup(format_key)
            .ok_or_else(|| RenderError::UnknownFormat(format_key.to_string()))?;

        if payload.is_test_label() {
            compose::compose_test_label(format, &self.font)
        } else {
            compose::compose_label(payload, format, code_type, &self.font)
        }
    }

    /// Renders a single payload to PNG (the preview image endpoint).
    pub fn label_png(
        &self,
        payload: &LabelPayload,
        format_key: &str,
        code_type: CodeType,
    ) -> RenderResult<Vec<u8>> {
        let raster = self.compose(payload, format_key, code_type)?;
        encode_png(&raster)
    }

    /// Renders a whole job to a multi-page PDF.
    ///
    /// `for_print` selects page geometry only; the embedded rasters are
    /// identical either way. One page per payload copy; job-level copies
    /// are the agent's concern (`lp -n`).
    pub fn job_pdf(&self, job: &PrintJob, for_print: bool) -> RenderResult<Vec<u8>> {
        let format = formats::lookup(&job.label_format)
            .ok_or_else(|| RenderError::UnknownFormat(job.label_format.clone()))?;

        let mut pages = Vec::with_capacity(job.labels.len());
        for payload in &job.labels {
            let raster = self.compose(payload, &job.label_format, job.code_type)?;
            pages.push((raster, payload.copies.max(1)));
        }

        pdf::build_pdf(&pages, format, for_print)
    }

    /// Renders a printer-alignment test page PDF for a format.
    pub fn test_pdf(&self, format_key: &str, for_print: bool) -> RenderResult<Vec<u8>> {
        let format = formats::lookup(format_key)
            .ok_or_else(|| RenderError::UnknownFormat(format_key.to_string()))?;

        let raster = compose::compose_test_label(format, &self.font)?;
        pdf::build_pdf(&[(raster, 1)], format, for_print)
    }
}

/// Encodes a raster as PNG.
pub fn encode_png(raster: &RgbImage) -> RenderResult<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    raster
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
