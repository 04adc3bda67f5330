//! Render error types.

use thiserror::Error;

/// Errors from label rendering.
///
/// Rendering never touches job state: a failed render propagates to the
/// caller and the job stays wherever it was.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Format key is not in the format table.
    #[error("Unknown label format: {0}")]
    UnknownFormat(String),

    /// A payload field required by the layout is missing or empty.
    #[error("Label payload missing {field}")]
    MissingField { field: String },

    /// No usable TrueType font on this system.
    #[error("No usable label font found (searched DejaVu/Vera system paths)")]
    FontUnavailable,

    /// QR code generation failed (data too long for the symbology).
    #[error("QR encoding failed: {0}")]
    Qr(String),

    /// Code 128 generation failed (character outside the code set).
    #[error("Barcode encoding failed: {0}")]
    Barcode(String),

    /// Raster encoding (PNG) failed.
    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// PDF assembly failed.
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
