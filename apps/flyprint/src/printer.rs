//! # CUPS Backend
//!
//! Shells out to `lpstat`/`lp`. Label rasterization happens server-side;
//! this module only hands finished PDFs to the spooler with the right
//! media options.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use flypush_core::formats;

use crate::error::{AgentError, AgentResult};

/// Lists printer queue names known to CUPS.
pub async fn list_printers() -> AgentResult<Vec<String>> {
    let output = Command::new("lpstat")
        .arg("-e")
        .output()
        .await
        .map_err(|e| AgentError::Printer(format!("lpstat not available: {}", e)))?;

    if !output.status.success() {
        // No queues configured also exits non-zero; report empty
        return Ok(Vec::new());
    }

    let printers = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    Ok(printers)
}

/// Whether a queue with this name exists.
pub async fn printer_available(name: &str) -> AgentResult<bool> {
    Ok(list_printers().await?.iter().any(|p| p == name))
}

/// Submits a PDF to CUPS.
///
/// Scaling is pinned off: the PDF pages are already the exact physical
/// label size, and any fitting CUPS applied would resample the raster.
pub async fn print_pdf(
    printer: &str,
    pdf_path: &Path,
    format_key: &str,
    copies: u32,
) -> AgentResult<()> {
    let format = formats::lookup(format_key)
        .ok_or_else(|| AgentError::Printer(format!("Unknown label format: {}", format_key)))?;

    let mut command = Command::new("lp");
    command
        .arg("-d")
        .arg(printer)
        .arg("-o")
        .arg(format!("media={}", format.cups_page))
        .arg("-o")
        .arg("fit-to-page=false")
        .arg("-o")
        .arg("scaling=100");
    if copies > 1 {
        command.arg("-n").arg(copies.to_string());
    }
    command.arg(pdf_path);

    debug!(printer = %printer, media = format.cups_page, copies, "Submitting to CUPS");

    let output = command
        .output()
        .await
        .map_err(|e| AgentError::Printer(format!("lp not available: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AgentError::Printer(format!(
            "lp exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    info!(printer = %printer, request = %stdout.trim(), "Print job submitted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_format_rejected() {
        let err = print_pdf("any", Path::new("/tmp/x.pdf"), "avery_5160", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Printer(_)));
    }
}
