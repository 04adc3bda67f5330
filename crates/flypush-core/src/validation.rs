//! # Validation Module
//!
//! Input validation utilities for the print API.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  └── Type and shape checks, defaults applied                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE: domain rule validation                          │
//! │  ├── Non-empty label batches                                           │
//! │  ├── Known format keys                                                 │
//! │  └── Copy count bounds                                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── UNIQUE constraints (api_key)                                      │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use flypush_core::validation::{validate_copies, validate_format_key};
//!
//! validate_format_key("dymo_11352").unwrap();
//! validate_copies(3).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::LabelPayload;
use crate::{MAX_COPIES, MAX_LABELS_PER_JOB};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a stock ID.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 64 characters (has to fit on the label and in a QR)
pub fn validate_stock_id(stock_id: &str) -> ValidationResult<()> {
    let stock_id = stock_id.trim();

    if stock_id.is_empty() {
        return Err(ValidationError::Required {
            field: "stock_id".to_string(),
        });
    }

    if stock_id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "stock_id".to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates an agent display name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 100 characters
pub fn validate_agent_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a label format key against the format table.
pub fn validate_format_key(key: &str) -> ValidationResult<()> {
    if key.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "label_format".to_string(),
        });
    }

    if crate::formats::lookup(key).is_none() {
        return Err(ValidationError::NotAllowed {
            field: "label_format".to_string(),
            allowed: crate::formats::LABEL_FORMATS
                .iter()
                .map(|f| f.key.to_string())
                .collect(),
        });
    }

    Ok(())
}

/// Validates a pairing code's shape (not its existence).
///
/// ## Rules
/// - Exactly 6 characters
/// - Uppercase letters and digits only
pub fn validate_pairing_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "pairing_code".to_string(),
            reason: "must be 6 letters or digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a copy count (job-level or per-payload).
///
/// ## Rules
/// - Must be between 1 and MAX_COPIES (10)
pub fn validate_copies(copies: u32) -> ValidationResult<()> {
    if copies < 1 || copies > MAX_COPIES {
        return Err(ValidationError::OutOfRange {
            field: "copies".to_string(),
            min: 1,
            max: MAX_COPIES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Job Request Validation
// =============================================================================

/// Validates a full job creation request.
///
/// ## Rules
/// - At least one payload, at most MAX_LABELS_PER_JOB
/// - Every payload has a valid stock ID and copy count
/// - The format key exists
/// - Job-level copies are in range
pub fn validate_job_request(
    labels: &[LabelPayload],
    label_format: &str,
    copies: u32,
) -> ValidationResult<()> {
    if labels.is_empty() {
        return Err(ValidationError::Required {
            field: "labels".to_string(),
        });
    }

    if labels.len() > MAX_LABELS_PER_JOB {
        return Err(ValidationError::TooMany {
            field: "labels".to_string(),
            max: MAX_LABELS_PER_JOB,
        });
    }

    for payload in labels {
        validate_stock_id(&payload.stock_id)?;
        validate_copies(payload.copies)?;
    }

    validate_format_key(label_format)?;
    validate_copies(copies)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stock_id() {
        assert!(validate_stock_id("FLY-1234").is_ok());
        assert!(validate_stock_id("w1118").is_ok());

        assert!(validate_stock_id("").is_err());
        assert!(validate_stock_id("   ").is_err());
        assert!(validate_stock_id(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_agent_name() {
        assert!(validate_agent_name("fly-room-bench-3").is_ok());
        assert!(validate_agent_name("").is_err());
        assert!(validate_agent_name(&"A".repeat(200)).is_err());
    }

    #[test]
    fn test_validate_format_key() {
        assert!(validate_format_key("dymo_11352").is_ok());
        assert!(validate_format_key("brother_62mm").is_ok());

        assert!(validate_format_key("").is_err());
        assert!(validate_format_key("avery_5160").is_err());
    }

    #[test]
    fn test_validate_copies() {
        assert!(validate_copies(1).is_ok());
        assert!(validate_copies(10).is_ok());

        assert!(validate_copies(0).is_err());
        assert!(validate_copies(11).is_err());
    }

    #[test]
    fn test_validate_pairing_code() {
        assert!(validate_pairing_code("K7M2XQ").is_ok());
        assert!(validate_pairing_code("AB12").is_err());
        assert!(validate_pairing_code("AB 12Q").is_err());
    }

    #[test]
    fn test_validate_job_request() {
        let labels = vec![LabelPayload::new("FLY-1")];
        assert!(validate_job_request(&labels, "dymo_11352", 1).is_ok());

        // Empty batch rejected
        assert!(validate_job_request(&[], "dymo_11352", 1).is_err());

        // Unknown format rejected
        assert!(validate_job_request(&labels, "bogus", 1).is_err());

        // Copies out of range rejected
        assert!(validate_job_request(&labels, "dymo_11352", 0).is_err());
        assert!(validate_job_request(&labels, "dymo_11352", 11).is_err());

        // Bad payload rejected
        let bad = vec![LabelPayload::new("")];
        assert!(validate_job_request(&bad, "dymo_11352", 1).is_err());
    }

    #[test]
    fn test_validate_job_request_batch_cap() {
        let labels: Vec<_> = (0..crate::MAX_LABELS_PER_JOB + 1)
            .map(|i| LabelPayload::new(format!("FLY-{}", i)))
            .collect();
        assert!(validate_job_request(&labels, "dymo_11352", 1).is_err());
    }
}
