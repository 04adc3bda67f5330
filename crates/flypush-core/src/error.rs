//! # Error Types
//!
//! Domain-specific error types for flypush-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  flypush-core errors (this file)                                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  flypush-db errors (separate crate)                                    │
//! │  └── DbError          - Database failures + job lifecycle violations   │
//! │                                                                         │
//! │  flypush-render errors (separate crate)                                │
//! │  └── RenderError      - Rasterization and PDF failures                 │
//! │                                                                         │
//! │  API errors (apps/server)                                              │
//! │  └── ApiError         - HTTP status + JSON body the clients see        │
//! │                                                                         │
//! │  Flow: ValidationError / DbError / RenderError → ApiError → Client     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lifecycle rule violations (claim races, ownership, terminal states)
//! are detected where the state lives, so they are `DbError` variants,
//! not duplicated here.
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field name, limits)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a distinct client-facing outcome

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a request doesn't meet requirements.
/// Used for early validation before any lifecycle logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Collection has too many entries.
    #[error("{field} must have at most {max} entries")]
    TooMany { field: String, max: usize },

    /// Invalid format (e.g., malformed pairing code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "stock_id".to_string(),
        };
        assert_eq!(err.to_string(), "stock_id is required");

        let err = ValidationError::OutOfRange {
            field: "copies".to_string(),
            min: 1,
            max: 10,
        };
        assert_eq!(err.to_string(), "copies must be between 1 and 10");
    }
}
