//! # flypush-core: Pure Domain Logic for the flyPush Print Core
//!
//! This crate is the **heart** of the print system. It contains the job
//! lifecycle rules, label geometry, and validation as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      flyPush Print Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────┐                      ┌──────────────────────────┐  │
//! │  │  Web UI / API   │  enqueue, cancel,    │  flyPrint agent          │  │
//! │  │  clients        │  pairing, settings   │  (lab workstation)       │  │
//! │  └────────┬────────┘                      └────────────┬─────────────┘  │
//! │           │ HTTP                                       │ HTTP (poll)    │
//! │  ┌────────▼───────────────────────────────────────────▼─────────────┐  │
//! │  │                    apps/server (axum)                             │  │
//! │  └────────┬──────────────────────┬──────────────────────────────────┘  │
//! │           │                      │                                      │
//! │  ┌────────▼────────┐    ┌────────▼────────┐                            │
//! │  │   flypush-db    │    │ flypush-render  │                            │
//! │  │   job queue,    │    │ raster labels,  │                            │
//! │  │   agents        │    │ PDF packaging   │                            │
//! │  └────────┬────────┘    └────────┬────────┘                            │
//! │           │                      │                                      │
//! │  ┌────────▼──────────────────────▼────────────────────────────────┐    │
//! │  │              ★ flypush-core (THIS CRATE) ★                     │    │
//! │  │                                                                │    │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │    │
//! │  │   │   types   │  │  formats  │  │validation │  │   error   │  │    │
//! │  │   │ PrintJob  │  │LabelFormat│  │   rules   │  │Validation │  │    │
//! │  │   │ JobStatus │  │ geometry  │  │  checks   │  │  Error    │  │    │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │    │
//! │  │                                                                │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (PrintJob, PrintAgent, LabelPayload, etc.)
//! - [`formats`] - The supported label formats and their physical geometry
//! - [`error`] - Domain error types
//! - [`validation`] - Request validation rules
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Explicit Errors**: All errors are typed, never strings or panics
//! 4. **One source of truth for geometry**: millimetres and DPI conversions
//!    live in [`formats`], so the renderer and the server never disagree

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod formats;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use flypush_core::PrintJob` instead of
// `use flypush_core::types::PrintJob`

pub use error::ValidationError;
pub use formats::{LabelFormat, WORKING_DPI};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum copies per label payload and per job.
///
/// ## Business Reason
/// Prevents a typo (100 instead of 10) from burning a whole label roll.
pub const MAX_COPIES: u32 = 10;

/// Maximum label payloads in a single job.
///
/// ## Business Reason
/// Keeps render time and PDF size bounded; bulk runs should be split into
/// multiple jobs so a single failure does not lose the whole batch.
pub const MAX_LABELS_PER_JOB: usize = 500;

/// Stock ID used to mark printer-alignment test jobs.
///
/// Jobs carrying this sentinel render as an alignment page (border, corner
/// marks, dimensions) instead of a data label.
pub const TEST_LABEL_STOCK_ID: &str = "__TEST__";
