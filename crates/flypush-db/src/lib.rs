//! # flypush-db: Database Layer for the flyPush Print Core
//!
//! This crate provides database access for the print job queue and agent
//! registry. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       flyPush Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (claim_job)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    flypush-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │   (job.rs)    │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ JobRepo       │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ AgentRepo     │    │              │  │   │
//! │  │   │ Management    │    │ SettingsRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (flypush.db, WAL mode)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (job, agent, settings)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flypush_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/flypush.db");
//! let db = Database::new(config).await?;
//!
//! let job = db.jobs().claim(&job_id, &tenant_id, &agent_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::agent::AgentRepository;
pub use repository::job::{JobRepository, JobStatistics};
pub use repository::settings::SettingsRepository;
