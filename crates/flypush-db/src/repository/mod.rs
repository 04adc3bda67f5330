//! # Repository Module
//!
//! Database repository implementations for the flyPush print core.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.jobs().claim(&job_id, &tenant_id, &agent_id)               │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  JobRepository                                                         │
//! │  ├── create(&self, request)                                            │
//! │  ├── list_pending(&self, tenant_id)                                    │
//! │  ├── claim(&self, job_id, tenant_id, agent_id)                         │
//! │  └── complete(&self, job_id, agent_id, success, reason)                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Lifecycle SQL is isolated in one place                              │
//! │  • Conditional UPDATEs make state transitions atomic                   │
//! │  • Every repository test runs against a real in-memory database        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`job::JobRepository`] - Job queue lifecycle and statistics
//! - [`agent::AgentRepository`] - Agent registry, auth, heartbeat, config
//! - [`settings::SettingsRepository`] - Tenant printing defaults

pub mod agent;
pub mod job;
pub mod settings;
