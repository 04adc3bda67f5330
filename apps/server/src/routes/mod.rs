//! Route modules.
//!
//! - [`agent`] - the surface polled by flyprint agents (`/agent/*`)
//! - [`admin`] - the surface used by the fronting web tier (`/api/*`)

pub mod admin;
pub mod agent;
