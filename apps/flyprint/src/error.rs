//! Agent error types.

use thiserror::Error;

/// Errors from the print agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No credentials file; the agent has never paired.
    #[error("Not paired with a server yet (run `flyprint pair` first)")]
    NotPaired,

    /// Local config file problems.
    #[error("Config error: {0}")]
    Config(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("Server rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    /// CUPS interaction failed.
    #[error("Printer error: {0}")]
    Printer(String),

    /// Filesystem failure (spool files, config dirs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    /// Claim races are expected; the poll loop skips them quietly.
    pub fn is_claim_conflict(&self) -> bool {
        matches!(self, AgentError::Api { status: 409, .. })
    }
}
