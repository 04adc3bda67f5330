//! # Domain Types
//!
//! Core domain types used throughout the flyPush print system.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    PrintJob     │   │   PrintAgent    │   │  LabelPayload   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  stock_id       │       │
//! │  │  labels[]       │   │  api_key        │   │  genotype       │       │
//! │  │  status         │   │  config_version │   │  source_info    │       │
//! │  │  agent_id       │   │  last_seen      │   │  print_date     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   JobStatus     │   │    CodeType     │   │   Orientation   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Pending        │   │  Qr             │   │  Landscape      │       │
//! │  │  Claimed        │   │  Barcode        │   │  Portrait       │       │
//! │  │  Printing       │   └─────────────────┘   └─────────────────┘       │
//! │  │  Completed      │                                                    │
//! │  │  Failed         │                                                    │
//! │  │  Cancelled      │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Job Lifecycle
//! ```text
//!   pending ──claim──► claimed ──start──► printing ──complete──► completed
//!      │                  │                   │
//!      │                  │                   └──complete(err)──► failed
//!      └────cancel────────┴──────► cancelled
//! ```
//! Terminal states (completed, failed, cancelled) never transition again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Job Status
// =============================================================================

/// The lifecycle status of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for an agent to claim it.
    Pending,
    /// An agent has taken exclusive ownership.
    Claimed,
    /// The owning agent has submitted the job to a physical printer.
    Printing,
    /// Printed successfully (terminal).
    Completed,
    /// Printing failed; `error_message` holds the reason (terminal).
    Failed,
    /// Cancelled before printing started (terminal).
    Cancelled,
}

impl JobStatus {
    /// Returns true once the job can never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Returns true while cancellation is still allowed.
    ///
    /// Once the labels are physically printing, cancelling would lie about
    /// what came out of the printer.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Claimed)
    }

    /// All statuses, in lifecycle order. Used by the statistics endpoint.
    pub fn all() -> [JobStatus; 6] {
        [
            JobStatus::Pending,
            JobStatus::Claimed,
            JobStatus::Printing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ]
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Pending
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Claimed => "claimed",
            JobStatus::Printing => "printing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "claimed" => Ok(JobStatus::Claimed),
            "printing" => Ok(JobStatus::Printing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

// =============================================================================
// Code Type
// =============================================================================

/// Which machine-readable symbology a label carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    /// QR code on the leading edge, text rows beside it.
    Qr,
    /// Code 128 across the bottom, text rows above it.
    Barcode,
}

impl Default for CodeType {
    fn default() -> Self {
        CodeType::Qr
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeType::Qr => write!(f, "qr"),
            CodeType::Barcode => write!(f, "barcode"),
        }
    }
}

impl FromStr for CodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qr" => Ok(CodeType::Qr),
            "barcode" => Ok(CodeType::Barcode),
            other => Err(format!("unknown code type: {}", other)),
        }
    }
}

// =============================================================================
// Orientation
// =============================================================================

/// Content drawing orientation.
///
/// Most small label stock feeds narrow-edge first, so content is composed
/// landscape and rotated for print when the physical page is portrait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Landscape
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Landscape => write!(f, "landscape"),
            Orientation::Portrait => write!(f, "portrait"),
        }
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            other => Err(format!("unknown orientation: {}", other)),
        }
    }
}

// =============================================================================
// Label Payload
// =============================================================================

fn default_payload_copies() -> u32 {
    1
}

/// The data printed on a single label.
///
/// Payloads are immutable once the job is enqueued; the agent renders from
/// this snapshot, so later edits to the stock never change what prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPayload {
    /// Business identifier of the stock; also the QR/barcode value.
    pub stock_id: String,

    /// Genotype line, word-wrapped on the label. May be empty.
    #[serde(default)]
    pub genotype: String,

    /// Origin of the stock (cross reference, supplier, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_info: Option<String>,

    /// Physical location (rack/tray position).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_info: Option<String>,

    /// Date shown on the label. Defaults to the print date when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_date: Option<String>,

    /// Copies of this specific label within the job.
    #[serde(default = "default_payload_copies")]
    pub copies: u32,
}

impl LabelPayload {
    /// Creates a payload with just a stock ID; other fields default.
    pub fn new(stock_id: impl Into<String>) -> Self {
        LabelPayload {
            stock_id: stock_id.into(),
            genotype: String::new(),
            source_info: None,
            location_info: None,
            print_date: None,
            copies: 1,
        }
    }

    /// Whether this payload marks a printer-alignment test label.
    pub fn is_test_label(&self) -> bool {
        self.stock_id == crate::TEST_LABEL_STOCK_ID
    }
}

// =============================================================================
// Print Job
// =============================================================================

/// A print job in the queue.
///
/// Jobs are created by the web tier, claimed by exactly one agent, and
/// carry their full label batch so rendering needs no other lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this job belongs to. Every query filters on it.
    pub tenant_id: String,

    /// User who enqueued the job.
    pub created_by: String,

    /// The label batch (immutable snapshot).
    pub labels: Vec<LabelPayload>,

    /// Label format key, see [`crate::formats`].
    pub label_format: String,

    /// Symbology for the whole batch.
    pub code_type: CodeType,

    /// Content orientation for the whole batch.
    pub orientation: Orientation,

    /// Job-level copies, multiplied with per-payload copies.
    pub copies: u32,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Owning agent, set on claim.
    pub agent_id: Option<String>,

    /// Failure reason, set when status is `failed`.
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PrintJob {
    /// Total physical labels this job will produce.
    pub fn total_labels(&self) -> u64 {
        let per_payload: u64 = self.labels.iter().map(|l| u64::from(l.copies.max(1))).sum();
        per_payload * u64::from(self.copies.max(1))
    }

    /// Checks that `agent_id` owns this job.
    pub fn is_owned_by(&self, agent_id: &str) -> bool {
        self.agent_id.as_deref() == Some(agent_id)
    }
}

// =============================================================================
// Print Agent
// =============================================================================

/// A registered flyPrint agent.
///
/// One row per installation. The API key is the agent's only credential
/// and is returned in cleartext exactly once, at creation or pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintAgent {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this agent serves.
    pub tenant_id: String,

    /// Human-readable name (defaults to the workstation hostname).
    pub name: String,

    /// Credential presented in the X-API-Key header.
    /// Skipped in serialization; exposed only through creation responses.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Target printer, when pinned by an operator.
    pub printer_name: Option<String>,

    /// Printers the agent reported at its last heartbeat.
    pub available_printers: Vec<String>,

    /// Seconds between agent poll cycles.
    pub poll_interval: u32,

    /// Agent log level, pushed through config sync.
    pub log_level: String,

    /// Monotonic config counter; agents refetch when it changes.
    pub config_version: i64,

    /// Soft-delete flag; inactive agents cannot authenticate.
    pub is_active: bool,

    /// Last authenticated contact.
    pub last_seen: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl PrintAgent {
    /// Whether the agent has been heard from within `threshold` of `now`.
    pub fn is_online_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_seen {
            Some(seen) => now.signed_duration_since(seen) <= threshold,
            None => false,
        }
    }

    /// [`is_online_at`](Self::is_online_at) against the current clock.
    pub fn is_online(&self, threshold: Duration) -> bool {
        self.is_online_at(Utc::now(), threshold)
    }
}

// =============================================================================
// Tenant Print Settings
// =============================================================================

/// Tenant-wide printing defaults.
///
/// Applied when a job request or an agent config leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPrintSettings {
    pub label_format: String,
    pub code_type: CodeType,
    pub copies: u32,
    pub orientation: Orientation,
}

impl Default for TenantPrintSettings {
    fn default() -> Self {
        TenantPrintSettings {
            label_format: crate::formats::DEFAULT_FORMAT.to_string(),
            code_type: CodeType::Qr,
            copies: 1,
            orientation: Orientation::Landscape,
        }
    }
}

// =============================================================================
// Agent Config
// =============================================================================

/// The merged configuration snapshot an agent receives from the server.
///
/// Tenant settings provide printing defaults; agent-level fields override
/// them. `config_version` lets the agent detect staleness from the
/// heartbeat echo without refetching every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub agent_name: String,
    pub printer_name: Option<String>,
    pub poll_interval: u32,
    pub log_level: String,
    pub label_format: String,
    pub code_type: CodeType,
    pub copies: u32,
    pub orientation: Orientation,
    pub config_version: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        for status in JobStatus::all() {
            let parsed: JobStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Claimed.is_terminal());
        assert!(!JobStatus::Printing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_cancellable_states() {
        assert!(JobStatus::Pending.is_cancellable());
        assert!(JobStatus::Claimed.is_cancellable());
        assert!(!JobStatus::Printing.is_cancellable());
        assert!(!JobStatus::Completed.is_cancellable());
    }

    #[test]
    fn test_total_labels_multiplies_copies() {
        let mut job = PrintJob {
            id: "j1".into(),
            tenant_id: "t1".into(),
            created_by: "u1".into(),
            labels: vec![
                LabelPayload {
                    copies: 2,
                    ..LabelPayload::new("FLY-001")
                },
                LabelPayload::new("FLY-002"),
            ],
            label_format: "dymo_11352".into(),
            code_type: CodeType::Qr,
            orientation: Orientation::Landscape,
            copies: 3,
            status: JobStatus::Pending,
            agent_id: None,
            error_message: None,
            created_at: Utc::now(),
            claimed_at: None,
            started_at: None,
            completed_at: None,
        };
        // (2 + 1) payload copies x 3 job copies
        assert_eq!(job.total_labels(), 9);

        job.copies = 0; // treated as 1
        assert_eq!(job.total_labels(), 3);
    }

    #[test]
    fn test_agent_liveness_window() {
        let now = Utc::now();
        let agent = PrintAgent {
            id: "a1".into(),
            tenant_id: "t1".into(),
            name: "bench-3".into(),
            api_key: "secret".into(),
            printer_name: None,
            available_printers: vec![],
            poll_interval: 5,
            log_level: "info".into(),
            config_version: 1,
            is_active: true,
            last_seen: Some(now - Duration::seconds(30)),
            created_at: now,
        };
        assert!(agent.is_online_at(now, Duration::seconds(60)));
        assert!(!agent.is_online_at(now, Duration::seconds(10)));

        let never_seen = PrintAgent {
            last_seen: None,
            ..agent
        };
        assert!(!never_seen.is_online_at(now, Duration::seconds(60)));
    }

    #[test]
    fn test_payload_defaults_from_json() {
        let payload: LabelPayload = serde_json::from_str(r#"{"stock_id":"FLY-42"}"#).unwrap();
        assert_eq!(payload.stock_id, "FLY-42");
        assert_eq!(payload.genotype, "");
        assert_eq!(payload.copies, 1);
        assert!(payload.print_date.is_none());
    }

    #[test]
    fn test_test_label_sentinel() {
        assert!(LabelPayload::new(crate::TEST_LABEL_STOCK_ID).is_test_label());
        assert!(!LabelPayload::new("FLY-1").is_test_label());
    }
}
