//! # Print Job Repository
//!
//! Job queue lifecycle operations.
//!
//! ## The Atomic Claim
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Claim Race Between Two Agents                          │
//! │                                                                         │
//! │  Agent A                          Agent B                              │
//! │     │                                │                                  │
//! │     │ GET /agent/jobs               │ GET /agent/jobs                  │
//! │     │ → sees job-42 pending         │ → sees job-42 pending            │
//! │     │                                │                                  │
//! │     │ POST claim ────────┐           │ POST claim ────────┐            │
//! │     ▼                    │           ▼                    │            │
//! │  UPDATE print_jobs       │        UPDATE print_jobs       │            │
//! │  SET status='claimed'    │        SET status='claimed'    │            │
//! │  WHERE id='job-42'       │        WHERE id='job-42'       │            │
//! │    AND status='pending'  │          AND status='pending'  │            │
//! │     │                    │           │                    │            │
//! │     ▼                    │           ▼                    │            │
//! │  rows_affected = 1  ◄── WINNER    rows_affected = 0  ◄── LOSER        │
//! │  (owns the job)                   (AlreadyClaimed, skips job)          │
//! │                                                                         │
//! │  The status predicate in the WHERE clause is the whole locking         │
//! │  story. SQLite serializes writers, so exactly one UPDATE matches.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same conditional-UPDATE shape drives start, complete, and cancel,
//! so every lifecycle transition is a single atomic statement.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use flypush_core::{CodeType, JobStatus, LabelPayload, Orientation, PrintJob};

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw database row; converted into the pure [`PrintJob`] type.
///
/// Runtime-checked queries keep the workspace buildable without a prepared
/// query cache; the repository tests cover every statement instead.
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    tenant_id: String,
    created_by: String,
    labels: String,
    label_format: String,
    code_type: CodeType,
    orientation: Orientation,
    copies: i64,
    status: JobStatus,
    agent_id: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self) -> DbResult<PrintJob> {
        let labels: Vec<LabelPayload> = serde_json::from_str(&self.labels)
            .map_err(|e| DbError::corrupt("Print job", &self.id, e.to_string()))?;

        Ok(PrintJob {
            id: self.id,
            tenant_id: self.tenant_id,
            created_by: self.created_by,
            labels,
            label_format: self.label_format,
            code_type: self.code_type,
            orientation: self.orientation,
            copies: self.copies as u32,
            status: self.status,
            agent_id: self.agent_id,
            error_message: self.error_message,
            created_at: self.created_at,
            claimed_at: self.claimed_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, tenant_id, created_by, labels, label_format, code_type, \
     orientation, copies, status, agent_id, error_message, \
     created_at, claimed_at, started_at, completed_at";

// =============================================================================
// Statistics
// =============================================================================

/// Per-status job counts over a time window.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStatistics {
    pub total: i64,
    pub pending: i64,
    pub claimed: i64,
    pub printing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for print job operations.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    /// Creates a new JobRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JobRepository { pool }
    }

    /// Enqueues a new job in the `pending` state.
    ///
    /// The label batch is serialized once and stored on the row; nothing
    /// that happens to the underlying stock afterwards changes the job.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        tenant_id: &str,
        created_by: &str,
        labels: &[LabelPayload],
        label_format: &str,
        code_type: CodeType,
        orientation: Orientation,
        copies: u32,
    ) -> DbResult<PrintJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let labels_json = serde_json::to_string(labels)
            .map_err(|e| DbError::Internal(format!("serialize labels: {}", e)))?;

        debug!(
            job_id = %id,
            tenant_id = %tenant_id,
            labels = labels.len(),
            format = %label_format,
            "Enqueuing print job"
        );

        sqlx::query(
            r#"
            INSERT INTO print_jobs (
                id, tenant_id, created_by, labels, label_format, code_type,
                orientation, copies, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(created_by)
        .bind(&labels_json)
        .bind(label_format)
        .bind(code_type)
        .bind(orientation)
        .bind(copies as i64)
        .bind(JobStatus::Pending)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(tenant_id, &id).await
    }

    /// Fetches a job by ID within a tenant.
    pub async fn get(&self, tenant_id: &str, job_id: &str) -> DbResult<PrintJob> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM print_jobs WHERE id = ?1 AND tenant_id = ?2"
        ))
        .bind(job_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| DbError::not_found("Print job", job_id))?
            .into_job()
    }

    /// Fetches a job the given agent owns (claimed or printing).
    ///
    /// Used by the label/PDF endpoints: an agent may only render jobs it
    /// has claimed.
    pub async fn get_owned(&self, job_id: &str, agent_id: &str) -> DbResult<PrintJob> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM print_jobs WHERE id = ?1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let job = row
            .ok_or_else(|| DbError::not_found("Print job", job_id))?
            .into_job()?;

        if !job.is_owned_by(agent_id) {
            return Err(DbError::NotJobOwner {
                job_id: job_id.to_string(),
            });
        }

        Ok(job)
    }

    /// Lists jobs for the admin surface, newest first.
    pub async fn list(
        &self,
        tenant_id: &str,
        status: Option<JobStatus>,
        limit: u32,
    ) -> DbResult<Vec<PrintJob>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {JOB_COLUMNS} FROM print_jobs \
                     WHERE tenant_id = ?1 AND status = ?2 \
                     ORDER BY created_at DESC LIMIT ?3"
                ))
                .bind(tenant_id)
                .bind(status)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {JOB_COLUMNS} FROM print_jobs \
                     WHERE tenant_id = ?1 \
                     ORDER BY created_at DESC LIMIT ?2"
                ))
                .bind(tenant_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Lists pending jobs for agents, oldest first (FIFO).
    pub async fn list_pending(&self, tenant_id: &str, limit: u32) -> DbResult<Vec<PrintJob>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM print_jobs \
             WHERE tenant_id = ?1 AND status = 'pending' \
             ORDER BY created_at ASC LIMIT ?2"
        ))
        .bind(tenant_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// Atomically claims a pending job for an agent.
    ///
    /// ## Returns
    /// - `Ok(job)` - this agent now owns the job
    /// - `Err(AlreadyClaimed)` - another agent won the race, or the job
    ///   already left `pending`
    /// - `Err(NotFound)` - no such job in this tenant
    pub async fn claim(&self, job_id: &str, tenant_id: &str, agent_id: &str) -> DbResult<PrintJob> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE print_jobs
            SET status = 'claimed', agent_id = ?3, claimed_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND status = 'pending'
            "#,
        )
        .bind(job_id)
        .bind(tenant_id)
        .bind(agent_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Disambiguate: gone vs lost race
            let current = self.get(tenant_id, job_id).await?;
            return Err(DbError::AlreadyClaimed {
                job_id: job_id.to_string(),
                status: current.status.to_string(),
            });
        }

        debug!(job_id = %job_id, agent_id = %agent_id, "Job claimed");
        self.get(tenant_id, job_id).await
    }

    /// Marks a claimed job as printing.
    ///
    /// Only the owning agent may start its job, and only from `claimed`.
    pub async fn mark_started(&self, job_id: &str, agent_id: &str) -> DbResult<PrintJob> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE print_jobs
            SET status = 'printing', started_at = ?3
            WHERE id = ?1 AND agent_id = ?2 AND status = 'claimed'
            "#,
        )
        .bind(job_id)
        .bind(agent_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_failure(job_id, agent_id, "start").await);
        }

        debug!(job_id = %job_id, agent_id = %agent_id, "Job printing");
        self.get_owned(job_id, agent_id).await
    }

    /// Completes an owned job, successfully or not.
    ///
    /// Terminal: `completed` on success, `failed` (with the agent's
    /// reason) otherwise. Allowed from `claimed` as well as `printing`:
    /// an agent that cannot even start the print (no printer configured,
    /// artifact fetch failed) still reports the failure.
    pub async fn complete(
        &self,
        job_id: &str,
        agent_id: &str,
        success: bool,
        error_message: Option<&str>,
    ) -> DbResult<PrintJob> {
        let now = Utc::now();
        let status = if success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };

        let result = sqlx::query(
            r#"
            UPDATE print_jobs
            SET status = ?3, error_message = ?4, completed_at = ?5
            WHERE id = ?1 AND agent_id = ?2 AND status IN ('claimed', 'printing')
            "#,
        )
        .bind(job_id)
        .bind(agent_id)
        .bind(status)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_failure(job_id, agent_id, "complete").await);
        }

        debug!(job_id = %job_id, success = success, "Job finished");
        self.get_owned(job_id, agent_id).await
    }

    /// Cancels a job that has not started printing.
    ///
    /// Allowed from `pending` and `claimed` only. Once labels are coming
    /// out of the printer, cancelling would misreport reality.
    pub async fn cancel(&self, tenant_id: &str, job_id: &str) -> DbResult<PrintJob> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE print_jobs
            SET status = 'cancelled', completed_at = ?3
            WHERE id = ?1 AND tenant_id = ?2 AND status IN ('pending', 'claimed')
            "#,
        )
        .bind(job_id)
        .bind(tenant_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get(tenant_id, job_id).await?;
            if current.status.is_terminal() {
                return Err(DbError::TerminalState {
                    job_id: job_id.to_string(),
                    status: current.status.to_string(),
                });
            }
            return Err(DbError::InvalidTransition {
                job_id: job_id.to_string(),
                status: current.status.to_string(),
                operation: "cancel".to_string(),
            });
        }

        debug!(job_id = %job_id, "Job cancelled");
        self.get(tenant_id, job_id).await
    }

    /// Per-status counts of jobs created within the last `window`.
    pub async fn statistics(&self, tenant_id: &str, window: Duration) -> DbResult<JobStatistics> {
        let cutoff = Utc::now() - window;

        let rows: Vec<(JobStatus, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM print_jobs
            WHERE tenant_id = ?1 AND created_at >= ?2
            GROUP BY status
            "#,
        )
        .bind(tenant_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = JobStatistics::default();
        for (status, count) in rows {
            stats.total += count;
            match status {
                JobStatus::Pending => stats.pending = count,
                JobStatus::Claimed => stats.claimed = count,
                JobStatus::Printing => stats.printing = count,
                JobStatus::Completed => stats.completed = count,
                JobStatus::Failed => stats.failed = count,
                JobStatus::Cancelled => stats.cancelled = count,
            }
        }

        Ok(stats)
    }

    /// Explains why a conditional owner-transition matched no rows.
    async fn classify_failure(&self, job_id: &str, agent_id: &str, operation: &str) -> DbError {
        let row: Result<Option<JobRow>, sqlx::Error> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM print_jobs WHERE id = ?1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await;

        let job = match row {
            Ok(Some(row)) => match row.into_job() {
                Ok(job) => job,
                Err(e) => return e,
            },
            Ok(None) => return DbError::not_found("Print job", job_id),
            Err(e) => return e.into(),
        };

        if !job.is_owned_by(agent_id) {
            return DbError::NotJobOwner {
                job_id: job_id.to_string(),
            };
        }
        if job.status.is_terminal() {
            return DbError::TerminalState {
                job_id: job_id.to_string(),
                status: job.status.to_string(),
            };
        }
        DbError::InvalidTransition {
            job_id: job_id.to_string(),
            status: job.status.to_string(),
            operation: operation.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
