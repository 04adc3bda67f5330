//! # Agent Surface
//!
//! The endpoints flyprint polls. All but `/pair` require `X-API-Key`.
//!
//! ## Poll Cycle
//! ```text
//! heartbeat ──► config_version changed? ──► GET /config
//!     │
//!     ▼
//! GET /jobs ──► per job: claim ──► pdf ──► start ──► complete
//! ```

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use flypush_core::{validation, AgentConfig, CodeType, LabelPayload, Orientation, PrintJob};

use crate::auth::{AgentAuth, ClientAddr};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Builds the `/agent` sub-router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/heartbeat", post(heartbeat))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}/claim", post(claim_job))
        .route("/jobs/{id}/labels", get(job_labels))
        .route("/jobs/{id}/pdf", get(job_pdf))
        .route("/jobs/{id}/image", get(job_image))
        .route("/jobs/{id}/start", post(start_job))
        .route("/jobs/{id}/complete", post(complete_job))
        .route("/config", get(agent_config))
        .route("/pair", post(pair))
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct HeartbeatRequest {
    pub printer_name: Option<String>,
    pub available_printers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub config_version: i64,
    pub latest_agent_version: String,
    pub server_time: DateTime<Utc>,
}

/// Compact job listing for the poll loop; agents fetch details after a
/// successful claim.
#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub label_format: String,
    pub label_count: usize,
    pub total_labels: u64,
    pub copies: u32,
    pub created_at: DateTime<Utc>,
}

impl From<&PrintJob> for JobSummary {
    fn from(job: &PrintJob) -> Self {
        JobSummary {
            id: job.id.clone(),
            label_format: job.label_format.clone(),
            label_count: job.labels.len(),
            total_labels: job.total_labels(),
            copies: job.copies,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LabelsResponse {
    pub job_id: String,
    pub label_format: String,
    pub code_type: CodeType,
    pub orientation: Orientation,
    pub copies: u32,
    pub labels: Vec<LabelPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PairRequest {
    pub code: Option<String>,
    pub agent_name: Option<String>,
    pub printer_name: Option<String>,
    pub available_printers: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PairResponse {
    pub agent_id: String,
    /// Returned exactly once; the server stores it but never serializes
    /// it again.
    pub api_key: String,
    pub tenant_id: String,
    pub config: AgentConfig,
}

// =============================================================================
// Handlers
// =============================================================================

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Json(req): Json<HeartbeatRequest>,
) -> ApiResult<Json<HeartbeatResponse>> {
    let config_version = state
        .db
        .agents()
        .heartbeat(
            &agent.id,
            req.printer_name.as_deref(),
            req.available_printers.as_deref(),
        )
        .await?;

    Ok(Json(HeartbeatResponse {
        config_version,
        latest_agent_version: state.config.latest_agent_version.clone(),
        server_time: Utc::now(),
    }))
}

/// Pending jobs for this agent's tenant, oldest first.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
) -> ApiResult<Json<Vec<JobSummary>>> {
    let jobs = state.db.jobs().list_pending(&agent.tenant_id, 50).await?;
    Ok(Json(jobs.iter().map(JobSummary::from).collect()))
}

async fn claim_job(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PrintJob>> {
    let job = state
        .db
        .jobs()
        .claim(&job_id, &agent.tenant_id, &agent.id)
        .await?;
    info!(job_id = %job.id, agent_id = %agent.id, "Job claimed");
    Ok(Json(job))
}

async fn job_labels(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Path(job_id): Path<String>,
) -> ApiResult<Json<LabelsResponse>> {
    let job = state.db.jobs().get_owned(&job_id, &agent.id).await?;
    Ok(Json(LabelsResponse {
        job_id: job.id,
        label_format: job.label_format,
        code_type: job.code_type,
        orientation: job.orientation,
        copies: job.copies,
        labels: job.labels,
    }))
}

/// The print-ready PDF: portrait pages sized to the physical label.
async fn job_pdf(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state.db.jobs().get_owned(&job_id, &agent.id).await?;
    let bytes = state.renderer.job_pdf(&job, true)?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

/// PNG of the first label, for on-device preview screens.
async fn job_image(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state.db.jobs().get_owned(&job_id, &agent.id).await?;
    let payload = job
        .labels
        .first()
        .ok_or_else(|| ApiError::NotFound(format!("Print job {} has no labels", job.id)))?;
    let bytes = state
        .renderer
        .label_png(payload, &job.label_format, job.code_type)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

async fn start_job(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PrintJob>> {
    let job = state.db.jobs().mark_started(&job_id, &agent.id).await?;
    Ok(Json(job))
}

async fn complete_job(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
    Path(job_id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<Json<PrintJob>> {
    let job = state
        .db
        .jobs()
        .complete(&job_id, &agent.id, req.success, req.error_message.as_deref())
        .await?;
    info!(job_id = %job.id, agent_id = %agent.id, status = %job.status, "Job settled");
    Ok(Json(job))
}

/// Merged agent + tenant settings snapshot.
async fn agent_config(
    State(state): State<Arc<AppState>>,
    AgentAuth(agent): AgentAuth,
) -> ApiResult<Json<AgentConfig>> {
    let config = state.db.agents().merged_config(&agent).await?;
    Ok(Json(config))
}

/// Completes a pairing handshake: registers the agent and hands back its
/// API key. Unauthenticated; the pairing code (or a same-network address
/// match) is the credential.
async fn pair(
    State(state): State<Arc<AppState>>,
    ClientAddr(caller_addr): ClientAddr,
    Json(req): Json<PairRequest>,
) -> ApiResult<(StatusCode, Json<PairResponse>)> {
    if let Some(code) = req.code.as_deref() {
        validation::validate_pairing_code(code)?;
    }

    let session = state
        .pairing
        .resolve(req.code.as_deref(), caller_addr.as_deref())
        .await?;

    let name = req
        .agent_name
        .clone()
        .or(session.agent_name.clone())
        .unwrap_or_else(|| "print-agent".to_string());
    validation::validate_agent_name(&name)?;

    let agent = state
        .db
        .agents()
        .create(&session.tenant_id, &name, req.printer_name.as_deref())
        .await?;

    // Pairing doubles as the first heartbeat
    state
        .db
        .agents()
        .heartbeat(
            &agent.id,
            req.printer_name.as_deref(),
            req.available_printers.as_deref(),
        )
        .await?;

    state
        .pairing
        .complete(&session.pairing_id, &agent.id, &agent.api_key)
        .await?;

    let config = state.db.agents().merged_config(&agent).await?;

    info!(agent_id = %agent.id, tenant_id = %agent.tenant_id, name = %agent.name, "Agent paired");
    Ok((
        StatusCode::CREATED,
        Json(PairResponse {
            agent_id: agent.id,
            api_key: agent.api_key,
            tenant_id: agent.tenant_id,
            config,
        }),
    ))
}
