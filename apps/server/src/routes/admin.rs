//! # Admin Surface
//!
//! Endpoints for the fronting web tier: agent management, pairing,
//! job submission and tracking, tenant print settings, previews.
//!
//! User authentication lives in the web tier; every request arrives with
//! the resolved tenant in `X-Tenant-Id`.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use flypush_core::formats::{self, LABEL_FORMATS};
use flypush_core::{
    validation, CodeType, JobStatus, LabelPayload, Orientation, PrintAgent, PrintJob,
    TenantPrintSettings, TEST_LABEL_STOCK_ID,
};
use flypush_db::repository::agent::AgentUpdate;
use flypush_db::JobStatistics;

use crate::auth::{ClientAddr, TenantId};
use crate::error::{ApiError, ApiResult};
use crate::pairing::{PairingStatus, PairingTicket};
use crate::AppState;

/// Builds the `/api` sub-router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/status/online", get(agents_online))
        .route(
            "/agents/{id}",
            get(get_agent).put(update_agent).delete(deactivate_agent),
        )
        .route("/pairing", post(start_pairing))
        .route("/pairing/{id}", get(pairing_status))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/statistics", get(job_statistics))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route("/jobs/{id}/pdf", get(job_preview_pdf))
        .route("/settings", get(get_settings).put(put_settings))
        .route("/formats", get(list_formats))
        .route("/test-label/print", post(print_test_label))
        .route("/test-label/pdf", get(test_label_pdf))
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub printer_name: Option<String>,
}

/// Creation response: the only place the API key ever appears.
#[derive(Debug, Serialize)]
pub struct CreatedAgentResponse {
    #[serde(flatten)]
    pub agent: PrintAgent,
    pub api_key: String,
}

/// Agent as listed for the UI, with liveness evaluated server-side.
#[derive(Debug, Serialize)]
pub struct AgentView {
    #[serde(flatten)]
    pub agent: PrintAgent,
    pub online: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListAgentsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub printer_name: Option<String>,
    /// Explicitly clears the assigned printer; wins over `printer_name`.
    #[serde(default)]
    pub clear_printer: bool,
    pub poll_interval: Option<u32>,
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StartPairingRequest {
    pub agent_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PairingStatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// The minted credential, revealed to the polling browser once the
    /// agent has paired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub labels: Vec<LabelPayload>,
    pub label_format: Option<String>,
    pub code_type: Option<CodeType>,
    pub orientation: Option<Orientation>,
    pub copies: Option<u32>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatisticsQuery {
    pub hours: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TestLabelRequest {
    pub label_format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FormatQuery {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FormatView {
    pub key: &'static str,
    pub display_name: &'static str,
    pub width_mm: f64,
    pub height_mm: f64,
    pub cups_page: &'static str,
}

// =============================================================================
// Agents
// =============================================================================

async fn create_agent(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Json(req): Json<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<CreatedAgentResponse>)> {
    validation::validate_agent_name(&req.name)?;

    let agent = state
        .db
        .agents()
        .create(&tenant, &req.name, req.printer_name.as_deref())
        .await?;

    info!(agent_id = %agent.id, tenant_id = %tenant, "Agent registered");
    let api_key = agent.api_key.clone();
    Ok((
        StatusCode::CREATED,
        Json(CreatedAgentResponse { agent, api_key }),
    ))
}

async fn list_agents(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Query(query): Query<ListAgentsQuery>,
) -> ApiResult<Json<Vec<AgentView>>> {
    let threshold = state.config.online_threshold();
    let agents = state
        .db
        .agents()
        .list(&tenant, query.include_inactive)
        .await?;

    Ok(Json(
        agents
            .into_iter()
            .map(|agent| AgentView {
                online: agent.is_online(threshold),
                agent,
            })
            .collect(),
    ))
}

async fn get_agent(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentView>> {
    let agent = state.db.agents().get(&tenant, &agent_id).await?;
    Ok(Json(AgentView {
        online: agent.is_online(state.config.online_threshold()),
        agent,
    }))
}

async fn update_agent(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(agent_id): Path<String>,
    Json(req): Json<UpdateAgentRequest>,
) -> ApiResult<Json<PrintAgent>> {
    if let Some(name) = &req.name {
        validation::validate_agent_name(name)?;
    }

    let printer_name = if req.clear_printer {
        Some(None)
    } else {
        req.printer_name.map(Some)
    };

    let agent = state
        .db
        .agents()
        .update(
            &tenant,
            &agent_id,
            AgentUpdate {
                name: req.name,
                printer_name,
                poll_interval: req.poll_interval,
                log_level: req.log_level,
            },
        )
        .await?;

    Ok(Json(agent))
}

/// Soft retire: the agent stops authenticating but its job history stays.
async fn deactivate_agent(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(agent_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.agents().deactivate(&tenant, &agent_id).await?;
    info!(agent_id = %agent_id, tenant_id = %tenant, "Agent deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// Whether any active agent is currently online; drives the "print" button
/// affordance in the UI.
async fn agents_online(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
) -> ApiResult<Json<serde_json::Value>> {
    let threshold = state.config.online_threshold();
    let agents = state.db.agents().list(&tenant, false).await?;
    let online = agents.iter().any(|a| a.is_online(threshold));
    Ok(Json(serde_json::json!({ "online": online })))
}

// =============================================================================
// Pairing
// =============================================================================

/// Opens a pairing window. The caller's address is remembered so an
/// agent started on the same machine can pair without typing the code.
async fn start_pairing(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    ClientAddr(caller_addr): ClientAddr,
    Json(req): Json<StartPairingRequest>,
) -> ApiResult<(StatusCode, Json<PairingTicket>)> {
    if let Some(name) = &req.agent_name {
        validation::validate_agent_name(name)?;
    }
    let ticket = state.pairing.start(&tenant, req.agent_name, caller_addr).await;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn pairing_status(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(pairing_id): Path<String>,
) -> ApiResult<Json<PairingStatusResponse>> {
    let status = state.pairing.status(&tenant, &pairing_id).await?;
    Ok(Json(match status {
        PairingStatus::Pending => PairingStatusResponse {
            status: "pending",
            agent_id: None,
            api_key: None,
        },
        PairingStatus::Completed { agent_id, api_key } => PairingStatusResponse {
            status: "completed",
            agent_id: Some(agent_id),
            api_key: Some(api_key),
        },
    }))
}

// =============================================================================
// Jobs
// =============================================================================

async fn create_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Json(req): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<PrintJob>)> {
    // Tenant settings fill whatever the request leaves out
    let settings = state.db.settings().get(&tenant).await?;
    let label_format = req.label_format.unwrap_or(settings.label_format);
    let code_type = req.code_type.unwrap_or(settings.code_type);
    let orientation = req.orientation.unwrap_or(settings.orientation);
    let copies = req.copies.unwrap_or(settings.copies);
    let created_by = req.created_by.unwrap_or_else(|| "web".to_string());

    validation::validate_job_request(&req.labels, &label_format, copies)?;

    let job = state
        .db
        .jobs()
        .create(
            &tenant,
            &created_by,
            &req.labels,
            &label_format,
            code_type,
            orientation,
            copies,
        )
        .await?;

    info!(job_id = %job.id, tenant_id = %tenant, labels = job.labels.len(), "Job queued");
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<PrintJob>>> {
    let status = query
        .status
        .as_deref()
        .map(JobStatus::from_str)
        .transpose()
        .map_err(ApiError::Validation)?;
    let limit = query.limit.unwrap_or(50).min(500);

    let jobs = state.db.jobs().list(&tenant, status, limit).await?;
    Ok(Json(jobs))
}

async fn job_statistics(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<Json<JobStatistics>> {
    let window = Duration::hours(i64::from(query.hours.unwrap_or(24)));
    let stats = state.db.jobs().statistics(&tenant, window).await?;
    Ok(Json(stats))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PrintJob>> {
    let job = state.db.jobs().get(&tenant, &job_id).await?;
    Ok(Json(job))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(job_id): Path<String>,
) -> ApiResult<Json<PrintJob>> {
    let job = state.db.jobs().cancel(&tenant, &job_id).await?;
    info!(job_id = %job.id, tenant_id = %tenant, "Job cancelled");
    Ok(Json(job))
}

/// Preview PDF: landscape pages, exactly the pixels the printer will get.
async fn job_preview_pdf(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state.db.jobs().get(&tenant, &job_id).await?;
    let bytes = state.renderer.job_pdf(&job, false)?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

// =============================================================================
// Settings & Formats
// =============================================================================

async fn get_settings(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
) -> ApiResult<Json<TenantPrintSettings>> {
    Ok(Json(state.db.settings().get(&tenant).await?))
}

/// Replaces the tenant's print settings and bumps every agent's
/// config_version in the same transaction.
async fn put_settings(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Json(settings): Json<TenantPrintSettings>,
) -> ApiResult<Json<TenantPrintSettings>> {
    validation::validate_format_key(&settings.label_format)?;
    validation::validate_copies(settings.copies)?;

    let saved = state.db.settings().upsert(&tenant, &settings).await?;
    info!(tenant_id = %tenant, format = %saved.label_format, "Print settings updated");
    Ok(Json(saved))
}

async fn list_formats() -> Json<Vec<FormatView>> {
    Json(
        LABEL_FORMATS
            .iter()
            .map(|f| FormatView {
                key: f.key,
                display_name: f.display_name,
                width_mm: f.width_mm,
                height_mm: f.height_mm,
                cups_page: f.cups_page,
            })
            .collect(),
    )
}

// =============================================================================
// Test Labels
// =============================================================================

/// Queues an alignment test page as a regular job so it flows through the
/// same claim/print path as real labels.
async fn print_test_label(
    State(state): State<Arc<AppState>>,
    TenantId(tenant): TenantId,
    Json(req): Json<TestLabelRequest>,
) -> ApiResult<(StatusCode, Json<PrintJob>)> {
    let settings = state.db.settings().get(&tenant).await?;
    let label_format = req.label_format.unwrap_or(settings.label_format);
    validation::validate_format_key(&label_format)?;

    let payload = LabelPayload::new(TEST_LABEL_STOCK_ID);
    let job = state
        .db
        .jobs()
        .create(
            &tenant,
            "test-label",
            &[payload],
            &label_format,
            settings.code_type,
            settings.orientation,
            1,
        )
        .await?;

    info!(job_id = %job.id, tenant_id = %tenant, format = %label_format, "Test label queued");
    Ok((StatusCode::CREATED, Json(job)))
}

async fn test_label_pdf(
    State(state): State<Arc<AppState>>,
    TenantId(_tenant): TenantId,
    Query(query): Query<FormatQuery>,
) -> ApiResult<impl IntoResponse> {
    let key = query
        .format
        .unwrap_or_else(|| formats::DEFAULT_FORMAT.to_string());
    let bytes = state.renderer.test_pdf(&key, false)?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}
