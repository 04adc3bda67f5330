//! # Print Agent Repository
//!
//! Agent registry: creation with key minting, API-key authentication,
//! heartbeat tracking, and the merged config snapshot.
//!
//! ## Config Versioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Config Version Propagation                            │
//! │                                                                         │
//! │  Admin edits agent ──► UPDATE print_agents                             │
//! │                        SET ..., config_version = config_version + 1    │
//! │                                                                         │
//! │  Admin edits tenant ─► SettingsRepository::upsert bumps EVERY agent    │
//! │  settings              in the tenant inside one transaction            │
//! │                                                                         │
//! │  Agent heartbeat ────► response echoes config_version                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  echo != cached? ────► GET /agent/config, apply, cache new version     │
//! │                                                                         │
//! │  The counter only ever grows, so a missed bump is caught by the        │
//! │  next write and agents converge without clock comparisons.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use flypush_core::{AgentConfig, PrintAgent, TenantPrintSettings};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AgentRow {
    id: String,
    tenant_id: String,
    name: String,
    api_key: String,
    printer_name: Option<String>,
    available_printers: Option<String>,
    poll_interval: i64,
    log_level: String,
    config_version: i64,
    is_active: bool,
    last_seen: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl AgentRow {
    fn into_agent(self) -> DbResult<PrintAgent> {
        let available_printers = match &self.available_printers {
            Some(json) => serde_json::from_str(json)
                .map_err(|e| DbError::corrupt("Print agent", &self.id, e.to_string()))?,
            None => Vec::new(),
        };

        Ok(PrintAgent {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            api_key: self.api_key,
            printer_name: self.printer_name,
            available_printers,
            poll_interval: self.poll_interval as u32,
            log_level: self.log_level,
            config_version: self.config_version,
            is_active: self.is_active,
            last_seen: self.last_seen,
            created_at: self.created_at,
        })
    }
}

const AGENT_COLUMNS: &str = "id, tenant_id, name, api_key, printer_name, available_printers, \
     poll_interval, log_level, config_version, is_active, last_seen, created_at";

/// Mints a new agent API key: 32 random bytes, URL-safe base64.
///
/// Returned in cleartext exactly once; afterwards it only travels in the
/// X-API-Key header.
fn mint_api_key() -> String {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Update Shape
// =============================================================================

/// Partial agent update from the admin surface.
///
/// `None` fields are left untouched. Any update bumps the agent's
/// config_version in the same statement.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub printer_name: Option<Option<String>>,
    pub poll_interval: Option<u32>,
    pub log_level: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for print agent operations.
#[derive(Debug, Clone)]
pub struct AgentRepository {
    pool: SqlitePool,
}

impl AgentRepository {
    /// Creates a new AgentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AgentRepository { pool }
    }

    /// Registers a new agent and mints its API key.
    pub async fn create(
        &self,
        tenant_id: &str,
        name: &str,
        printer_name: Option<&str>,
    ) -> DbResult<PrintAgent> {
        let id = Uuid::new_v4().to_string();
        let api_key = mint_api_key();
        let now = Utc::now();

        debug!(agent_id = %id, tenant_id = %tenant_id, name = %name, "Registering agent");

        sqlx::query(
            r#"
            INSERT INTO print_agents (
                id, tenant_id, name, api_key, printer_name,
                poll_interval, log_level, config_version, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 5, 'info', 1, 1, ?6)
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(name)
        .bind(&api_key)
        .bind(printer_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(tenant_id, &id).await
    }

    /// Fetches an agent by ID within a tenant.
    pub async fn get(&self, tenant_id: &str, agent_id: &str) -> DbResult<PrintAgent> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {AGENT_COLUMNS} FROM print_agents WHERE id = ?1 AND tenant_id = ?2"
        ))
        .bind(agent_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| DbError::not_found("Print agent", agent_id))?
            .into_agent()
    }

    /// Resolves an API key to its active agent.
    ///
    /// Deactivated agents fail here, which is what revokes their access.
    pub async fn get_by_api_key(&self, api_key: &str) -> DbResult<PrintAgent> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {AGENT_COLUMNS} FROM print_agents WHERE api_key = ?1 AND is_active = 1"
        ))
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| DbError::not_found("Print agent", "api-key"))?
            .into_agent()
    }

    /// Lists agents for a tenant, newest first.
    pub async fn list(&self, tenant_id: &str, include_inactive: bool) -> DbResult<Vec<PrintAgent>> {
        let rows: Vec<AgentRow> = if include_inactive {
            sqlx::query_as(&format!(
                "SELECT {AGENT_COLUMNS} FROM print_agents \
                 WHERE tenant_id = ?1 ORDER BY created_at DESC"
            ))
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(&format!(
                "SELECT {AGENT_COLUMNS} FROM print_agents \
                 WHERE tenant_id = ?1 AND is_active = 1 ORDER BY created_at DESC"
            ))
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// Applies a partial admin update and bumps the agent's config version.
    ///
    /// The bump rides in the same UPDATE, so an agent can never observe
    /// the new settings under the old version.
    pub async fn update(
        &self,
        tenant_id: &str,
        agent_id: &str,
        update: AgentUpdate,
    ) -> DbResult<PrintAgent> {
        // COALESCE keeps untouched columns; printer_name supports explicit
        // clearing, so it binds both a value and a "set it" flag.
        let set_printer = update.printer_name.is_some();
        let printer_value = update.printer_name.flatten();

        let result = sqlx::query(
            r#"
            UPDATE print_agents SET
                name = COALESCE(?3, name),
                printer_name = CASE WHEN ?4 THEN ?5 ELSE printer_name END,
                poll_interval = COALESCE(?6, poll_interval),
                log_level = COALESCE(?7, log_level),
                config_version = config_version + 1
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(agent_id)
        .bind(tenant_id)
        .bind(update.name)
        .bind(set_printer)
        .bind(printer_value)
        .bind(update.poll_interval.map(|v| v as i64))
        .bind(update.log_level)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Print agent", agent_id));
        }

        debug!(agent_id = %agent_id, "Agent updated, config version bumped");
        self.get(tenant_id, agent_id).await
    }

    /// Soft-retires an agent. Its API key stops authenticating immediately.
    pub async fn deactivate(&self, tenant_id: &str, agent_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE print_agents SET is_active = 0 WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(agent_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Print agent", agent_id));
        }

        debug!(agent_id = %agent_id, "Agent deactivated");
        Ok(())
    }

    /// Records a heartbeat: bumps last_seen and stores what the agent
    /// reported about its printers.
    ///
    /// ## Returns
    /// The agent's current config_version, echoed back so the agent can
    /// detect staleness.
    pub async fn heartbeat(
        &self,
        agent_id: &str,
        printer_name: Option<&str>,
        available_printers: Option<&[String]>,
    ) -> DbResult<i64> {
        let now = Utc::now();
        let printers_json = match available_printers {
            Some(list) => Some(
                serde_json::to_string(list)
                    .map_err(|e| DbError::Internal(format!("serialize printers: {}", e)))?,
            ),
            None => None,
        };

        sqlx::query(
            r#"
            UPDATE print_agents SET
                last_seen = ?2,
                printer_name = COALESCE(?3, printer_name),
                available_printers = COALESCE(?4, available_printers)
            WHERE id = ?1
            "#,
        )
        .bind(agent_id)
        .bind(now)
        .bind(printer_name)
        .bind(printers_json)
        .execute(&self.pool)
        .await?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT config_version FROM print_agents WHERE id = ?1")
                .bind(agent_id)
                .fetch_optional(&self.pool)
                .await?;

        version.ok_or_else(|| DbError::not_found("Print agent", agent_id))
    }

    /// Bumps last_seen only. Called by the auth layer on every
    /// authenticated agent request, so liveness reflects any contact,
    /// not just explicit heartbeats.
    pub async fn touch(&self, agent_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE print_agents SET last_seen = ?2 WHERE id = ?1")
            .bind(agent_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Builds the merged config snapshot for an agent.
    ///
    /// Tenant settings supply printing defaults; the agent row overrides
    /// operational fields. Absent tenant settings fall back to built-ins.
    pub async fn merged_config(&self, agent: &PrintAgent) -> DbResult<AgentConfig> {
        let settings: Option<(String, flypush_core::CodeType, i64, flypush_core::Orientation)> =
            sqlx::query_as(
                "SELECT label_format, code_type, copies, orientation \
                 FROM tenant_print_settings WHERE tenant_id = ?1",
            )
            .bind(&agent.tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        let settings = match settings {
            Some((label_format, code_type, copies, orientation)) => TenantPrintSettings {
                label_format,
                code_type,
                copies: copies as u32,
                orientation,
            },
            None => TenantPrintSettings::default(),
        };

        Ok(AgentConfig {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            printer_name: agent.printer_name.clone(),
            poll_interval: agent.poll_interval,
            log_level: agent.log_level.clone(),
            label_format: settings.label_format,
            code_type: settings.code_type,
            copies: settings.copies,
            orientation: settings.orientation,
            config_version: agent.config_version,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
