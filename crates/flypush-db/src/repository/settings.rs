//! # Tenant Print Settings Repository
//!
//! Tenant-wide printing defaults, and the bulk config-version bump that
//! keeps every agent in the tenant in sync.
//!
//! ## The Settings Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. INSERT OR REPLACE INTO tenant_print_settings ...                   │
//! │                                                                         │
//! │  2. UPDATE print_agents                                                │
//! │     SET config_version = config_version + 1                            │
//! │     WHERE tenant_id = ?                                                │
//! │                                                                         │
//! │  COMMIT ← Both land or neither does                                    │
//! │                                                                         │
//! │  Guarantee: no agent can observe the new settings while still          │
//! │  carrying its old version number, so every agent refetches.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use flypush_core::{CodeType, Orientation, TenantPrintSettings};

/// Repository for tenant print settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Fetches a tenant's settings, falling back to built-in defaults.
    pub async fn get(&self, tenant_id: &str) -> DbResult<TenantPrintSettings> {
        let row: Option<(String, CodeType, i64, Orientation)> = sqlx::query_as(
            "SELECT label_format, code_type, copies, orientation \
             FROM tenant_print_settings WHERE tenant_id = ?1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((label_format, code_type, copies, orientation)) => TenantPrintSettings {
                label_format,
                code_type,
                copies: copies as u32,
                orientation,
            },
            None => TenantPrintSettings::default(),
        })
    }

    /// Writes a tenant's settings and bumps every agent in the tenant.
    ///
    /// The upsert and the bulk bump share one transaction: an agent can
    /// never see the new settings under a stale config version.
    pub async fn upsert(
        &self,
        tenant_id: &str,
        settings: &TenantPrintSettings,
    ) -> DbResult<TenantPrintSettings> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tenant_print_settings (
                tenant_id, label_format, code_type, copies, orientation, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (tenant_id) DO UPDATE SET
                label_format = excluded.label_format,
                code_type = excluded.code_type,
                copies = excluded.copies,
                orientation = excluded.orientation,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(&settings.label_format)
        .bind(settings.code_type)
        .bind(settings.copies as i64)
        .bind(settings.orientation)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let bumped = sqlx::query(
            "UPDATE print_agents SET config_version = config_version + 1 WHERE tenant_id = ?1",
        )
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            tenant_id = %tenant_id,
            agents_bumped = bumped.rows_affected(),
            "Tenant print settings updated"
        );

        self.get(tenant_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    const TENANT: &str = "tenant-1";

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_absent() {
        let db = test_db().await;
        let settings = db.settings().get(TENANT).await.unwrap();
        assert_eq!(settings, TenantPrintSettings::default());
    }

    #[tokio::test]
    async fn test_upsert_roundtrip() {
        let db = test_db().await;
        let wanted = TenantPrintSettings {
            label_format: "brother_62mm".to_string(),
            code_type: CodeType::Barcode,
            copies: 2,
            orientation: Orientation::Landscape,
        };

        db.settings().upsert(TENANT, &wanted).await.unwrap();
        assert_eq!(db.settings().get(TENANT).await.unwrap(), wanted);

        // Second write overwrites, not duplicates
        let second = TenantPrintSettings {
            copies: 3,
            ..wanted.clone()
        };
        db.settings().upsert(TENANT, &second).await.unwrap();
        assert_eq!(db.settings().get(TENANT).await.unwrap().copies, 3);
    }

    #[tokio::test]
    async fn test_upsert_bumps_all_tenant_agents() {
        let db = test_db().await;
        let a = db.agents().create(TENANT, "bench-1", None).await.unwrap();
        let b = db.agents().create(TENANT, "bench-2", None).await.unwrap();
        let other = db
            .agents()
            .create("tenant-2", "elsewhere", None)
            .await
            .unwrap();

        db.settings()
            .upsert(TENANT, &TenantPrintSettings::default())
            .await
            .unwrap();

        assert_eq!(db.agents().get(TENANT, &a.id).await.unwrap().config_version, 2);
        assert_eq!(db.agents().get(TENANT, &b.id).await.unwrap().config_version, 2);
        // Other tenants untouched
        assert_eq!(
            db.agents()
                .get("tenant-2", &other.id)
                .await
                .unwrap()
                .config_version,
            1
        );
    }
}
