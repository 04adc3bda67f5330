//! Request authentication extractors.
//!
//! Two surfaces, two credentials:
//! - Agents present their minted key in `X-API-Key`.
//! - The admin surface is reached only through the fronting web tier,
//!   which authenticates the user and forwards the tenant in
//!   `X-Tenant-Id`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use flypush_core::PrintAgent;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the agent API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the admin caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Header the fronting proxy sets with the original client address.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

// =============================================================================
// Agent Auth
// =============================================================================

/// The authenticated agent behind an `/agent/*` request.
///
/// Resolving the key also touches `last_seen`, so any authenticated call
/// counts as a sign of life.
pub struct AgentAuth(pub PrintAgent);

impl FromRequestParts<Arc<AppState>> for AgentAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-API-Key header".to_string()))?;

        let agent = state
            .db
            .agents()
            .get_by_api_key(api_key)
            .await
            .map_err(|_| ApiError::Unauthorized("Invalid API key".to_string()))?;

        state.db.agents().touch(&agent.id).await?;

        Ok(AgentAuth(agent))
    }
}

// =============================================================================
// Tenant Auth
// =============================================================================

/// The tenant behind an `/api/*` request.
pub struct TenantId(pub String);

impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Tenant-Id header".to_string()))?;

        Ok(TenantId(tenant.to_string()))
    }
}

// =============================================================================
// Client Address
// =============================================================================

/// Best-effort caller address, used by the pairing same-network
/// auto-match.
///
/// Behind a proxy the socket peer is the proxy itself, so the forwarded
/// header's first hop wins; a direct connection falls back to the peer
/// address. `None` when neither is available.
pub struct ClientAddr(pub Option<String>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let addr = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(peer)| peer.ip().to_string())
        });

        Ok(ClientAddr(addr))
    }
}
