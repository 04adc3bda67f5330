//! # flyPush Server
//!
//! HTTP API server orchestrating print jobs between the web tier and
//! local print agents.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        flyPush Server                                   │
//! │                                                                         │
//! │  Web tier ───► /api/*   (X-Tenant-Id)  ──┐                             │
//! │                                          ├──► repositories ──► SQLite  │
//! │  flyprint ───► /agent/* (X-API-Key)   ───┘         │                   │
//! │                                                    ▼                    │
//! │                                              flypush-render            │
//! │                                           (PNG previews, print PDFs)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `FLYPUSH_PORT` - HTTP port (default: 8080)
//! - `FLYPUSH_BIND_ADDR` - Bind address (default: 0.0.0.0)
//! - `FLYPUSH_DATABASE_PATH` - SQLite file path (default: flypush.db)
//! - `FLYPUSH_AGENT_ONLINE_THRESHOLD_SECS` - Liveness window (default: 60)
//! - `FLYPUSH_PAIRING_TTL_SECS` - Pairing code lifetime (default: 300)
//! - `FLYPUSH_LATEST_AGENT_VERSION` - Version advertised to agents

pub mod auth;
pub mod config;
pub mod error;
pub mod pairing;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use pairing::PairingBroker;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use flypush_db::Database;
use flypush_render::Renderer;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub renderer: Renderer,
    pub pairing: PairingBroker,
    pub config: ServerConfig,
}

/// Builds the full router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/agent", routes::agent::router())
        .nest("/api", routes::admin::router())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness endpoint for deployment probes.
async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse {
    if state.db.health_check().await {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "DB unavailable")
    }
}
