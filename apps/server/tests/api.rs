//! End-to-end API tests: real router, in-memory database.
//!
//! Tests are skipped on systems without a DejaVu/Vera font install, since
//! the renderer is part of the shared state.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use flypush_db::{Database, DbConfig};
use flypush_render::{LabelFont, Renderer};
use flypush_server::{router, AppState, PairingBroker, ServerConfig};

const TENANT: &str = "tenant-1";

async fn test_app() -> Option<Router> {
    let font = LabelFont::discover().ok()?;
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let state = Arc::new(AppState {
        db,
        renderer: Renderer::with_font(font),
        pairing: PairingBroker::new(Duration::from_secs(60)),
        config: ServerConfig::default(),
    });
    Some(router(state))
}

/// Sends a JSON request and returns (status, parsed body).
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-tenant-id", TENANT);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Same, authenticated as an agent instead of the admin tier.
async fn send_as_agent(
    app: &Router,
    api_key: &str,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", api_key);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Registers an agent and returns (agent_id, api_key).
async fn register_agent(app: &Router, name: &str) -> (String, String) {
    let (status, body) = send(app, "POST", "/api/agents", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["id"].as_str().unwrap().to_string(),
        body["api_key"].as_str().unwrap().to_string(),
    )
}

/// Queues a one-label job and returns its id.
async fn queue_job(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/jobs",
        Some(json!({
            "labels": [{ "stock_id": "FLY-1001", "genotype": "w1118" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "job create failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_admin_requires_tenant_header() {
    let Some(app) = test_app().await else { return };

    let request = Request::builder()
        .method("GET")
        .uri("/api/jobs")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_agent_requires_api_key() {
    let Some(app) = test_app().await else { return };

    let (status, body) = send_as_agent(&app, "not-a-real-key", "GET", "/agent/jobs", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_deactivated_agent_rejected() {
    let Some(app) = test_app().await else { return };
    let (agent_id, api_key) = register_agent(&app, "retired-bench").await;

    let (status, _) = send(&app, "DELETE", &format!("/api/agents/{agent_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_as_agent(&app, &api_key, "GET", "/agent/jobs", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Job Lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_job_lifecycle() {
    let Some(app) = test_app().await else { return };
    let (_, api_key) = register_agent(&app, "bench-1").await;
    let job_id = queue_job(&app).await;

    // Agent sees the pending job
    let (status, body) = send_as_agent(&app, &api_key, "GET", "/agent/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], job_id.as_str());

    // Claim
    let (status, body) = send_as_agent(
        &app,
        &api_key,
        "POST",
        &format!("/agent/jobs/{job_id}/claim"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "claimed");

    // A second agent loses the race with a conflict, not a 404
    let (_, other_key) = register_agent(&app, "bench-2").await;
    let (status, body) = send_as_agent(
        &app,
        &other_key,
        "POST",
        &format!("/agent/jobs/{job_id}/claim"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // Labels are readable by the owner
    let (status, body) = send_as_agent(
        &app,
        &api_key,
        "GET",
        &format!("/agent/jobs/{job_id}/labels"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["labels"][0]["stock_id"], "FLY-1001");

    // Start, then complete
    let (status, body) = send_as_agent(
        &app,
        &api_key,
        "POST",
        &format!("/agent/jobs/{job_id}/start"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "printing");

    let (status, body) = send_as_agent(
        &app,
        &api_key,
        "POST",
        &format!("/agent/jobs/{job_id}/complete"),
        Some(json!({ "success": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    // Admin view agrees
    let (status, body) = send(&app, "GET", &format!("/api/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_failed_print_records_reason() {
    let Some(app) = test_app().await else { return };
    let (_, api_key) = register_agent(&app, "bench-1").await;
    let job_id = queue_job(&app).await;

    send_as_agent(&app, &api_key, "POST", &format!("/agent/jobs/{job_id}/claim"), None).await;
    send_as_agent(&app, &api_key, "POST", &format!("/agent/jobs/{job_id}/start"), None).await;
    let (status, body) = send_as_agent(
        &app,
        &api_key,
        "POST",
        &format!("/agent/jobs/{job_id}/complete"),
        Some(json!({ "success": false, "error_message": "printer out of labels" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error_message"], "printer out of labels");
}

#[tokio::test]
async fn test_failure_before_start_is_accepted() {
    let Some(app) = test_app().await else { return };
    let (_, api_key) = register_agent(&app, "bench-1").await;
    let job_id = queue_job(&app).await;

    send_as_agent(&app, &api_key, "POST", &format!("/agent/jobs/{job_id}/claim"), None).await;

    // No start call: an agent without a printer reports failure straight
    // from claimed, and the job must not wedge there
    let (status, body) = send_as_agent(
        &app,
        &api_key,
        "POST",
        &format!("/agent/jobs/{job_id}/complete"),
        Some(json!({ "success": false, "error_message": "No printer configured on this agent" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error_message"], "No printer configured on this agent");
}

#[tokio::test]
async fn test_cancel_rules() {
    let Some(app) = test_app().await else { return };
    let job_id = queue_job(&app).await;

    let (status, body) = send(&app, "POST", &format!("/api/jobs/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // Terminal now; cancelling again conflicts
    let (status, _) = send(&app, "POST", &format!("/api/jobs/{job_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_format_rejected() {
    let Some(app) = test_app().await else { return };

    let (status, body) = send(
        &app,
        "POST",
        "/api/jobs",
        Some(json!({
            "labels": [{ "stock_id": "FLY-1" }],
            "label_format": "avery_5160"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_job_statistics() {
    let Some(app) = test_app().await else { return };
    queue_job(&app).await;
    queue_job(&app).await;

    let (status, body) = send(&app, "GET", "/api/jobs/statistics?hours=24", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["pending"], 2);
}

// =============================================================================
// Rendering Endpoints
// =============================================================================

#[tokio::test]
async fn test_preview_and_print_pdfs() {
    let Some(app) = test_app().await else { return };
    let (_, api_key) = register_agent(&app, "bench-1").await;
    let job_id = queue_job(&app).await;

    // Admin preview works on an unclaimed job
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/jobs/{job_id}/pdf"))
        .header("x-tenant-id", TENANT)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    // Agent print PDF requires ownership
    let (status, _) = send_as_agent(
        &app,
        &api_key,
        "GET",
        &format!("/agent/jobs/{job_id}/pdf"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send_as_agent(&app, &api_key, "POST", &format!("/agent/jobs/{job_id}/claim"), None).await;
    let request = Request::builder()
        .method("GET")
        .uri(format!("/agent/jobs/{job_id}/pdf"))
        .header("x-api-key", &api_key)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_test_label_endpoints() {
    let Some(app) = test_app().await else { return };

    let (status, body) = send(&app, "POST", "/api/test-label/print", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["labels"][0]["stock_id"], "__TEST__");

    let request = Request::builder()
        .method("GET")
        .uri("/api/test-label/pdf?format=dymo_11352")
        .header("x-tenant-id", TENANT)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
}

// =============================================================================
// Pairing
// =============================================================================

#[tokio::test]
async fn test_pairing_handshake() {
    let Some(app) = test_app().await else { return };

    let (status, ticket) = send(
        &app,
        "POST",
        "/api/pairing",
        Some(json!({ "agent_name": "incubator-3" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let pairing_id = ticket["pairing_id"].as_str().unwrap().to_string();
    let code = ticket["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, body) = send(&app, "GET", &format!("/api/pairing/{pairing_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    // The agent pairs with the code; no prior credential
    let request = Request::builder()
        .method("POST")
        .uri("/agent/pair")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "code": code, "available_printers": ["DYMO_LW450"] }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let paired: Value = serde_json::from_slice(&bytes).unwrap();
    let api_key = paired["api_key"].as_str().unwrap().to_string();
    assert_eq!(paired["tenant_id"], TENANT);
    assert_eq!(paired["config"]["agent_name"], "incubator-3");

    // Admin poll sees completion and reveals the minted credential
    let (status, body) = send(&app, "GET", &format!("/api/pairing/{pairing_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["agent_id"], paired["agent_id"]);
    assert_eq!(body["api_key"], api_key.as_str());

    // The minted key works
    let (status, body) = send_as_agent(&app, &api_key, "GET", "/agent/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config_version"], 1);

    // The code is single-shot
    let request = Request::builder()
        .method("POST")
        .uri("/agent/pair")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "code": code }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pairing_auto_match_by_address() {
    let Some(app) = test_app().await else { return };

    async fn open_window(app: &Router, name: &str, addr: &str) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/api/pairing")
            .header("x-tenant-id", TENANT)
            .header("x-forwarded-for", addr)
            .header("content-type", "application/json")
            .body(Body::from(json!({ "agent_name": name }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let ticket: Value = serde_json::from_slice(&bytes).unwrap();
        ticket["pairing_id"].as_str().unwrap().to_string()
    }

    // Two windows open from different machines
    open_window(&app, "room-a", "10.0.0.1").await;
    let pairing_id = open_window(&app, "room-b", "10.0.0.5").await;

    // No code: the agent calling in from 10.0.0.5 resolves its own window
    let request = Request::builder()
        .method("POST")
        .uri("/agent/pair")
        .header("x-forwarded-for", "10.0.0.5")
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let paired: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(paired["config"]["agent_name"], "room-b");

    let (_, body) = send(&app, "GET", &format!("/api/pairing/{pairing_id}"), None).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["api_key"], paired["api_key"]);
}

#[tokio::test]
async fn test_pairing_unknown_code() {
    let Some(app) = test_app().await else { return };

    let request = Request::builder()
        .method("POST")
        .uri("/agent/pair")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "code": "ZZZZZZ" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Settings & Config Versioning
// =============================================================================

#[tokio::test]
async fn test_settings_update_invalidates_agent_config() {
    let Some(app) = test_app().await else { return };
    let (_, api_key) = register_agent(&app, "bench-1").await;

    let (status, body) =
        send_as_agent(&app, &api_key, "POST", "/agent/heartbeat", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config_version"], 1);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/settings",
        Some(json!({
            "label_format": "dymo_99012",
            "code_type": "barcode",
            "copies": 2,
            "orientation": "landscape"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The bump is visible on the next heartbeat, and the merged config
    // carries the new settings
    let (_, body) =
        send_as_agent(&app, &api_key, "POST", "/agent/heartbeat", Some(json!({}))).await;
    assert_eq!(body["config_version"], 2);

    let (_, config) = send_as_agent(&app, &api_key, "GET", "/agent/config", None).await;
    assert_eq!(config["label_format"], "dymo_99012");
    assert_eq!(config["code_type"], "barcode");
    assert_eq!(config["config_version"], 2);
}

#[tokio::test]
async fn test_agents_online_flips_after_heartbeat() {
    let Some(app) = test_app().await else { return };

    let (status, body) = send(&app, "GET", "/api/agents/status/online", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["online"], false);

    let (_, api_key) = register_agent(&app, "bench-1").await;
    send_as_agent(&app, &api_key, "POST", "/agent/heartbeat", Some(json!({}))).await;

    let (_, body) = send(&app, "GET", "/api/agents/status/online", None).await;
    assert_eq!(body["online"], true);
}

#[tokio::test]
async fn test_agent_update_and_listing() {
    let Some(app) = test_app().await else { return };
    let (agent_id, _) = register_agent(&app, "bench-1").await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/agents/{agent_id}"),
        Some(json!({ "name": "bench-renamed", "poll_interval": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "bench-renamed");
    assert_eq!(body["poll_interval"], 10);
    // Admin edits invalidate the agent's cached config
    assert_eq!(body["config_version"], 2);

    // The API key never appears in listings
    let (_, body) = send(&app, "GET", "/api/agents", None).await;
    let listed = &body.as_array().unwrap()[0];
    assert!(listed.get("api_key").is_none());
    assert_eq!(listed["online"], false);
}

#[tokio::test]
async fn test_formats_listing() {
    let Some(app) = test_app().await else { return };

    let (status, body) = send(&app, "GET", "/api/formats", None).await;
    assert_eq!(status, StatusCode::OK);
    let formats = body.as_array().unwrap();
    assert!(formats.iter().any(|f| f["key"] == "dymo_11352"));
    assert!(formats.iter().all(|f| f["cups_page"].is_string()));
}
