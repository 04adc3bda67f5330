//! # Server Client
//!
//! Typed reqwest wrapper over the `/agent/*` surface.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flypush_core::AgentConfig;

use crate::error::{AgentError, AgentResult};

/// Request timeout; label PDFs are small, slow means broken.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_KEY_HEADER: &str = "X-API-Key";

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize, Default)]
pub struct HeartbeatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_printers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatResponse {
    pub config_version: i64,
    pub latest_agent_version: String,
}

#[derive(Debug, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub label_format: String,
    pub total_labels: u64,
}

/// The claimed job, as much of it as the agent needs.
#[derive(Debug, Deserialize)]
pub struct ClaimedJob {
    pub id: String,
    pub label_format: String,
    pub copies: u32,
}

#[derive(Debug, Serialize)]
struct CompleteRequest<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct PairRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_printers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PairResponse {
    pub agent_id: String,
    pub api_key: String,
    pub tenant_id: String,
    pub config: AgentConfig,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    error: String,
    message: String,
}

// =============================================================================
// Client
// =============================================================================

/// Authenticated client for one paired agent.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(server_url: &str, api_key: &str) -> AgentResult<Self> {
        Ok(ApiClient {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: server_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// One-shot pairing call; the only request made without a key.
    pub async fn pair(server_url: &str, request: &PairRequest) -> AgentResult<PairResponse> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let url = format!("{}/agent/pair", server_url.trim_end_matches('/'));
        let response = http.post(&url).json(request).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> AgentResult<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::api_error(status, response).await)
        }
    }

    async fn api_error(status: StatusCode, response: reqwest::Response) -> AgentError {
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        AgentError::Api {
            status: status.as_u16(),
            message,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =========================================================================
    // Agent API
    // =========================================================================

    pub async fn heartbeat(&self, request: &HeartbeatRequest) -> AgentResult<HeartbeatResponse> {
        let response = self
            .http
            .post(self.url("/agent/heartbeat"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn config(&self) -> AgentResult<AgentConfig> {
        let response = self
            .http
            .get(self.url("/agent/config"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn pending_jobs(&self) -> AgentResult<Vec<JobSummary>> {
        let response = self
            .http
            .get(self.url("/agent/jobs"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn claim(&self, job_id: &str) -> AgentResult<ClaimedJob> {
        let response = self
            .http
            .post(self.url(&format!("/agent/jobs/{}/claim", job_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Fetches the print-ready PDF bytes.
    pub async fn job_pdf(&self, job_id: &str) -> AgentResult<Vec<u8>> {
        let response = self
            .http
            .get(self.url(&format!("/agent/jobs/{}/pdf", job_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        let bytes = response.bytes().await?;
        debug!(job_id = %job_id, bytes = bytes.len(), "PDF fetched");
        Ok(bytes.to_vec())
    }

    pub async fn start(&self, job_id: &str) -> AgentResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/agent/jobs/{}/start", job_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(())
    }

    pub async fn complete(
        &self,
        job_id: &str,
        success: bool,
        error_message: Option<&str>,
    ) -> AgentResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/agent/jobs/{}/complete", job_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&CompleteRequest {
                success,
                error_message,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        let client = ApiClient::new("http://localhost:8080/", "key").unwrap();
        assert_eq!(client.url("/agent/jobs"), "http://localhost:8080/agent/jobs");
    }
}
