//! # Pairing Broker
//!
//! In-memory rendezvous between the admin UI and a new print agent.
//!
//! ## Handshake
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Admin UI                    Broker                    flyprint         │
//! │                                                                         │
//! │  POST /api/pairing ────────► start() ── code "K7M2PX"                  │
//! │  (shows the code)                                                       │
//! │                                          flyprint pair --code K7M2PX    │
//! │                              resolve() ◄──── POST /agent/pair          │
//! │                              complete(agent_id, api_key)                │
//! │  GET /api/pairing/{id} ────► status() ── Completed { id, key }         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions live in process memory: a restart drops open pairings, which is
//! fine because the code on the operator's screen is seconds old. Expired
//! sessions are retained one extra TTL so a late agent gets "expired"
//! rather than "unknown code".

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Code alphabet with ambiguous glyphs removed (no 0/O, 1/I/L).
const PAIRING_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Pairing code length.
const CODE_LEN: usize = 6;

// =============================================================================
// Errors
// =============================================================================

/// Pairing failures, mapped onto HTTP statuses by the API layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("Unknown pairing code")]
    UnknownCode,

    #[error("Unknown pairing session")]
    UnknownSession,

    #[error("Pairing session expired")]
    Expired,

    #[error("Pairing session already completed")]
    AlreadySettled,

    #[error("Multiple pairing sessions open; a code is required")]
    Ambiguous,

    #[error("No pairing session open")]
    NoSessionOpen,
}

// =============================================================================
// Session Types
// =============================================================================

#[derive(Debug, Clone)]
enum SessionState {
    Open,
    Completed { agent_id: String, api_key: String },
}

#[derive(Debug, Clone)]
struct Session {
    code: String,
    tenant_id: String,
    agent_name: Option<String>,
    /// Address the admin started pairing from; agents calling in from the
    /// same address auto-match without a code.
    originating_address: Option<String>,
    created_at: Instant,
    state: SessionState,
}

/// Handed to the admin UI when a pairing starts.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PairingTicket {
    pub pairing_id: String,
    pub code: String,
    pub expires_in_secs: u64,
}

/// Current state of a session, as seen by the admin poll endpoint.
///
/// Completion carries the minted key so the browser that started the
/// pairing can show it to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    Pending,
    Completed { agent_id: String, api_key: String },
}

/// A session matched to an incoming agent, before completion.
#[derive(Debug, Clone)]
pub struct ResolvedPairing {
    pub pairing_id: String,
    pub tenant_id: String,
    pub agent_name: Option<String>,
}

// =============================================================================
// Broker
// =============================================================================

/// In-memory pairing session store.
///
/// Injectable into [`AppState`](crate::AppState) so tests can run with a
/// short TTL.
pub struct PairingBroker {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl PairingBroker {
    /// Creates a broker with the given session lifetime.
    pub fn new(ttl: Duration) -> Self {
        PairingBroker {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn is_expired(&self, session: &Session) -> bool {
        session.created_at.elapsed() >= self.ttl
    }

    /// Drops sessions older than twice the TTL. Within the grace window an
    /// expired session still answers with [`PairingError::Expired`].
    fn sweep(&self, sessions: &mut HashMap<String, Session>) {
        let cutoff = self.ttl * 2;
        sessions.retain(|_, s| s.created_at.elapsed() < cutoff);
    }

    /// Opens a new pairing session and returns its code.
    ///
    /// `originating_address` is the admin caller's network address, kept
    /// for the same-network auto-match in [`resolve`](Self::resolve).
    pub async fn start(
        &self,
        tenant_id: &str,
        agent_name: Option<String>,
        originating_address: Option<String>,
    ) -> PairingTicket {
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions);

        // Regenerate on the off chance of a collision with a live code
        let mut code = generate_code();
        while sessions.values().any(|s| s.code == code) {
            code = generate_code();
        }

        let pairing_id = Uuid::new_v4().to_string();
        sessions.insert(
            pairing_id.clone(),
            Session {
                code: code.clone(),
                tenant_id: tenant_id.to_string(),
                agent_name,
                originating_address,
                created_at: Instant::now(),
                state: SessionState::Open,
            },
        );

        info!(pairing_id = %pairing_id, tenant_id = %tenant_id, "Pairing session opened");
        PairingTicket {
            pairing_id,
            code,
            expires_in_secs: self.ttl.as_secs(),
        }
    }

    /// Polls a session's state (admin side).
    pub async fn status(
        &self,
        tenant_id: &str,
        pairing_id: &str,
    ) -> Result<PairingStatus, PairingError> {
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions);

        let session = sessions
            .get(pairing_id)
            .filter(|s| s.tenant_id == tenant_id)
            .ok_or(PairingError::UnknownSession)?;

        match &session.state {
            SessionState::Completed { agent_id, api_key } => Ok(PairingStatus::Completed {
                agent_id: agent_id.clone(),
                api_key: api_key.clone(),
            }),
            SessionState::Open if self.is_expired(session) => Err(PairingError::Expired),
            SessionState::Open => Ok(PairingStatus::Pending),
        }
    }

    /// Matches an incoming agent to an open session.
    ///
    /// With a code the match is exact. Without one, a session whose
    /// originating address equals the caller's address wins first (the
    /// operator started pairing from the machine that runs the agent);
    /// failing that, a single open session is matched automatically.
    /// Several candidates force the agent to supply a code.
    pub async fn resolve(
        &self,
        code: Option<&str>,
        caller_address: Option<&str>,
    ) -> Result<ResolvedPairing, PairingError> {
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions);

        match code {
            Some(code) => {
                let (id, session) = sessions
                    .iter()
                    .find(|(_, s)| s.code.eq_ignore_ascii_case(code))
                    .ok_or(PairingError::UnknownCode)?;

                if matches!(session.state, SessionState::Completed { .. }) {
                    return Err(PairingError::AlreadySettled);
                }
                if self.is_expired(session) {
                    return Err(PairingError::Expired);
                }

                Ok(ResolvedPairing {
                    pairing_id: id.clone(),
                    tenant_id: session.tenant_id.clone(),
                    agent_name: session.agent_name.clone(),
                })
            }
            None => {
                let open: Vec<(&String, &Session)> = sessions
                    .iter()
                    .filter(|(_, s)| {
                        matches!(s.state, SessionState::Open) && !self.is_expired(s)
                    })
                    .collect();

                let same_address: Vec<(&String, &Session)> = match caller_address {
                    Some(addr) => open
                        .iter()
                        .filter(|(_, s)| s.originating_address.as_deref() == Some(addr))
                        .copied()
                        .collect(),
                    None => Vec::new(),
                };

                let candidates = if same_address.is_empty() {
                    &open
                } else {
                    &same_address
                };
                match candidates.as_slice() {
                    [] => Err(PairingError::NoSessionOpen),
                    [(id, session)] => Ok(ResolvedPairing {
                        pairing_id: (*id).clone(),
                        tenant_id: session.tenant_id.clone(),
                        agent_name: session.agent_name.clone(),
                    }),
                    _ => Err(PairingError::Ambiguous),
                }
            }
        }
    }

    /// Marks a session completed, retaining the minted credential for the
    /// admin poll. Single-shot: a settled session cannot be completed
    /// again.
    pub async fn complete(
        &self,
        pairing_id: &str,
        agent_id: &str,
        api_key: &str,
    ) -> Result<(), PairingError> {
        let mut sessions = self.sessions.lock().await;

        let session = sessions
            .get_mut(pairing_id)
            .ok_or(PairingError::UnknownSession)?;

        if matches!(session.state, SessionState::Completed { .. }) {
            return Err(PairingError::AlreadySettled);
        }

        debug!(pairing_id = %pairing_id, agent_id = %agent_id, "Pairing completed");
        session.state = SessionState::Completed {
            agent_id: agent_id.to_string(),
            api_key: api_key.to_string(),
        };
        Ok(())
    }
}

/// Generates a pairing code from the unambiguous alphabet.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| PAIRING_ALPHABET[rng.gen_range(0..PAIRING_ALPHABET.len())] as char)
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "tenant-1";

    #[test]
    fn test_code_shape() {
        let code = generate_code();
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.bytes().all(|b| PAIRING_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn test_full_handshake() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        let ticket = broker
            .start(TENANT, Some("bench-3".to_string()), None)
            .await;

        assert_eq!(
            broker.status(TENANT, &ticket.pairing_id).await.unwrap(),
            PairingStatus::Pending
        );

        let resolved = broker.resolve(Some(&ticket.code), None).await.unwrap();
        assert_eq!(resolved.tenant_id, TENANT);
        assert_eq!(resolved.agent_name.as_deref(), Some("bench-3"));

        broker
            .complete(&resolved.pairing_id, "agent-9", "key-9")
            .await
            .unwrap();
        // The poll reveals the minted credential
        assert_eq!(
            broker.status(TENANT, &ticket.pairing_id).await.unwrap(),
            PairingStatus::Completed {
                agent_id: "agent-9".to_string(),
                api_key: "key-9".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_code_is_case_insensitive() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        let ticket = broker.start(TENANT, None, None).await;
        assert!(broker
            .resolve(Some(&ticket.code.to_lowercase()), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        assert_eq!(
            broker.resolve(Some("XXXXXX"), None).await.unwrap_err(),
            PairingError::UnknownCode
        );
    }

    #[tokio::test]
    async fn test_zero_config_single_session() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        let ticket = broker.start(TENANT, None, None).await;

        let resolved = broker.resolve(None, None).await.unwrap();
        assert_eq!(resolved.pairing_id, ticket.pairing_id);
    }

    #[tokio::test]
    async fn test_address_auto_match_picks_originating_session() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        broker
            .start(TENANT, None, Some("10.0.0.1".to_string()))
            .await;
        let ticket = broker
            .start(TENANT, None, Some("10.0.0.5".to_string()))
            .await;

        // Two sessions open, but the caller's address singles one out
        let resolved = broker.resolve(None, Some("10.0.0.5")).await.unwrap();
        assert_eq!(resolved.pairing_id, ticket.pairing_id);
    }

    #[tokio::test]
    async fn test_unmatched_address_falls_back_to_single_session() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        let ticket = broker
            .start(TENANT, None, Some("10.0.0.1".to_string()))
            .await;

        let resolved = broker.resolve(None, Some("192.168.7.20")).await.unwrap();
        assert_eq!(resolved.pairing_id, ticket.pairing_id);
    }

    #[tokio::test]
    async fn test_zero_config_ambiguous() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        broker.start(TENANT, None, None).await;
        broker.start(TENANT, None, None).await;

        assert_eq!(
            broker.resolve(None, None).await.unwrap_err(),
            PairingError::Ambiguous
        );
        // An address matching neither session does not break the tie
        assert_eq!(
            broker.resolve(None, Some("10.0.0.5")).await.unwrap_err(),
            PairingError::Ambiguous
        );
    }

    #[tokio::test]
    async fn test_zero_config_none_open() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        assert_eq!(
            broker.resolve(None, None).await.unwrap_err(),
            PairingError::NoSessionOpen
        );
    }

    #[tokio::test]
    async fn test_completion_is_single_shot() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        let ticket = broker.start(TENANT, None, None).await;

        let resolved = broker.resolve(Some(&ticket.code), None).await.unwrap();
        broker
            .complete(&resolved.pairing_id, "agent-1", "key-1")
            .await
            .unwrap();

        assert_eq!(
            broker
                .complete(&resolved.pairing_id, "agent-2", "key-2")
                .await
                .unwrap_err(),
            PairingError::AlreadySettled
        );
        assert_eq!(
            broker.resolve(Some(&ticket.code), None).await.unwrap_err(),
            PairingError::AlreadySettled
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_distinguishable() {
        let broker = PairingBroker::new(Duration::from_millis(10));
        let ticket = broker.start(TENANT, None, None).await;

        tokio::time::sleep(Duration::from_millis(15)).await;

        // Within the grace window: expired, not unknown
        assert_eq!(
            broker.resolve(Some(&ticket.code), None).await.unwrap_err(),
            PairingError::Expired
        );
        assert_eq!(
            broker.status(TENANT, &ticket.pairing_id).await.unwrap_err(),
            PairingError::Expired
        );

        tokio::time::sleep(Duration::from_millis(15)).await;

        // Past the grace window: gone entirely
        assert_eq!(
            broker.resolve(Some(&ticket.code), None).await.unwrap_err(),
            PairingError::UnknownCode
        );
    }

    #[tokio::test]
    async fn test_tenant_isolation_on_status() {
        let broker = PairingBroker::new(Duration::from_secs(60));
        let ticket = broker.start(TENANT, None, None).await;

        assert_eq!(
            broker.status("other-tenant", &ticket.pairing_id).await.unwrap_err(),
            PairingError::UnknownSession
        );
    }
}
