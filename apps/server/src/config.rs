//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub port: u16,

    /// Bind address.
    pub bind_addr: String,

    /// SQLite database file path.
    pub database_path: String,

    /// How recently an agent must have been heard from to count as online.
    pub agent_online_threshold_secs: i64,

    /// Pairing session lifetime.
    pub pairing_ttl_secs: u64,

    /// Agent version advertised in heartbeat responses.
    pub latest_agent_version: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            port: env::var("FLYPUSH_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FLYPUSH_PORT".to_string()))?,

            bind_addr: env::var("FLYPUSH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),

            database_path: env::var("FLYPUSH_DATABASE_PATH")
                .unwrap_or_else(|_| "flypush.db".to_string()),

            agent_online_threshold_secs: env::var("FLYPUSH_AGENT_ONLINE_THRESHOLD_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("FLYPUSH_AGENT_ONLINE_THRESHOLD_SECS".to_string())
                })?,

            pairing_ttl_secs: env::var("FLYPUSH_PAIRING_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FLYPUSH_PAIRING_TTL_SECS".to_string()))?,

            latest_agent_version: env::var("FLYPUSH_LATEST_AGENT_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
        };

        Ok(config)
    }

    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Online threshold as a chrono duration.
    pub fn online_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.agent_online_threshold_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            database_path: "flypush.db".to_string(),
            agent_online_threshold_secs: 60,
            pairing_ttl_secs: 300,
            latest_agent_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.online_threshold(), chrono::Duration::seconds(60));
    }
}
