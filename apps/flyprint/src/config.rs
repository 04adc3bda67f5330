//! # Local Configuration
//!
//! Two files under the platform config dir
//! (`~/.config/flypush/flyprint/` on Linux):
//!
//! - `credentials.toml` - server URL + API key, written once at pairing,
//!   mode 0600 on unix. Synced settings never touch this file.
//! - `settings.toml` - operational settings cached from the server plus
//!   the `config_version` they were synced at.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use flypush_core::AgentConfig;

use crate::error::{AgentError, AgentResult};

const CREDENTIALS_FILE: &str = "credentials.toml";
const SETTINGS_FILE: &str = "settings.toml";

// =============================================================================
// File Contents
// =============================================================================

/// Pairing credentials. The API key is the agent's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub server_url: String,
    pub api_key: String,
    pub agent_id: String,
}

/// Operational settings cached from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSettings {
    pub agent_name: String,
    pub printer_name: Option<String>,
    pub poll_interval: u32,
    pub log_level: String,
    pub label_format: String,
    pub copies: u32,
    /// Server config version these settings were synced at.
    pub config_version: i64,
}

impl Default for LocalSettings {
    fn default() -> Self {
        LocalSettings {
            agent_name: "print-agent".to_string(),
            printer_name: None,
            poll_interval: 5,
            log_level: "info".to_string(),
            label_format: flypush_core::formats::DEFAULT_FORMAT.to_string(),
            copies: 1,
            config_version: 0,
        }
    }
}

impl LocalSettings {
    /// Builds the local cache from a server config snapshot.
    pub fn from_server(config: &AgentConfig) -> Self {
        LocalSettings {
            agent_name: config.agent_name.clone(),
            printer_name: config.printer_name.clone(),
            poll_interval: config.poll_interval.max(1),
            log_level: config.log_level.clone(),
            label_format: config.label_format.clone(),
            copies: config.copies,
            config_version: config.config_version,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Reads and writes the two config files.
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store at the platform default location.
    pub fn open() -> AgentResult<Self> {
        let dirs = ProjectDirs::from("", "flypush", "flyprint")
            .ok_or_else(|| AgentError::Config("Cannot determine config directory".to_string()))?;
        Ok(ConfigStore {
            dir: dirs.config_dir().to_path_buf(),
        })
    }

    /// Store rooted at an explicit directory (tests).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// Loads credentials; a missing file means the agent never paired.
    pub fn load_credentials(&self) -> AgentResult<Credentials> {
        let path = self.credentials_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::NotPaired)
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text)
            .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Writes credentials, restricting the file to the owner on unix.
    pub fn save_credentials(&self, credentials: &Credentials) -> AgentResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.credentials_path();
        let text = toml::to_string_pretty(credentials)
            .map_err(|e| AgentError::Config(e.to_string()))?;
        fs::write(&path, text)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %path.display(), "Credentials written");
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Loads cached settings; defaults when the file is absent.
    pub fn load_settings(&self) -> AgentResult<LocalSettings> {
        let path = self.settings_path();
        match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| AgentError::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LocalSettings::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_settings(&self, settings: &LocalSettings) -> AgentResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.settings_path();
        let text =
            toml::to_string_pretty(settings).map_err(|e| AgentError::Config(e.to_string()))?;
        fs::write(&path, text)?;
        debug!(path = %path.display(), version = settings.config_version, "Settings cached");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
