//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calbridge/config.toml` by default.
//!
//! `client_id` supports secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use calbridge_providers::google::SessionConfig;
use serde::{Deserialize, Serialize};

/// Configuration for the calbridge client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google settings.
    pub google: GoogleSettings,

    /// Debug mode.
    pub debug: bool,
}

impl ClientConfig {
    /// Loads configuration from the default path; a missing file is the
    /// default configuration.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbridge")
    }
}

/// The `[google]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// Where the session is persisted.
    pub session_path: Option<PathBuf>,

    /// Calendar used when a command does not name one.
    pub calendar_id: String,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// First and last port tried for the sign-in redirect listener.
    pub loopback_port_range: Option<[u16; 2]>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            session_path: None,
            calendar_id: "primary".to_string(),
            timeout_secs: SessionConfig::DEFAULT_TIMEOUT_SECS,
            loopback_port_range: None,
        }
    }
}

impl GoogleSettings {
    /// Resolves the client id, preferring `override_id` (from the command
    /// line or `GOOGLE_CLIENT_ID`) over the configured value.
    pub fn resolve_client_id(&self, override_id: Option<&str>) -> Result<String, String> {
        let raw = override_id
            .or(self.client_id.as_deref())
            .ok_or_else(|| {
                format!(
                    "Google client id not found. Add to {}:\n  \
                     [google]\n  \
                     client_id = \"1234-abc.apps.googleusercontent.com\"\n\n  \
                     Or pass --client-id / set GOOGLE_CLIENT_ID",
                    ClientConfig::default_path().display()
                )
            })?;
        crate::secret::resolve(raw).map_err(|e| format!("failed to resolve client_id: {}", e))
    }

    /// Builds the provider session configuration.
    ///
    /// The client id is resolved but not checked for placeholders here; the
    /// session manager rejects those before any network call.
    pub fn to_session_config(&self, override_id: Option<&str>) -> Result<SessionConfig, String> {
        let client_id = self.resolve_client_id(override_id)?;
        let mut config = SessionConfig::new(client_id)
            .with_timeout(Duration::from_secs(self.timeout_secs.max(1)));

        if let Some(ref path) = self.session_path {
            config = config.with_session_path(path);
        }
        if let Some([start, end]) = self.loopback_port_range {
            config = config.with_loopback_port_range(start, end);
        }

        Ok(config)
    }
}
