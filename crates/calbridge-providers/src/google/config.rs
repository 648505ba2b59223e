//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Read access to calendars and events.
pub const CALENDAR_READ_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Create, change and delete events.
pub const CALENDAR_WRITE_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

/// Scopes requested on every sign-in.
pub const SIGN_IN_SCOPES: [&str; 4] = [CALENDAR_READ_SCOPE, CALENDAR_WRITE_SCOPE, "profile", "email"];

/// Google's OpenID discovery document.
pub const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";

/// Client ids shipped in sample configuration files.
const PLACEHOLDER_CLIENT_IDS: &[&str] = &[
    "YOUR_CLIENT_ID",
    "YOUR_CLIENT_ID.apps.googleusercontent.com",
    "YOUR_ID.apps.googleusercontent.com",
    "your-client-id",
    "your-google-client-id",
    "changeme",
    "您的Google客戶端ID",
];

/// Configuration for the Google session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// OAuth client identifier from Google Cloud Console.
    ///
    /// May be empty here; [`SessionConfig::client_id`] rejects it at
    /// initialization time.
    pub client_id: String,

    /// Timeout for each HTTP request.
    pub timeout: Duration,

    /// How long loading the identity client may take.
    pub load_timeout: Duration,

    /// How long to wait for the user to finish the consent screen.
    pub consent_timeout: Duration,

    /// Ports tried for the loopback redirect listener.
    pub loopback_port_range: (u16, u16),

    /// Where the identity client is loaded from.
    pub discovery_url: String,

    /// File holding the persisted session.
    ///
    /// Defaults to `~/.local/share/calbridge/session.json`.
    pub session_path: PathBuf,
}

impl SessionConfig {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default identity client load timeout in seconds.
    pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;

    /// Default consent timeout in seconds.
    pub const DEFAULT_CONSENT_TIMEOUT_SECS: u64 = 300;

    /// Creates a configuration for the given client id.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            load_timeout: Duration::from_secs(Self::DEFAULT_LOAD_TIMEOUT_SECS),
            consent_timeout: Duration::from_secs(Self::DEFAULT_CONSENT_TIMEOUT_SECS),
            loopback_port_range: (8080, 8090),
            discovery_url: GOOGLE_DISCOVERY_URL.to_string(),
            session_path: Self::default_session_path(),
        }
    }

    /// Returns the default session file path.
    pub fn default_session_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbridge")
            .join("session.json")
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the identity client load timeout.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Sets the consent timeout.
    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Sets the loopback port range.
    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    /// Sets the discovery document URL.
    pub fn with_discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = url.into();
        self
    }

    /// Sets the session file path.
    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = path.into();
        self
    }

    /// Returns the scopes requested on sign-in.
    pub fn scopes(&self) -> Vec<String> {
        SIGN_IN_SCOPES.iter().map(|s| s.to_string()).collect()
    }

    /// Returns the client id, or a configuration error if it is missing or
    /// still a placeholder.
    pub fn client_id(&self) -> ProviderResult<&str> {
        let id = self.client_id.trim();
        if id.is_empty() {
            return Err(ProviderError::configuration(
                "Google OAuth client id is not set",
            ));
        }
        if PLACEHOLDER_CLIENT_IDS
            .iter()
            .any(|placeholder| placeholder.eq_ignore_ascii_case(id))
        {
            return Err(ProviderError::configuration(format!(
                "Google OAuth client id is still the placeholder '{}'",
                id
            )));
        }
        if !id.ends_with(".apps.googleusercontent.com") {
            debug!("client id does not look like a Google OAuth client id");
        }
        Ok(id)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ProviderResult<()> {
        self.client_id()?;
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(ProviderError::configuration(
                "invalid loopback port range",
            ));
        }
        Ok(())
    }
}
