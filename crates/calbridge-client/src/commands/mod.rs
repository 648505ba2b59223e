//! Command implementations.

pub mod auth;
pub mod calendars;
pub mod config;
pub mod events;

use std::path::PathBuf;
use std::time::Duration;

use calbridge_providers::google::{
    CalendarGateway, CredentialStore, FileStore, SessionConfig, SessionManager,
};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// What every command needs: the loaded configuration, the file it came
/// from and the client id given on the command line, if any.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration.
    pub config: ClientConfig,
    /// `--client-id` or `GOOGLE_CLIENT_ID`.
    pub client_id: Option<String>,
    /// The configuration file in use: `--config`, `CALBRIDGE_CONFIG` or the
    /// default path.
    pub config_path: PathBuf,
}

impl Context {
    /// Creates a context for the default configuration file.
    pub fn new(config: ClientConfig, client_id: Option<String>) -> Self {
        Self {
            config,
            client_id,
            config_path: ClientConfig::default_path(),
        }
    }

    /// Uses `path` as the configuration file.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Builds the provider session configuration.
    pub fn session_config(&self) -> ClientResult<SessionConfig> {
        self.config
            .google
            .to_session_config(self.client_id.as_deref())
            .map_err(ClientError::Config)
    }

    /// Opens the session manager on the persisted session.
    pub fn session_manager(&self) -> ClientResult<SessionManager> {
        Ok(SessionManager::from_config(self.session_config()?)?)
    }

    /// Returns `calendar` or the configured default.
    pub fn calendar_id(&self, calendar: Option<String>) -> String {
        calendar.unwrap_or_else(|| self.config.google.calendar_id.clone())
    }

    /// Returns the session file path.
    pub fn session_path(&self) -> PathBuf {
        self.config
            .google
            .session_path
            .clone()
            .unwrap_or_else(SessionConfig::default_session_path)
    }

    /// Reads the persisted session without a client id.
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::open(FileStore::open(self.session_path()))
    }

    /// Builds a gateway carrying the stored token.
    pub fn gateway(&self) -> ClientResult<CalendarGateway> {
        let token = self
            .credential_store()
            .access_token()
            .ok_or_else(|| ClientError::AuthRequired("not signed in".to_string()))?;

        debug!("using stored session for calendar requests");
        let timeout = Duration::from_secs(self.config.google.timeout_secs.max(1));
        let gateway = CalendarGateway::new(timeout)?;
        gateway.set_access_token(token);
        Ok(gateway)
    }
}
