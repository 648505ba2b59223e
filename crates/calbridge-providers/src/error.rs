//! Error types for session and calendar operations.
//!
//! Every fallible operation in this crate returns [`ProviderError`]. The
//! [`ProviderErrorCode`] tells callers which class of failure they are
//! looking at; remote calendar failures also carry the HTTP status.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Client identifier missing or still a placeholder. Raised before any
    /// network activity.
    ConfigurationError,
    /// The identity provider's client could not be loaded.
    LoadFailed,
    /// Token request denied or cancelled, profile fetch rejected, or no
    /// token available for a call that needs one.
    AuthenticationFailed,
    /// The calendar API answered with a non-success status.
    RemoteError,
    /// Transport failure: connection, timeout, DNS, TLS.
    NetworkError,
    /// A response body could not be decoded.
    InvalidResponse,
    /// The operation is not allowed in the current session state.
    InvalidState,
    /// A request payload was rejected before being sent.
    InvalidRequest,
    /// Persisted session state could not be written.
    StorageError,
}

impl ProviderErrorCode {
    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::LoadFailed => "load_failed",
            Self::AuthenticationFailed => "authentication_failed",
            Self::RemoteError => "remote_error",
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::InvalidState => "invalid_state",
            Self::InvalidRequest => "invalid_request",
            Self::StorageError => "storage_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by the session or calendar layer.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// HTTP status of the failed remote call, if there was one.
    status: Option<u16>,
    /// The provider that generated this error (e.g. "google").
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            provider: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates a client load error.
    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::LoadFailed, message)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates a remote error carrying the HTTP status of the response.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RemoteError, message).with_status(status)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidState, message)
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidRequest, message)
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::StorageError, message)
    }

    /// Attaches an HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// True for a remote 401, which usually means the token expired or was
    /// revoked and the user has to sign in again.
    pub fn is_unauthorized(&self) -> bool {
        self.code == ProviderErrorCode::RemoteError && self.status == Some(401)
    }

    /// Whether repeating the same call might succeed.
    ///
    /// Informational only: nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self.code {
            ProviderErrorCode::NetworkError | ProviderErrorCode::LoadFailed => true,
            ProviderErrorCode::RemoteError => {
                matches!(self.status, Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(status) = self.status {
            write!(f, " ({})", status)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
