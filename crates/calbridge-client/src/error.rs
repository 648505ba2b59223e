//! Client error types.

use std::fmt;

use calbridge_providers::{ProviderError, ProviderErrorCode};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Invalid command-line input.
    InvalidInput(String),
    /// Provider error.
    Provider(ProviderError),
    /// IO error.
    Io(std::io::Error),
    /// Authentication required.
    AuthRequired(String),
}

impl ClientError {
    /// Exit code for this error: 2 for bad input, 3 when sign-in is needed,
    /// 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidInput(_) => 2,
            Self::AuthRequired(_) => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            Self::Provider(err) if err.is_retryable() => {
                write!(f, "{}\nThis may be temporary; try again.", err)
            }
            Self::Provider(err) => write!(f, "{}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::AuthRequired(msg) => write!(
                f,
                "authentication required: {}\nRun `calbridge auth login` to sign in.",
                msg
            ),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        if err.is_unauthorized() {
            return Self::AuthRequired("the stored session was rejected".to_string());
        }
        match err.code() {
            ProviderErrorCode::ConfigurationError => Self::Config(err.message().to_string()),
            ProviderErrorCode::InvalidRequest => Self::InvalidInput(err.message().to_string()),
            _ => Self::Provider(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_becomes_auth_required() {
        let err = ClientError::from(ProviderError::remote(401, "Invalid Credentials"));
        assert!(matches!(err, ClientError::AuthRequired(_)));
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("calbridge auth login"));
    }

    #[test]
    fn configuration_error_becomes_config() {
        let err = ClientError::from(ProviderError::configuration("client id is not set"));
        assert!(matches!(err, ClientError::Config(_)));
        assert_eq!(err.to_string(), "configuration error: client id is not set");
    }

    #[test]
    fn invalid_draft_becomes_invalid_input() {
        let err = ClientError::from(ProviderError::invalid_request("event end precedes its start"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn other_remote_errors_keep_status() {
        let err = ClientError::from(ProviderError::remote(404, "Not Found").with_provider("google"));
        assert_eq!(err.to_string(), "[google] remote_error (404): Not Found");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn retryable_errors_suggest_trying_again() {
        let err = ClientError::from(ProviderError::remote(503, "Backend Error"));
        assert!(err.to_string().ends_with("try again."));

        let err = ClientError::from(ProviderError::network("connection failed"));
        assert!(err.to_string().contains("try again"));

        let err = ClientError::from(ProviderError::remote(403, "Forbidden"));
        assert!(!err.to_string().contains("try again"));
    }
}
