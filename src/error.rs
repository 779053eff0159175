//! Error types for aya-client

use thiserror::Error;

use crate::infra::lsp::protocol::{ResponseError, error_codes};
use crate::models::session::SessionState;

pub type AyaResult<T> = std::result::Result<T, AyaError>;

#[derive(Debug, Error)]
pub enum AyaError {
    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    #[error("{0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to spawn language server '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Failed to connect to language server at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Language server session is not ready (state: {state})")]
    NotReady { state: SessionState },

    #[error("Cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("Server error [{code}]: {message}")]
    Backend { code: i32, message: String },

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Language server terminated unexpectedly")]
    Terminated,

    #[error("{0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    pub fn spawn(program: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Spawn {
            program: program.into(),
            reason: reason.to_string(),
        }
    }

    pub fn connect(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn error_code(&self) -> i32 {
        match self {
            Self::Backend { code, .. } => *code,
            Self::Terminated => error_codes::SERVER_TERMINATED,
            Self::Cancelled(_) => error_codes::REQUEST_CANCELLED,
            Self::NotReady { .. } => error_codes::SERVER_NOT_INITIALIZED,
            Self::Timeout(_) => -32001,
            _ => -32000,
        }
    }

    /// Errors that end the current connection attempt rather than one request
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::Connect { .. } | Self::Terminated | Self::Io(_)
        )
    }

    /// A manual restart may fix this
    pub fn needs_restart(&self) -> bool {
        self.is_transport_failure() || matches!(self, Self::NotReady { .. })
    }
}

impl From<ResponseError> for SessionError {
    fn from(err: ResponseError) -> Self {
        match err.code {
            error_codes::SERVER_TERMINATED => Self::Terminated,
            error_codes::REQUEST_CANCELLED => Self::Cancelled(err.message),
            code => Self::Backend {
                code,
                message: err.message,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Aya language server is disabled")]
    Disabled,

    #[error("Cannot find aya language server")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures reported by the editor host capabilities
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Document is not open: {0}")]
    UnknownDocument(String),

    #[error("Failed to save {uri}: {reason}")]
    Save { uri: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_mapping() {
        let backend: SessionError = ResponseError {
            code: error_codes::INTERNAL_ERROR,
            message: "no term at position".to_string(),
            data: None,
        }
        .into();
        assert!(matches!(
            backend,
            SessionError::Backend { code: -32603, ref message } if message == "no term at position"
        ));
        assert!(!backend.needs_restart());

        let terminated: SessionError = ResponseError {
            code: error_codes::SERVER_TERMINATED,
            message: "gone".to_string(),
            data: None,
        }
        .into();
        assert!(matches!(terminated, SessionError::Terminated));
        assert!(terminated.needs_restart());
    }

    #[test]
    fn test_not_ready_display_names_state() {
        let err = SessionError::NotReady {
            state: SessionState::Failed,
        };
        assert!(err.to_string().contains("failed"));
        assert_eq!(err.error_code(), error_codes::SERVER_NOT_INITIALIZED);
    }

    #[test]
    fn test_transport_failures() {
        assert!(SessionError::spawn("aya-lsp", "No such file").is_transport_failure());
        assert!(SessionError::connect("localhost:11451", "refused").is_transport_failure());
        assert!(!SessionError::Cancelled("restart".into()).is_transport_failure());
    }

    #[test]
    fn test_discovery_messages() {
        assert_eq!(
            DiscoveryError::Disabled.to_string(),
            "Aya language server is disabled"
        );
        assert_eq!(
            DiscoveryError::NotFound.to_string(),
            "Cannot find aya language server"
        );
    }
}
