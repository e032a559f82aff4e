// src/error.rs
// Standardized error types for the server

use thiserror::Error;

/// Main error type for the library.
///
/// Clone lets cache single-flight waiters each receive the loader's error.
#[derive(Error, Debug, Clone)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HubSpot credentials rejected: {0}")]
    Auth(String),

    #[error("invalid request: {0}")]
    Client(String),

    #[error("transient upstream failure: {message}")]
    Transient {
        message: String,
        /// Seconds to wait before retrying, when the upstream said so (429)
        retry_after: Option<u64>,
    },

    #[error("{what} not found: {reason}")]
    NotFound { what: String, reason: String },

    #[error("index not ready: {0}")]
    NotReady(String),

    #[error("{0} is disabled")]
    Disabled(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("operation canceled")]
    Canceled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Result using ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn config(msg: impl Into<String>) -> Self {
        ServerError::Config(msg.into())
    }

    pub fn client(msg: impl Into<String>) -> Self {
        ServerError::Client(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        ServerError::Transient {
            message: msg.into(),
            retry_after: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ServerError::Internal(msg.into())
    }

    /// Stable machine-readable kind, carried alongside the user-facing
    /// message in structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Config(_) => "config_error",
            ServerError::Auth(_) => "auth_error",
            ServerError::Client(_) => "client_error",
            ServerError::Transient { .. } => "transient_error",
            ServerError::NotFound { .. } => "not_found",
            ServerError::NotReady(_) => "not_ready",
            ServerError::Disabled(_) => "disabled",
            ServerError::Timeout(_) => "timeout",
            ServerError::Canceled => "canceled",
            ServerError::Internal(_) => "internal",
        }
    }

    /// Convert to a user-facing string for tool boundaries
    pub fn to_user_string(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServerError::Transient {
                message: format!("request timed out: {err}"),
                retry_after: None,
            }
        } else if err.is_connect() {
            ServerError::Transient {
                message: format!("connection failed: {err}"),
                retry_after: None,
            }
        } else {
            ServerError::Transient {
                message: err.to_string(),
                retry_after: None,
            }
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Internal(format!("JSON serialization error: {err}"))
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            ServerError::Canceled
        } else {
            ServerError::Internal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(ServerError::client("x").kind(), "client_error");
        assert_eq!(ServerError::transient("x").kind(), "transient_error");
        let not_found = ServerError::NotFound {
            what: "Deal".into(),
            reason: "no exact match".into(),
        };
        assert_eq!(not_found.kind(), "not_found");
        assert_eq!(ServerError::Timeout(60).kind(), "timeout");
    }

    #[test]
    fn test_display_messages() {
        let err = ServerError::Disabled("embeddings".into());
        assert_eq!(err.to_string(), "embeddings is disabled");

        let err = ServerError::Transient {
            message: "rate limited".into(),
            retry_after: Some(10),
        };
        assert!(err.to_string().contains("rate limited"));
    }
}
