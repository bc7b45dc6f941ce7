//! Error types for the EchoCheck client

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for EchoCheck client operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or transport failure while sending a request
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server rejected the request; carries the displayable detail
    #[error("API error {status}: {detail}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Detail message from the server, or the raw body when unparseable
        detail: String,
    },

    /// Session could not be established or restored; sign-in is required
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Credential persistence failed
    #[error("Credential storage error: {0}")]
    Storage(#[from] StoreError),

    /// Response body could not be decoded
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for EchoCheck client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create an API error from a status code and server detail
    pub fn api(status: u16, detail: impl Into<String>) -> Self {
        Self::Api {
            status,
            detail: detail.into(),
        }
    }

    /// Create an authentication failure
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Map an error status to the matching variant
    ///
    /// A 401 becomes [`ClientError::AuthenticationFailed`]; every other status
    /// carries through as [`ClientError::Api`] with the server's detail.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, detail: String) -> Self {
        match status.as_u16() {
            401 => Self::AuthenticationFailed(detail),
            code => Self::Api {
                status: code,
                detail,
            },
        }
    }

    /// HTTP status carried by this error, when one exists
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error means the session is gone and sign-in is required
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}
