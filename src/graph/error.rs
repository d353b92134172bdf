//! Error types for the Microsoft Graph client.

use thiserror::Error;

use crate::error::ProviderError;

/// Result type alias using [`GraphError`].
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur when talking to Microsoft Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph answered with a non-success status.
    #[error("Graph API error ({status}): {code} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// OData error code, e.g. `Request_ResourceNotFound`.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Token acquisition failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Throttling or transient failures outlasted the retry budget.
    #[error("Maximum retries ({attempts}) exceeded, last status {status}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Status of the last response.
        status: u16,
    },
}

impl GraphError {
    /// HTTP status associated with the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::RetriesExhausted { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether Graph reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<GraphError> for ProviderError {
    fn from(err: GraphError) -> Self {
        let message = err.to_string();
        match &err {
            GraphError::Auth(_) => ProviderError::PermissionDenied(message),
            GraphError::Json(_) => ProviderError::Internal(message),
            GraphError::RetriesExhausted { status: 429, .. } => {
                ProviderError::ResourceExhausted(message)
            },
            GraphError::RetriesExhausted { .. } => ProviderError::Unavailable(message),
            GraphError::Http(e) if e.is_timeout() => ProviderError::DeadlineExceeded(message),
            GraphError::Http(_) => ProviderError::Unavailable(message),
            GraphError::Api { status, .. } => match *status {
                400 | 422 => ProviderError::InvalidRequest(message),
                401 | 403 => ProviderError::PermissionDenied(message),
                404 => ProviderError::NotFound(message),
                409 => ProviderError::AlreadyExists(message),
                412 => ProviderError::FailedPrecondition(message),
                429 => ProviderError::ResourceExhausted(message),
                501 => ProviderError::Unimplemented(message),
                s if s >= 500 => ProviderError::Unavailable(message),
                _ => ProviderError::Internal(message),
            },
        }
    }
}
