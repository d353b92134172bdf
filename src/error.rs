//! Protocol-facing error type.
//!
//! Handlers return [`ProviderError`]; the server reports it to the host as an
//! error diagnostic. Graph failures arrive through `From<GraphError>`, which
//! picks the variant from the HTTP status.

use thiserror::Error;

/// Errors surfaced to the host as diagnostics.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The Graph object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configuration or state failed a provider check.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unexpected provider-side failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The provider is unconfigured or misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No handler is registered for the type name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A payload was not valid JSON or did not match the state shape.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Graph reported a conflict, e.g. a duplicate mail nickname.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Authentication or authorization failed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Throttled past the retry budget.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Graph or the network is unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation does not fit the current remote state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The operation is not supported.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The request itself is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
