//! Error types for the Instana provider.
//!
//! Every fallible operation in the crate returns [`ProviderError`]. The
//! variants follow the taxonomy the resource handles rely on for local
//! recovery: [`ProviderError::NotFound`] is absorbed by read and delete,
//! everything else travels to the host unaltered as a [`Diagnostic`].

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while talking to Instana or mapping state.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested entity was not found (HTTP 404 or no data-source match).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// State cannot be mapped to the wire model.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network, TLS or unexpected HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A throttled write did not complete before the waiter deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A response body could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A provider configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The operation is not supported for this entity.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::InvalidConfig(msg) => msg,
            Self::Transport(msg) => msg,
            Self::Timeout(msg) => msg,
            Self::Decode(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "http client error (see Debug output)",
        }
    }

    /// Short, user-facing summary of the error kind.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource not found",
            Self::InvalidConfig(_) => "Invalid configuration",
            Self::Transport(_) => "Instana API request failed",
            Self::Timeout(_) => "Instana API request timed out",
            Self::Decode(_) => "Unexpected Instana API response",
            Self::Validation(_) => "Validation failed",
            Self::Configuration(_) => "Provider configuration error",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Unimplemented(_) => "Operation not supported",
            Self::Serialization(_) => "Serialization error",
            Self::Http(_) => "HTTP client error",
        }
    }

    /// Returns true for [`ProviderError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Convert the error into an error diagnostic for the host.
    ///
    /// The summary names the error kind, the detail carries the full message
    /// (including any structured error body returned by the platform).
    pub fn to_diagnostic(&self) -> Diagnostic {
        let detail = match self {
            Self::Serialization(err) => err.to_string(),
            Self::Http(err) => err.to_string(),
            other => other.message().to_string(),
        };
        Diagnostic::error(self.summary()).with_detail(detail)
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        err.to_diagnostic()
    }
}
