//! Error types for the Fastly provider.
//!
//! Two layers:
//!
//! - [`ClientError`] is what the remote API client returns. It only knows
//!   about HTTP statuses and transport failures.
//! - [`ProviderError`] is what every resource operation returns. Client
//!   errors are wrapped unchanged so the status survives all the way to the
//!   host.
//!
//! Both classify into an [`ErrorKind`], which is the taxonomy the
//! reconciliation code branches on (404 tolerance on delete, ID clearing on
//! read).

use thiserror::Error;

use crate::schema::Diagnostic;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 404. Success on delete paths, "resource gone" on read paths.
    NotFound,
    /// Any other 4xx, or a local validation failure. Fatal, never retried.
    ValidationFailed,
    /// Network failures, 5xx and anything unclassified. Fatal, never retried.
    TransientOrUnknown,
}

/// Errors returned by a [`FastlyClient`](crate::client::FastlyClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error detail returned by the API.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Build an HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a 404 response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(404, message)
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { status: 404, .. } => ErrorKind::NotFound,
            Self::Http { status, .. } if (400..500).contains(status) => {
                ErrorKind::ValidationFailed
            },
            _ => ErrorKind::TransientOrUnknown,
        }
    }

    /// Whether the API reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Errors that can occur while running a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A required attribute was absent from configuration or state.
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote API rejected a call.
    #[error("Fastly API error: {0}")]
    Api(#[from] ClientError),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::MissingAttribute(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Api(err) => err.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(err) => err.kind(),
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_)
            | Self::Configuration(_)
            | Self::MissingAttribute(_)
            | Self::FailedPrecondition(_)
            | Self::InvalidRequest(_) => ErrorKind::ValidationFailed,
            _ => ErrorKind::TransientOrUnknown,
        }
    }

    /// Whether this error is a 404 from the API (or a local not-found).
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        let summary = match err.kind() {
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::ValidationFailed => "Invalid configuration",
            ErrorKind::TransientOrUnknown => "Fastly request failed",
        };
        let diagnostic = Diagnostic::error(summary).with_detail(err.to_string());
        match err {
            ProviderError::MissingAttribute(attr) => diagnostic.with_attribute(attr),
            _ => diagnostic,
        }
    }
}

/// Treat a 404 as success. Used on every delete path.
pub fn ignore_not_found(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(err) if err.is_not_found() => {
            tracing::debug!(error = %err, "Delete target already gone");
            Ok(())
        },
        other => other,
    }
}
