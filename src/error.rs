//! Error types for the Instatus provider.

use thiserror::Error;

use crate::client::ApiError;

/// Errors that can occur while configuring the provider or reconciling resources.
///
/// Only two kinds carry meaning for the host: configuration errors, which are
/// fatal to the whole session, and remote errors, which are surfaced with the
/// attempted operation and never retried. The remaining variants describe
/// malformed input handed to the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A call against the Instatus API failed.
    #[error("{operation}: {source}")]
    Remote {
        /// Human-readable description of the attempted operation.
        operation: String,
        /// The error returned by the remote client, unmodified.
        #[source]
        source: ApiError,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),
}

impl ProviderError {
    /// Wrap a remote client error with a description of the attempted operation.
    pub fn remote(operation: impl Into<String>, source: ApiError) -> Self {
        Self::Remote {
            operation: operation.into(),
            source,
        }
    }

    /// Get the error message as a string.
    ///
    /// For remote errors this is the operation description; the underlying
    /// client error is available through [`std::error::Error::source`].
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg) => msg,
            Self::Validation(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Remote { operation, .. } => operation,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Sdk(msg) => msg,
        }
    }

    /// Whether this error was raised before any remote call, while resolving
    /// provider configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The remote client error, if this error came from the Instatus API.
    pub fn remote_source(&self) -> Option<&ApiError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}
