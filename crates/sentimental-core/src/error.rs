//! Error types for the Sentimental application.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The user-facing error taxonomy.
///
/// Every [`SentimentalError`] collapses into one of these kinds at the
/// controller boundary, which decides how the failure is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A gated action was attempted without a usable session.
    AuthRequired,
    /// The session exists but does not own the target.
    AccessDenied,
    /// Required input was missing or malformed.
    ValidationError,
    /// The generation backend failed to produce content.
    GenerationFailure,
    /// The referenced story or format does not exist (yet).
    NotFound,
    /// A collaborator could not be reached or did not answer in time.
    TransientNetwork,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "AUTH_REQUIRED",
            ErrorKind::AccessDenied => "ACCESS_DENIED",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::GenerationFailure => "GENERATION_FAILURE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::TransientNetwork => "TRANSIENT_NETWORK",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared error type for the entire Sentimental application.
///
/// Collaborators (auth, content store, generation) and the infrastructure
/// layer all report failures through this type. It is `Clone` so that a
/// single in-flight result can be handed to several waiting callers.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SentimentalError {
    /// No usable session for a gated action
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Caller is signed in but is not the owner
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource already exists (e.g. email already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The language model call failed or returned nothing usable
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Collaborator unreachable, timed out, or answered with a 5xx
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentimentalError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::AuthRequired(message.into())
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::TransientNetwork(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Classification
    // ============================================================================

    /// Maps this error onto the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthRequired(_) | Self::Unauthorized(_) => ErrorKind::AuthRequired,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Validation(_) | Self::Conflict(_) => ErrorKind::ValidationError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Generation(_) => ErrorKind::GenerationFailure,
            Self::TransientNetwork(_)
            | Self::Io { .. }
            | Self::Serialization { .. }
            | Self::Config(_)
            | Self::Internal(_) => ErrorKind::TransientNetwork,
        }
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the message without the variant prefix.
    ///
    /// Server-provided messages are carried here untouched so the UI can
    /// show them verbatim.
    pub fn message(&self) -> String {
        match self {
            Self::AuthRequired(m)
            | Self::AccessDenied(m)
            | Self::Validation(m)
            | Self::Conflict(m)
            | Self::Unauthorized(m)
            | Self::Generation(m)
            | Self::TransientNetwork(m)
            | Self::Config(m)
            | Self::Internal(m) => m.clone(),
            Self::Io { message } | Self::Serialization { message, .. } => message.clone(),
            Self::NotFound { entity_type, id } => format!("{entity_type} '{id}' not found"),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SentimentalError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SentimentalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SentimentalError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SentimentalError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (binary edge only)
impl From<anyhow::Error> for SentimentalError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, SentimentalError>`.
pub type Result<T> = std::result::Result<T, SentimentalError>;
