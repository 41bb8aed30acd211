//! Error types for audit-relay

use thiserror::Error;

/// Errors that can occur in the audit query protocol
#[derive(Debug, Error)]
pub enum AuditError {
    /// Provider connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Publish failure
    #[error("Failed to publish to subject '{subject}': {reason}")]
    Publish {
        subject: String,
        reason: String,
    },

    /// Subscribe failure
    #[error("Failed to subscribe to subject '{subject}': {reason}")]
    Subscribe {
        subject: String,
        reason: String,
    },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Audit store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Record not found
    #[error("Audit record not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Provider not supported or not available
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Result type alias for audit query operations
pub type Result<T> = std::result::Result<T, AuditError>;
