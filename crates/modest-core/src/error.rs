//! Error types for the core library.

use thiserror::Error;

use crate::account::ValidationError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration key is not a legal key.
    #[error("Invalid configuration key: {0}")]
    InvalidKey(String),

    /// A stored value has a different type than the one requested.
    #[error("Type mismatch for {key}: expected {expected}")]
    TypeMismatch {
        /// The offending key.
        key: String,
        /// The requested value type.
        expected: &'static str,
    },

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account already exists.
    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// A server account failed validation.
    #[error("Invalid server account {name}: {}", join_messages(errors))]
    InvalidServerAccount {
        /// Server account name.
        name: String,
        /// Every problem found.
        errors: Vec<ValidationError>,
    },

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::account::credentials::CredentialError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join(", ")
}
