//! Error types for blushproof.
//!
//! This module defines all error types used throughout the blushproof crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for blushproof operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Categorization Errors ===
    /// A lookup key could not be derived from a domain or query. The input
    /// itself is left out so digest-mode hosts never reach the logs.
    #[error("failed to derive key: {message}")]
    KeyDerivation {
        /// Description of what went wrong.
        message: String,
    },

    /// The store was written with digest keys and cannot be read as plaintext.
    #[error("store uses {stored} keys and cannot be opened in {requested} mode")]
    KeyModeDowngrade {
        /// Key mode recorded in the store.
        stored: String,
        /// Key mode requested by the configuration.
        requested: String,
    },

    /// A category label is not well formed.
    #[error("invalid category label '{label}'")]
    InvalidCategory {
        /// The rejected label.
        label: String,
    },

    /// A shipped list could not be read or contains bad entries.
    #[error("invalid shipped list {name}: {message}")]
    InvalidList {
        /// Which list (file path or built-in name).
        name: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Bloom filter parameters or encoding are invalid.
    #[error("invalid bloom filter: {0}")]
    InvalidBloom(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for blushproof operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a key derivation error.
    #[must_use]
    pub fn key_derivation(message: impl Into<String>) -> Self {
        Self::KeyDerivation {
            message: message.into(),
        }
    }

    /// Create a shipped list error.
    #[must_use]
    pub fn invalid_list(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidList {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a bloom filter error.
    #[must_use]
    pub fn invalid_bloom(message: impl Into<String>) -> Self {
        Self::InvalidBloom(message.into())
    }

    /// Check if this error comes from loading or validating configuration.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } | Self::KeyModeDowngrade { .. }
        )
    }
}
