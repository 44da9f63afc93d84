//! Error types for hearingrecorder.
//!
//! Every fallible operation in the crate returns [`Result`]. The two core
//! operations (recording and reading hearing tests) surface exactly two
//! failure shapes to callers: [`Error::AuthenticationMissing`] and
//! [`Error::Store`]. The remaining variants belong to the local service,
//! configuration and CLI plumbing.

use std::path::PathBuf;
use thiserror::Error;

/// Message reported when no authenticated user can be resolved.
pub const NOT_AUTHENTICATED: &str = "User not authenticated";

/// The main error type for hearingrecorder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Core Operation Errors ===
    /// No valid session or identifiable user at call time.
    #[error("{msg}", msg = NOT_AUTHENTICATED)]
    AuthenticationMissing,

    /// The data service reported a failure. The message is shown verbatim.
    #[error("{message}")]
    Store {
        /// Message reported by the data service.
        message: String,
    },

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

    // === Input Errors ===
    /// A caller-supplied value could not be used.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

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

/// A specialized Result type for hearingrecorder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a store error carrying the service's message.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Collapse any error into the store-failure shape.
    ///
    /// Authentication and store errors pass through unchanged; everything
    /// else keeps its display text as the store message.
    #[must_use]
    pub fn into_store(self) -> Self {
        match self {
            Self::AuthenticationMissing | Self::Store { .. } => self,
            other => Self::store(other.to_string()),
        }
    }

    /// Check if this error means the caller is not authenticated.
    #[must_use]
    pub fn is_authentication_missing(&self) -> bool {
        matches!(self, Self::AuthenticationMissing)
    }

    /// Check if this error came from the data service.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}
