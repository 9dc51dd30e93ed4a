//! Core error types for studysync-core.
//!
//! This module defines the error hierarchy using thiserror. Remote and
//! device failures are always recoverable at the session level; the
//! variants here exist so callers can log them and pick a fallback.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studysync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote model call failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Camera or audio device failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Row not found
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Could not resolve the data directory
    #[error("Cannot resolve data directory: {0}")]
    DataDir(String),

    /// Credential store failure
    #[error("Keyring error: {0}")]
    Keyring(String),
}

/// Errors from the hosted model.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No API key in the environment or keyring
    #[error("No Gemini API key configured (set GEMINI_API_KEY or run `studysync auth set-key`)")]
    MissingApiKey,

    /// Connection or protocol failure
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request exceeded its deadline
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Camera errors.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Access to the device was refused
    #[error("Could not access camera: permission denied ({0})")]
    PermissionDenied(String),

    /// Device missing or not opened
    #[error("Camera unavailable: {0}")]
    Unavailable(String),

    /// A single frame could not be read
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Out of bounds
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        ConfigError::Keyring(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
