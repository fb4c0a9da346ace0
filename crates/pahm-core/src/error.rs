//! Core error types for pahm-core.
//!
//! Only configuration loading and session validation surface errors to
//! callers. Port-level errors (wake lock, audio, recovery storage) are caught
//! by the manager that owns the resource and turned into `bool`/no-op outcomes.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pahm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Recovery storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recovery-store errors. Always logged and swallowed inside the session.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open recovery store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Store is locked by another writer
    #[error("Recovery store is locked")]
    Locked,

    /// Stored record could not be decoded
    #[error("Corrupt recovery record: {0}")]
    Corrupt(String),

    /// Backend refused the write (quota, read-only medium, ...)
    #[error("Write rejected: {0}")]
    WriteRejected(String),
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
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Session shorter than the minimum practice length
    #[error("Session duration must be at least {min} minutes (got {got})")]
    DurationTooShort { min: u32, got: u32 },

    /// Unknown attention-matrix position
    #[error("Unknown attention position '{0}'")]
    UnknownPosition(String),
}

/// Wake-lock port errors.
#[derive(Error, Debug)]
pub enum WakeLockError {
    /// Platform has no wake-lock capability
    #[error("Wake lock is not supported on this platform")]
    Unsupported,

    /// Platform refused the request
    #[error("Wake lock request rejected: {0}")]
    Rejected(String),

    /// IO error while talking to the platform
    #[error("Wake lock IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio port errors.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output available
    #[error("Audio output is not supported")]
    Unsupported,

    /// Output device could not be resumed / opened
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),

    /// Playback of a single voice failed
    #[error("Playback failed: {0}")]
    Playback(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_message_names_minimum() {
        let err = ValidationError::DurationTooShort { min: 30, got: 10 };
        assert_eq!(
            err.to_string(),
            "Session duration must be at least 30 minutes (got 10)"
        );
    }

    #[test]
    fn storage_error_wraps_into_core_error() {
        let err: CoreError = StorageError::Locked.into();
        assert!(matches!(err, CoreError::Storage(StorageError::Locked)));
    }
}
