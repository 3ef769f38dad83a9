//! Error types for Hepple Analytics

use thiserror::Error;

/// Errors raised by a key-value storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Quota exceeded writing {key}: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur inside the tracker.
///
/// None of these cross the capture surface of [`crate::Tracker`]; they are
/// returned by the lower layers and by the explicit export/config APIs.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid TOML configuration: {0}")]
    ConfigFormat(#[from] toml::de::Error),
}
