// Darkroom error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DarkroomError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hash error: {0}")]
    Hash(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Checksum mismatch after transfer (expected {expected}, got {actual})")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Geocoding error: {0}")]
    Geocode(String),

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for DarkroomError {
    fn from(err: anyhow::Error) -> Self {
        DarkroomError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DarkroomError>;
