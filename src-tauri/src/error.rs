// Error taxonomy for the soundboard core.
// Every variant is recovered locally by the caller; none should end the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoundboardError {
    /// Serialization or write failure while persisting a record.
    #[error("Storage error for '{key}': {reason}")]
    Storage { key: String, reason: String },

    /// A persisted record could not be parsed or violates its schema.
    #[error("Malformed persisted data in '{key}': {reason}")]
    MalformedData { key: String, reason: String },

    /// Decode or playback failure reported by the media backend.
    #[error("Media error: {0}")]
    Media(String),

    /// Transfer request references a missing path or tab.
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// Reorder request is not a permutation of the current file list.
    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SoundboardResult<T> = Result<T, SoundboardError>;
