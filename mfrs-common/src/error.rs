//! Errors shared by the risk service crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures outside the sync cycle itself: storage, configuration, encoding
#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or invalid setting; the message names the flag and env var
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored pie row that no longer decodes
    #[error("Stored pie {id} is corrupt: {reason}")]
    CorruptPie { id: String, reason: String },
}
