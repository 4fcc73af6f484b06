//! Error types for the pharmrev_core library.

use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pharmrev_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rating outside the Again/Hard/Good/Easy range (1..=4)
    #[error("Invalid rating {0}: expected 1 (Again), 2 (Hard), 3 (Good) or 4 (Easy)")]
    InvalidRating(u8),

    /// No card with this id belongs to the requesting owner
    #[error("Card not found: {0}")]
    CardNotFound(Uuid),

    /// Card fields rejected on creation
    #[error("Invalid card: {0}")]
    InvalidCard(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Card store error (corrupt snapshot, bad layout)
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by caller input rather than storage
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidRating(_) | Error::InvalidCard(_))
    }
}
