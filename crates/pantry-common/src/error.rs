//! Error types for Pantry

use thiserror::Error;

/// Result type alias for Pantry operations
pub type Result<T> = std::result::Result<T, PantryError>;

/// Main error type for Pantry
#[derive(Error, Debug)]
pub enum PantryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
