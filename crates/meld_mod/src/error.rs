//! Error types for mod definition and settings handling.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ModError>;

/// Errors that can occur loading or saving mod definitions and settings.
#[derive(Error, Debug)]
pub enum ModError {
    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mod definition is structurally invalid.
    #[error("invalid mod definition: {0}")]
    InvalidDefinition(String),
}
