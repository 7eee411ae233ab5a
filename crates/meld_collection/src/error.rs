//! Error types for collection management.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Errors that can occur while managing collections and their settings.
///
/// Note that *merging* never returns these: per-mod problems during a merge
/// are recovered locally (the contribution is skipped and logged). These
/// errors cover the management surface only.
#[derive(Error, Debug)]
pub enum CollectionError {
    /// No collection with the given id exists.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// No registered mod with the given id exists.
    #[error("unknown mod: {0}")]
    UnknownMod(String),

    /// A mod with the same id is already registered.
    #[error("duplicate mod id: {0}")]
    DuplicateMod(String),

    /// A collection with the same id already exists.
    #[error("duplicate collection id: {0}")]
    DuplicateCollection(String),

    /// Setting the requested inheritance parent would create a cycle.
    #[error("inheritance cycle: {collection} -> {parent}")]
    InheritanceCycle { collection: String, parent: String },

    /// Filesystem I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
