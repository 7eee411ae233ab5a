//! Error types for core type construction.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors produced when constructing core domain types from raw values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A game path exceeded the maximum representable length.
    #[error("game path too long: {length} bytes (max {max})")]
    PathTooLong { length: usize, max: usize },

    /// A gender-race code is not one of the known codes.
    #[error("unknown gender-race code: {0}")]
    InvalidGenderRace(u16),

    /// A sub-race index is outside the fixed sub-race table.
    #[error("sub-race index out of range: {0}")]
    InvalidSubRace(u8),

    /// A numeric slot code does not name a known equipment slot.
    #[error("unknown equip slot code: {0}")]
    InvalidSlot(u8),

    /// A numeric object type code does not name a known object type.
    #[error("unknown object type code: {0}")]
    InvalidObjectType(u8),
}
