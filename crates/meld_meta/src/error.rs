//! Error types for codec and manipulation operations.
//!
//! The error taxonomy mirrors how failures are recovered: [`Decode`] degrades
//! one table to defaults-only, [`OutOfRange`] and [`Validation`] drop one
//! record edit, [`Capacity`] fails one specific write. None of them are ever
//! allowed to abort a whole merge.
//!
//! [`Decode`]: MetaError::Decode
//! [`OutOfRange`]: MetaError::OutOfRange
//! [`Validation`]: MetaError::Validation
//! [`Capacity`]: MetaError::Capacity

use crate::defaults::{MetaKind, TableKey};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MetaError>;

/// Errors produced by the structured-parameter codecs.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The source bytes of a table could not be decoded.
    ///
    /// The affected table degrades to "defaults only, no manipulations" for
    /// the session; other tables are unaffected.
    #[error("failed to decode {kind} table: {reason}")]
    Decode { kind: MetaKind, reason: String },

    /// A record key is outside the representable range of its table.
    #[error("{kind} {what} out of range: {value} (max {max})")]
    OutOfRange {
        kind: MetaKind,
        what: &'static str,
        value: usize,
        max: usize,
    },

    /// Growing a table would exceed its representable size.
    #[error("{kind} capacity exceeded: requested {requested}, max {max}")]
    Capacity {
        kind: MetaKind,
        requested: usize,
        max: usize,
    },

    /// A manipulation failed its kind-specific domain validation.
    #[error("invalid {kind} manipulation: {reason}")]
    Validation { kind: MetaKind, reason: String },

    /// No default bytes are available for a required table.
    #[error("no default table available for {key:?}")]
    MissingDefault { key: TableKey },

    /// Reading source bytes failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A binrw-parsed record was malformed.
    #[error("binary record error: {0}")]
    BinRw(#[from] binrw::Error),
}
