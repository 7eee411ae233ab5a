//! Structured binary-parameter codecs and the manipulation model.
//!
//! The game ships a handful of sparse, bit-packed parameter tables that mods
//! want to edit record-by-record: equipment parameters (EQP), per-race model
//! visibility (EQDP), visor gimmicks (GMP), extra skeleton ids (EST), variant
//! parameters (IMC), and racial scaling floats (RSP). This crate provides:
//!
//! - One codec per format ([`EqpFile`], [`GmpFile`], [`EqdpFile`], [`EstFile`],
//!   [`ImcFile`], [`RspFile`]): decode from the shipped default bytes, read
//!   and write individual records, and re-serialize byte-for-byte compatible
//!   output with collapsed regions recompacted.
//! - The manipulation model ([`MetaManipulation`]): a closed tagged union of
//!   single-record overrides, identified by kind-specific composite keys
//!   ([`MetaIdentifier`]) and collected into first-insert-wins sets
//!   ([`MetaManipulationSet`]).
//! - The [`DefaultProvider`] seam through which default table bytes reach the
//!   codecs — an explicit dependency, never a global.
//!
//! Decode failures degrade a single table to "defaults only"; out-of-range
//! writes fail that one write. Neither aborts anything wider, so one broken
//! table can never take the rest of the engine down with it.

pub mod defaults;
pub mod eqdp;
pub mod eqp_gmp;
pub mod error;
pub mod est;
pub mod imc;
pub mod manipulation;
pub mod rsp;

pub use defaults::{DefaultProvider, ImcKey, MetaKind, StaticDefaults, SyntheticDefaults, TableKey};
pub use eqdp::{EqdpEntry, EqdpFile};
pub use eqp_gmp::{EqpEntry, EqpFile, GmpEntry, GmpFile, EQP_BLOCK_COUNT, EQP_BLOCK_SIZE};
pub use error::{MetaError, Result};
pub use est::{EstFile, EstKey};
pub use imc::{ImcEntry, ImcFile};
pub use manipulation::{
    EqdpManipulation, EqpManipulation, EstManipulation, GmpManipulation, ImcManipulation,
    MetaIdentifier, MetaManipulation, MetaManipulationSet, RspManipulation,
};
pub use rsp::{RspFile, RSP_ENTRY_SIZE};
