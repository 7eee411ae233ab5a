//! Core shared types for the meld mod resolution engine.
//!
//! This crate holds the primitives every other meld crate speaks in:
//!
//! - [`GamePath`] — normalized, case-insensitive virtual asset paths used as
//!   redirect lookup keys
//! - [`FullPath`] — absolute filesystem paths that redirects resolve to
//! - Domain enums for the structured-parameter formats: [`GenderRace`],
//!   [`SubRace`], [`EquipSlot`], [`ObjectType`], [`EstType`], [`RspAttribute`]
//!
//! All types here are plain data: no I/O, no global state.

pub mod error;
pub mod game_path;
pub mod race;
pub mod slot;

pub use error::{CoreError, Result};
pub use game_path::{FullPath, GamePath, MAX_GAME_PATH_LEN};
pub use race::{Gender, GenderRace, RspAttribute, SubRace, SUB_RACE_COUNT};
pub use slot::{EquipSlot, EstType, ObjectType};
