//! Mod, option group, and settings data model.
//!
//! A [`Mod`] is a named bundle of file redirects and structured-parameter
//! edits, split into selectable [`ModOption`]s: an always-active default
//! option plus ordered [`OptionGroup`]s (single-choice or multi-choice).
//! Which options are active for a given user is decided by [`ModSettings`],
//! which live *outside* the mod — one per (mod, collection) pair — so the
//! same mod can be configured differently in every collection.
//!
//! Mods are immutable to the resolution engine once loaded; edits go through
//! a separate editing surface that replaces the definition atomically.

pub mod error;
pub mod group;
pub mod mod_data;
pub mod option;
pub mod settings;

pub use error::{ModError, Result};
pub use group::{MultiGroup, MultiOption, OptionGroup, SingleGroup, MAX_MULTI_OPTIONS};
pub use mod_data::Mod;
pub use option::ModOption;
pub use settings::{ModSettings, SettingsFile};
