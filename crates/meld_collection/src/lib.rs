//! Collection resolver, merged caches, and cache consistency.
//!
//! A [`Collection`] is an independent configuration scope: it stores
//! [`ModSettings`](meld_mod::ModSettings) per mod (with lookup fallback to an
//! inheritance parent) and owns a derived [`ResolvedCache`] — the merged
//! redirect table and per-format structured-parameter caches produced by
//! stacking every enabled mod by priority.
//!
//! The cache is a derived artifact, never the source of truth. Every settings
//! mutation rebuilds it through the [`CollectionManager`], which publishes the
//! new cache by swapping an `Arc` snapshot: resolve calls on loader threads
//! only ever see a fully-old or fully-new cache, never a torn merge.
//!
//! # Resolution example
//!
//! ```
//! use meld_collection::{CollectionManager, ModRegistry};
//! use meld_core::GamePath;
//! use meld_meta::SyntheticDefaults;
//! use meld_mod::{Mod, ModOption};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ModRegistry::new();
//! let mut option = ModOption::new("default");
//! option.files.insert(
//!     GamePath::new("chara/a0001.mdl")?,
//!     "/mods/hats/a0001.mdl".into(),
//! );
//! registry.register(Mod {
//!     id: "hats".into(),
//!     name: "Hats".into(),
//!     default_option: option,
//!     ..Default::default()
//! })?;
//!
//! let manager = CollectionManager::new(Arc::new(registry), Arc::new(SyntheticDefaults));
//! let collection = manager.create_collection("Default")?;
//! manager.set_mod_enabled(collection.id(), "hats", true)?;
//!
//! let path = GamePath::new("chara/a0001.mdl")?;
//! let resolved = manager.resolve_file(collection.id(), &path);
//! assert_eq!(resolved.unwrap().as_str(), "/mods/hats/a0001.mdl");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod collection;
pub mod error;
pub mod persist;
pub mod registry;
pub mod resolver;

pub use cache::{Conflict, MetaCache, ResolvedCache};
pub use collection::{Collection, CollectionManager};
pub use error::{CollectionError, Result};
pub use persist::CollectionFile;
pub use registry::ModRegistry;
