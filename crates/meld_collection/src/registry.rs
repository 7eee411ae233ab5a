//! The ordered registry of loaded mods.

use crate::error::{CollectionError, Result};
use meld_mod::Mod;
use std::collections::HashMap;
use std::sync::Arc;

/// All mods known to the engine, in registration order.
///
/// The registration index doubles as the stable secondary sort key of the
/// merge: two mods with equal priority fold in registration order, never in
/// incidental map iteration order, so merges are reproducible across runs.
#[derive(Debug, Default)]
pub struct ModRegistry {
    mods: Vec<Arc<Mod>>,
    by_id: HashMap<String, usize>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mod, returning its registration index.
    pub fn register(&mut self, mod_data: Mod) -> Result<usize> {
        if self.by_id.contains_key(&mod_data.id) {
            return Err(CollectionError::DuplicateMod(mod_data.id));
        }
        let index = self.mods.len();
        self.by_id.insert(mod_data.id.clone(), index);
        self.mods.push(Arc::new(mod_data));
        Ok(index)
    }

    /// Look a mod up by id.
    pub fn get(&self, id: &str) -> Option<&Arc<Mod>> {
        self.by_id.get(id).map(|i| &self.mods[*i])
    }

    /// The registration index of a mod.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Iterate all mods with their registration indices, in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<Mod>)> {
        self.mods.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}
