//! Collections and the manager that keeps their caches current.

use crate::cache::ResolvedCache;
use crate::error::{CollectionError, Result};
use crate::persist::CollectionFile;
use crate::registry::ModRegistry;
use crate::resolver;
use meld_core::{FullPath, GamePath};
use meld_meta::DefaultProvider;
use meld_mod::{Mod, ModSettings};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default)]
struct RebuildState {
    rebuilding: bool,
    dirty: bool,
}

/// One independent configuration scope.
///
/// Stores per-mod settings and an optional inheritance parent. The resolved
/// cache hangs off the collection behind an `Arc` swap: readers clone the
/// handle and keep a consistent snapshot for as long as they hold it, while
/// the manager publishes replacements whole.
#[derive(Debug)]
pub struct Collection {
    id: String,
    name: String,
    settings: RwLock<HashMap<String, ModSettings>>,
    parent: RwLock<Option<String>>,
    cache: RwLock<Arc<ResolvedCache>>,
    rebuild: Mutex<RebuildState>,
}

impl Collection {
    fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            settings: RwLock::new(HashMap::new()),
            parent: RwLock::new(None),
            cache: RwLock::new(Arc::new(ResolvedCache::default())),
            rebuild: Mutex::new(RebuildState::default()),
        }
    }

    fn restore(file: CollectionFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            settings: RwLock::new(file.settings),
            parent: RwLock::new(file.parent),
            cache: RwLock::new(Arc::new(ResolvedCache::default())),
            rebuild: Mutex::new(RebuildState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The collection this one inherits unset mod settings from, if any.
    pub fn parent(&self) -> Option<String> {
        self.parent.read().clone()
    }

    /// The settings stored directly on this collection for one mod.
    ///
    /// `None` means nothing is stored here; the effective settings then come
    /// from the parent chain or the defaults.
    pub fn mod_settings(&self, mod_id: &str) -> Option<ModSettings> {
        self.settings.read().get(mod_id).cloned()
    }

    /// A consistent snapshot of the current resolved cache.
    pub fn cache(&self) -> Arc<ResolvedCache> {
        self.cache.read().clone()
    }
}

/// Owns every collection and rebuilds their caches after each mutation.
///
/// All settings mutations funnel through the manager so the cache can never
/// drift from the settings that produced it. Rebuilds are debounced per
/// collection: mutations arriving while a rebuild runs mark it dirty and the
/// running rebuild goes one more round instead of stacking.
pub struct CollectionManager {
    registry: RwLock<Arc<ModRegistry>>,
    defaults: Arc<dyn DefaultProvider>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl CollectionManager {
    pub fn new(registry: Arc<ModRegistry>, defaults: Arc<dyn DefaultProvider>) -> Self {
        Self {
            registry: RwLock::new(registry),
            defaults,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Create a collection with no stored settings and an empty cache.
    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection>> {
        let collection = Arc::new(Collection::new(name));
        info!(id = %collection.id, name, "Created collection");
        self.collections
            .write()
            .insert(collection.id.clone(), collection.clone());
        Ok(collection)
    }

    /// Look a collection up by id.
    pub fn collection(&self, id: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(id).cloned()
    }

    /// Capture a collection's persistent state for saving.
    pub fn export_collection(&self, id: &str) -> Result<CollectionFile> {
        let collection = self
            .collection(id)
            .ok_or_else(|| CollectionError::UnknownCollection(id.to_owned()))?;
        let settings = collection.settings.read().clone();
        Ok(CollectionFile {
            version: 1,
            id: collection.id.clone(),
            name: collection.name.clone(),
            parent: collection.parent(),
            settings,
        })
    }

    /// Recreate a collection from its persisted state, keeping its stored id
    /// so inheritance links to and from it reconnect.
    pub fn import_collection(&self, file: CollectionFile) -> Result<Arc<Collection>> {
        if self.collections.read().contains_key(&file.id) {
            return Err(CollectionError::DuplicateCollection(file.id));
        }
        let collection = Arc::new(Collection::restore(file));
        self.collections
            .write()
            .insert(collection.id.clone(), collection.clone());
        self.rebuild(&collection);
        // Importing this one may complete another collection's parent chain.
        self.rebuild_descendants(&collection.id);
        Ok(collection)
    }

    /// Remove a collection. Children inheriting from it fall back to their
    /// own settings and defaults on their next rebuild.
    pub fn remove_collection(&self, id: &str) -> Result<()> {
        let removed = self.collections.write().remove(id);
        if removed.is_none() {
            return Err(CollectionError::UnknownCollection(id.to_owned()));
        }
        self.rebuild_descendants(id);
        Ok(())
    }

    /// The current mod registry.
    pub fn registry(&self) -> Arc<ModRegistry> {
        self.registry.read().clone()
    }

    /// Swap in a new registry, repair stored settings against the new mod
    /// definitions, and rebuild every collection.
    pub fn set_registry(&self, registry: Arc<ModRegistry>) {
        *self.registry.write() = registry.clone();

        let collections: Vec<Arc<Collection>> =
            self.collections.read().values().cloned().collect();
        for collection in &collections {
            let mut settings = collection.settings.write();
            for (mod_id, entry) in settings.iter_mut() {
                if let Some(mod_data) = registry.get(mod_id) {
                    entry.repair(mod_data);
                }
            }
        }
        for collection in &collections {
            self.rebuild(collection);
        }
    }

    /// Enable or disable a mod in a collection.
    pub fn set_mod_enabled(&self, collection_id: &str, mod_id: &str, enabled: bool) -> Result<()> {
        self.update_settings(collection_id, mod_id, |_, settings| {
            settings.enabled = enabled;
        })
    }

    /// Set a mod's merge priority in a collection.
    pub fn set_mod_priority(&self, collection_id: &str, mod_id: &str, priority: i32) -> Result<()> {
        self.update_settings(collection_id, mod_id, |_, settings| {
            settings.priority = priority;
        })
    }

    /// Set the raw selection value for one of a mod's option groups.
    ///
    /// The value is stored as given; out-of-range selections are clamped or
    /// skipped at resolve time rather than rejected here, so settings survive
    /// a mod shrinking under them.
    pub fn set_mod_selection(
        &self,
        collection_id: &str,
        mod_id: &str,
        group_index: usize,
        selection: u32,
    ) -> Result<()> {
        self.update_settings(collection_id, mod_id, |mod_data, settings| {
            // Slots skipped over by the write keep their group's default, not
            // zero, so untouched groups still resolve as shipped.
            while settings.selections.len() <= group_index {
                let i = settings.selections.len();
                settings.selections.push(
                    mod_data
                        .groups
                        .get(i)
                        .map(|g| g.default_selection())
                        .unwrap_or(0),
                );
            }
            settings.selections[group_index] = selection;
        })
    }

    /// Set or clear a collection's inheritance parent.
    ///
    /// Rejects a parent whose own chain already leads back to this
    /// collection.
    pub fn set_inheritance(&self, collection_id: &str, parent_id: Option<&str>) -> Result<()> {
        let collection = self
            .collection(collection_id)
            .ok_or_else(|| CollectionError::UnknownCollection(collection_id.to_owned()))?;

        if let Some(parent_id) = parent_id {
            let collections = self.collections.read();
            let parent = collections
                .get(parent_id)
                .ok_or_else(|| CollectionError::UnknownCollection(parent_id.to_owned()))?;
            if parent.id == collection.id || self.chain_contains(&collections, parent, &collection.id)
            {
                return Err(CollectionError::InheritanceCycle {
                    collection: collection_id.to_owned(),
                    parent: parent_id.to_owned(),
                });
            }
        }

        *collection.parent.write() = parent_id.map(str::to_owned);
        self.rebuild(&collection);
        self.rebuild_descendants(collection_id);
        Ok(())
    }

    /// Translate a game path through a collection's current cache.
    pub fn resolve_file(&self, collection_id: &str, path: &GamePath) -> Option<FullPath> {
        let collection = self.collection(collection_id)?;
        let cache = collection.cache();
        cache.resolve(path).cloned()
    }

    /// A consistent snapshot of a collection's resolved cache.
    pub fn snapshot(&self, collection_id: &str) -> Option<Arc<ResolvedCache>> {
        Some(self.collection(collection_id)?.cache())
    }

    /// The settings a merge of this collection would use for a mod: its own
    /// stored entry, else the nearest ancestor's, else the defaults.
    pub fn effective_settings(&self, collection: &Collection, mod_data: &Mod) -> ModSettings {
        if let Some(settings) = collection.settings.read().get(&mod_data.id) {
            return settings.clone();
        }

        let collections = self.collections.read();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(collection.id.clone());
        let mut next = collection.parent.read().clone();
        while let Some(id) = next {
            if !visited.insert(id.clone()) {
                break;
            }
            let Some(ancestor) = collections.get(&id) else {
                break;
            };
            if let Some(settings) = ancestor.settings.read().get(&mod_data.id) {
                return settings.clone();
            }
            next = ancestor.parent.read().clone();
        }
        ModSettings::default_for(mod_data)
    }

    fn update_settings(
        &self,
        collection_id: &str,
        mod_id: &str,
        apply: impl FnOnce(&Mod, &mut ModSettings),
    ) -> Result<()> {
        let collection = self
            .collection(collection_id)
            .ok_or_else(|| CollectionError::UnknownCollection(collection_id.to_owned()))?;
        let registry = self.registry();
        let mod_data = registry
            .get(mod_id)
            .ok_or_else(|| CollectionError::UnknownMod(mod_id.to_owned()))?;

        {
            let mut settings = collection.settings.write();
            let entry = settings
                .entry(mod_id.to_owned())
                .or_insert_with(|| ModSettings::default_for(mod_data));
            apply(mod_data, entry);
        }

        self.rebuild(&collection);
        self.rebuild_descendants(collection_id);
        Ok(())
    }

    /// Rebuild one collection's cache, debounced.
    ///
    /// If a rebuild is already running, mark it dirty and return; the running
    /// rebuild loops until it finishes a round with no mutation behind it, so
    /// the published cache always reflects the latest settings.
    fn rebuild(&self, collection: &Arc<Collection>) {
        {
            let mut state = collection.rebuild.lock();
            if state.rebuilding {
                state.dirty = true;
                return;
            }
            state.rebuilding = true;
        }

        loop {
            let registry = self.registry();
            let cache = resolver::resolve(
                &registry,
                |mod_data| self.effective_settings(collection, mod_data),
                self.defaults.as_ref(),
            );
            *collection.cache.write() = Arc::new(cache);

            let mut state = collection.rebuild.lock();
            if state.dirty {
                state.dirty = false;
            } else {
                state.rebuilding = false;
                return;
            }
        }
    }

    /// Rebuild every collection whose inheritance chain passes through `id`.
    fn rebuild_descendants(&self, id: &str) {
        let affected: Vec<Arc<Collection>> = {
            let collections = self.collections.read();
            collections
                .values()
                .filter(|c| c.id != id && self.chain_contains(&collections, c, id))
                .cloned()
                .collect()
        };
        for collection in affected {
            self.rebuild(&collection);
        }
    }

    /// Whether `start`'s parent chain reaches the collection with `target` id.
    fn chain_contains(
        &self,
        collections: &HashMap<String, Arc<Collection>>,
        start: &Collection,
        target: &str,
    ) -> bool {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.id.clone());
        let mut next = start.parent.read().clone();
        while let Some(id) = next {
            if id == target {
                return true;
            }
            if !visited.insert(id.clone()) {
                return false;
            }
            let Some(ancestor) = collections.get(&id) else {
                return false;
            };
            next = ancestor.parent.read().clone();
        }
        false
    }
}
