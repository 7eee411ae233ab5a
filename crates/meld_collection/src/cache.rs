//! Merged caches derived from a collection's enabled mods.

use meld_core::{EstType, FullPath, GamePath, GenderRace};
use meld_meta::{
    DefaultProvider, EqdpFile, EqpFile, EstFile, EstKey, GmpFile, ImcFile, ImcKey, MetaError,
    MetaManipulation, MetaManipulationSet, RspFile, TableKey,
};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// One game path claimed by more than one contribution.
///
/// The winner is the contribution that reached the path first in fold order;
/// losers follow in fold order. Recorded during the merge so a UI can show
/// which mod actually provides each contested file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: GamePath,
    pub winner: String,
    pub losers: Vec<String>,
}

/// The patched structured-parameter tables of one resolved collection.
///
/// Tables are built lazily: only formats some winning manipulation touches
/// are decoded from the default provider and patched. A table whose default
/// image fails to decode degrades to defaults-only; the edits aimed at it are
/// dropped with a logged reason and every other table is unaffected.
#[derive(Debug, Default)]
pub struct MetaCache {
    manipulations: MetaManipulationSet,
    eqp: Option<EqpFile>,
    gmp: Option<GmpFile>,
    eqdp: HashMap<(GenderRace, bool), EqdpFile>,
    est: HashMap<EstType, EstFile>,
    imc: HashMap<ImcKey, ImcFile>,
    rsp: Option<RspFile>,
}

impl MetaCache {
    /// Decode the touched tables and apply the winning manipulations.
    ///
    /// Never fails as a whole: a missing or undecodable default image, an
    /// out-of-range key, or a capacity overflow each drop only the affected
    /// edits (or table) with a warning.
    pub fn build(manipulations: MetaManipulationSet, defaults: &dyn DefaultProvider) -> Self {
        let mut cache = MetaCache {
            manipulations,
            ..MetaCache::default()
        };
        let mut failed: HashSet<TableKey> = HashSet::new();

        // Clone the entry list so the set stays borrowable while we patch.
        let entries: Vec<MetaManipulation> = cache.manipulations.iter().copied().collect();
        for manipulation in entries {
            let key = manipulation.table_key();
            if failed.contains(&key) {
                continue;
            }
            if let Err(err) = cache.apply(&manipulation, &key, defaults, &mut failed) {
                warn!("Dropping manipulation for {key:?}: {err}");
            }
        }
        cache
    }

    fn apply(
        &mut self,
        manipulation: &MetaManipulation,
        key: &TableKey,
        defaults: &dyn DefaultProvider,
        failed: &mut HashSet<TableKey>,
    ) -> meld_meta::Result<()> {
        match *manipulation {
            MetaManipulation::Eqp(m) => {
                if self.eqp.is_none() {
                    match Self::decode(key, defaults, EqpFile::new) {
                        Ok(file) => self.eqp = Some(file),
                        Err(err) => {
                            warn!("Table {key:?} degrades to defaults: {err}");
                            failed.insert(*key);
                            return Ok(());
                        }
                    }
                }
                if let Some(file) = self.eqp.as_mut() {
                    file.set_slot(m.set_id, m.slot, m.entry)?;
                }
            }
            MetaManipulation::Gmp(m) => {
                if self.gmp.is_none() {
                    match Self::decode(key, defaults, GmpFile::new) {
                        Ok(file) => self.gmp = Some(file),
                        Err(err) => {
                            warn!("Table {key:?} degrades to defaults: {err}");
                            failed.insert(*key);
                            return Ok(());
                        }
                    }
                }
                if let Some(file) = self.gmp.as_mut() {
                    file.set(m.set_id, m.entry)?;
                }
            }
            MetaManipulation::Eqdp(m) => {
                let accessory = m.slot.is_accessory();
                let map_key = (m.gender_race, accessory);
                if !self.eqdp.contains_key(&map_key) {
                    match Self::decode(key, defaults, |bytes| {
                        EqdpFile::new(m.gender_race, accessory, bytes)
                    }) {
                        Ok(file) => {
                            self.eqdp.insert(map_key, file);
                        }
                        Err(err) => {
                            warn!("Table {key:?} degrades to defaults: {err}");
                            failed.insert(*key);
                            return Ok(());
                        }
                    }
                }
                if let Some(file) = self.eqdp.get_mut(&map_key) {
                    file.set_slot(m.set_id, m.slot, m.entry)?;
                }
            }
            MetaManipulation::Est(m) => {
                if !self.est.contains_key(&m.est_type) {
                    match Self::decode(key, defaults, EstFile::new) {
                        Ok(file) => {
                            self.est.insert(m.est_type, file);
                        }
                        Err(err) => {
                            warn!("Table {key:?} degrades to defaults: {err}");
                            failed.insert(*key);
                            return Ok(());
                        }
                    }
                }
                if let Some(file) = self.est.get_mut(&m.est_type) {
                    file.set(
                        EstKey {
                            gender_race: m.gender_race,
                            set_id: m.set_id,
                        },
                        m.skeleton_id,
                    );
                }
            }
            MetaManipulation::Imc(m) => {
                let imc_key = ImcKey {
                    object_type: m.object_type,
                    primary_id: m.primary_id,
                    secondary_id: m.secondary_id,
                };
                if !self.imc.contains_key(&imc_key) {
                    match Self::decode(key, defaults, |bytes| ImcFile::new(imc_key, bytes)) {
                        Ok(file) => {
                            self.imc.insert(imc_key, file);
                        }
                        Err(err) => {
                            warn!("Table {key:?} degrades to defaults: {err}");
                            failed.insert(*key);
                            return Ok(());
                        }
                    }
                }
                if let Some(file) = self.imc.get_mut(&imc_key) {
                    let part = m.slot.map(|s| s.imc_part_index()).unwrap_or(0);
                    // Variant v is addressable once the count reaches v;
                    // variant 0 is the default row and never needs growth.
                    if m.variant > 0 {
                        file.ensure_variant_count(m.variant as usize)?;
                    }
                    file.set(part, m.variant, m.entry)?;
                }
            }
            MetaManipulation::Rsp(m) => {
                if self.rsp.is_none() {
                    match Self::decode(key, defaults, RspFile::new) {
                        Ok(file) => self.rsp = Some(file),
                        Err(err) => {
                            warn!("Table {key:?} degrades to defaults: {err}");
                            failed.insert(*key);
                            return Ok(());
                        }
                    }
                }
                if let Some(file) = self.rsp.as_mut() {
                    file.set(m.sub_race, m.attribute, m.value);
                }
            }
        }
        Ok(())
    }

    fn decode<T>(
        key: &TableKey,
        defaults: &dyn DefaultProvider,
        parse: impl FnOnce(&[u8]) -> meld_meta::Result<T>,
    ) -> meld_meta::Result<T> {
        let bytes = defaults
            .default_bytes(key)
            .ok_or(MetaError::MissingDefault { key: *key })?;
        parse(&bytes)
    }

    /// The merged, first-writer-wins manipulation set this cache was built from.
    pub fn manipulations(&self) -> &MetaManipulationSet {
        &self.manipulations
    }

    pub fn eqp(&self) -> Option<&EqpFile> {
        self.eqp.as_ref()
    }

    pub fn gmp(&self) -> Option<&GmpFile> {
        self.gmp.as_ref()
    }

    pub fn eqdp(&self, gender_race: GenderRace, accessory: bool) -> Option<&EqdpFile> {
        self.eqdp.get(&(gender_race, accessory))
    }

    pub fn est(&self, est_type: EstType) -> Option<&EstFile> {
        self.est.get(&est_type)
    }

    pub fn imc(&self, key: &ImcKey) -> Option<&ImcFile> {
        self.imc.get(key)
    }

    pub fn rsp(&self) -> Option<&RspFile> {
        self.rsp.as_ref()
    }

    /// Serialize one patched table, if the merge touched it.
    ///
    /// Untouched tables return `None`; callers should fall through to the
    /// unmodified game files for those.
    pub fn serialize(&self, key: &TableKey) -> Option<Vec<u8>> {
        match key {
            TableKey::Eqp => self.eqp.as_ref().map(EqpFile::serialize),
            TableKey::Gmp => self.gmp.as_ref().map(GmpFile::serialize),
            TableKey::Eqdp {
                gender_race,
                accessory,
            } => self
                .eqdp
                .get(&(*gender_race, *accessory))
                .map(EqdpFile::serialize),
            TableKey::Est { est_type } => self.est.get(est_type).map(EstFile::serialize),
            TableKey::Imc(imc_key) => self.imc.get(imc_key).map(ImcFile::serialize),
            TableKey::Rsp => self.rsp.as_ref().map(RspFile::serialize),
        }
    }
}

/// The complete resolved view of one collection: the merged file redirect
/// table, the conflicts recorded while merging, and the patched parameter
/// tables.
///
/// Immutable once built. Collections publish it behind an `Arc` so readers
/// hold a consistent snapshot for as long as they keep the handle.
#[derive(Debug, Default)]
pub struct ResolvedCache {
    redirects: HashMap<GamePath, FullPath>,
    conflicts: Vec<Conflict>,
    meta: MetaCache,
}

impl ResolvedCache {
    pub(crate) fn new(
        redirects: HashMap<GamePath, FullPath>,
        conflicts: Vec<Conflict>,
        meta: MetaCache,
    ) -> Self {
        Self {
            redirects,
            conflicts,
            meta,
        }
    }

    /// Translate a game path; `None` means the game's own file applies.
    pub fn resolve(&self, path: &GamePath) -> Option<&FullPath> {
        self.redirects.get(path)
    }

    /// All redirects in the cache.
    pub fn redirects(&self) -> &HashMap<GamePath, FullPath> {
        &self.redirects
    }

    /// The conflicts recorded during the merge, in fold order of the winner.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// The merged structured-parameter caches.
    pub fn meta(&self) -> &MetaCache {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meld_core::EquipSlot;
    use meld_meta::{EqpEntry, EqpManipulation, ImcEntry, ImcManipulation, SyntheticDefaults};

    #[test]
    fn test_untouched_tables_stay_unbuilt() {
        let mut set = MetaManipulationSet::new();
        set.insert(MetaManipulation::Eqp(EqpManipulation {
            set_id: 1,
            slot: EquipSlot::Body,
            entry: EqpEntry(0),
        }));

        let cache = MetaCache::build(set, &SyntheticDefaults);
        assert!(cache.eqp().is_some());
        assert!(cache.gmp().is_none());
        assert!(cache.rsp().is_none());
        assert!(cache.serialize(&TableKey::Gmp).is_none());
    }

    #[test]
    fn test_imc_grows_to_requested_variant() {
        use meld_core::ObjectType;

        let mut set = MetaManipulationSet::new();
        set.insert(MetaManipulation::Imc(ImcManipulation {
            object_type: ObjectType::Equipment,
            primary_id: 1,
            secondary_id: 0,
            variant: 9,
            slot: Some(EquipSlot::Body),
            entry: ImcEntry {
                material_id: 3,
                ..ImcEntry::default()
            },
        }));

        let cache = MetaCache::build(set, &SyntheticDefaults);
        let key = ImcKey {
            object_type: ObjectType::Equipment,
            primary_id: 1,
            secondary_id: 0,
        };
        let file = cache.imc(&key).unwrap();
        // Variant 9 is addressable at count 9 exactly; growing further would
        // append spurious default rows to the serialized table.
        assert_eq!(file.variant_count(), 9);
        let part = EquipSlot::Body.imc_part_index();
        assert_eq!(file.entry(part, 9).unwrap().material_id, 3);
    }

    #[test]
    fn test_imc_edit_at_last_representable_variant() {
        use meld_core::ObjectType;

        let mut set = MetaManipulationSet::new();
        set.insert(MetaManipulation::Imc(ImcManipulation {
            object_type: ObjectType::Equipment,
            primary_id: 2,
            secondary_id: 0,
            variant: u16::MAX,
            slot: Some(EquipSlot::Head),
            entry: ImcEntry {
                vfx_id: 7,
                ..ImcEntry::default()
            },
        }));

        let cache = MetaCache::build(set, &SyntheticDefaults);
        let key = ImcKey {
            object_type: ObjectType::Equipment,
            primary_id: 2,
            secondary_id: 0,
        };
        let file = cache.imc(&key).unwrap();
        assert_eq!(file.variant_count(), u16::MAX);
        let part = EquipSlot::Head.imc_part_index();
        assert_eq!(file.entry(part, u16::MAX).unwrap().vfx_id, 7);
    }

    #[test]
    fn test_imc_default_variant_edit_needs_no_growth() {
        use meld_core::ObjectType;

        let mut set = MetaManipulationSet::new();
        set.insert(MetaManipulation::Imc(ImcManipulation {
            object_type: ObjectType::Equipment,
            primary_id: 3,
            secondary_id: 0,
            variant: 0,
            slot: Some(EquipSlot::Body),
            entry: ImcEntry {
                decal_id: 2,
                ..ImcEntry::default()
            },
        }));

        let cache = MetaCache::build(set, &SyntheticDefaults);
        let key = ImcKey {
            object_type: ObjectType::Equipment,
            primary_id: 3,
            secondary_id: 0,
        };
        let file = cache.imc(&key).unwrap();
        assert_eq!(file.variant_count(), 1);
        let part = EquipSlot::Body.imc_part_index();
        assert_eq!(file.entry(part, 0).unwrap().decal_id, 2);
    }

    #[test]
    fn test_missing_default_drops_edits_quietly() {
        use meld_meta::StaticDefaults;

        let mut set = MetaManipulationSet::new();
        set.insert(MetaManipulation::Eqp(EqpManipulation {
            set_id: 1,
            slot: EquipSlot::Body,
            entry: EqpEntry(0),
        }));

        let cache = MetaCache::build(set, &StaticDefaults::new());
        assert!(cache.eqp().is_none());
        assert_eq!(cache.manipulations().len(), 1);
    }
}
