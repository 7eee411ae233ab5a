//! Default table sourcing.
//!
//! Every codec diffs against, and fills collapsed regions from, the shipped
//! default image of its table. Where those bytes come from is not this
//! crate's business — the storage layer reads them out of the game archives —
//! so the codecs take a [`DefaultProvider`] as an explicit dependency instead
//! of consulting any process-wide singleton.

use crate::eqp_gmp::{EQP_BLOCK_COUNT, EQP_BLOCK_SIZE};
use crate::rsp::RSP_ENTRY_SIZE;
use meld_core::{EstType, GenderRace, ObjectType, SUB_RACE_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The six structured-parameter format families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaKind {
    Eqp,
    Eqdp,
    Gmp,
    Est,
    Imc,
    Rsp,
}

impl MetaKind {
    /// All kinds, in a fixed order used for stable iteration.
    pub const ALL: [MetaKind; 6] = [
        MetaKind::Eqp,
        MetaKind::Eqdp,
        MetaKind::Gmp,
        MetaKind::Est,
        MetaKind::Imc,
        MetaKind::Rsp,
    ];
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetaKind::Eqp => "EQP",
            MetaKind::Eqdp => "EQDP",
            MetaKind::Gmp => "GMP",
            MetaKind::Est => "EST",
            MetaKind::Imc => "IMC",
            MetaKind::Rsp => "RSP",
        };
        f.write_str(name)
    }
}

/// Sub-key identifying one IMC file.
///
/// Equipment and accessories share one file per set id; weapons, demi-humans,
/// and monsters have one file per (primary, secondary) id pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImcKey {
    pub object_type: ObjectType,
    pub primary_id: u16,
    pub secondary_id: u16,
}

/// Identifies one concrete table instance across all six kinds.
///
/// EQP, GMP, and RSP are process-global single tables; EQDP exists per
/// (gender-race, accessory) pair, EST per category, IMC per [`ImcKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableKey {
    Eqp,
    Gmp,
    Eqdp {
        gender_race: GenderRace,
        accessory: bool,
    },
    Est {
        est_type: EstType,
    },
    Imc(ImcKey),
    Rsp,
}

impl TableKey {
    /// The format family this key belongs to.
    pub fn kind(&self) -> MetaKind {
        match self {
            TableKey::Eqp => MetaKind::Eqp,
            TableKey::Gmp => MetaKind::Gmp,
            TableKey::Eqdp { .. } => MetaKind::Eqdp,
            TableKey::Est { .. } => MetaKind::Est,
            TableKey::Imc(_) => MetaKind::Imc,
            TableKey::Rsp => MetaKind::Rsp,
        }
    }
}

/// Source of unmodified shipped table bytes.
///
/// Implementations must be cheap to query repeatedly; the merge engine asks
/// for the same keys on every rebuild. Returning `None` means the table is
/// unavailable and manipulations against it are skipped.
pub trait DefaultProvider: Send + Sync {
    /// The shipped bytes for `key`, if available.
    fn default_bytes(&self, key: &TableKey) -> Option<Arc<[u8]>>;
}

/// A fixed, pre-populated default table store.
///
/// The storage layer fills one of these at startup from the game archives and
/// hands it to the engine. Lazily-cached readers can wrap this; the engine
/// itself only ever reads.
#[derive(Default)]
pub struct StaticDefaults {
    tables: HashMap<TableKey, Arc<[u8]>>,
}

impl StaticDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the shipped bytes for a table. Replaces any previous entry.
    pub fn insert(&mut self, key: TableKey, bytes: impl Into<Arc<[u8]>>) {
        self.tables.insert(key, bytes.into());
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl DefaultProvider for StaticDefaults {
    fn default_bytes(&self, key: &TableKey) -> Option<Arc<[u8]>> {
        self.tables.get(key).cloned()
    }
}

/// Generates minimal well-formed default images for every table on demand.
///
/// All records carry their format's canonical default value: EQP fully
/// flagged, GMP/EQDP/IMC zeroed, EST empty, RSP scales at `1.0`. Used by
/// tests and tooling that need a complete provider without game data.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDefaults;

impl SyntheticDefaults {
    fn eqp_image(fill: u64) -> Vec<u8> {
        // Only block 0 expanded; its first record is the expansion mask.
        let mut out = Vec::with_capacity(EQP_BLOCK_SIZE * 8);
        out.extend_from_slice(&1u64.to_le_bytes());
        for _ in 1..EQP_BLOCK_SIZE {
            out.extend_from_slice(&fill.to_le_bytes());
        }
        out
    }

    fn eqdp_image(gender_race: GenderRace) -> Vec<u8> {
        let block_count = EQP_BLOCK_COUNT as u16;
        let mut out = Vec::new();
        out.extend_from_slice(&gender_race.code().to_le_bytes());
        out.extend_from_slice(&(EQP_BLOCK_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&block_count.to_le_bytes());
        for _ in 0..block_count {
            out.extend_from_slice(&u16::MAX.to_le_bytes());
        }
        out
    }

    fn imc_image(key: &ImcKey) -> Vec<u8> {
        let part_mask: u16 = match key.object_type {
            ObjectType::Equipment | ObjectType::Accessory => 0b1_1111,
            _ => 0b1,
        };
        let parts = part_mask.count_ones() as usize;
        let mut out = Vec::new();
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&part_mask.to_le_bytes());
        // Default-variant row plus one variant row, all zeroed.
        out.resize(out.len() + 2 * parts * 6, 0);
        out
    }

    fn rsp_image() -> Vec<u8> {
        let mut out = vec![0u8; 32];
        for _ in 0..SUB_RACE_COUNT * (RSP_ENTRY_SIZE / 4) {
            out.extend_from_slice(&1.0f32.to_le_bytes());
        }
        out
    }

    /// Expand into a fully-populated [`StaticDefaults`].
    pub fn materialize(&self) -> StaticDefaults {
        let mut out = StaticDefaults::new();
        out.insert(TableKey::Eqp, Self::eqp_image(u64::MAX));
        out.insert(TableKey::Gmp, Self::eqp_image(0));
        out.insert(TableKey::Rsp, Self::rsp_image());
        for est_type in EstType::ALL {
            out.insert(TableKey::Est { est_type }, 0u32.to_le_bytes().to_vec());
        }
        for gender_race in GenderRace::ALL {
            for accessory in [false, true] {
                out.insert(
                    TableKey::Eqdp {
                        gender_race,
                        accessory,
                    },
                    Self::eqdp_image(gender_race),
                );
            }
        }
        out
    }
}

impl DefaultProvider for SyntheticDefaults {
    fn default_bytes(&self, key: &TableKey) -> Option<Arc<[u8]>> {
        let bytes = match key {
            TableKey::Eqp => Self::eqp_image(u64::MAX),
            TableKey::Gmp => Self::eqp_image(0),
            TableKey::Eqdp { gender_race, .. } => Self::eqdp_image(*gender_race),
            TableKey::Est { .. } => 0u32.to_le_bytes().to_vec(),
            TableKey::Imc(key) => Self::imc_image(key),
            TableKey::Rsp => Self::rsp_image(),
        };
        Some(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_defaults_round_trip() {
        let mut defaults = StaticDefaults::new();
        defaults.insert(TableKey::Eqp, vec![0u8; 8]);
        assert_eq!(defaults.default_bytes(&TableKey::Eqp).unwrap().len(), 8);
        assert!(defaults.default_bytes(&TableKey::Rsp).is_none());
    }

    #[test]
    fn test_synthetic_provides_all_global_tables() {
        let provider = SyntheticDefaults;
        for key in [TableKey::Eqp, TableKey::Gmp, TableKey::Rsp] {
            assert!(provider.default_bytes(&key).is_some());
        }
    }

    #[test]
    fn test_materialize_covers_eqdp_sub_keys() {
        let defaults = SyntheticDefaults.materialize();
        for gender_race in GenderRace::ALL {
            for accessory in [false, true] {
                let key = TableKey::Eqdp {
                    gender_race,
                    accessory,
                };
                assert!(defaults.default_bytes(&key).is_some());
            }
        }
    }
}
