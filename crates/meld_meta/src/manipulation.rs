//! The manipulation model: single-record overrides and their identity.
//!
//! A manipulation pairs a kind-specific composite key with a new value for
//! that record. *Identity* is the key alone — two manipulations are the same
//! edit iff their kind and key fields match, regardless of value — which is
//! what lets a first-insert-wins set fold many mods' edits under priority
//! order without ever comparing payloads.
//!
//! Validation runs once, when manipulations are loaded from mod definitions;
//! invalid entries are dropped with a logged reason and never stored.

use crate::defaults::{ImcKey, MetaKind, TableKey};
use crate::eqdp::EqdpEntry;
use crate::eqp_gmp::{EqpEntry, GmpEntry, EQP_RECORD_COUNT};
use crate::error::{MetaError, Result};
use crate::imc::ImcEntry;
use meld_core::{EquipSlot, EstType, GenderRace, ObjectType, RspAttribute, SubRace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Override of one equipment parameter record's slot bits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqpManipulation {
    pub set_id: u16,
    pub slot: EquipSlot,
    pub entry: EqpEntry,
}

/// Override of one gimmick parameter record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmpManipulation {
    pub set_id: u16,
    pub entry: GmpEntry,
}

/// Override of one model-visibility pair for one gender-race.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqdpManipulation {
    pub gender_race: GenderRace,
    pub set_id: u16,
    pub slot: EquipSlot,
    pub entry: EqdpEntry,
}

/// Override of one extra skeleton id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstManipulation {
    pub est_type: EstType,
    pub gender_race: GenderRace,
    pub set_id: u16,
    pub skeleton_id: u16,
}

/// Override of one variant record in one IMC file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImcManipulation {
    pub object_type: ObjectType,
    pub primary_id: u16,
    #[serde(default)]
    pub secondary_id: u16,
    pub variant: u16,
    #[serde(default)]
    pub slot: Option<EquipSlot>,
    pub entry: ImcEntry,
}

/// Override of one racial scaling float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RspManipulation {
    pub sub_race: SubRace,
    pub attribute: RspAttribute,
    pub value: f32,
}

/// Upper bound accepted for racial scaling values.
pub const RSP_MAX_VALUE: f32 = 512.0;

/// One structured-parameter override, tagged by format family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "manipulation", rename_all = "camelCase")]
pub enum MetaManipulation {
    Eqp(EqpManipulation),
    Gmp(GmpManipulation),
    Eqdp(EqdpManipulation),
    Est(EstManipulation),
    Imc(ImcManipulation),
    Rsp(RspManipulation),
}

/// The identity key of a manipulation: its kind and key fields, no value.
///
/// Identifiers of different kinds are never equal. Within a kind, identity is
/// structural equality over the key fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaIdentifier {
    Eqp {
        set_id: u16,
        slot: EquipSlot,
    },
    Gmp {
        set_id: u16,
    },
    Eqdp {
        gender_race: GenderRace,
        set_id: u16,
        slot: EquipSlot,
    },
    Est {
        est_type: EstType,
        gender_race: GenderRace,
        set_id: u16,
    },
    Imc {
        key: ImcKey,
        variant: u16,
        slot: Option<EquipSlot>,
    },
    Rsp {
        sub_race: SubRace,
        attribute: RspAttribute,
    },
}

impl MetaManipulation {
    /// The format family this manipulation edits.
    pub fn kind(&self) -> MetaKind {
        match self {
            MetaManipulation::Eqp(_) => MetaKind::Eqp,
            MetaManipulation::Gmp(_) => MetaKind::Gmp,
            MetaManipulation::Eqdp(_) => MetaKind::Eqdp,
            MetaManipulation::Est(_) => MetaKind::Est,
            MetaManipulation::Imc(_) => MetaKind::Imc,
            MetaManipulation::Rsp(_) => MetaKind::Rsp,
        }
    }

    /// The identity key of this manipulation.
    pub fn identifier(&self) -> MetaIdentifier {
        match *self {
            // Set 0 and set 1 address the same table row, so they must fold
            // to one identity or a lower-priority edit of the alias would
            // slip past first-insert-wins and clobber the winner.
            MetaManipulation::Eqp(m) => MetaIdentifier::Eqp {
                set_id: m.set_id.max(1),
                slot: m.slot,
            },
            MetaManipulation::Gmp(m) => MetaIdentifier::Gmp {
                set_id: m.set_id.max(1),
            },
            MetaManipulation::Eqdp(m) => MetaIdentifier::Eqdp {
                gender_race: m.gender_race,
                set_id: m.set_id,
                slot: m.slot,
            },
            MetaManipulation::Est(m) => MetaIdentifier::Est {
                est_type: m.est_type,
                gender_race: m.gender_race,
                set_id: m.set_id,
            },
            MetaManipulation::Imc(m) => MetaIdentifier::Imc {
                key: ImcKey {
                    object_type: m.object_type,
                    primary_id: m.primary_id,
                    secondary_id: m.secondary_id,
                },
                variant: m.variant,
                slot: m.slot,
            },
            MetaManipulation::Rsp(m) => MetaIdentifier::Rsp {
                sub_race: m.sub_race,
                attribute: m.attribute,
            },
        }
    }

    /// The table this manipulation patches.
    pub fn table_key(&self) -> TableKey {
        match *self {
            MetaManipulation::Eqp(_) => TableKey::Eqp,
            MetaManipulation::Gmp(_) => TableKey::Gmp,
            MetaManipulation::Eqdp(m) => TableKey::Eqdp {
                gender_race: m.gender_race,
                accessory: m.slot.is_accessory(),
            },
            MetaManipulation::Est(m) => TableKey::Est {
                est_type: m.est_type,
            },
            MetaManipulation::Imc(m) => TableKey::Imc(ImcKey {
                object_type: m.object_type,
                primary_id: m.primary_id,
                secondary_id: m.secondary_id,
            }),
            MetaManipulation::Rsp(_) => TableKey::Rsp,
        }
    }

    /// Check kind-specific domain constraints on the key and value fields.
    ///
    /// Constraints that depend on a concrete table's geometry (EQDP set range,
    /// IMC variant count) are enforced later by the codec write; this covers
    /// everything checkable from the manipulation alone.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| MetaError::Validation {
            kind: self.kind(),
            reason,
        };
        match *self {
            MetaManipulation::Eqp(m) => {
                if m.slot.is_accessory() {
                    return Err(invalid(format!("slot {:?} has no EQP bits", m.slot)));
                }
                if m.set_id as usize >= EQP_RECORD_COUNT {
                    return Err(invalid(format!("set id {} out of range", m.set_id)));
                }
            }
            MetaManipulation::Gmp(m) => {
                if m.set_id as usize >= EQP_RECORD_COUNT {
                    return Err(invalid(format!("set id {} out of range", m.set_id)));
                }
            }
            MetaManipulation::Eqdp(_) | MetaManipulation::Est(_) => {}
            MetaManipulation::Imc(m) => {
                if !m.object_type.accepts_slot(m.slot) {
                    return Err(invalid(format!(
                        "slot {:?} invalid for {:?}",
                        m.slot, m.object_type
                    )));
                }
                if !m.object_type.uses_secondary_id() && m.secondary_id != 0 {
                    return Err(invalid(format!(
                        "{:?} does not use a secondary id",
                        m.object_type
                    )));
                }
                if m.entry.attribute_mask > ImcEntry::MAX_ATTRIBUTE_MASK {
                    return Err(invalid(format!(
                        "attribute mask {:#x} exceeds 10 bits",
                        m.entry.attribute_mask
                    )));
                }
                if m.entry.sound_id > ImcEntry::MAX_SOUND_ID {
                    return Err(invalid(format!(
                        "sound id {} exceeds 6 bits",
                        m.entry.sound_id
                    )));
                }
            }
            MetaManipulation::Rsp(m) => {
                if !m.value.is_finite() || m.value <= 0.0 || m.value > RSP_MAX_VALUE {
                    return Err(invalid(format!("scaling value {} out of domain", m.value)));
                }
            }
        }
        Ok(())
    }
}

/// A set of manipulations keyed by identifier, first insert wins.
///
/// Iteration follows insertion order, which keeps merge results and
/// serialization deterministic for a fixed fold order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MetaManipulation>", into = "Vec<MetaManipulation>")]
pub struct MetaManipulationSet {
    entries: Vec<MetaManipulation>,
    index: HashMap<MetaIdentifier, usize>,
}

impl MetaManipulationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if no manipulation with the same identifier exists yet.
    ///
    /// Returns whether the manipulation was inserted; a duplicate identifier
    /// leaves the existing (first-added) value untouched.
    pub fn insert(&mut self, manipulation: MetaManipulation) -> bool {
        let identifier = manipulation.identifier();
        if self.index.contains_key(&identifier) {
            return false;
        }
        self.index.insert(identifier, self.entries.len());
        self.entries.push(manipulation);
        true
    }

    /// Fold another set in under the same first-insert-wins rule.
    pub fn extend_first_wins<'a>(
        &mut self,
        other: impl IntoIterator<Item = &'a MetaManipulation>,
    ) {
        for manipulation in other {
            self.insert(*manipulation);
        }
    }

    /// The stored manipulation for an identifier, if any.
    pub fn get(&self, identifier: &MetaIdentifier) -> Option<&MetaManipulation> {
        self.index.get(identifier).map(|i| &self.entries[*i])
    }

    pub fn contains(&self, identifier: &MetaIdentifier) -> bool {
        self.index.contains_key(identifier)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MetaManipulation> {
        self.entries.iter()
    }

    /// Iterate only the manipulations of one kind, in insertion order.
    pub fn iter_kind(&self, kind: MetaKind) -> impl Iterator<Item = &MetaManipulation> {
        self.entries.iter().filter(move |m| m.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every entry, dropping invalid ones with a logged reason.
    pub fn retain_valid(&mut self) {
        let mut valid = MetaManipulationSet::new();
        for manipulation in &self.entries {
            match manipulation.validate() {
                Ok(()) => {
                    valid.insert(*manipulation);
                }
                Err(err) => {
                    tracing::warn!("Dropping invalid manipulation: {err}");
                }
            }
        }
        *self = valid;
    }
}

impl PartialEq for MetaManipulationSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl From<Vec<MetaManipulation>> for MetaManipulationSet {
    fn from(entries: Vec<MetaManipulation>) -> Self {
        let mut set = Self::new();
        for manipulation in entries {
            set.insert(manipulation);
        }
        set
    }
}

impl From<MetaManipulationSet> for Vec<MetaManipulation> {
    fn from(set: MetaManipulationSet) -> Self {
        set.entries
    }
}

impl<'a> IntoIterator for &'a MetaManipulationSet {
    type Item = &'a MetaManipulation;
    type IntoIter = std::slice::Iter<'a, MetaManipulation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<MetaManipulation> for MetaManipulationSet {
    fn from_iter<T: IntoIterator<Item = MetaManipulation>>(iter: T) -> Self {
        let mut set = Self::new();
        for manipulation in iter {
            set.insert(manipulation);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eqp(set_id: u16, slot: EquipSlot, bits: u64) -> MetaManipulation {
        MetaManipulation::Eqp(EqpManipulation {
            set_id,
            slot,
            entry: EqpEntry(bits),
        })
    }

    #[test]
    fn test_identity_ignores_value() {
        let a = eqp(1301, EquipSlot::Body, 0);
        let b = eqp(1301, EquipSlot::Body, u64::MAX);
        assert_eq!(a.identifier(), b.identifier());

        let c = eqp(1301, EquipSlot::Head, 0);
        assert_ne!(a.identifier(), c.identifier());
    }

    #[test]
    fn test_kinds_never_compare_equal() {
        let eqp = eqp(5, EquipSlot::Body, 0);
        let gmp = MetaManipulation::Gmp(GmpManipulation {
            set_id: 5,
            entry: GmpEntry::default(),
        });
        assert_ne!(eqp.identifier(), gmp.identifier());
    }

    #[test]
    fn test_first_insert_wins() {
        let mut set = MetaManipulationSet::new();
        assert!(set.insert(eqp(10, EquipSlot::Body, 1)));
        assert!(!set.insert(eqp(10, EquipSlot::Body, 2)));
        assert_eq!(set.len(), 1);

        let stored = set.get(&eqp(10, EquipSlot::Body, 0).identifier()).unwrap();
        match stored {
            MetaManipulation::Eqp(m) => assert_eq!(m.entry.0, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_set_zero_aliases_set_one() {
        let a = eqp(0, EquipSlot::Body, 0);
        let b = eqp(1, EquipSlot::Body, 0);
        assert_eq!(a.identifier(), b.identifier());

        let mut set = MetaManipulationSet::new();
        assert!(set.insert(eqp(1, EquipSlot::Body, 7)));
        assert!(!set.insert(eqp(0, EquipSlot::Body, 9)));
        match set.get(&a.identifier()).unwrap() {
            MetaManipulation::Eqp(m) => assert_eq!(m.entry.0, 7),
            other => panic!("unexpected {other:?}"),
        }

        let mut set = MetaManipulationSet::new();
        assert!(set.insert(MetaManipulation::Gmp(GmpManipulation {
            set_id: 0,
            entry: GmpEntry::default(),
        })));
        assert!(!set.insert(MetaManipulation::Gmp(GmpManipulation {
            set_id: 1,
            entry: GmpEntry::default(),
        })));
    }

    #[test]
    fn test_iteration_is_insertion_ordered() {
        let mut set = MetaManipulationSet::new();
        set.insert(eqp(3, EquipSlot::Body, 0));
        set.insert(eqp(1, EquipSlot::Body, 0));
        set.insert(eqp(2, EquipSlot::Body, 0));
        let ids: Vec<u16> = set
            .iter()
            .map(|m| match m {
                MetaManipulation::Eqp(m) => m.set_id,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ids, [3, 1, 2]);
    }

    #[test]
    fn test_validation_rejects_bad_imc() {
        let bad_slot = MetaManipulation::Imc(ImcManipulation {
            object_type: ObjectType::Equipment,
            primary_id: 1,
            secondary_id: 0,
            variant: 0,
            slot: Some(EquipSlot::Ears),
            entry: ImcEntry::default(),
        });
        assert!(bad_slot.validate().is_err());

        let bad_mask = MetaManipulation::Imc(ImcManipulation {
            object_type: ObjectType::Weapon,
            primary_id: 1,
            secondary_id: 1,
            variant: 0,
            slot: None,
            entry: ImcEntry {
                attribute_mask: 0x400,
                ..Default::default()
            },
        });
        assert!(bad_mask.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_rsp() {
        for value in [f32::NAN, 0.0, -1.0, 1000.0] {
            let manipulation = MetaManipulation::Rsp(RspManipulation {
                sub_race: SubRace::from_index(2).unwrap(),
                attribute: RspAttribute::MaleMinSize,
                value,
            });
            assert!(manipulation.validate().is_err(), "accepted {value}");
        }
    }

    #[test]
    fn test_retain_valid_drops_only_invalid() {
        let mut set = MetaManipulationSet::new();
        set.insert(eqp(10, EquipSlot::Body, 1));
        set.insert(MetaManipulation::Eqp(EqpManipulation {
            set_id: 10,
            slot: EquipSlot::Ears,
            entry: EqpEntry(0),
        }));
        set.retain_valid();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut set = MetaManipulationSet::new();
        set.insert(eqp(1301, EquipSlot::Body, 42));
        set.insert(MetaManipulation::Rsp(RspManipulation {
            sub_race: SubRace::from_index(0).unwrap(),
            attribute: RspAttribute::BustMaxX,
            value: 1.5,
        }));
        let json = serde_json::to_string(&set).unwrap();
        let back: MetaManipulationSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
