//! Equipment slots, object types, and skeleton table categories.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// One of the ten wearable slots: five equipment, five accessory.
///
/// The declaration order fixes both the per-slot bit layout in EQDP records
/// and the slot-to-part mapping of IMC files, so it must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EquipSlot {
    Head,
    Body,
    Hands,
    Legs,
    Feet,
    Ears,
    Neck,
    Wrists,
    RingRight,
    RingLeft,
}

impl EquipSlot {
    /// The five equipment slots, in part order.
    pub const EQUIPMENT: [EquipSlot; 5] = [
        EquipSlot::Head,
        EquipSlot::Body,
        EquipSlot::Hands,
        EquipSlot::Legs,
        EquipSlot::Feet,
    ];

    /// The five accessory slots, in part order.
    pub const ACCESSORIES: [EquipSlot; 5] = [
        EquipSlot::Ears,
        EquipSlot::Neck,
        EquipSlot::Wrists,
        EquipSlot::RingRight,
        EquipSlot::RingLeft,
    ];

    /// Whether this slot is an accessory slot.
    pub fn is_accessory(self) -> bool {
        matches!(
            self,
            EquipSlot::Ears
                | EquipSlot::Neck
                | EquipSlot::Wrists
                | EquipSlot::RingRight
                | EquipSlot::RingLeft
        )
    }

    /// Whether this slot is an equipment slot.
    pub fn is_equipment(self) -> bool {
        !self.is_accessory()
    }

    /// The IMC part index for this slot.
    ///
    /// Equipment and accessory IMC files each carry up to five parts; the part
    /// index is the slot's position within its own five-slot family.
    pub fn imc_part_index(self) -> usize {
        match self {
            EquipSlot::Head | EquipSlot::Ears => 0,
            EquipSlot::Body | EquipSlot::Neck => 1,
            EquipSlot::Hands | EquipSlot::Wrists => 2,
            EquipSlot::Legs | EquipSlot::RingRight => 3,
            EquipSlot::Feet | EquipSlot::RingLeft => 4,
        }
    }

    /// Bit offset of this slot's 2-bit pair inside an EQDP record.
    pub fn eqdp_bit_offset(self) -> u32 {
        (self.imc_part_index() as u32) * 2
    }

    /// The bit range this slot owns inside a 64-bit EQP record.
    ///
    /// Returns `None` for accessory slots, which have no EQP representation.
    /// Layout: body 0..16, legs 16..24, hands 24..32, feet 32..40, head 40..64.
    pub fn eqp_mask(self) -> Option<u64> {
        match self {
            EquipSlot::Body => Some(0x0000_0000_0000_FFFF),
            EquipSlot::Legs => Some(0x0000_0000_00FF_0000),
            EquipSlot::Hands => Some(0x0000_0000_FF00_0000),
            EquipSlot::Feet => Some(0x0000_00FF_0000_0000),
            EquipSlot::Head => Some(0xFFFF_FF00_0000_0000),
            _ => None,
        }
    }
}

/// The kind of game object a structured-parameter edit targets.
///
/// Determines which sub-keys are meaningful: equipment and accessories are
/// addressed by set id and slot, weapons and demi-humans by a primary and
/// secondary id, monsters by body id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectType {
    Equipment,
    Accessory,
    Weapon,
    DemiHuman,
    Monster,
}

impl ObjectType {
    /// Whether `slot` is valid for this object type.
    ///
    /// Weapons, demi-humans, and monsters are not slot-addressed; for them,
    /// only the absence of a slot is valid.
    pub fn accepts_slot(self, slot: Option<EquipSlot>) -> bool {
        match self {
            ObjectType::Equipment => slot.is_some_and(EquipSlot::is_equipment),
            ObjectType::Accessory => slot.is_some_and(EquipSlot::is_accessory),
            ObjectType::Weapon | ObjectType::DemiHuman | ObjectType::Monster => slot.is_none(),
        }
    }

    /// Whether this object type uses a secondary id in its IMC sub-key.
    pub fn uses_secondary_id(self) -> bool {
        matches!(self, ObjectType::Weapon | ObjectType::DemiHuman | ObjectType::Monster)
    }
}

/// Category of the extra skeleton table a set id maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EstType {
    Hair,
    Face,
    Body,
    Head,
}

impl EstType {
    /// All table categories.
    pub const ALL: [EstType; 4] = [EstType::Hair, EstType::Face, EstType::Body, EstType::Head];
}

/// Parse helpers used by the settings loaders.
impl TryFrom<u8> for EquipSlot {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        let all = EquipSlot::EQUIPMENT
            .into_iter()
            .chain(EquipSlot::ACCESSORIES);
        for (i, slot) in all.enumerate() {
            if i == value as usize {
                return Ok(slot);
            }
        }
        Err(CoreError::InvalidSlot(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eqp_masks_disjoint_and_complete() {
        let mut seen = 0u64;
        for slot in EquipSlot::EQUIPMENT {
            let mask = slot.eqp_mask().unwrap();
            assert_eq!(seen & mask, 0, "masks overlap for {slot:?}");
            seen |= mask;
        }
        assert_eq!(seen, u64::MAX);
    }

    #[test]
    fn test_accessories_have_no_eqp_mask() {
        for slot in EquipSlot::ACCESSORIES {
            assert!(slot.eqp_mask().is_none());
        }
    }

    #[test]
    fn test_imc_part_indices() {
        for (i, slot) in EquipSlot::EQUIPMENT.into_iter().enumerate() {
            assert_eq!(slot.imc_part_index(), i);
        }
        for (i, slot) in EquipSlot::ACCESSORIES.into_iter().enumerate() {
            assert_eq!(slot.imc_part_index(), i);
        }
    }

    #[test]
    fn test_object_type_slot_validity() {
        assert!(ObjectType::Equipment.accepts_slot(Some(EquipSlot::Head)));
        assert!(!ObjectType::Equipment.accepts_slot(Some(EquipSlot::Ears)));
        assert!(ObjectType::Accessory.accepts_slot(Some(EquipSlot::Neck)));
        assert!(!ObjectType::Accessory.accepts_slot(None));
        assert!(ObjectType::Weapon.accepts_slot(None));
        assert!(!ObjectType::Weapon.accepts_slot(Some(EquipSlot::Body)));
    }
}
