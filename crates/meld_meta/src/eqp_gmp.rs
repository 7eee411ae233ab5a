//! EQP and GMP codecs: sparse 64-block tables of 8-byte records.
//!
//! Both formats share one layout trick. The table is 64 blocks of 160 records
//! of 8 bytes each, but only *expanded* blocks are stored; collapsed blocks
//! implicitly hold the table's canonical default in every record (all bits set
//! for EQP, zero for GMP). The first record of the first block doubles as the
//! 64-bit expansion control mask, so block 0 is always expanded and record 0
//! is reserved — reads and writes of set 0 alias to set 1.
//!
//! Blocks are an explicit [`Block`] enum rather than nullable pointers, with
//! the serialized offsets derived from the mask's popcount on encode.

use crate::defaults::MetaKind;
use crate::error::{MetaError, Result};
use byteorder::{ReadBytesExt, LE};
use meld_core::EquipSlot;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// Number of blocks in an EQP/GMP table.
pub const EQP_BLOCK_COUNT: usize = 64;

/// Number of records per block.
pub const EQP_BLOCK_SIZE: usize = 160;

/// Total addressable records (equipment set ids).
pub const EQP_RECORD_COUNT: usize = EQP_BLOCK_COUNT * EQP_BLOCK_SIZE;

/// One block of the sparse table: either implicit defaults or 160 records.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Collapsed,
    Expanded(Box<[u64; EQP_BLOCK_SIZE]>),
}

impl Block {
    fn is_expanded(&self) -> bool {
        matches!(self, Block::Expanded(_))
    }
}

/// Shared expand/collapse machinery for the EQP and GMP formats.
#[derive(Debug, Clone)]
struct SparseU64Table {
    kind: MetaKind,
    collapsed_default: u64,
    blocks: Vec<Block>,
    defaults: Arc<Vec<Block>>,
}

impl SparseU64Table {
    fn decode(kind: MetaKind, collapsed_default: u64, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 8 != 0 || bytes.len() < EQP_BLOCK_SIZE * 8 {
            return Err(MetaError::Decode {
                kind,
                reason: format!("unexpected length {}", bytes.len()),
            });
        }

        let mut cursor = Cursor::new(bytes);
        let mask = cursor.read_u64::<LE>()?;
        if mask & 1 == 0 {
            return Err(MetaError::Decode {
                kind,
                reason: "control block not marked expanded".into(),
            });
        }

        cursor.set_position(0);
        let mut blocks = Vec::with_capacity(EQP_BLOCK_COUNT);
        for block in 0..EQP_BLOCK_COUNT {
            if mask >> block & 1 == 1 {
                let mut records = Box::new([0u64; EQP_BLOCK_SIZE]);
                for record in records.iter_mut() {
                    *record = cursor.read_u64::<LE>().map_err(|_| MetaError::Decode {
                        kind,
                        reason: format!("truncated at block {block}"),
                    })?;
                }
                blocks.push(Block::Expanded(records));
            } else {
                blocks.push(Block::Collapsed);
            }
        }

        if cursor.position() as usize != bytes.len() {
            return Err(MetaError::Decode {
                kind,
                reason: format!(
                    "{} trailing bytes after last expanded block",
                    bytes.len() - cursor.position() as usize
                ),
            });
        }

        Ok(Self {
            kind,
            collapsed_default,
            blocks: blocks.clone(),
            defaults: Arc::new(blocks),
        })
    }

    /// Set id 0 is reserved for the control mask and aliases set 1.
    fn resolve(set_id: usize) -> usize {
        if set_id == 0 {
            1
        } else {
            set_id
        }
    }

    fn check_range(&self, set_id: usize) -> Result<()> {
        if set_id < EQP_RECORD_COUNT {
            Ok(())
        } else {
            Err(MetaError::OutOfRange {
                kind: self.kind,
                what: "set id",
                value: set_id,
                max: EQP_RECORD_COUNT - 1,
            })
        }
    }

    fn default_record(&self, block: usize, record: usize) -> u64 {
        match &self.defaults[block] {
            Block::Expanded(records) => records[record],
            Block::Collapsed => self.collapsed_default,
        }
    }

    fn read(&self, set_id: usize) -> Result<u64> {
        self.check_range(set_id)?;
        let index = Self::resolve(set_id);
        let (block, record) = (index / EQP_BLOCK_SIZE, index % EQP_BLOCK_SIZE);
        Ok(match &self.blocks[block] {
            Block::Expanded(records) => records[record],
            Block::Collapsed => self.default_record(block, record),
        })
    }

    fn default_value(&self, set_id: usize) -> Result<u64> {
        self.check_range(set_id)?;
        let index = Self::resolve(set_id);
        Ok(self.default_record(index / EQP_BLOCK_SIZE, index % EQP_BLOCK_SIZE))
    }

    fn write(&mut self, set_id: usize, value: u64) -> Result<bool> {
        self.check_range(set_id)?;
        let index = Self::resolve(set_id);
        let (block, record) = (index / EQP_BLOCK_SIZE, index % EQP_BLOCK_SIZE);

        let current = self.read(set_id)?;
        if current == value {
            return Ok(false);
        }

        let default = self.default_record(block, record);
        if self.blocks[block].is_expanded() {
            if let Block::Expanded(records) = &mut self.blocks[block] {
                records[record] = value;
            }
            if value == default {
                self.try_collapse(block);
            }
        } else {
            // Expand, filling every record from the shipped defaults.
            let mut records = Box::new([0u64; EQP_BLOCK_SIZE]);
            for (i, slot) in records.iter_mut().enumerate() {
                *slot = self.default_record(block, i);
            }
            records[record] = value;
            self.blocks[block] = Block::Expanded(records);
        }

        Ok(true)
    }

    /// Collapse `block` if every record equals its default again.
    ///
    /// Block 0 carries the control mask and never collapses; blocks the
    /// shipped file stores expanded stay expanded so serialization remains
    /// byte-identical to the source when nothing effective changed.
    fn try_collapse(&mut self, block: usize) {
        if block == 0 || self.defaults[block].is_expanded() {
            return;
        }
        let all_default = match &self.blocks[block] {
            Block::Expanded(records) => {
                let default = self.collapsed_default;
                records.iter().all(|r| *r == default)
            }
            Block::Collapsed => return,
        };
        if all_default {
            self.blocks[block] = Block::Collapsed;
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut mask = 0u64;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.is_expanded() {
                mask |= 1 << i;
            }
        }

        let expanded = mask.count_ones() as usize;
        let mut out = Vec::with_capacity(expanded * EQP_BLOCK_SIZE * 8);
        for block in &self.blocks {
            if let Block::Expanded(records) = block {
                for record in records.iter() {
                    out.extend_from_slice(&record.to_le_bytes());
                }
            }
        }
        out[..8].copy_from_slice(&mask.to_le_bytes());
        out
    }
}

/// One 64-bit equipment parameter record, a bag of per-slot bit flags.
///
/// Slots own disjoint bit ranges of the record (see [`EquipSlot::eqp_mask`]);
/// manipulations only ever replace the bits of their own slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EqpEntry(pub u64);

impl EqpEntry {
    /// The bits of this entry belonging to `slot`.
    pub fn slot_bits(self, slot: EquipSlot) -> u64 {
        slot.eqp_mask().map_or(0, |mask| self.0 & mask)
    }

    /// This entry with the bits of `slot` replaced by those from `other`.
    pub fn with_slot_from(self, slot: EquipSlot, other: EqpEntry) -> EqpEntry {
        match slot.eqp_mask() {
            Some(mask) => EqpEntry(self.0 & !mask | other.0 & mask),
            None => self,
        }
    }
}

/// The expanded in-memory EQP table.
#[derive(Debug, Clone)]
pub struct EqpFile {
    table: SparseU64Table,
}

impl EqpFile {
    /// Canonical value of records in collapsed blocks: everything visible.
    pub const COLLAPSED_DEFAULT: u64 = u64::MAX;

    /// Decode the shipped EQP bytes.
    pub fn new(default_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            table: SparseU64Table::decode(MetaKind::Eqp, Self::COLLAPSED_DEFAULT, default_bytes)?,
        })
    }

    /// The current record for an equipment set.
    pub fn entry(&self, set_id: u16) -> Result<EqpEntry> {
        self.table.read(set_id as usize).map(EqpEntry)
    }

    /// The shipped default record for an equipment set.
    pub fn default_entry(&self, set_id: u16) -> Result<EqpEntry> {
        self.table.default_value(set_id as usize).map(EqpEntry)
    }

    /// Replace the bits of `slot` in the record for `set_id`.
    ///
    /// Returns whether the stored record changed. Accessory slots have no EQP
    /// representation and are rejected.
    pub fn set_slot(&mut self, set_id: u16, slot: EquipSlot, entry: EqpEntry) -> Result<bool> {
        if slot.eqp_mask().is_none() {
            return Err(MetaError::Validation {
                kind: MetaKind::Eqp,
                reason: format!("slot {slot:?} has no EQP bits"),
            });
        }
        let merged = self.entry(set_id)?.with_slot_from(slot, entry);
        self.table.write(set_id as usize, merged.0)
    }

    /// Restore the shipped default record for `set_id`.
    pub fn reset(&mut self, set_id: u16) -> Result<bool> {
        let default = self.table.default_value(set_id as usize)?;
        self.table.write(set_id as usize, default)
    }

    /// Re-encode, recompacting collapsed blocks.
    pub fn serialize(&self) -> Vec<u8> {
        self.table.serialize()
    }
}

/// One 64-bit gimmick parameter record, unpacked into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmpEntry {
    pub enabled: bool,
    pub animated: bool,
    /// 10-bit rotation values, in degrees.
    pub rotation_a: u16,
    pub rotation_b: u16,
    pub rotation_c: u16,
    /// 4-bit animation parameters.
    pub animation_a: u8,
    pub animation_b: u8,
}

impl GmpEntry {
    /// Unpack from the on-disk 64-bit representation.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            enabled: raw & 1 != 0,
            animated: raw & 2 != 0,
            rotation_a: (raw >> 2 & 0x3FF) as u16,
            rotation_b: (raw >> 12 & 0x3FF) as u16,
            rotation_c: (raw >> 22 & 0x3FF) as u16,
            animation_a: (raw >> 32 & 0xF) as u8,
            animation_b: (raw >> 36 & 0xF) as u8,
        }
    }

    /// Pack into the on-disk 64-bit representation.
    pub fn to_raw(self) -> u64 {
        u64::from(self.enabled)
            | u64::from(self.animated) << 1
            | u64::from(self.rotation_a & 0x3FF) << 2
            | u64::from(self.rotation_b & 0x3FF) << 12
            | u64::from(self.rotation_c & 0x3FF) << 22
            | u64::from(self.animation_a & 0xF) << 32
            | u64::from(self.animation_b & 0xF) << 36
    }
}

/// The expanded in-memory GMP table.
#[derive(Debug, Clone)]
pub struct GmpFile {
    table: SparseU64Table,
}

impl GmpFile {
    /// Canonical value of records in collapsed blocks: no gimmick.
    pub const COLLAPSED_DEFAULT: u64 = 0;

    /// Decode the shipped GMP bytes.
    pub fn new(default_bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            table: SparseU64Table::decode(MetaKind::Gmp, Self::COLLAPSED_DEFAULT, default_bytes)?,
        })
    }

    /// The current record for an equipment set.
    pub fn entry(&self, set_id: u16) -> Result<GmpEntry> {
        self.table.read(set_id as usize).map(GmpEntry::from_raw)
    }

    /// The shipped default record for an equipment set.
    pub fn default_entry(&self, set_id: u16) -> Result<GmpEntry> {
        self.table
            .default_value(set_id as usize)
            .map(GmpEntry::from_raw)
    }

    /// Replace the record for `set_id`. Returns whether it changed.
    pub fn set(&mut self, set_id: u16, entry: GmpEntry) -> Result<bool> {
        self.table.write(set_id as usize, entry.to_raw())
    }

    /// Restore the shipped default record for `set_id`.
    pub fn reset(&mut self, set_id: u16) -> Result<bool> {
        let default = self.table.default_value(set_id as usize)?;
        self.table.write(set_id as usize, default)
    }

    /// Re-encode, recompacting collapsed blocks.
    pub fn serialize(&self) -> Vec<u8> {
        self.table.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DefaultProvider, SyntheticDefaults, TableKey};

    fn eqp() -> EqpFile {
        let bytes = SyntheticDefaults.default_bytes(&TableKey::Eqp).unwrap();
        EqpFile::new(&bytes).unwrap()
    }

    fn gmp() -> GmpFile {
        let bytes = SyntheticDefaults.default_bytes(&TableKey::Gmp).unwrap();
        GmpFile::new(&bytes).unwrap()
    }

    #[test]
    fn test_collapsed_read_returns_default() {
        let file = eqp();
        // Set 5000 lives in a collapsed block of the synthetic default.
        assert_eq!(file.entry(5000).unwrap().0, EqpFile::COLLAPSED_DEFAULT);
    }

    #[test]
    fn test_set_zero_aliases_set_one() {
        let mut file = gmp();
        let entry = GmpEntry {
            enabled: true,
            rotation_a: 90,
            ..Default::default()
        };
        assert!(file.set(0, entry).unwrap());
        assert_eq!(file.entry(1).unwrap(), entry);
        assert_eq!(file.entry(0).unwrap(), entry);
    }

    #[test]
    fn test_write_expands_and_collapse_restores_bytes() {
        let mut file = eqp();
        let before = file.serialize();

        let set_id = 1301;
        let mut entry = file.entry(set_id).unwrap();
        entry = EqpEntry(entry.0 & !2);
        assert!(file.set_slot(set_id, EquipSlot::Body, entry).unwrap());
        let expanded = file.serialize();
        assert_ne!(before, expanded);
        assert_eq!(expanded.len(), before.len() + EQP_BLOCK_SIZE * 8);

        // Writing the default back empties the block and collapses it.
        assert!(file.reset(set_id).unwrap());
        assert_eq!(file.serialize(), before);
    }

    #[test]
    fn test_write_same_value_reports_unchanged() {
        let mut file = gmp();
        assert!(!file.set(100, GmpEntry::default()).unwrap());
        let changed = GmpEntry {
            enabled: true,
            ..Default::default()
        };
        assert!(file.set(100, changed).unwrap());
        assert!(!file.set(100, changed).unwrap());
    }

    #[test]
    fn test_out_of_range_set_id() {
        let file = eqp();
        assert!(matches!(
            file.entry(EQP_RECORD_COUNT as u16),
            Err(MetaError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_slot_merge_preserves_other_slots() {
        let mut file = eqp();
        let set_id = 42;
        let head_mask = EquipSlot::Head.eqp_mask().unwrap();

        // Clear all head bits; body bits must survive.
        assert!(file.set_slot(set_id, EquipSlot::Head, EqpEntry(0)).unwrap());
        let entry = file.entry(set_id).unwrap();
        assert_eq!(entry.0 & head_mask, 0);
        assert_eq!(
            entry.slot_bits(EquipSlot::Body),
            EquipSlot::Body.eqp_mask().unwrap()
        );
    }

    #[test]
    fn test_accessory_slot_rejected() {
        let mut file = eqp();
        assert!(matches!(
            file.set_slot(7, EquipSlot::Ears, EqpEntry(0)),
            Err(MetaError::Validation { .. })
        ));
    }

    #[test]
    fn test_gmp_round_trip_packing() {
        let entry = GmpEntry {
            enabled: true,
            animated: true,
            rotation_a: 0x3FF,
            rotation_b: 1,
            rotation_c: 511,
            animation_a: 0xF,
            animation_b: 3,
        };
        assert_eq!(GmpEntry::from_raw(entry.to_raw()), entry);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            EqpFile::new(&[0u8; 16]),
            Err(MetaError::Decode { .. })
        ));
        // Mask claims block 1 expanded but the bytes end early.
        let mut bytes = vec![0u8; EQP_BLOCK_SIZE * 8];
        bytes[..8].copy_from_slice(&3u64.to_le_bytes());
        assert!(matches!(
            EqpFile::new(&bytes),
            Err(MetaError::Decode { .. })
        ));
    }
}
