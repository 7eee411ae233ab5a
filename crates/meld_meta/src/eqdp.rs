//! EQDP codec: per-race model visibility records behind an offset table.
//!
//! Unlike EQP/GMP, expansion state is not a bitmask but an explicit offset
//! table: one `u16` per block giving the block's position in the data area
//! (in records), with `0xFFFF` marking a collapsed block whose records are
//! implicitly zero. Each record is a `u16` holding a 2-bit
//! (material, model) visibility pair per slot.
//!
//! One file exists per (gender-race, equipment/accessory) pair; the header's
//! identifier field carries the gender-race code.

use crate::defaults::MetaKind;
use crate::error::{MetaError, Result};
use binrw::{binrw, BinRead};
use byteorder::{ReadBytesExt, LE};
use meld_core::{EquipSlot, GenderRace};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// Offset table sentinel for a collapsed block.
const COLLAPSED_OFFSET: u16 = u16::MAX;

/// Fixed EQDP file header.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EqdpHeader {
    /// Gender-race code of the file.
    identifier: u16,
    /// Records per block.
    block_size: u16,
    /// Number of blocks in the offset table.
    block_count: u16,
}

/// One EQDP record: a 2-bit (material, model) pair per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EqdpEntry(pub u16);

impl EqdpEntry {
    /// Bit 0 of a slot pair: the material is present.
    pub const MATERIAL: u16 = 1;
    /// Bit 1 of a slot pair: the model is present.
    pub const MODEL: u16 = 2;

    /// The 2-bit pair belonging to `slot`.
    pub fn slot_bits(self, slot: EquipSlot) -> u16 {
        self.0 >> slot.eqdp_bit_offset() & 0b11
    }

    /// This entry with the pair of `slot` replaced by the pair from `other`.
    pub fn with_slot_from(self, slot: EquipSlot, other: EqdpEntry) -> EqdpEntry {
        let shift = slot.eqdp_bit_offset();
        EqdpEntry(self.0 & !(0b11 << shift) | (other.slot_bits(slot) << shift))
    }

    /// Whether the material bit of `slot` is set.
    pub fn material(self, slot: EquipSlot) -> bool {
        self.slot_bits(slot) & Self::MATERIAL != 0
    }

    /// Whether the model bit of `slot` is set.
    pub fn model(self, slot: EquipSlot) -> bool {
        self.slot_bits(slot) & Self::MODEL != 0
    }
}

/// The expanded in-memory EQDP table for one (gender-race, accessory) pair.
#[derive(Debug, Clone)]
pub struct EqdpFile {
    gender_race: GenderRace,
    accessory: bool,
    header: EqdpHeader,
    blocks: Vec<Option<Box<[u16]>>>,
    defaults: Arc<Vec<Option<Box<[u16]>>>>,
}

impl EqdpFile {
    /// Decode the shipped EQDP bytes for one file.
    pub fn new(gender_race: GenderRace, accessory: bool, default_bytes: &[u8]) -> Result<Self> {
        let decode_err = |reason: String| MetaError::Decode {
            kind: MetaKind::Eqdp,
            reason,
        };

        let mut cursor = Cursor::new(default_bytes);
        let header = EqdpHeader::read(&mut cursor)
            .map_err(|e| decode_err(format!("header: {e}")))?;
        if header.block_size == 0 || header.block_count == 0 {
            return Err(decode_err(format!(
                "degenerate geometry: {} x {}",
                header.block_count, header.block_size
            )));
        }

        let mut offsets = Vec::with_capacity(header.block_count as usize);
        for _ in 0..header.block_count {
            let offset = cursor
                .read_u16::<LE>()
                .map_err(|_| decode_err("truncated offset table".into()))?;
            offsets.push(offset);
        }

        let data_start = cursor.position() as usize;
        let data_bytes = &default_bytes[data_start..];
        if data_bytes.len() % 2 != 0 {
            return Err(decode_err("odd data length".into()));
        }
        let data: Vec<u16> = data_bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        let block_size = header.block_size as usize;
        let mut blocks = Vec::with_capacity(offsets.len());
        for (i, offset) in offsets.iter().enumerate() {
            if *offset == COLLAPSED_OFFSET {
                blocks.push(None);
                continue;
            }
            let start = *offset as usize;
            let end = start + block_size;
            if end > data.len() {
                return Err(decode_err(format!(
                    "block {i} offset {start} exceeds data area of {} records",
                    data.len()
                )));
            }
            blocks.push(Some(data[start..end].to_vec().into_boxed_slice()));
        }

        Ok(Self {
            gender_race,
            accessory,
            header,
            blocks: blocks.clone(),
            defaults: Arc::new(blocks),
        })
    }

    /// The gender-race this file belongs to.
    pub fn gender_race(&self) -> GenderRace {
        self.gender_race
    }

    /// Whether this is the accessory file for its gender-race.
    pub fn is_accessory(&self) -> bool {
        self.accessory
    }

    fn record_count(&self) -> usize {
        self.header.block_size as usize * self.header.block_count as usize
    }

    fn locate(&self, set_id: u16) -> Result<(usize, usize)> {
        let index = set_id as usize;
        if index >= self.record_count() {
            return Err(MetaError::OutOfRange {
                kind: MetaKind::Eqdp,
                what: "set id",
                value: index,
                max: self.record_count() - 1,
            });
        }
        let block_size = self.header.block_size as usize;
        Ok((index / block_size, index % block_size))
    }

    fn default_record(&self, block: usize, record: usize) -> u16 {
        match &self.defaults[block] {
            Some(records) => records[record],
            None => 0,
        }
    }

    /// The current record for an equipment set.
    pub fn entry(&self, set_id: u16) -> Result<EqdpEntry> {
        let (block, record) = self.locate(set_id)?;
        Ok(EqdpEntry(match &self.blocks[block] {
            Some(records) => records[record],
            None => self.default_record(block, record),
        }))
    }

    /// The shipped default record for an equipment set.
    pub fn default_entry(&self, set_id: u16) -> Result<EqdpEntry> {
        let (block, record) = self.locate(set_id)?;
        Ok(EqdpEntry(self.default_record(block, record)))
    }

    /// Replace the 2-bit pair of `slot` in the record for `set_id`.
    ///
    /// The slot family must match the file: equipment slots for the equipment
    /// file, accessory slots for the accessory file.
    pub fn set_slot(&mut self, set_id: u16, slot: EquipSlot, entry: EqdpEntry) -> Result<bool> {
        if slot.is_accessory() != self.accessory {
            return Err(MetaError::Validation {
                kind: MetaKind::Eqdp,
                reason: format!(
                    "slot {slot:?} does not belong to the {} file",
                    if self.accessory { "accessory" } else { "equipment" }
                ),
            });
        }
        let merged = self.entry(set_id)?.with_slot_from(slot, entry);
        self.write(set_id, merged)
    }

    /// Restore the shipped default record for `set_id`.
    pub fn reset(&mut self, set_id: u16) -> Result<bool> {
        let default = self.default_entry(set_id)?;
        self.write(set_id, default)
    }

    fn write(&mut self, set_id: u16, entry: EqdpEntry) -> Result<bool> {
        let (block, record) = self.locate(set_id)?;
        let current = self.entry(set_id)?;
        if current == entry {
            return Ok(false);
        }

        let default = self.default_record(block, record);
        if let Some(records) = &mut self.blocks[block] {
            records[record] = entry.0;
            if entry.0 == default {
                self.try_collapse(block);
            }
        } else {
            let block_size = self.header.block_size as usize;
            let mut records = vec![0u16; block_size].into_boxed_slice();
            for (i, slot) in records.iter_mut().enumerate() {
                *slot = self.default_record(block, i);
            }
            records[record] = entry.0;
            self.blocks[block] = Some(records);
        }

        Ok(true)
    }

    /// Collapse `block` if all its records are zero again.
    ///
    /// Blocks the shipped file stores expanded stay expanded so that
    /// serialization stays byte-identical when nothing effective changed.
    fn try_collapse(&mut self, block: usize) {
        if self.defaults[block].is_some() {
            return;
        }
        let empty = self.blocks[block]
            .as_ref()
            .is_some_and(|records| records.iter().all(|r| *r == 0));
        if empty {
            self.blocks[block] = None;
        }
    }

    /// Re-encode, recompacting the offset table and data area.
    pub fn serialize(&self) -> Vec<u8> {
        let block_size = self.header.block_size as usize;
        let expanded = self.blocks.iter().filter(|b| b.is_some()).count();
        let mut out =
            Vec::with_capacity(6 + self.blocks.len() * 2 + expanded * block_size * 2);
        out.extend_from_slice(&self.header.identifier.to_le_bytes());
        out.extend_from_slice(&self.header.block_size.to_le_bytes());
        out.extend_from_slice(&self.header.block_count.to_le_bytes());

        let mut offset = 0u16;
        for block in &self.blocks {
            if block.is_some() {
                out.extend_from_slice(&offset.to_le_bytes());
                offset += block_size as u16;
            } else {
                out.extend_from_slice(&COLLAPSED_OFFSET.to_le_bytes());
            }
        }
        for block in self.blocks.iter().flatten() {
            for record in block.iter() {
                out.extend_from_slice(&record.to_le_bytes());
            }
        }
        out
    }
}
