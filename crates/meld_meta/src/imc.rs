//! IMC codec: per-variant material parameters.
//!
//! An IMC file starts with a variant count and an active-part bitmask. The
//! body is one *default variant* record per active part, followed by `count`
//! rows of one record per active part. Variant 0 addresses the default row;
//! variants 1..=count address stored rows. Growing the variant count clones
//! the default row into every newly created row, so new variants read exactly
//! like variant 0 until written.
//!
//! One file exists per [`ImcKey`]; equipment and accessory files carry five
//! parts (one per slot), the other object types a single part.

use crate::defaults::{ImcKey, MetaKind};
use crate::error::{MetaError, Result};
use binrw::{binrw, BinRead};
use byteorder::{ReadBytesExt, LE};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// One 6-byte IMC record.
///
/// The attribute mask is 10 bits and the sound id 6 bits; they share a `u16`
/// on disk ([`RawImcEntry`]) and are kept separate here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImcEntry {
    pub material_id: u8,
    pub decal_id: u8,
    pub attribute_mask: u16,
    pub sound_id: u8,
    pub vfx_id: u8,
    pub material_animation_id: u8,
}

impl ImcEntry {
    /// Maximum attribute mask (10 bits).
    pub const MAX_ATTRIBUTE_MASK: u16 = 0x3FF;
    /// Maximum sound id (6 bits).
    pub const MAX_SOUND_ID: u8 = 0x3F;
}

/// Wire form of an [`ImcEntry`].
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct RawImcEntry {
    material_id: u8,
    decal_id: u8,
    attribute_and_sound: u16,
    vfx_id: u8,
    material_animation_id: u8,
}

impl From<RawImcEntry> for ImcEntry {
    fn from(raw: RawImcEntry) -> Self {
        Self {
            material_id: raw.material_id,
            decal_id: raw.decal_id,
            attribute_mask: raw.attribute_and_sound & ImcEntry::MAX_ATTRIBUTE_MASK,
            sound_id: (raw.attribute_and_sound >> 10) as u8,
            vfx_id: raw.vfx_id,
            material_animation_id: raw.material_animation_id,
        }
    }
}

impl From<ImcEntry> for RawImcEntry {
    fn from(entry: ImcEntry) -> Self {
        Self {
            material_id: entry.material_id,
            decal_id: entry.decal_id,
            attribute_and_sound: entry.attribute_mask & ImcEntry::MAX_ATTRIBUTE_MASK
                | u16::from(entry.sound_id & ImcEntry::MAX_SOUND_ID) << 10,
            vfx_id: entry.vfx_id,
            material_animation_id: entry.material_animation_id,
        }
    }
}

/// One active part: its default-variant record plus the stored variant rows.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImcPart {
    default_variant: ImcEntry,
    variants: Vec<ImcEntry>,
}

/// The expanded in-memory IMC file for one [`ImcKey`].
#[derive(Debug, Clone)]
pub struct ImcFile {
    key: ImcKey,
    part_mask: u16,
    count: u16,
    parts: Vec<ImcPart>,
    defaults: Arc<(u16, Vec<ImcPart>)>,
}

impl ImcFile {
    /// Decode the shipped IMC bytes for one file.
    pub fn new(key: ImcKey, default_bytes: &[u8]) -> Result<Self> {
        let decode_err = |reason: String| MetaError::Decode {
            kind: MetaKind::Imc,
            reason,
        };

        let mut cursor = Cursor::new(default_bytes);
        let count = cursor
            .read_u16::<LE>()
            .map_err(|_| decode_err("missing header".into()))?;
        let part_mask = cursor
            .read_u16::<LE>()
            .map_err(|_| decode_err("missing part mask".into()))?;
        let part_count = part_mask.count_ones() as usize;
        if part_count == 0 {
            return Err(decode_err("empty part mask".into()));
        }

        let expected = 4 + (count as usize + 1) * part_count * 6;
        if default_bytes.len() != expected {
            return Err(decode_err(format!(
                "length {} does not match {count} variants x {part_count} parts (expected {expected})",
                default_bytes.len()
            )));
        }

        let mut read_row = |cursor: &mut Cursor<&[u8]>| -> Result<Vec<ImcEntry>> {
            (0..part_count)
                .map(|_| Ok(ImcEntry::from(RawImcEntry::read(cursor)?)))
                .collect()
        };

        let default_row = read_row(&mut cursor)?;
        let mut parts: Vec<ImcPart> = default_row
            .into_iter()
            .map(|default_variant| ImcPart {
                default_variant,
                variants: Vec::with_capacity(count as usize),
            })
            .collect();
        for _ in 0..count {
            let row = read_row(&mut cursor)?;
            for (part, entry) in parts.iter_mut().zip(row) {
                part.variants.push(entry);
            }
        }

        Ok(Self {
            key,
            part_mask,
            count,
            parts: parts.clone(),
            defaults: Arc::new((count, parts)),
        })
    }

    /// The sub-key this file belongs to.
    pub fn key(&self) -> ImcKey {
        self.key
    }

    /// Number of stored variants, excluding the default variant 0.
    pub fn variant_count(&self) -> u16 {
        self.count
    }

    /// Number of active parts.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    fn check_address(&self, part_index: usize, variant: u16) -> Result<()> {
        if part_index >= self.parts.len() {
            return Err(MetaError::OutOfRange {
                kind: MetaKind::Imc,
                what: "part index",
                value: part_index,
                max: self.parts.len() - 1,
            });
        }
        if variant > self.count {
            return Err(MetaError::OutOfRange {
                kind: MetaKind::Imc,
                what: "variant",
                value: variant as usize,
                max: self.count as usize,
            });
        }
        Ok(())
    }

    /// The current record at (part, variant). Variant 0 is the default row.
    pub fn entry(&self, part_index: usize, variant: u16) -> Result<ImcEntry> {
        self.check_address(part_index, variant)?;
        let part = &self.parts[part_index];
        Ok(match variant {
            0 => part.default_variant,
            v => part.variants[v as usize - 1],
        })
    }

    /// The shipped default record at (part, variant).
    ///
    /// Variants beyond the shipped count fall back to the shipped default
    /// row, matching how growth materializes them.
    pub fn default_entry(&self, part_index: usize, variant: u16) -> Result<ImcEntry> {
        if part_index >= self.parts.len() {
            return Err(MetaError::OutOfRange {
                kind: MetaKind::Imc,
                what: "part index",
                value: part_index,
                max: self.parts.len() - 1,
            });
        }
        let (default_count, parts) = &*self.defaults;
        let part = &parts[part_index];
        Ok(match variant {
            0 => part.default_variant,
            v if v <= *default_count => part.variants[v as usize - 1],
            _ => part.default_variant,
        })
    }

    /// Replace the record at (part, variant). Returns whether it changed.
    pub fn set(&mut self, part_index: usize, variant: u16, entry: ImcEntry) -> Result<bool> {
        self.check_address(part_index, variant)?;
        let part = &mut self.parts[part_index];
        let slot = match variant {
            0 => &mut part.default_variant,
            v => &mut part.variants[v as usize - 1],
        };
        if *slot == entry {
            return Ok(false);
        }
        *slot = entry;
        Ok(true)
    }

    /// Restore the shipped default record at (part, variant).
    pub fn reset(&mut self, part_index: usize, variant: u16) -> Result<bool> {
        let default = self.default_entry(part_index, variant)?;
        self.set(part_index, variant, default)
    }

    /// Grow the table so that at least `count` variants exist.
    ///
    /// Every newly created row is a copy of its part's default-variant record.
    /// Shrinking never happens here; a smaller count is a no-op.
    pub fn ensure_variant_count(&mut self, count: usize) -> Result<bool> {
        if count > u16::MAX as usize {
            return Err(MetaError::Capacity {
                kind: MetaKind::Imc,
                requested: count,
                max: u16::MAX as usize,
            });
        }
        if count <= self.count as usize {
            return Ok(false);
        }
        for part in &mut self.parts {
            let default = part.default_variant;
            part.variants.resize(count, default);
        }
        self.count = count as u16;
        Ok(true)
    }

    /// Re-encode: header, default row, then one row per variant.
    pub fn serialize(&self) -> Vec<u8> {
        let part_count = self.parts.len();
        let mut out = Vec::with_capacity(4 + (self.count as usize + 1) * part_count * 6);
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.part_mask.to_le_bytes());

        let push = |out: &mut Vec<u8>, entry: ImcEntry| {
            let raw = RawImcEntry::from(entry);
            out.push(raw.material_id);
            out.push(raw.decal_id);
            out.extend_from_slice(&raw.attribute_and_sound.to_le_bytes());
            out.push(raw.vfx_id);
            out.push(raw.material_animation_id);
        };
        for part in &self.parts {
            push(&mut out, part.default_variant);
        }
        for variant in 0..self.count as usize {
            for part in &self.parts {
                push(&mut out, part.variants[variant]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinWrite;
    use meld_core::ObjectType;

    fn weapon_key() -> ImcKey {
        ImcKey {
            object_type: ObjectType::Weapon,
            primary_id: 201,
            secondary_id: 1,
        }
    }

    fn file_with_default(default: ImcEntry, count: u16, parts: u16) -> ImcFile {
        let part_mask = (1u16 << parts) - 1;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&part_mask.to_le_bytes());
        let mut cursor = Cursor::new(&mut bytes);
        cursor.set_position(4);
        for _ in 0..(count as usize + 1) * parts as usize {
            RawImcEntry::from(default).write(&mut cursor).unwrap();
        }
        ImcFile::new(weapon_key(), &bytes).unwrap()
    }

    #[test]
    fn test_growth_duplicates_default_row() {
        let default = ImcEntry {
            material_id: 3,
            sound_id: 5,
            ..Default::default()
        };
        let mut file = file_with_default(default, 1, 2);
        assert!(file.ensure_variant_count(5).unwrap());
        assert_eq!(file.variant_count(), 5);
        for part in 0..2 {
            for variant in 2..=5 {
                assert_eq!(file.entry(part, variant).unwrap(), default);
            }
        }
        // Growing to a smaller count is a no-op.
        assert!(!file.ensure_variant_count(3).unwrap());
        assert_eq!(file.variant_count(), 5);
    }

    #[test]
    fn test_variant_out_of_range() {
        let file = file_with_default(ImcEntry::default(), 2, 1);
        assert!(file.entry(0, 2).is_ok());
        assert!(matches!(
            file.entry(0, 3),
            Err(MetaError::OutOfRange { .. })
        ));
        assert!(matches!(
            file.entry(1, 0),
            Err(MetaError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_capacity_overflow() {
        let mut file = file_with_default(ImcEntry::default(), 1, 1);
        assert!(matches!(
            file.ensure_variant_count(u16::MAX as usize + 1),
            Err(MetaError::Capacity { .. })
        ));
    }

    #[test]
    fn test_set_and_serialize_round_trip() {
        let mut file = file_with_default(ImcEntry::default(), 2, 3);
        let entry = ImcEntry {
            material_id: 7,
            decal_id: 1,
            attribute_mask: 0x155,
            sound_id: 12,
            vfx_id: 9,
            material_animation_id: 2,
        };
        assert!(file.set(1, 2, entry).unwrap());
        assert!(!file.set(1, 2, entry).unwrap());

        let bytes = file.serialize();
        let back = ImcFile::new(weapon_key(), &bytes).unwrap();
        assert_eq!(back.entry(1, 2).unwrap(), entry);
        assert_eq!(back.entry(0, 2).unwrap(), ImcEntry::default());
    }

    #[test]
    fn test_grown_file_serializes_new_rows() {
        let default = ImcEntry {
            vfx_id: 4,
            ..Default::default()
        };
        let mut file = file_with_default(default, 0, 1);
        file.ensure_variant_count(3).unwrap();
        let back = ImcFile::new(weapon_key(), &file.serialize()).unwrap();
        assert_eq!(back.variant_count(), 3);
        assert_eq!(back.entry(0, 3).unwrap(), default);
    }

    #[test]
    fn test_reset_beyond_shipped_count_uses_default_row() {
        let default = ImcEntry {
            material_id: 9,
            ..Default::default()
        };
        let mut file = file_with_default(default, 1, 1);
        file.ensure_variant_count(4).unwrap();
        let other = ImcEntry {
            material_id: 1,
            ..Default::default()
        };
        file.set(0, 4, other).unwrap();
        assert!(file.reset(0, 4).unwrap());
        assert_eq!(file.entry(0, 4).unwrap(), default);
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let bytes = [1u8, 0, 1, 0, 0, 0];
        assert!(matches!(
            ImcFile::new(weapon_key(), &bytes),
            Err(MetaError::Decode { .. })
        ));
    }

    #[test]
    fn test_attribute_sound_packing() {
        let entry = ImcEntry {
            attribute_mask: 0x3FF,
            sound_id: 0x3F,
            ..Default::default()
        };
        let raw = RawImcEntry::from(entry);
        assert_eq!(raw.attribute_and_sound, u16::MAX);
        assert_eq!(ImcEntry::from(raw), entry);
    }
}
