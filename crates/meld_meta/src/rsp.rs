//! RSP/CMP codec: racial scaling floats at the tail of the charamake table.
//!
//! The file is a large preamble (an unrelated byte table this engine never
//! interprets, carried verbatim) followed by one fixed-size entry per
//! sub-race. Each entry is a flat array of named float attributes
//! ([`RspAttribute`]), addressed by index.

use crate::defaults::MetaKind;
use crate::error::{MetaError, Result};
use meld_core::{RspAttribute, SubRace, SUB_RACE_COUNT};
use std::sync::Arc;

/// Size of one sub-race entry in bytes.
pub const RSP_ENTRY_SIZE: usize = RspAttribute::ALL.len() * 4;

type RspEntry = [f32; RspAttribute::ALL.len()];

/// The expanded in-memory racial scaling table.
#[derive(Debug, Clone)]
pub struct RspFile {
    preamble: Arc<[u8]>,
    entries: Vec<RspEntry>,
    defaults: Arc<Vec<RspEntry>>,
}

impl RspFile {
    /// Decode the shipped table bytes.
    ///
    /// Everything before the final `SUB_RACE_COUNT` entries is preamble and
    /// is preserved byte-for-byte through [`serialize`](Self::serialize).
    pub fn new(default_bytes: &[u8]) -> Result<Self> {
        let tail = SUB_RACE_COUNT * RSP_ENTRY_SIZE;
        if default_bytes.len() < tail {
            return Err(MetaError::Decode {
                kind: MetaKind::Rsp,
                reason: format!(
                    "length {} shorter than {tail}-byte scaling tail",
                    default_bytes.len()
                ),
            });
        }

        let split = default_bytes.len() - tail;
        let (preamble, scaling) = default_bytes.split_at(split);

        let mut entries = Vec::with_capacity(SUB_RACE_COUNT);
        for chunk in scaling.chunks_exact(RSP_ENTRY_SIZE) {
            let mut entry = [0f32; RspAttribute::ALL.len()];
            for (value, bytes) in entry.iter_mut().zip(chunk.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            entries.push(entry);
        }

        Ok(Self {
            preamble: preamble.into(),
            entries: entries.clone(),
            defaults: Arc::new(entries),
        })
    }

    /// The current value of one scaling attribute.
    pub fn value(&self, sub_race: SubRace, attribute: RspAttribute) -> f32 {
        self.entries[sub_race.index()][attribute.index()]
    }

    /// The shipped default value of one scaling attribute.
    pub fn default_value(&self, sub_race: SubRace, attribute: RspAttribute) -> f32 {
        self.defaults[sub_race.index()][attribute.index()]
    }

    /// Set one scaling attribute. Returns whether the stored bits changed.
    pub fn set(&mut self, sub_race: SubRace, attribute: RspAttribute, value: f32) -> bool {
        let slot = &mut self.entries[sub_race.index()][attribute.index()];
        if slot.to_bits() == value.to_bits() {
            return false;
        }
        *slot = value;
        true
    }

    /// Restore the shipped default for one attribute.
    pub fn reset(&mut self, sub_race: SubRace, attribute: RspAttribute) -> bool {
        self.set(sub_race, attribute, self.default_value(sub_race, attribute))
    }

    /// Re-encode: preamble verbatim, then all sub-race entries.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.preamble.len() + SUB_RACE_COUNT * RSP_ENTRY_SIZE);
        out.extend_from_slice(&self.preamble);
        for entry in &self.entries {
            for value in entry {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{DefaultProvider, SyntheticDefaults, TableKey};

    fn file() -> RspFile {
        let bytes = SyntheticDefaults.default_bytes(&TableKey::Rsp).unwrap();
        RspFile::new(&bytes).unwrap()
    }

    #[test]
    fn test_defaults_read_back() {
        let file = file();
        let sub_race = SubRace::from_index(3).unwrap();
        assert_eq!(file.value(sub_race, RspAttribute::MaleMaxSize), 1.0);
    }

    #[test]
    fn test_set_and_reset() {
        let mut file = file();
        let sub_race = SubRace::from_index(0).unwrap();
        assert!(file.set(sub_race, RspAttribute::FemaleMinSize, 0.5));
        assert!(!file.set(sub_race, RspAttribute::FemaleMinSize, 0.5));
        assert_eq!(file.value(sub_race, RspAttribute::FemaleMinSize), 0.5);
        // Neighbouring attributes are untouched.
        assert_eq!(file.value(sub_race, RspAttribute::FemaleMaxSize), 1.0);

        assert!(file.reset(sub_race, RspAttribute::FemaleMinSize));
        assert_eq!(file.value(sub_race, RspAttribute::FemaleMinSize), 1.0);
    }

    #[test]
    fn test_serialize_preserves_preamble() {
        let bytes = SyntheticDefaults.default_bytes(&TableKey::Rsp).unwrap();
        let mut file = RspFile::new(&bytes).unwrap();
        assert_eq!(file.serialize(), bytes.as_ref());

        let sub_race = SubRace::from_index(9).unwrap();
        file.set(sub_race, RspAttribute::BustMaxZ, 2.0);
        let out = file.serialize();
        assert_eq!(out.len(), bytes.len());
        assert_eq!(&out[..32], &bytes[..32]);
        assert_ne!(out, bytes.as_ref());
    }

    #[test]
    fn test_decode_rejects_short_input() {
        assert!(matches!(
            RspFile::new(&[0u8; 100]),
            Err(MetaError::Decode { .. })
        ));
    }
}
