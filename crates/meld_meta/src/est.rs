//! EST codec: a sorted, dense array of extra skeleton ids.
//!
//! The file is a leading record count followed by `count` (gender-race,
//! set-id) key pairs and a parallel array of `count` 16-bit skeleton ids.
//! Keys are strictly sorted, so lookups are binary searches; insertion and
//! removal shift the tails of both arrays. A skeleton id of zero means "no
//! entry": writing zero removes a key, and absent keys read as zero.

use crate::defaults::MetaKind;
use crate::error::{MetaError, Result};
use byteorder::{ReadBytesExt, LE};
use meld_core::GenderRace;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// Allocation growth increment, in entries.
const GROWTH_INCREMENT: usize = 64;

/// Sort key of one EST row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstKey {
    pub gender_race: GenderRace,
    pub set_id: u16,
}

/// The expanded in-memory EST table for one category (hair/face/body/head).
#[derive(Debug, Clone)]
pub struct EstFile {
    keys: Vec<EstKey>,
    values: Vec<u16>,
    defaults: Arc<(Vec<EstKey>, Vec<u16>)>,
}

impl EstFile {
    /// Decode the shipped EST bytes.
    pub fn new(default_bytes: &[u8]) -> Result<Self> {
        let decode_err = |reason: String| MetaError::Decode {
            kind: MetaKind::Est,
            reason,
        };

        let mut cursor = Cursor::new(default_bytes);
        let count = cursor
            .read_u32::<LE>()
            .map_err(|_| decode_err("missing record count".into()))? as usize;
        let expected = 4 + count * 6;
        if default_bytes.len() != expected {
            return Err(decode_err(format!(
                "length {} does not match count {count} (expected {expected})",
                default_bytes.len()
            )));
        }

        let mut keys = Vec::with_capacity(count);
        for i in 0..count {
            let code = cursor.read_u16::<LE>()?;
            let set_id = cursor.read_u16::<LE>()?;
            let gender_race = GenderRace::from_code(code)
                .map_err(|_| decode_err(format!("row {i}: unknown gender-race {code}")))?;
            keys.push(EstKey {
                gender_race,
                set_id,
            });
        }
        if !keys.windows(2).all(|w| w[0] < w[1]) {
            return Err(decode_err("keys not strictly sorted".into()));
        }

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(cursor.read_u16::<LE>()?);
        }

        Ok(Self {
            keys: keys.clone(),
            values: values.clone(),
            defaults: Arc::new((keys, values)),
        })
    }

    /// Number of rows currently stored.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The current skeleton id for `key`, zero when absent.
    pub fn skeleton(&self, key: EstKey) -> u16 {
        match self.keys.binary_search(&key) {
            Ok(i) => self.values[i],
            Err(_) => 0,
        }
    }

    /// The shipped default skeleton id for `key`, zero when absent.
    pub fn default_skeleton(&self, key: EstKey) -> u16 {
        let (keys, values) = &*self.defaults;
        match keys.binary_search(&key) {
            Ok(i) => values[i],
            Err(_) => 0,
        }
    }

    /// Set the skeleton id for `key`. Zero removes the row.
    ///
    /// Returns whether the table changed.
    pub fn set(&mut self, key: EstKey, skeleton_id: u16) -> bool {
        match self.keys.binary_search(&key) {
            Ok(i) if skeleton_id == 0 => {
                self.keys.remove(i);
                self.values.remove(i);
                true
            }
            Ok(i) => {
                if self.values[i] == skeleton_id {
                    false
                } else {
                    self.values[i] = skeleton_id;
                    true
                }
            }
            Err(_) if skeleton_id == 0 => false,
            Err(i) => {
                if self.keys.len() == self.keys.capacity() {
                    self.keys.reserve(GROWTH_INCREMENT);
                    self.values.reserve(GROWTH_INCREMENT);
                }
                self.keys.insert(i, key);
                self.values.insert(i, skeleton_id);
                true
            }
        }
    }

    /// Restore the shipped default for `key`.
    pub fn reset(&mut self, key: EstKey) -> bool {
        self.set(key, self.default_skeleton(key))
    }

    /// Re-encode: count, sorted key pairs, parallel values.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.keys.len() * 6);
        out.extend_from_slice(&(self.keys.len() as u32).to_le_bytes());
        for key in &self.keys {
            out.extend_from_slice(&key.gender_race.code().to_le_bytes());
            out.extend_from_slice(&key.set_id.to_le_bytes());
        }
        for value in &self.values {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    #[cfg(test)]
    fn keys(&self) -> &[EstKey] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(code: u16, set_id: u16) -> EstKey {
        EstKey {
            gender_race: GenderRace::from_code(code).unwrap(),
            set_id,
        }
    }

    fn empty() -> EstFile {
        EstFile::new(&0u32.to_le_bytes()).unwrap()
    }

    fn populated() -> EstFile {
        let mut file = empty();
        file.set(key(101, 5), 10);
        file.set(key(101, 7), 11);
        file.set(key(201, 1), 12);
        file
    }

    #[test]
    fn test_lookup_and_absent_reads_zero() {
        let file = populated();
        assert_eq!(file.skeleton(key(101, 5)), 10);
        assert_eq!(file.skeleton(key(101, 6)), 0);
        assert_eq!(file.skeleton(key(1801, 99)), 0);
    }

    #[test]
    fn test_zero_removes_row() {
        let mut file = populated();
        assert_eq!(file.len(), 3);
        assert!(file.set(key(101, 5), 0));
        assert_eq!(file.len(), 2);
        assert_eq!(file.skeleton(key(101, 5)), 0);
        // Removing an absent key is not a change.
        assert!(!file.set(key(101, 5), 0));
    }

    #[test]
    fn test_serialize_round_trip() {
        let file = populated();
        let bytes = file.serialize();
        let back = EstFile::new(&bytes).unwrap();
        assert_eq!(back.keys(), file.keys());
        assert_eq!(back.skeleton(key(201, 1)), 12);
    }

    #[test]
    fn test_decode_rejects_unsorted() {
        let mut file = populated();
        file.keys.swap(0, 1);
        let bytes = file.serialize();
        assert!(matches!(
            EstFile::new(&bytes),
            Err(MetaError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let mut bytes = 5u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            EstFile::new(&bytes),
            Err(MetaError::Decode { .. })
        ));
    }

    proptest! {
        /// After any sequence of sets and removes the key array stays
        /// strictly sorted, so binary search remains valid throughout.
        #[test]
        fn prop_sort_invariant(ops in prop::collection::vec(
            (0usize..18, any::<u16>(), any::<u16>()),
            0..200,
        )) {
            let mut file = empty();
            for (race_index, set_id, skeleton_id) in ops {
                let gender_race = GenderRace::ALL[race_index];
                file.set(EstKey { gender_race, set_id }, skeleton_id);
                prop_assert!(file.keys().windows(2).all(|w| w[0] < w[1]));
            }
            let bytes = file.serialize();
            let reread = EstFile::new(&bytes).unwrap();
            prop_assert_eq!(reread.keys(), file.keys());
        }
    }
}
