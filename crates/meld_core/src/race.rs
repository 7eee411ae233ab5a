//! Character race, gender, and scaling-attribute identifiers.
//!
//! The structured-parameter files are keyed by a numeric *gender-race code*
//! (one code per playable model skeleton, e.g. `101`/`201` for the male and
//! female variants of the first race) and, for the racial scaling table, by a
//! dense *sub-race* index. Neither set is open-ended: the codes are fixed by
//! the game data, so constructors validate against the known tables.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model gender, derived from the hundreds digit of a gender-race code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Gender {
    Male,
    Female,
}

/// A validated gender-race code, the sub-key for EQDP and EST tables.
///
/// Codes follow the game's `RRG1` scheme: odd hundreds digit pairs are male,
/// even are female, for nine playable races (`101`, `201`, ..., `1801`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct GenderRace(u16);

impl GenderRace {
    /// All known gender-race codes, in ascending code order.
    pub const ALL: [GenderRace; 18] = [
        GenderRace(101),
        GenderRace(201),
        GenderRace(301),
        GenderRace(401),
        GenderRace(501),
        GenderRace(601),
        GenderRace(701),
        GenderRace(801),
        GenderRace(901),
        GenderRace(1001),
        GenderRace(1101),
        GenderRace(1201),
        GenderRace(1301),
        GenderRace(1401),
        GenderRace(1501),
        GenderRace(1601),
        GenderRace(1701),
        GenderRace(1801),
    ];

    /// Validate a raw code.
    pub fn from_code(code: u16) -> Result<Self> {
        if Self::ALL.contains(&GenderRace(code)) {
            Ok(Self(code))
        } else {
            Err(CoreError::InvalidGenderRace(code))
        }
    }

    /// The numeric wire code.
    pub fn code(self) -> u16 {
        self.0
    }

    /// The gender half of the code.
    pub fn gender(self) -> Gender {
        if (self.0 / 100) % 2 == 1 {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

impl fmt::Display for GenderRace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl TryFrom<u16> for GenderRace {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self> {
        Self::from_code(value)
    }
}

impl From<GenderRace> for u16 {
    fn from(value: GenderRace) -> Self {
        value.0
    }
}

/// Number of sub-races in the racial scaling table.
pub const SUB_RACE_COUNT: usize = 16;

/// A dense sub-race index into the racial scaling (RSP) table.
///
/// Two sub-races exist per playable race; the scaling table stores one entry
/// per sub-race, addressed by this index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SubRace(u8);

impl SubRace {
    /// Validate a raw index against the fixed table size.
    pub fn from_index(index: u8) -> Result<Self> {
        if (index as usize) < SUB_RACE_COUNT {
            Ok(Self(index))
        } else {
            Err(CoreError::InvalidSubRace(index))
        }
    }

    /// The dense table index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for SubRace {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_index(value)
    }
}

impl From<SubRace> for u8 {
    fn from(value: SubRace) -> Self {
        value.0
    }
}

/// One named float attribute inside a racial scaling entry.
///
/// Each sub-race entry is a flat array of these, in declaration order. The
/// bust attributes only exist on female models; [`gender`](Self::gender)
/// reports which model a given attribute applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RspAttribute {
    MaleMinSize,
    MaleMaxSize,
    MaleMinTail,
    MaleMaxTail,
    FemaleMinSize,
    FemaleMaxSize,
    FemaleMinTail,
    FemaleMaxTail,
    BustMinX,
    BustMinY,
    BustMinZ,
    BustMaxX,
    BustMaxY,
    BustMaxZ,
}

impl RspAttribute {
    /// All attributes, in entry layout order.
    pub const ALL: [RspAttribute; 14] = [
        RspAttribute::MaleMinSize,
        RspAttribute::MaleMaxSize,
        RspAttribute::MaleMinTail,
        RspAttribute::MaleMaxTail,
        RspAttribute::FemaleMinSize,
        RspAttribute::FemaleMaxSize,
        RspAttribute::FemaleMinTail,
        RspAttribute::FemaleMaxTail,
        RspAttribute::BustMinX,
        RspAttribute::BustMinY,
        RspAttribute::BustMinZ,
        RspAttribute::BustMaxX,
        RspAttribute::BustMaxY,
        RspAttribute::BustMaxZ,
    ];

    /// Offset of this attribute within a sub-race entry, in floats.
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|a| *a == self).unwrap_or(0)
    }

    /// Which model gender this attribute applies to.
    pub fn gender(self) -> Gender {
        match self {
            RspAttribute::MaleMinSize
            | RspAttribute::MaleMaxSize
            | RspAttribute::MaleMinTail
            | RspAttribute::MaleMaxTail => Gender::Male,
            _ => Gender::Female,
        }
    }
}
