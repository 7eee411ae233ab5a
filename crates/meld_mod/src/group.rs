//! Option groups: single-choice and multi-choice containers.

use crate::option::ModOption;
use serde::{Deserialize, Serialize};

/// Maximum number of options a multi group can hold.
///
/// Selections for multi groups are a `u32` bitmask, one bit per option.
pub const MAX_MULTI_OPTIONS: usize = 32;

/// A group of exactly-one-active options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleGroup {
    pub name: String,

    /// Orders this group against the mod's other groups (higher first).
    #[serde(default)]
    pub priority: i32,

    /// Selected option index when no settings exist.
    #[serde(default)]
    pub default_index: u32,

    #[serde(default)]
    pub options: Vec<ModOption>,
}

/// One option of a multi group, carrying its own priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiOption {
    #[serde(flatten)]
    pub option: ModOption,

    /// Orders this option against the group's other active options.
    #[serde(default)]
    pub priority: i32,
}

/// A group of any-subset-active options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiGroup {
    pub name: String,

    /// Orders this group against the mod's other groups (higher first).
    #[serde(default)]
    pub priority: i32,

    /// Active option bitmask when no settings exist.
    #[serde(default)]
    pub default_mask: u32,

    #[serde(default)]
    pub options: Vec<MultiOption>,
}

/// A container of selectable options, polymorphic over selection shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OptionGroup {
    Single(SingleGroup),
    Multi(MultiGroup),
}

impl OptionGroup {
    pub fn name(&self) -> &str {
        match self {
            OptionGroup::Single(g) => &g.name,
            OptionGroup::Multi(g) => &g.name,
        }
    }

    /// Priority ordering this group against the mod's other groups.
    pub fn priority(&self) -> i32 {
        match self {
            OptionGroup::Single(g) => g.priority,
            OptionGroup::Multi(g) => g.priority,
        }
    }

    /// Number of options in the group.
    pub fn len(&self) -> usize {
        match self {
            OptionGroup::Single(g) => g.options.len(),
            OptionGroup::Multi(g) => g.options.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored selection value used when settings are absent.
    ///
    /// An option index for single groups, a bitmask for multi groups.
    pub fn default_selection(&self) -> u32 {
        match self {
            OptionGroup::Single(g) => g.default_index,
            OptionGroup::Multi(g) => g.default_mask,
        }
    }

    /// Clamp a raw selection value to this group's current shape.
    ///
    /// Single: indices past the end clamp to the last option (or zero when
    /// the group is empty). Multi: bits without a matching option are masked
    /// away.
    pub fn clamp_selection(&self, selection: u32) -> u32 {
        match self {
            OptionGroup::Single(g) => {
                if g.options.is_empty() {
                    0
                } else {
                    selection.min(g.options.len() as u32 - 1)
                }
            }
            OptionGroup::Multi(g) => {
                let valid = if g.options.len() >= MAX_MULTI_OPTIONS {
                    u32::MAX
                } else {
                    (1u32 << g.options.len()) - 1
                };
                selection & valid
            }
        }
    }

    /// Drop invalid manipulations from every option.
    pub fn sanitize(&mut self) {
        match self {
            OptionGroup::Single(g) => {
                for option in &mut g.options {
                    option.sanitize();
                }
            }
            OptionGroup::Multi(g) => {
                for option in &mut g.options {
                    option.option.sanitize();
                }
            }
        }
    }
}
