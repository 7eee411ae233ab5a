//! A single selectable option within a mod.

use meld_core::{FullPath, GamePath};
use meld_meta::MetaManipulationSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One selectable unit inside a mod.
///
/// When active, an option contributes its file redirects, its cross-path
/// swaps, and its manipulation set to the merge. Options contribute
/// independently; activating one never removes another's contribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModOption {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Game path -> substitute file on disk.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub files: HashMap<GamePath, FullPath>,

    /// Game path -> another game asset's path, served in its place.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub file_swaps: HashMap<GamePath, FullPath>,

    #[serde(default, skip_serializing_if = "MetaManipulationSet::is_empty")]
    pub manipulations: MetaManipulationSet,
}

impl ModOption {
    /// Create an empty option with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether this option contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.file_swaps.is_empty() && self.manipulations.is_empty()
    }

    /// All redirect entries of this option: files first, then swaps.
    pub fn redirects(&self) -> impl Iterator<Item = (&GamePath, &FullPath)> {
        self.files.iter().chain(self.file_swaps.iter())
    }

    /// Drop invalid manipulations, logging each reason.
    pub fn sanitize(&mut self) {
        self.manipulations.retain_valid();
    }
}
