//! Per-collection mod settings and their persistence.
//!
//! Settings exist per (mod, collection) pair and are independent of the mod's
//! own definition files: a collection with no stored settings for a mod falls
//! back to its inheritance parent, then to [`ModSettings::default_for`].
//! Because a mod can be edited after settings were saved, raw selection
//! values are clamped against the mod's current shape by
//! [`ModSettings::repair`]; merge-time consumers must tolerate (skip, never
//! panic on) any shape mismatch that repair has not yet seen.

use crate::error::Result;
use crate::mod_data::Mod;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

/// The configuration of one mod within one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModSettings {
    /// Whether the mod contributes to the merge at all.
    #[serde(default)]
    pub enabled: bool,

    /// Orders this mod against all other enabled mods (higher wins).
    #[serde(default)]
    pub priority: i32,

    /// One raw selection value per option group, in group order:
    /// an option index for single groups, a bitmask for multi groups.
    #[serde(default)]
    pub selections: Vec<u32>,
}

impl ModSettings {
    /// The settings used when a collection stores none: disabled, priority
    /// zero, every group at its default selection.
    pub fn default_for(mod_data: &Mod) -> Self {
        Self {
            enabled: false,
            priority: 0,
            selections: mod_data
                .groups
                .iter()
                .map(|g| g.default_selection())
                .collect(),
        }
    }

    /// The effective selection for group `index`, falling back to the group
    /// default when the stored vector is too short.
    pub fn selection(&self, mod_data: &Mod, index: usize) -> u32 {
        self.selections
            .get(index)
            .copied()
            .unwrap_or_else(|| {
                mod_data
                    .groups
                    .get(index)
                    .map_or(0, |g| g.default_selection())
            })
    }

    /// Clamp stored selections to the mod's current shape.
    ///
    /// Returns whether anything changed. Run when a mod definition is
    /// reloaded; the merge itself never repairs, only skips.
    pub fn repair(&mut self, mod_data: &Mod) -> bool {
        let mut changed = false;

        if self.selections.len() > mod_data.groups.len() {
            self.selections.truncate(mod_data.groups.len());
            changed = true;
        }
        while self.selections.len() < mod_data.groups.len() {
            let group = &mod_data.groups[self.selections.len()];
            self.selections.push(group.default_selection());
            changed = true;
        }

        for (selection, group) in self.selections.iter_mut().zip(&mod_data.groups) {
            let clamped = group.clamp_selection(*selection);
            if clamped != *selection {
                tracing::info!(
                    "Repaired selection for group '{}': {} -> {}",
                    group.name(),
                    *selection,
                    clamped
                );
                *selection = clamped;
                changed = true;
            }
        }

        changed
    }
}

/// Persisted per-collection settings, keyed by mod id.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "settings": {
///     "some-mod": { "enabled": true, "priority": 5, "selections": [0, 3] }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    /// Schema version (current: `1`).
    pub version: u32,

    #[serde(default)]
    pub settings: HashMap<String, ModSettings>,
}

impl SettingsFile {
    pub fn new(settings: HashMap<String, ModSettings>) -> Self {
        Self {
            version: 1,
            settings,
        }
    }

    /// Load a settings file from disk.
    ///
    /// Returns `Ok(None)` if the file doesn't exist; parse failures are
    /// logged and also yield `Ok(None)` so a corrupt file degrades to
    /// defaults instead of blocking the collection.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path.as_std_path())?;
        match serde_json::from_str(&contents) {
            Ok(file) => Ok(Some(file)),
            Err(e) => {
                tracing::error!("Failed to parse settings file {path}: {e}");
                Ok(None)
            }
        }
    }

    /// Save the settings file, creating parent directories as needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path.as_std_path(), contents)?;
        tracing::debug!("Saved settings to {path}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{MultiGroup, MultiOption, OptionGroup, SingleGroup};
    use crate::option::ModOption;

    fn sample_mod() -> Mod {
        Mod {
            id: "sample".into(),
            name: "Sample".into(),
            base_dir: Default::default(),
            default_option: ModOption::new("default"),
            groups: vec![
                OptionGroup::Single(SingleGroup {
                    name: "style".into(),
                    default_index: 1,
                    options: vec![ModOption::new("a"), ModOption::new("b")],
                    ..Default::default()
                }),
                OptionGroup::Multi(MultiGroup {
                    name: "extras".into(),
                    options: vec![MultiOption::default(), MultiOption::default()],
                    ..Default::default()
                }),
            ],
        }
    }

    #[test]
    fn test_defaults_use_group_defaults() {
        let settings = ModSettings::default_for(&sample_mod());
        assert!(!settings.enabled);
        assert_eq!(settings.selections, [1, 0]);
    }

    #[test]
    fn test_repair_clamps_and_extends() {
        let mod_data = sample_mod();
        let mut settings = ModSettings {
            enabled: true,
            priority: 3,
            selections: vec![9, 0b1110, 4],
        };
        assert!(settings.repair(&mod_data));
        assert_eq!(settings.selections, [1, 0b10]);
        // Second pass is a no-op.
        assert!(!settings.repair(&mod_data));

        let mut short = ModSettings::default();
        assert!(short.repair(&mod_data));
        assert_eq!(short.selections, [1, 0]);
    }

    #[test]
    fn test_settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("settings.json")).unwrap();

        assert!(SettingsFile::load(&path).unwrap().is_none());

        let mut settings = HashMap::new();
        settings.insert(
            "sample".to_string(),
            ModSettings {
                enabled: true,
                priority: -2,
                selections: vec![1],
            },
        );
        let file = SettingsFile::new(settings);
        file.save(&path).unwrap();

        let back = SettingsFile::load(&path).unwrap().unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_corrupt_settings_degrade_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("settings.json")).unwrap();
        fs::write(path.as_std_path(), "{not json").unwrap();
        assert!(SettingsFile::load(&path).unwrap().is_none());
    }
}
