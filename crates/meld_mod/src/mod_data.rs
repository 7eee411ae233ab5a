//! The mod definition and active-option computation.

use crate::error::{ModError, Result};
use crate::group::OptionGroup;
use crate::option::ModOption;
use crate::settings::ModSettings;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fs;

/// A named, independently enable/disable-able bundle of redirects and edits.
///
/// Immutable to the resolution engine after loading. The `id` is the stable
/// key settings and registries use; editing tools must preserve it across
/// definition rewrites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    /// Stable unique identifier.
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Directory the mod's files live under.
    #[serde(default)]
    pub base_dir: Utf8PathBuf,

    /// The always-active option.
    #[serde(default)]
    pub default_option: ModOption,

    /// Selectable option groups, in definition order.
    #[serde(default)]
    pub groups: Vec<OptionGroup>,
}

impl Mod {
    /// Load a mod definition from its JSON file.
    ///
    /// Invalid manipulations are dropped (with logged reasons) as part of
    /// loading, so a stored definition can never smuggle an invalid edit
    /// into a merge.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents = fs::read_to_string(path.as_std_path())?;
        let mut mod_data: Mod = serde_json::from_str(&contents)?;
        if mod_data.id.is_empty() {
            return Err(ModError::InvalidDefinition(format!(
                "{path}: mod id must not be empty"
            )));
        }
        mod_data.sanitize();
        tracing::debug!(
            "Loaded mod '{}' ({} groups) from {path}",
            mod_data.name,
            mod_data.groups.len()
        );
        Ok(mod_data)
    }

    /// Save this definition as pretty-printed JSON.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        fs::write(path.as_std_path(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Drop invalid manipulations from every option.
    pub fn sanitize(&mut self) {
        self.default_option.sanitize();
        for group in &mut self.groups {
            group.sanitize();
        }
    }

    /// The options contributing under `settings`, in contribution order.
    ///
    /// Groups contribute first, ordered by group priority descending (stable
    /// on ties by definition order); within a multi group, selected options
    /// are ordered by their own priority descending (stable on ties by
    /// definition order). The always-active default option contributes last,
    /// below every group. A selection referencing an option that no longer
    /// exists skips that group — computing the active set never fails.
    pub fn active_options<'a>(&'a self, settings: &ModSettings) -> Vec<&'a ModOption> {
        let mut group_order: Vec<usize> = (0..self.groups.len()).collect();
        group_order.sort_by_key(|&i| Reverse(self.groups[i].priority()));

        let mut active = Vec::new();
        for group_index in group_order {
            let selection = settings.selection(self, group_index);
            match &self.groups[group_index] {
                OptionGroup::Single(group) => {
                    match group.options.get(selection as usize) {
                        Some(option) => active.push(option),
                        None if !group.options.is_empty() => {
                            tracing::warn!(
                                "Mod '{}' group '{}': selection {selection} out of range, skipping",
                                self.id,
                                group.name
                            );
                        }
                        None => {}
                    }
                }
                OptionGroup::Multi(group) => {
                    let mut selected: Vec<usize> = group
                        .options
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i < 32 && selection >> i & 1 == 1)
                        .map(|(i, _)| i)
                        .collect();
                    selected.sort_by_key(|&i| Reverse(group.options[i].priority));
                    active.extend(selected.into_iter().map(|i| &group.options[i].option));
                }
            }
        }

        active.push(&self.default_option);
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{MultiGroup, MultiOption, SingleGroup};
    use meld_core::{FullPath, GamePath};

    fn redirecting_option(name: &str, target: &str) -> ModOption {
        let mut option = ModOption::new(name);
        option.files.insert(
            GamePath::new("chara/q.mdl").unwrap(),
            FullPath::from(target),
        );
        option
    }

    fn multi_option(name: &str, priority: i32) -> MultiOption {
        MultiOption {
            option: ModOption::new(name),
            priority,
        }
    }

    #[test]
    fn test_default_option_contributes_last() {
        let mod_data = Mod {
            id: "m".into(),
            name: "M".into(),
            default_option: ModOption::new("default"),
            groups: vec![OptionGroup::Single(SingleGroup {
                name: "g".into(),
                options: vec![ModOption::new("only")],
                ..Default::default()
            })],
            ..Default::default()
        };
        let settings = ModSettings {
            enabled: true,
            ..ModSettings::default_for(&mod_data)
        };
        let names: Vec<&str> = mod_data
            .active_options(&settings)
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, ["only", "default"]);
    }

    #[test]
    fn test_group_priority_orders_groups() {
        let group = |name: &str, priority: i32| {
            OptionGroup::Single(SingleGroup {
                name: name.into(),
                priority,
                options: vec![ModOption::new(name)],
                ..Default::default()
            })
        };
        let mod_data = Mod {
            id: "m".into(),
            groups: vec![group("low", 1), group("high", 5), group("tied", 1)],
            ..Default::default()
        };
        let settings = ModSettings::default_for(&mod_data);
        let names: Vec<&str> = mod_data
            .active_options(&settings)
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        // Ties keep definition order.
        assert_eq!(names, ["high", "low", "tied", ""]);
    }

    #[test]
    fn test_multi_selection_ordered_by_option_priority() {
        let mod_data = Mod {
            id: "m".into(),
            groups: vec![OptionGroup::Multi(MultiGroup {
                name: "g".into(),
                options: vec![
                    multi_option("y", 1),
                    multi_option("x", 2),
                    multi_option("unselected", 9),
                ],
                ..Default::default()
            })],
            ..Default::default()
        };
        let settings = ModSettings {
            enabled: true,
            priority: 0,
            selections: vec![0b011],
        };
        let names: Vec<&str> = mod_data
            .active_options(&settings)
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, ["x", "y", ""]);
    }

    #[test]
    fn test_out_of_range_selection_skips_group() {
        let mod_data = Mod {
            id: "m".into(),
            groups: vec![OptionGroup::Single(SingleGroup {
                name: "g".into(),
                options: vec![redirecting_option("a", "/mods/a")],
                ..Default::default()
            })],
            ..Default::default()
        };
        let settings = ModSettings {
            enabled: true,
            priority: 0,
            selections: vec![3],
        };
        let active = mod_data.active_options(&settings);
        // Only the default option survives.
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_load_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("mod.json")).unwrap();

        let mod_data = Mod {
            id: "hats".into(),
            name: "Hats".into(),
            default_option: redirecting_option("default", "/mods/hats/a.mdl"),
            ..Default::default()
        };
        mod_data.save(&path).unwrap();
        let back = Mod::load(&path).unwrap();
        assert_eq!(back, mod_data);
    }

    #[test]
    fn test_load_rejects_empty_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("mod.json")).unwrap();
        std::fs::write(path.as_std_path(), r#"{"id":"","name":"x"}"#).unwrap();
        assert!(matches!(
            Mod::load(&path),
            Err(ModError::InvalidDefinition(_))
        ));
    }
}
