//! The merge itself: fold enabled mods into a [`ResolvedCache`].

use crate::cache::{Conflict, MetaCache, ResolvedCache};
use crate::registry::ModRegistry;
use itertools::Itertools;
use meld_core::{FullPath, GamePath};
use meld_meta::{DefaultProvider, MetaManipulationSet};
use meld_mod::{Mod, ModSettings};
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::debug;

/// Merge every enabled mod into a fresh cache.
///
/// Mods fold in descending settings priority; equal priorities break by
/// registration index, so the result is a pure function of the registry and
/// the settings. Every contribution is insert-if-absent: the first writer of
/// a game path or a manipulation identifier wins, later writers are recorded
/// as conflict losers.
pub fn resolve(
    registry: &ModRegistry,
    settings_for: impl Fn(&Mod) -> ModSettings,
    defaults: &dyn DefaultProvider,
) -> ResolvedCache {
    let mut redirects: HashMap<GamePath, FullPath> = HashMap::new();
    let mut claims: HashMap<GamePath, Vec<String>> = HashMap::new();
    let mut manipulations = MetaManipulationSet::new();

    let enabled = registry
        .iter()
        .map(|(index, mod_data)| {
            let settings = settings_for(mod_data);
            (index, mod_data, settings)
        })
        .filter(|(_, _, settings)| settings.enabled)
        .sorted_by_key(|(index, _, settings)| (Reverse(settings.priority), *index));

    for (_, mod_data, settings) in enabled {
        for option in mod_data.active_options(&settings) {
            for (path, target) in option.redirects() {
                let contributors = claims.entry(path.clone()).or_default();
                if contributors.last().map(String::as_str) != Some(mod_data.id.as_str()) {
                    contributors.push(mod_data.id.clone());
                }
                redirects
                    .entry(path.clone())
                    .or_insert_with(|| target.clone());
            }
            manipulations.extend_first_wins(&option.manipulations);
        }
    }
    manipulations.retain_valid();

    // Only cross-mod contention counts; a mod shadowing itself through two of
    // its own options is ordinary option precedence.
    let conflicts: Vec<Conflict> = claims
        .into_iter()
        .filter(|(_, contributors)| contributors.len() > 1)
        .map(|(path, mut contributors)| {
            let winner = contributors.remove(0);
            Conflict {
                path,
                winner,
                losers: contributors,
            }
        })
        .sorted_by(|a, b| a.path.cmp(&b.path))
        .collect();

    debug!(
        redirects = redirects.len(),
        manipulations = manipulations.len(),
        conflicts = conflicts.len(),
        "Resolved collection cache"
    );

    let meta = MetaCache::build(manipulations, defaults);
    ResolvedCache::new(redirects, conflicts, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meld_meta::SyntheticDefaults;
    use meld_mod::ModOption;

    fn file_mod(id: &str, path: &str, target: &str) -> Mod {
        let mut option = ModOption::new("default");
        option
            .files
            .insert(GamePath::new(path).unwrap(), target.into());
        Mod {
            id: id.into(),
            name: id.to_uppercase(),
            default_option: option,
            ..Default::default()
        }
    }

    fn enabled_at(priority: i32) -> ModSettings {
        ModSettings {
            enabled: true,
            priority,
            selections: Vec::new(),
        }
    }

    #[test]
    fn test_higher_priority_wins() {
        let mut registry = ModRegistry::new();
        registry
            .register(file_mod("low", "a/b.mdl", "/low/b.mdl"))
            .unwrap();
        registry
            .register(file_mod("high", "a/b.mdl", "/high/b.mdl"))
            .unwrap();

        let cache = resolve(
            &registry,
            |m| enabled_at(if m.id == "high" { 5 } else { 0 }),
            &SyntheticDefaults,
        );

        let path = GamePath::new("a/b.mdl").unwrap();
        assert_eq!(cache.resolve(&path).unwrap().as_str(), "/high/b.mdl");
        assert_eq!(cache.conflicts().len(), 1);
        assert_eq!(cache.conflicts()[0].winner, "high");
        assert_eq!(cache.conflicts()[0].losers, ["low"]);
    }

    #[test]
    fn test_equal_priority_breaks_by_registration_order() {
        let mut registry = ModRegistry::new();
        registry
            .register(file_mod("first", "a/b.mdl", "/first/b.mdl"))
            .unwrap();
        registry
            .register(file_mod("second", "a/b.mdl", "/second/b.mdl"))
            .unwrap();

        let cache = resolve(&registry, |_| enabled_at(0), &SyntheticDefaults);

        let path = GamePath::new("a/b.mdl").unwrap();
        assert_eq!(cache.resolve(&path).unwrap().as_str(), "/first/b.mdl");
    }

    #[test]
    fn test_disabled_mods_contribute_nothing() {
        let mut registry = ModRegistry::new();
        registry
            .register(file_mod("only", "a/b.mdl", "/only/b.mdl"))
            .unwrap();

        let cache = resolve(
            &registry,
            |_| ModSettings {
                enabled: false,
                ..ModSettings::default()
            },
            &SyntheticDefaults,
        );

        assert!(cache.resolve(&GamePath::new("a/b.mdl").unwrap()).is_none());
        assert!(cache.conflicts().is_empty());
    }
}
