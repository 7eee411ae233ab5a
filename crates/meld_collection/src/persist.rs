//! On-disk representation of a collection.

use crate::error::Result;
use camino::Utf8Path;
use meld_mod::ModSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

/// Persisted form of one collection, as versioned JSON.
///
/// The id is stored so inheritance links between collections survive a
/// save/load round trip.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "id": "7d8f…",
///   "name": "Default",
///   "parent": null,
///   "settings": {
///     "some-mod": { "enabled": true, "priority": 5, "selections": [0] }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionFile {
    /// Schema version (current: `1`).
    pub version: u32,

    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default)]
    pub settings: HashMap<String, ModSettings>,
}

impl CollectionFile {
    /// Load a collection file from disk.
    ///
    /// Returns `Ok(None)` if the file doesn't exist; parse failures are
    /// logged and also yield `Ok(None)` so one corrupt file degrades to
    /// nothing instead of blocking startup.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path.as_std_path())?;
        match serde_json::from_str(&contents) {
            Ok(file) => Ok(Some(file)),
            Err(e) => {
                tracing::error!("Failed to parse collection file {path}: {e}");
                Ok(None)
            }
        }
    }

    /// Save the collection file, creating parent directories as needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path.as_std_path(), contents)?;
        tracing::debug!("Saved collection to {path}");
        Ok(())
    }
}
