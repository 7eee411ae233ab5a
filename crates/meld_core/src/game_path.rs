//! Virtual game paths and filesystem target paths.
//!
//! [`GamePath`] is the lookup key for every redirect table in the engine. It is
//! normalized at construction (lowercased, forward slashes, no leading slash)
//! so that equality and hashing are case-insensitive without any per-lookup
//! normalization cost. [`FullPath`] is the value side of a redirect: an
//! absolute filesystem path owned by whichever mod option produced it.

use crate::error::{CoreError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum byte length of a [`GamePath`].
///
/// Matches the fixed-size path buffers used by the game's resource loader;
/// longer paths can never be requested, so they can never match a redirect.
pub const MAX_GAME_PATH_LEN: usize = 260;

/// A normalized, case-insensitive virtual path into the game's asset library.
///
/// Stored pre-normalized: all-lowercase, `/`-separated, no leading separator.
/// Because normalization happens exactly once at construction, the derived
/// `Eq`/`Hash`/`Ord` impls are case-insensitive for free, which is what makes
/// redirect lookups O(1) on the hot path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GamePath(Box<str>);

impl GamePath {
    /// Create a game path from a raw string, normalizing it.
    ///
    /// Returns [`CoreError::PathTooLong`] if the *normalized* form exceeds
    /// [`MAX_GAME_PATH_LEN`] bytes. The bound is checked after lowercasing
    /// because Unicode lowercasing can grow the byte length ('İ' is two
    /// bytes, its lowercase "i\u{307}" is three), and it is the stored form
    /// the game's buffers have to hold.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let path = path.as_ref();
        let mut normalized = String::with_capacity(path.len());
        for c in path.chars() {
            match c {
                '\\' => normalized.push('/'),
                c => normalized.extend(c.to_lowercase()),
            }
        }
        let trimmed = normalized.trim_start_matches('/');
        if trimmed.len() > MAX_GAME_PATH_LEN {
            return Err(CoreError::PathTooLong {
                length: trimmed.len(),
                max: MAX_GAME_PATH_LEN,
            });
        }
        let boxed = if trimmed.len() == normalized.len() {
            normalized.into_boxed_str()
        } else {
            trimmed.into()
        };

        Ok(Self(boxed))
    }

    /// The normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path is empty (matches nothing).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The file extension of the path, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.0.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        (!stem.is_empty()).then_some(ext)
    }
}

impl fmt::Display for GamePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GamePath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<GamePath> for String {
    fn from(path: GamePath) -> Self {
        path.0.into()
    }
}

/// An absolute filesystem path produced by a mod option.
///
/// The value side of a redirect table entry. May point at a substitute file on
/// disk, or — for cross-path swaps — be constructed from another [`GamePath`]
/// so the loader re-requests a different vanilla asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullPath(Utf8PathBuf);

impl FullPath {
    /// Wrap a filesystem path.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    /// The underlying path.
    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for FullPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<Utf8PathBuf> for FullPath {
    fn from(path: Utf8PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for FullPath {
    fn from(path: &str) -> Self {
        Self(Utf8PathBuf::from(path))
    }
}
