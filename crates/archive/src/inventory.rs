//! Per-archive content inventories
//!
//! A direct inventory lists what one archive captured: file entries with
//! metadata, and tombstones for files the backup observed as deleted since
//! the predecessor. Keys are normalized relative paths, kept sorted so the
//! persisted form is stable.

use crate::error::{ArchiveError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// Metadata the scanner captured for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Size in bytes
    pub size: u64,
    /// Last modification instant
    pub modified: DateTime<Utc>,
    /// Opaque content fingerprint supplied by the scanner
    pub fingerprint: String,
}

impl FileMeta {
    pub fn new(size: u64, modified: DateTime<Utc>, fingerprint: &str) -> Self {
        Self {
            size,
            modified,
            fingerprint: fingerprint.to_string(),
        }
    }
}

/// One inventory entry: a captured file or a deletion marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InventoryEntry {
    /// File present in this archive
    Present(FileMeta),
    /// File deleted since the predecessor archive
    Deleted,
}

impl InventoryEntry {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, InventoryEntry::Deleted)
    }
}

/// What one archive directly captured, keyed by normalized relative path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectInventory {
    entries: BTreeMap<String, InventoryEntry>,
}

impl DirectInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a captured file, replacing any earlier entry for the path
    pub fn upsert(&mut self, path: &Path, meta: FileMeta) -> Result<()> {
        let key = normalize_path(path)?;
        self.entries.insert(key, InventoryEntry::Present(meta));
        Ok(())
    }

    /// Record a deletion marker for the path
    pub fn tombstone(&mut self, path: &Path) -> Result<()> {
        let key = normalize_path(path)?;
        self.entries.insert(key, InventoryEntry::Deleted);
        Ok(())
    }

    /// Look up the entry for a path, if its normalized form is present
    pub fn get(&self, path: &Path) -> Option<&InventoryEntry> {
        let key = normalize_path(path).ok()?;
        self.entries.get(&key)
    }

    /// Entries in sorted path order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &InventoryEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of captured files (tombstones excluded)
    pub fn file_count(&self) -> usize {
        self.entries.values().filter(|e| !e.is_tombstone()).count()
    }

    pub fn tombstone_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_tombstone()).count()
    }
}

/// Normalize a path into an inventory key
///
/// - relative, `/`-separated, `./` dropped
/// - rejects absolute paths and `..` traversal
pub fn normalize_path(path: &Path) -> Result<String> {
    let invalid = |detail: &str| ArchiveError::InvalidPath {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    };

    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute paths are not allowed"));
            }
            Component::ParentDir => {
                return Err(invalid("path traversal is not allowed"));
            }
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }
    if parts.is_empty() {
        return Err(invalid("empty path"));
    }

    // Backslashes become separators so keys match across platforms
    Ok(parts.join("/").replace('\\', "/"))
}
