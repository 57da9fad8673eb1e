//! Source → destination path mapping for one backup definition

use crate::error::{ArchiveError, Result};
use std::path::{Path, PathBuf};

/// The two roots of a backup definition
///
/// Mapping is component-wise, so `/home/data` does not claim files under
/// `/home/database`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLocation {
    source: PathBuf,
    destination: PathBuf,
}

impl BackupLocation {
    pub fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// True if `path` is the source root or lives under it
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.source)
    }

    /// Map a path under the source root to its place under the destination
    ///
    /// The source root itself maps to the destination root. Paths outside
    /// the source are an error, never silently passed through.
    pub fn destination_for(&self, path: &Path) -> Result<PathBuf> {
        let relative =
            path.strip_prefix(&self.source)
                .map_err(|_| ArchiveError::PathNotInSource {
                    path: path.to_path_buf(),
                    source: self.source.clone(),
                })?;
        if relative.as_os_str().is_empty() {
            return Ok(self.destination.clone());
        }
        Ok(self.destination.join(relative))
    }
}
