//! Backup definition configuration
//!
//! Each definition is described by a small TOML file:
//!
//! ```toml
//! [backup]
//! id = "documents"
//! source = "/home/alice/documents"
//! destination = "/mnt/drive/backups/documents"
//! ```
//!
//! The `id` names the definition's directory inside the vault.

use crate::location::BackupLocation;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file for one backup definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub backup: BackupDefinition,
}

/// One backup definition: an id plus its two roots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDefinition {
    pub id: String,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl BackupDefinition {
    pub fn location(&self) -> BackupLocation {
        BackupLocation::new(self.source.clone(), self.destination.clone())
    }
}

impl VaultConfig {
    /// Load a definition from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read backup definition at {}", path.display()))?;
        let config: VaultConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse backup definition at {}", path.display()))?;
        if config.backup.id.is_empty() {
            bail!("backup definition at {} has an empty id", path.display());
        }
        tracing::debug!("Loaded backup definition '{}'", config.backup.id);
        Ok(config)
    }

    /// Save a definition as pretty-printed TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize backup definition")?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write backup definition to {}", path.display()))?;
        Ok(())
    }
}
