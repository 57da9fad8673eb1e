//! File-backed vault for ledgers and content inventories
//!
//! Layout:
//! ```text
//! <root>/
//! ├── tmp/                       # staging area for atomic writes
//! └── <definition>/
//!     ├── archives.json          # the definition's ledger
//!     └── <archive-name>/
//!         └── content.json       # that archive's direct inventory
//! ```
//!
//! Every write lands in `tmp/` first and is renamed into place, so a crash
//! never leaves a half-written ledger or inventory behind.

use anyhow::{bail, Context, Result};
use archive::DirectInventory;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

const LEDGER_FILE: &str = "archives.json";
const CONTENT_FILE: &str = "content.json";
const TMP_DIR: &str = "tmp";

/// Persistence provider for archive ledgers
pub trait LedgerStore: Send + Sync {
    /// Raw ledger entries for a definition; empty when none was written yet
    fn load_ledger(&self, definition: &str) -> Result<Vec<Value>>;

    /// Replace the persisted ledger for a definition
    fn save_ledger(&self, definition: &str, entries: &[Value]) -> Result<()>;
}

/// Persistence provider for per-archive content inventories
pub trait InventoryStore: Send + Sync {
    fn load_inventory(&self, definition: &str, archive: &str)
        -> Result<Option<DirectInventory>>;

    /// Write-once: fails when the archive already has an inventory
    fn save_inventory(
        &self,
        definition: &str,
        archive: &str,
        inventory: &DirectInventory,
    ) -> Result<()>;
}

/// Persisted shape of a `content.json` file
#[derive(Debug, Deserialize)]
struct ContentFile {
    archive: String,
    entries: DirectInventory,
}

/// On-disk vault holding every definition's ledger and inventories
pub struct FileVault {
    root: PathBuf,
}

impl FileVault {
    /// Open or create a vault rooted at `root`
    ///
    /// Staging files left over from interrupted writes are removed.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create vault at {}", root.display()))?;
        let vault = Self {
            root: root.to_path_buf(),
        };
        vault.cleanup_tmp()?;
        Ok(vault)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    fn ledger_path(&self, definition: &str) -> PathBuf {
        self.root.join(definition).join(LEDGER_FILE)
    }

    fn content_path(&self, definition: &str, archive: &str) -> PathBuf {
        self.root.join(definition).join(archive).join(CONTENT_FILE)
    }

    fn cleanup_tmp(&self) -> Result<()> {
        let tmp = self.tmp_dir();
        if !tmp.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&tmp)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            tracing::debug!("Removed incomplete write {}", path.display());
        }
        Ok(())
    }
}

impl LedgerStore for FileVault {
    fn load_ledger(&self, definition: &str) -> Result<Vec<Value>> {
        let path = self.ledger_path(definition);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read(&path)
            .with_context(|| format!("Failed to read ledger at {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse ledger at {}", path.display()))
    }

    fn save_ledger(&self, definition: &str, entries: &[Value]) -> Result<()> {
        let data = serde_json::to_vec_pretty(entries)?;
        atomic_write(&self.tmp_dir(), &self.ledger_path(definition), &data)
    }
}

impl InventoryStore for FileVault {
    fn load_inventory(
        &self,
        definition: &str,
        archive: &str,
    ) -> Result<Option<DirectInventory>> {
        let path = self.content_path(definition, archive);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(&path)
            .with_context(|| format!("Failed to read inventory at {}", path.display()))?;
        let file: ContentFile = serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse inventory at {}", path.display()))?;
        if file.archive != archive {
            bail!(
                "inventory at {} belongs to '{}', expected '{}'",
                path.display(),
                file.archive,
                archive
            );
        }
        Ok(Some(file.entries))
    }

    fn save_inventory(
        &self,
        definition: &str,
        archive: &str,
        inventory: &DirectInventory,
    ) -> Result<()> {
        let path = self.content_path(definition, archive);
        if path.exists() {
            bail!("inventory for '{archive}' is already recorded");
        }
        let data = serde_json::to_vec_pretty(&json!({
            "archive": archive,
            "entries": inventory,
        }))?;
        atomic_write(&self.tmp_dir(), &path, &data)
    }
}

/// Atomic write helper
///
/// Writes data to a temporary file, fsyncs it, then renames it to the target
/// path. This ensures crash safety.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    fs::create_dir_all(tmp_dir)?;

    // Unique temp file path
    let temp_path = tmp_dir.join(format!("{}", uuid::Uuid::new_v4()));

    let mut temp_file = fs::File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?; // fsync file
    drop(temp_file);

    // Ensure target parent directory exists
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    // Rename to target (atomic on POSIX systems)
    fs::rename(&temp_path, target)?;

    // Fsync parent directory for durability
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
