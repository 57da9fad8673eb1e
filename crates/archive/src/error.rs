//! Error types shared across the archive and catalog layers

use std::path::PathBuf;

/// Errors specific to archive records, chains, and their persistence
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive '{name}' follows '{previous}', which is not in the ledger")]
    DanglingPredecessor { name: String, previous: String },

    #[error("archive '{name}' is already in the ledger")]
    DuplicateArchive { name: String },

    #[error("archive '{name}' still has dependent '{dependent}'")]
    ArchiveHasDependents { name: String, dependent: String },

    #[error("incremental archive requires a predecessor name")]
    MissingPredecessor,

    #[error("archive '{name}' was not created after its predecessor '{previous}'")]
    NonMonotonicCreation { name: String, previous: String },

    #[error("chain walk from '{name}' failed: {reason}")]
    BrokenChain { name: String, reason: String },

    #[error("inventory for archive '{name}' is already recorded")]
    InventoryExists { name: String },

    #[error("no inventory recorded for archive '{name}'")]
    MissingInventory { name: String },

    #[error("malformed archive record: {detail}")]
    MalformedRecord { detail: String },

    #[error("path '{path}' is not under the source root '{r#source}'")]
    PathNotInSource { path: PathBuf, r#source: PathBuf },

    #[error("invalid inventory path '{path}': {detail}")]
    InvalidPath { path: PathBuf, detail: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Common result type used throughout custodian
pub type Result<T> = std::result::Result<T, ArchiveError>;
