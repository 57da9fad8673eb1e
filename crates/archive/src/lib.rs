//! Custodian Archive - Domain types for versioned backup archive chains
//!
//! This crate provides the pure layer under the catalog services:
//! - Archive records with derived names and lineage
//! - The JSON wire codec for persisted ledgers
//! - Per-archive content inventories with deletion tombstones
//! - Source → destination path mapping
//! - Backup definition configuration

pub mod codec;
pub mod config;
pub mod error;
pub mod inventory;
pub mod location;
pub mod record;

// Re-export main types for convenience
pub use config::{BackupDefinition, VaultConfig};
pub use error::{ArchiveError, Result};
pub use inventory::{DirectInventory, FileMeta, InventoryEntry};
pub use location::BackupLocation;
pub use record::{ArchiveKind, ArchiveRecord, Lineage};
