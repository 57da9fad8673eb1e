//! Custodian Catalog - Persisted archive chains and their reconstruction
//!
//! This crate provides:
//! - The archives ledger with chain-integrity enforcement
//! - Pure chain resolution (ancestry, roots, heads) over ledger snapshots
//! - Per-archive content inventories and the effective file-set fold
//! - A file-backed vault implementing the persistence seams

pub mod chain;
pub mod content;
pub mod ledger;
pub mod store;

// Re-exports
pub use chain::ChainResolver;
pub use content::ContentIndex;
pub use ledger::{ChainReport, Ledger};
pub use store::{FileVault, InventoryStore, LedgerStore};

pub use archive::error::{ArchiveError, Result};
