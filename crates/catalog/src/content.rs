//! Per-archive inventories and effective file-set reconstruction
//!
//! Only a full archive stores everything; each incremental stores a diff.
//! Folding the direct inventories along the chain, oldest to newest,
//! rebuilds the exact file set that existed when any archive was taken.

use crate::chain::ChainResolver;
use crate::store::InventoryStore;
use archive::error::{ArchiveError, Result};
use archive::inventory::{DirectInventory, FileMeta, InventoryEntry};
use archive::record::ArchiveRecord;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Inventory service for one backup definition
///
/// Inventories are write-once; once an archive is recorded it never changes,
/// so reads go through a cache keyed by archive name.
pub struct ContentIndex {
    store: Arc<dyn InventoryStore>,
    definition: String,
    cache: DashMap<String, Arc<DirectInventory>>,
}

impl ContentIndex {
    pub fn new(store: Arc<dyn InventoryStore>, definition: &str) -> Self {
        Self {
            store,
            definition: definition.to_string(),
            cache: DashMap::new(),
        }
    }

    /// Store the direct inventory for a newly created archive
    ///
    /// Called exactly once per archive, when the backup operation finishes.
    /// A second call for the same archive fails with `InventoryExists`.
    pub fn record_inventory(
        &self,
        record: &ArchiveRecord,
        inventory: DirectInventory,
    ) -> Result<()> {
        let name = record.name();
        if self.cache.contains_key(&name)
            || self.store.load_inventory(&self.definition, &name)?.is_some()
        {
            return Err(ArchiveError::InventoryExists { name });
        }

        self.store.save_inventory(&self.definition, &name, &inventory)?;
        tracing::debug!(
            "Recorded inventory with {} entries for '{}'",
            inventory.len(),
            name
        );
        self.cache.insert(name, Arc::new(inventory));
        Ok(())
    }

    /// What the archive directly captured
    ///
    /// A ledgered archive without a stored inventory is corruption, not an
    /// empty archive; treating it as empty would resurrect files its
    /// tombstones deleted.
    pub fn direct_inventory(&self, record: &ArchiveRecord) -> Result<Arc<DirectInventory>> {
        let name = record.name();
        if let Some(cached) = self.cache.get(&name) {
            return Ok(Arc::clone(cached.value()));
        }

        let inventory = self
            .store
            .load_inventory(&self.definition, &name)?
            .ok_or_else(|| ArchiveError::MissingInventory { name: name.clone() })?;
        let inventory = Arc::new(inventory);
        self.cache.insert(name, Arc::clone(&inventory));
        Ok(inventory)
    }

    /// Reconstruct the complete file set as of `record`
    ///
    /// Folds the direct inventories along `resolver.ancestors_of(record)`,
    /// oldest to newest: present entries upsert their path, tombstones
    /// remove it. A tombstone for a path nothing captured is a no-op. Each
    /// entry acts on its own marker, so the result does not depend on entry
    /// order within any one inventory.
    pub fn effective_inventory_at(
        &self,
        resolver: &ChainResolver<'_>,
        record: &ArchiveRecord,
    ) -> Result<BTreeMap<String, FileMeta>> {
        let ancestors = resolver.ancestors_of(record)?;

        let mut effective = BTreeMap::new();
        for ancestor in &ancestors {
            let inventory = self.direct_inventory(ancestor)?;
            for (path, entry) in inventory.entries() {
                match entry {
                    InventoryEntry::Present(meta) => {
                        effective.insert(path.to_string(), meta.clone());
                    }
                    InventoryEntry::Deleted => {
                        effective.remove(path);
                    }
                }
            }
        }

        tracing::debug!(
            "Reconstructed {} files at '{}' from {} archives",
            effective.len(),
            record.name(),
            ancestors.len()
        );
        Ok(effective)
    }
}
