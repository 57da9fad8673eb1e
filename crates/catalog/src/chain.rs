//! Pure chain queries over a ledger snapshot
//!
//! The resolver follows `previous` links forward-looking through a name
//! index; records never hold back-references. Every walk is bounded by the
//! snapshot size, so a cycle in a tampered ledger surfaces as `BrokenChain`
//! instead of hanging the caller.

use ahash::{AHashMap, AHashSet};
use archive::error::{ArchiveError, Result};
use archive::record::ArchiveRecord;

/// Read-only ancestry queries over one ledger snapshot
pub struct ChainResolver<'a> {
    records: &'a [ArchiveRecord],
    by_name: AHashMap<String, &'a ArchiveRecord>,
}

impl<'a> ChainResolver<'a> {
    pub fn new(records: &'a [ArchiveRecord]) -> Self {
        let mut by_name = AHashMap::with_capacity(records.len());
        for record in records {
            by_name.entry(record.name()).or_insert(record);
        }
        Self { records, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&'a ArchiveRecord> {
        self.by_name.get(name).copied()
    }

    /// The chain from the root full archive up to `record`, inclusive
    ///
    /// Ordered oldest to newest; the last element is `record` itself.
    pub fn ancestors_of(&self, record: &ArchiveRecord) -> Result<Vec<ArchiveRecord>> {
        let mut chain = vec![record.clone()];
        let mut current = record;
        while let Some(previous) = current.previous() {
            if chain.len() > self.records.len() {
                return Err(ArchiveError::BrokenChain {
                    name: record.name(),
                    reason: "chain never reaches a full archive".to_string(),
                });
            }
            current = self.get(previous).ok_or_else(|| ArchiveError::BrokenChain {
                name: record.name(),
                reason: format!("predecessor '{previous}' is not in the ledger"),
            })?;
            chain.push(current.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    /// The full archive rooting the chain that contains `record`
    ///
    /// Equals `record` itself when it is full.
    pub fn full_ancestor_of(&self, record: &ArchiveRecord) -> Result<ArchiveRecord> {
        let mut current = record;
        let mut steps = 0;
        while let Some(previous) = current.previous() {
            steps += 1;
            if steps > self.records.len() {
                return Err(ArchiveError::BrokenChain {
                    name: record.name(),
                    reason: "chain never reaches a full archive".to_string(),
                });
            }
            current = self.get(previous).ok_or_else(|| ArchiveError::BrokenChain {
                name: record.name(),
                reason: format!("predecessor '{previous}' is not in the ledger"),
            })?;
        }
        Ok(current.clone())
    }

    /// Chain tips: records no other record follows, in snapshot order
    ///
    /// A well-formed ledger yields one head per chain. Backup operations
    /// pick the predecessor for the next incremental from here.
    pub fn heads(&self) -> Vec<ArchiveRecord> {
        let referenced: AHashSet<&str> =
            self.records.iter().filter_map(|r| r.previous()).collect();
        self.records
            .iter()
            .filter(|record| !referenced.contains(record.name().as_str()))
            .cloned()
            .collect()
    }
}
