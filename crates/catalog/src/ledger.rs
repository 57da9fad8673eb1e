//! The persisted archives ledger for one backup definition
//!
//! The ledger is the authoritative list of every archive a definition owns,
//! kept in insertion order. Chain integrity is enforced here, on every
//! mutation, rather than trusted to callers: a broken chain corrupts restore
//! silently, long after the bad call returned.
//!
//! Mutations validate first, persist the candidate ledger through the store,
//! and only then become visible in memory. A persistence failure leaves the
//! in-memory ledger exactly as it was.

use crate::store::LedgerStore;
use ahash::AHashMap;
use archive::codec;
use archive::error::{ArchiveError, Result};
use archive::record::ArchiveRecord;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct LedgerState {
    /// Records in insertion order
    records: Vec<ArchiveRecord>,
    /// Archive name -> position in `records`
    index: AHashMap<String, usize>,
}

impl LedgerState {
    fn rebuild_index(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.name(), pos))
            .collect();
    }
}

/// Ordered, persisted collection of archive records for one definition
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    definition: String,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Open the ledger for a definition, loading whatever the store holds
    ///
    /// Entries the codec skips are dropped with a warning. Duplicate names in
    /// a hand-edited file keep their first occurrence; load never fails on a
    /// ledger the tool itself could not have written.
    pub fn open(store: Arc<dyn LedgerStore>, definition: &str) -> Result<Self> {
        let raw = store.load_ledger(definition)?;
        let decoded = codec::decode_ledger(&raw)?;

        let mut records = Vec::with_capacity(decoded.len());
        let mut index = AHashMap::with_capacity(decoded.len());
        for record in decoded {
            let name = record.name();
            if index.contains_key(&name) {
                tracing::warn!(
                    "Ledger for '{definition}' lists '{name}' more than once, keeping the first"
                );
                continue;
            }
            index.insert(name, records.len());
            records.push(record);
        }

        tracing::debug!(
            "Opened ledger for '{}' with {} archives",
            definition,
            records.len()
        );

        Ok(Self {
            store,
            definition: definition.to_string(),
            state: RwLock::new(LedgerState { records, index }),
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Records in ledger order, as an owned snapshot
    ///
    /// The backing structure is never handed out; chain queries run over the
    /// snapshot and see either the pre- or post-state of any mutation.
    pub fn records(&self) -> Vec<ArchiveRecord> {
        self.state.read().records.clone()
    }

    /// Look up a record by its derived name
    pub fn get(&self, name: &str) -> Option<ArchiveRecord> {
        let state = self.state.read();
        let &pos = state.index.get(name)?;
        Some(state.records[pos].clone())
    }

    pub fn contains(&self, record: &ArchiveRecord) -> bool {
        self.state.read().records.contains(record)
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Append a record iff it keeps the chain intact
    ///
    /// Full records are always addable. An incremental needs its predecessor
    /// present already (no forward references) and a creation instant
    /// strictly after the predecessor's. Equal records, and name collisions
    /// in general, are rejected; two equal records always share a name, so
    /// the name index covers both rules.
    pub fn add(&self, record: ArchiveRecord) -> Result<()> {
        let mut state = self.state.write();

        let name = record.name();
        if state.index.contains_key(&name) {
            return Err(ArchiveError::DuplicateArchive { name });
        }
        if let Some(previous) = record.previous() {
            let Some(&pos) = state.index.get(previous) else {
                return Err(ArchiveError::DanglingPredecessor {
                    name,
                    previous: previous.to_string(),
                });
            };
            if record.created() <= state.records[pos].created() {
                return Err(ArchiveError::NonMonotonicCreation {
                    name,
                    previous: previous.to_string(),
                });
            }
        }

        // Persist the candidate before it becomes visible
        let mut entries = codec::encode_ledger(&state.records);
        entries.push(codec::encode(&record));
        self.store.save_ledger(&self.definition, &entries)?;

        tracing::debug!("Added archive '{}' to ledger '{}'", name, self.definition);
        let pos = state.records.len();
        state.index.insert(name, pos);
        state.records.push(record);
        Ok(())
    }

    /// Remove a record iff nothing in the ledger still follows it
    ///
    /// Removal matches by record equality. A record that is not present is a
    /// no-op so pruning retries stay safe.
    pub fn remove(&self, record: &ArchiveRecord) -> Result<()> {
        let mut state = self.state.write();

        let Some(pos) = state.records.iter().position(|r| r == record) else {
            tracing::debug!(
                "Archive '{}' is not in ledger '{}'",
                record.name(),
                self.definition
            );
            return Ok(());
        };

        let name = record.name();
        if let Some(dependent) = state.records.iter().find(|r| r.lineage().follows(&name)) {
            return Err(ArchiveError::ArchiveHasDependents {
                name,
                dependent: dependent.name(),
            });
        }

        let mut entries = codec::encode_ledger(&state.records);
        entries.remove(pos);
        self.store.save_ledger(&self.definition, &entries)?;

        tracing::debug!("Removed archive '{}' from ledger '{}'", name, self.definition);
        state.records.remove(pos);
        state.rebuild_index();
        Ok(())
    }

    /// Verify chain integrity of the persisted ledger
    ///
    /// Re-reads the ledger file and checks every record: decodable, unique
    /// name, resolvable predecessor, creation order along the chain, no
    /// cycles, and agreement with the in-memory state. This is the
    /// inspection tool for ledgers edited outside the tool.
    pub fn verify(&self) -> Result<ChainReport> {
        let start = Instant::now();
        let mut report = ChainReport::default();

        tracing::info!("Starting chain integrity check for '{}'", self.definition);

        // Hold the read guard across the scan so the memory cross-check sees
        // one consistent state.
        let state = self.state.read();
        let raw = self.store.load_ledger(&self.definition)?;
        report.total_entries = raw.len();

        let mut persisted: Vec<ArchiveRecord> = Vec::with_capacity(raw.len());
        for value in &raw {
            match codec::decode(value) {
                Ok(Some(record)) => persisted.push(record),
                Ok(None) => report.skipped_entries += 1,
                Err(e) => {
                    tracing::warn!("Undecodable ledger entry: {e}");
                    report.malformed_entries.push(e.to_string());
                }
            }
        }
        report.valid_records = persisted.len();

        let mut by_name: AHashMap<String, &ArchiveRecord> =
            AHashMap::with_capacity(persisted.len());
        for record in &persisted {
            let name = record.name();
            if by_name.contains_key(&name) {
                tracing::warn!("Archive name '{name}' appears more than once");
                report.duplicate_names.push(name);
            } else {
                by_name.insert(name, record);
            }
        }

        for record in &persisted {
            let name = record.name();
            if let Some(previous) = record.previous() {
                match by_name.get(previous) {
                    None => {
                        tracing::warn!("Archive '{name}' follows missing '{previous}'");
                        report.dangling.push((name.clone(), previous.to_string()));
                    }
                    Some(predecessor) => {
                        if record.created() <= predecessor.created() {
                            tracing::warn!(
                                "Archive '{name}' was not created after '{previous}'"
                            );
                            report.disordered.push((name.clone(), previous.to_string()));
                        }
                    }
                }
            }

            // Bounded walk; a chain longer than the ledger loops somewhere
            let mut current = record;
            let mut steps = 0;
            while let Some(previous) = current.previous() {
                steps += 1;
                if steps > persisted.len() {
                    tracing::warn!("Chain through '{name}' never reaches a full archive");
                    report.cycles.push(name.clone());
                    break;
                }
                match by_name.get(previous) {
                    Some(&next) => current = next,
                    None => break, // already reported as dangling
                }
            }
        }

        for name in by_name.keys() {
            if !state.index.contains_key(name) {
                tracing::warn!("Archive '{name}' is on disk but not in memory");
                report.missing_in_memory.push(name.clone());
            }
        }
        for name in state.index.keys() {
            if !by_name.contains_key(name) {
                tracing::warn!("Archive '{name}' is in memory but not on disk");
                report.missing_in_store.push(name.clone());
            }
        }

        report.scan_duration = start.elapsed();
        tracing::info!(
            "Chain integrity check complete: {}/{} valid records",
            report.valid_records,
            report.total_entries
        );

        Ok(report)
    }
}

/// Chain integrity report
#[derive(Debug, Default, Clone)]
pub struct ChainReport {
    /// Entries in the persisted ledger file
    pub total_entries: usize,

    /// Entries that decoded into records
    pub valid_records: usize,

    /// Entries dropped by the missing-field skip policy
    pub skipped_entries: usize,

    /// Entries that failed to decode
    pub malformed_entries: Vec<String>,

    /// Archive names appearing more than once
    pub duplicate_names: Vec<String>,

    /// (record, missing predecessor) pairs
    pub dangling: Vec<(String, String)>,

    /// Records whose chain never reaches a full archive
    pub cycles: Vec<String>,

    /// (record, predecessor) pairs out of creation order
    pub disordered: Vec<(String, String)>,

    /// On disk but not in the in-memory ledger
    pub missing_in_memory: Vec<String>,

    /// In the in-memory ledger but not on disk
    pub missing_in_store: Vec<String>,

    /// Scan duration
    pub scan_duration: Duration,
}

impl ChainReport {
    /// Skipped entries are tolerated by the wire format and do not count
    /// against health.
    pub fn is_healthy(&self) -> bool {
        self.malformed_entries.is_empty()
            && self.duplicate_names.is_empty()
            && self.dangling.is_empty()
            && self.cycles.is_empty()
            && self.disordered.is_empty()
            && self.missing_in_memory.is_empty()
            && self.missing_in_store.is_empty()
    }

    pub fn print_summary(&self) {
        use owo_colors::OwoColorize;

        println!("Chain Integrity Report");
        println!("======================");
        println!("Ledger entries: {}", self.total_entries);
        println!("Valid records: {}", self.valid_records);
        println!("Skipped entries: {}", self.skipped_entries);
        println!("Malformed entries: {}", self.malformed_entries.len());
        println!("Duplicate names: {}", self.duplicate_names.len());
        println!("Dangling links: {}", self.dangling.len());
        println!("Cycles: {}", self.cycles.len());
        println!("Out of order: {}", self.disordered.len());
        println!("Missing in memory: {}", self.missing_in_memory.len());
        println!("Missing in store: {}", self.missing_in_store.len());
        println!("Scan duration: {:?}", self.scan_duration);
        println!();

        if self.is_healthy() {
            println!("{}", "✅ Chain is healthy".green().bold());
        } else {
            println!(
                "{}",
                "⚠️  Chain has issues - inspect the ledger file".yellow().bold()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileVault;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn instant(day_offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 2, 17, 11, 14, 42).unwrap() + Duration::days(day_offset)
    }

    fn full(day_offset: i64) -> ArchiveRecord {
        ArchiveRecord::full(instant(day_offset))
    }

    fn inc(day_offset: i64, previous: &ArchiveRecord) -> ArchiveRecord {
        ArchiveRecord::incremental(instant(day_offset), &previous.name()).unwrap()
    }

    fn open_ledger(dir: &TempDir) -> Ledger {
        let vault = Arc::new(FileVault::open(dir.path()).unwrap());
        Ledger::open(vault, "documents").unwrap()
    }

    #[test]
    fn open_on_an_empty_vault_gives_an_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        assert!(ledger.is_empty());
        assert_eq!(ledger.records(), Vec::new());
    }

    #[test]
    fn added_records_survive_a_reload() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        let base = full(0);
        let follow = inc(1, &base);
        ledger.add(base.clone()).unwrap();
        ledger.add(follow.clone()).unwrap();

        let reloaded = open_ledger(&dir);
        assert_eq!(reloaded.records(), vec![base, follow]);
    }

    #[test]
    fn lookups_resolve_by_name() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        let base = full(0);
        ledger.add(base.clone()).unwrap();

        assert_eq!(ledger.get(&base.name()), Some(base.clone()));
        assert_eq!(ledger.get("full_2020-01-01T00_00_00Z"), None);
        assert!(ledger.contains(&base));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn equal_records_are_rejected() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        ledger.add(full(0)).unwrap();
        let second = ledger.add(full(0));

        assert!(matches!(second, Err(ArchiveError::DuplicateArchive { .. })));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn name_collisions_are_rejected_even_when_fields_differ() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        let first = full(0);
        let second = full(1);
        ledger.add(first.clone()).unwrap();
        ledger.add(second.clone()).unwrap();

        // Same created instant as inc(2, first) but a different predecessor:
        // same derived name, unequal record.
        ledger.add(inc(2, &first)).unwrap();
        let collision = ledger.add(inc(2, &second));

        assert!(matches!(collision, Err(ArchiveError::DuplicateArchive { .. })));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn dangling_predecessors_are_rejected() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        ledger.add(full(0)).unwrap();
        let orphan =
            ArchiveRecord::incremental(instant(1), "full_2030-01-01T00_00_00Z").unwrap();
        let result = ledger.add(orphan);

        assert!(matches!(
            result,
            Err(ArchiveError::DanglingPredecessor { .. })
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn creation_must_advance_along_a_chain() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        let base = full(1);
        ledger.add(base.clone()).unwrap();

        for stale in [inc(1, &base), inc(0, &base)] {
            let result = ledger.add(stale);
            assert!(matches!(
                result,
                Err(ArchiveError::NonMonotonicCreation { .. })
            ));
        }
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn removing_an_absent_record_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        ledger.add(full(0)).unwrap();
        ledger.remove(&full(5)).unwrap();

        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn dependents_block_removal() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        let base = full(0);
        let follow = inc(1, &base);
        ledger.add(base.clone()).unwrap();
        ledger.add(follow.clone()).unwrap();

        let blocked = ledger.remove(&base);
        assert!(matches!(
            blocked,
            Err(ArchiveError::ArchiveHasDependents { .. })
        ));
        assert_eq!(ledger.len(), 2);

        ledger.remove(&follow).unwrap();
        ledger.remove(&base).unwrap();
        assert!(ledger.is_empty());
        assert!(open_ledger(&dir).is_empty());
    }

    #[test]
    fn duplicate_names_in_the_file_keep_the_first() {
        let dir = TempDir::new().unwrap();
        let vault = Arc::new(FileVault::open(dir.path()).unwrap());

        let base = full(0);
        let entries = vec![
            codec::encode(&base),
            json!({
                "type": "inc",
                "created": instant(1).to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
                "previous": base.name(),
            }),
            json!({
                "type": "inc",
                "created": instant(1).to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
                "previous": "some_other_archive",
            }),
        ];
        vault.save_ledger("documents", &entries).unwrap();

        let ledger = Ledger::open(vault, "documents").unwrap();
        assert_eq!(ledger.len(), 2);

        let kept = ledger.get(&inc(1, &base).name()).unwrap();
        assert_eq!(kept.previous(), Some(base.name().as_str()));
    }

    #[test]
    fn verify_reports_a_healthy_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger = open_ledger(&dir);

        let base = full(0);
        let follow = inc(1, &base);
        ledger.add(base).unwrap();
        ledger.add(follow).unwrap();

        let report = ledger.verify().unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.total_entries, 2);
        assert_eq!(report.valid_records, 2);
        assert_eq!(report.skipped_entries, 0);
    }

    #[test]
    fn verify_flags_external_tampering() {
        let dir = TempDir::new().unwrap();
        let vault = Arc::new(FileVault::open(dir.path()).unwrap());
        let ledger = Ledger::open(vault.clone(), "documents").unwrap();

        let base = full(0);
        let follow = inc(1, &base);
        ledger.add(base.clone()).unwrap();
        ledger.add(follow.clone()).unwrap();

        // Drop the full archive from the file behind the ledger's back
        vault
            .save_ledger("documents", &[codec::encode(&follow)])
            .unwrap();

        let report = ledger.verify().unwrap();
        assert!(!report.is_healthy());
        assert_eq!(
            report.dangling,
            vec![(follow.name(), base.name())]
        );
        assert_eq!(report.missing_in_store, vec![base.name()]);
        assert!(report.missing_in_memory.is_empty());
    }

    #[test]
    fn verify_counts_skipped_entries_without_failing_health() {
        let dir = TempDir::new().unwrap();
        let vault = Arc::new(FileVault::open(dir.path()).unwrap());

        let base = full(0);
        let entries = vec![codec::encode(&base), json!({"note": "unknown entry"})];
        vault.save_ledger("documents", &entries).unwrap();

        let ledger = Ledger::open(vault, "documents").unwrap();
        assert_eq!(ledger.len(), 1);

        let report = ledger.verify().unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.skipped_entries, 1);
        assert_eq!(report.valid_records, 1);
    }
}
