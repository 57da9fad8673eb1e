//! Archive records and their derived names

use crate::error::{ArchiveError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Kind of archive in a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Self-contained baseline; roots a chain
    Full,
    /// Captures changes since its predecessor
    Incremental,
}

impl ArchiveKind {
    /// Tag used in archive names and in the persisted ledger
    pub fn tag(&self) -> &'static str {
        match self {
            ArchiveKind::Full => "full",
            ArchiveKind::Incremental => "inc",
        }
    }

    /// Parse a kind tag, case-insensitively
    pub fn from_tag(text: &str) -> Result<Self> {
        match text.to_ascii_lowercase().as_str() {
            "full" => Ok(ArchiveKind::Full),
            "inc" => Ok(ArchiveKind::Incremental),
            _ => Err(ArchiveError::MalformedRecord {
                detail: format!("unknown archive kind '{text}'"),
            }),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Where a record sits in its chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lineage {
    /// Chain root; nothing before it
    Root,
    /// Follows the named archive
    Follows(String),
}

impl Lineage {
    /// Name of the predecessor, if any
    pub fn previous(&self) -> Option<&str> {
        match self {
            Lineage::Root => None,
            Lineage::Follows(name) => Some(name),
        }
    }

    /// True if this lineage points at `name`
    pub fn follows(&self, name: &str) -> bool {
        self.previous() == Some(name)
    }
}

/// One archive in a backup definition's ledger
///
/// A record's kind is derived from its lineage: a chain root is a full
/// archive, anything with a predecessor is incremental. Its name is derived
/// from kind and creation time and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveRecord {
    created: DateTime<Utc>,
    lineage: Lineage,
}

impl ArchiveRecord {
    /// Create a full archive record rooting a new chain
    pub fn full(created: DateTime<Utc>) -> Self {
        Self {
            created,
            lineage: Lineage::Root,
        }
    }

    /// Create an incremental archive record following `previous`
    pub fn incremental(created: DateTime<Utc>, previous: &str) -> Result<Self> {
        if previous.is_empty() {
            return Err(ArchiveError::MissingPredecessor);
        }
        Ok(Self {
            created,
            lineage: Lineage::Follows(previous.to_string()),
        })
    }

    /// Kind, derived from lineage
    pub fn kind(&self) -> ArchiveKind {
        match self.lineage {
            Lineage::Root => ArchiveKind::Full,
            Lineage::Follows(_) => ArchiveKind::Incremental,
        }
    }

    /// Creation instant (UTC)
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Position in the chain
    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    /// Name of the predecessor, if any
    pub fn previous(&self) -> Option<&str> {
        self.lineage.previous()
    }

    /// Creation instant in the RFC 3339 'Z' form used on the wire
    ///
    /// Fractional seconds appear only when non-zero, in groups of three
    /// digits, so a parse → format round trip preserves the original text.
    pub fn created_text(&self) -> String {
        self.created.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Derived archive name, e.g. `full_2019-02-17T11_14_42Z`
    ///
    /// Colons are unusable in file names on some platforms, so the timestamp
    /// swaps them for underscores. The name doubles as the directory name
    /// holding the archive's content inventory.
    pub fn name(&self) -> String {
        format!("{}_{}", self.kind().tag(), self.created_text().replace(':', "_"))
    }

    /// Parse an archive name back into its kind and creation instant
    ///
    /// Names do not encode lineage, so the predecessor of an incremental
    /// archive is recoverable only from the ledger.
    pub fn parse_name(name: &str) -> Result<(ArchiveKind, DateTime<Utc>)> {
        let (tag, stamp) = name.split_once('_').ok_or_else(|| ArchiveError::MalformedRecord {
            detail: format!("archive name '{name}' has no kind tag"),
        })?;
        let kind = ArchiveKind::from_tag(tag)?;
        let created = parse_instant(stamp)?;
        Ok((kind, created))
    }
}

impl fmt::Display for ArchiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Parse an RFC 3339 instant, tolerating underscores in place of colons
///
/// Archive names carry the underscore form; ledgers written by older tools
/// occasionally do too.
pub(crate) fn parse_instant(text: &str) -> Result<DateTime<Utc>> {
    let restored = text.replace('_', ":");
    DateTime::parse_from_rfc3339(&restored)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ArchiveError::MalformedRecord {
            detail: format!("bad timestamp '{text}': {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 2, 17, 11, 14, 42).unwrap()
    }

    #[test]
    fn full_name_encodes_kind_and_created() {
        let record = ArchiveRecord::full(instant());
        assert_eq!(record.name(), "full_2019-02-17T11_14_42Z");
        assert_eq!(record.kind(), ArchiveKind::Full);
        assert_eq!(record.previous(), None);
    }

    #[test]
    fn incremental_name_uses_inc_tag() {
        let previous = ArchiveRecord::full(instant()).name();
        let record = ArchiveRecord::incremental(instant(), &previous).unwrap();
        assert_eq!(record.name(), "inc_2019-02-17T11_14_42Z");
        assert_eq!(record.kind(), ArchiveKind::Incremental);
        assert_eq!(record.previous(), Some(previous.as_str()));
    }

    #[test]
    fn incremental_requires_predecessor_name() {
        let result = ArchiveRecord::incremental(instant(), "");
        assert!(matches!(result, Err(ArchiveError::MissingPredecessor)));
    }

    #[test]
    fn kind_tags_parse_case_insensitively() {
        assert_eq!(ArchiveKind::from_tag("full").unwrap(), ArchiveKind::Full);
        assert_eq!(ArchiveKind::from_tag("FULL").unwrap(), ArchiveKind::Full);
        assert_eq!(ArchiveKind::from_tag("Inc").unwrap(), ArchiveKind::Incremental);
        assert!(ArchiveKind::from_tag("differential").is_err());
    }

    #[test]
    fn name_round_trips() {
        let record = ArchiveRecord::full(instant());
        let (kind, created) = ArchiveRecord::parse_name(&record.name()).unwrap();
        assert_eq!(kind, ArchiveKind::Full);
        assert_eq!(created, record.created());
    }

    #[test]
    fn fractional_seconds_survive_the_round_trip() {
        for text in [
            "2019-02-17T11:14:42Z",
            "2019-02-17T11:14:42.123Z",
            "2019-02-17T11:14:42.123456Z",
            "2019-02-17T11:14:42.123456789Z",
        ] {
            let created = DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc);
            let record = ArchiveRecord::full(created);
            assert_eq!(record.created_text(), text);
        }
    }

    #[test]
    fn parse_instant_tolerates_underscores() {
        let a = parse_instant("2019-02-17T11_14_42Z").unwrap();
        let b = parse_instant("2019-02-17T11:14:42Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn offset_instants_normalize_to_utc() {
        let created = parse_instant("2019-02-17T12:14:42+01:00").unwrap();
        let record = ArchiveRecord::full(created);
        assert_eq!(record.name(), "full_2019-02-17T11_14_42Z");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert!(ArchiveRecord::parse_name("nonsense").is_err());
        assert!(ArchiveRecord::parse_name("diff_2019-02-17T11_14_42Z").is_err());
        assert!(ArchiveRecord::parse_name("full_tuesday").is_err());
    }

    #[test]
    fn equality_covers_created_and_lineage() {
        let full = ArchiveRecord::full(instant());
        let same = ArchiveRecord::full(instant());
        let later = ArchiveRecord::full(instant() + chrono::Duration::seconds(1));
        let inc = ArchiveRecord::incremental(instant(), "full_x").unwrap();

        assert_eq!(full, same);
        assert_ne!(full, later);
        assert_ne!(full, inc);
    }
}
