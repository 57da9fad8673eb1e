//! JSON codec for persisted ledger entries
//!
//! Each ledger entry is an object with three fields:
//!
//! ```json
//! {"type": "inc", "created": "2019-02-18T11:14:42Z", "previous": "full_2019-02-17T11_14_42Z"}
//! ```
//!
//! `previous` is `null` exactly when `type` is `full`. Entries missing a
//! textual `type` or `created` are skipped on load with a warning; anything
//! else out of shape fails the load.

use crate::error::{ArchiveError, Result};
use crate::record::{parse_instant, ArchiveKind, ArchiveRecord};
use serde_json::{json, Value};

const FIELD_TYPE: &str = "type";
const FIELD_CREATED: &str = "created";
const FIELD_PREVIOUS: &str = "previous";

/// Encode a record as one ledger entry
pub fn encode(record: &ArchiveRecord) -> Value {
    json!({
        FIELD_TYPE: record.kind().tag(),
        FIELD_CREATED: record.created_text(),
        FIELD_PREVIOUS: record.previous(),
    })
}

/// Encode a whole ledger in its persisted order
pub fn encode_ledger(records: &[ArchiveRecord]) -> Vec<Value> {
    records.iter().map(encode).collect()
}

/// Decode one ledger entry
///
/// Returns `Ok(None)` for entries skipped under the missing-field policy.
pub fn decode(value: &Value) -> Result<Option<ArchiveRecord>> {
    let object = value.as_object().ok_or_else(|| ArchiveError::MalformedRecord {
        detail: "ledger entry is not an object".to_string(),
    })?;

    let Some(tag) = object.get(FIELD_TYPE).and_then(Value::as_str) else {
        tracing::warn!("skipping ledger entry without a textual '{FIELD_TYPE}' field");
        return Ok(None);
    };
    let Some(created_text) = object.get(FIELD_CREATED).and_then(Value::as_str) else {
        tracing::warn!("skipping ledger entry without a textual '{FIELD_CREATED}' field");
        return Ok(None);
    };

    let kind = ArchiveKind::from_tag(tag)?;
    let created = parse_instant(created_text)?;
    let previous = match object.get(FIELD_PREVIOUS) {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.as_str()),
        Some(other) => {
            return Err(ArchiveError::MalformedRecord {
                detail: format!("'{FIELD_PREVIOUS}' must be a string or null, got {other}"),
            })
        }
    };

    match (kind, previous) {
        (ArchiveKind::Full, None) => Ok(Some(ArchiveRecord::full(created))),
        (ArchiveKind::Incremental, Some(name)) => {
            Ok(Some(ArchiveRecord::incremental(created, name)?))
        }
        (ArchiveKind::Full, Some(name)) => Err(ArchiveError::MalformedRecord {
            detail: format!("full archive must not follow '{name}'"),
        }),
        (ArchiveKind::Incremental, None) => Err(ArchiveError::MalformedRecord {
            detail: "incremental archive has no predecessor".to_string(),
        }),
    }
}

/// Decode a persisted ledger, dropping skipped entries
pub fn decode_ledger(values: &[Value]) -> Result<Vec<ArchiveRecord>> {
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        if let Some(record) = decode(value)? {
            records.push(record);
        }
    }
    Ok(records)
}
