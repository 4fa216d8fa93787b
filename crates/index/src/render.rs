//! Type-aware text rendering for extracted column values (spec §4.5):
//! integers to decimal, floats to their canonical textual form, dates/times
//! to ISO 8601, binary to lowercase hex. Charset conversion to UTF-8 is a
//! documented no-op here since the stand-in host DB (sqlite) is already
//! UTF-8 throughout; `to_utf8` is kept as a seam for a real charset-aware
//! `RelationCatalog` to plug into without changing the extractor's shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Segment size used when streaming a BLOB/TEXT column larger than
/// `MAX_BLOB_TEXT_BYTES` (spec §4.5).
pub const BLOB_SEGMENT_BYTES: usize = 65_535;

/// Columns larger than this are streamed in [`BLOB_SEGMENT_BYTES`] chunks
/// rather than materialized in one read.
pub const MAX_BLOB_TEXT_BYTES: usize = 10 * 1024 * 1024;

/// A value read back from a row, before it is rendered to analyzer-ready
/// text.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Renders `value` to its analyzer-ready textual form, or `None` for a SQL
/// NULL (the caller treats a null non-key segment as "does not contribute
/// text" per spec §4.6's "non-empty field" rule).
pub fn render(value: &ColumnValue) -> Option<String> {
    match value {
        ColumnValue::Null => None,
        ColumnValue::Integer(i) => Some(i.to_string()),
        ColumnValue::Float(f) => Some(render_float(*f)),
        ColumnValue::Text(s) => Some(s.clone()),
        ColumnValue::Blob(bytes) => Some(render_blob(bytes)),
    }
}

fn render_float(f: f64) -> String {
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn render_blob(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Charset conversion hook (spec §4.5). The stand-in host DB is already
/// UTF-8, so this is the identity function; a real deployment with a
/// non-UTF-8 host charset would replace this with an ICU-backed converter
/// keyed by `charset_id`.
pub fn to_utf8(_charset_id: i64, bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parses a string that sqlite returned for a `DATE`/`TIME`/`TIMESTAMP`
/// declared-type column into its ISO 8601 textual form. Falls back to the
/// input unchanged if it is not one of the recognised shapes -- sqlite has
/// no native temporal type, so these always arrive as text.
pub fn render_temporal(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc).to_rfc3339();
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return ndt.format("%Y-%m-%dT%H:%M:%S").to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        return t.format("%H:%M:%S").to_string();
    }
    raw.to_string()
}
