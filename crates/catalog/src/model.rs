//! The entity model for the full-text index catalog (spec §3).

use std::fmt;

/// Lifecycle state of an [`Index`]. Transitions are monotone within a
/// session: `New -> Complete` after a successful full build, `Complete ->
/// NeedsRebuild` on metadata change or extractor failure, any state ->
/// `Inactive` by explicit user action, `Inactive -> NeedsRebuild` on
/// reactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexStatus {
    New,
    Inactive,
    NeedsRebuild,
    Complete,
}

impl IndexStatus {
    /// The single-character code stored in `FTS$INDEX_STATUS`.
    pub fn code(self) -> char {
        match self {
            Self::New => 'N',
            Self::Inactive => 'I',
            Self::NeedsRebuild => 'U',
            Self::Complete => 'C',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "N" => Some(Self::New),
            "I" => Some(Self::Inactive),
            "U" => Some(Self::NeedsRebuild),
            "C" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Whether this status is one of the two "active" states an index must
    /// be in to participate in change-log application and search
    /// (invariant 1, spec §3).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Complete | Self::NeedsRebuild)
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "N",
            Self::Inactive => "I",
            Self::NeedsRebuild => "U",
            Self::Complete => "C",
        })
    }
}

/// The key kind carried through the extractor, writer, and query executor
/// (spec §9, "Polymorphism over key kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    DbKey,
    Uuid,
    IntId,
}

impl KeyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DbKey => "DBKEY",
            Self::Uuid => "UUID",
            Self::IntId => "INT_ID",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog row in `FTS$INDICES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub relation_name: String,
    pub analyzer: String,
    pub description: Option<String>,
    pub status: IndexStatus,
    pub segments: Option<Vec<IndexSegment>>,
}

impl Index {
    /// The segment with `is_key = true`, if segments were loaded.
    pub fn key_segment(&self) -> Option<&IndexSegment> {
        self.segments.as_ref()?.iter().find(|s| s.is_key)
    }

    /// All non-key segments, if segments were loaded.
    pub fn field_segments(&self) -> Vec<&IndexSegment> {
        self.segments
            .as_ref()
            .map(|segs| segs.iter().filter(|s| !s.is_key).collect())
            .unwrap_or_default()
    }
}

/// A catalog row in `FTS$INDEX_SEGMENTS`: one field's participation in one
/// index. Not to be confused with an on-disk index segment.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSegment {
    pub index_name: String,
    pub field_name: String,
    pub is_key: bool,
    pub boost: Option<f64>,
}

/// A catalog row in `FTS$ANALYZERS`. Built-in analyzers are never persisted
/// here; this struct only ever describes a user-defined analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAnalyzer {
    pub name: String,
    pub base_analyzer: String,
    pub description: Option<String>,
}

/// A catalog row in `FTS$STOP_WORDS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopWord {
    pub analyzer_name: String,
    pub word: String,
}

/// The type of mutation a change-log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

impl ChangeType {
    pub fn code(self) -> char {
        match self {
            Self::Insert => 'I',
            Self::Update => 'U',
            Self::Delete => 'D',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "I" => Some(Self::Insert),
            "U" => Some(Self::Update),
            "D" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A value of whatever kind a change-log row's key column holds, already
/// decoded from the host DB's native representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    DbKey(Vec<u8>),
    Uuid([u8; 16]),
    IntId(i64),
}

impl KeyValue {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::DbKey(_) => KeyKind::DbKey,
            Self::Uuid(_) => KeyKind::Uuid,
            Self::IntId(_) => KeyKind::IntId,
        }
    }
}

/// A row in `FTS$LOG`, canonicalized to the newer column shape (spec §9,
/// open question 2): exactly one of `db_key`/`uuid`/`id` is meaningful per
/// row, selected by `change_type`'s relation's indexes' key kinds -- a
/// single log row can carry values for more than one key shape at once
/// because triggers on relations with different declared key kinds all
/// write into the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub log_id: i64,
    pub relation_name: String,
    pub db_key: Option<Vec<u8>>,
    pub uuid: Option<[u8; 16]>,
    pub id: Option<i64>,
    pub change_type: ChangeType,
}

impl LogEntry {
    /// The key value for a given key kind, if this log row carries one.
    /// Per spec §4.7 step 3: if the corresponding column is null, the
    /// caller should skip the index.
    pub fn key_for_kind(&self, kind: KeyKind) -> Option<KeyValue> {
        match kind {
            KeyKind::DbKey => self.db_key.clone().map(KeyValue::DbKey),
            KeyKind::Uuid => self.uuid.map(KeyValue::Uuid),
            KeyKind::IntId => self.id.map(KeyValue::IntId),
        }
    }
}
