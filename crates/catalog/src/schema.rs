//! Catalog table DDL. Column names are normative (spec §6): they are
//! shared with the trigger DDL this crate emits for the host DB, so they
//! must match exactly.

/// Idempotent; safe to run on every connection open, the way the teacher's
/// `SqlitePersistence::new` unconditionally runs its own `*_INIT` batches.
pub const INDICES_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS "FTS$INDICES" (
    "FTS$INDEX_NAME"     TEXT PRIMARY KEY,
    "FTS$RELATION_NAME"  TEXT NOT NULL,
    "FTS$ANALYZER"       TEXT NOT NULL,
    "FTS$DESCRIPTION"    TEXT,
    "FTS$INDEX_STATUS"   TEXT NOT NULL CHECK ("FTS$INDEX_STATUS" IN ('N', 'I', 'U', 'C'))
);
"#;

pub const INDEX_SEGMENTS_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS "FTS$INDEX_SEGMENTS" (
    "FTS$INDEX_NAME" TEXT NOT NULL REFERENCES "FTS$INDICES"("FTS$INDEX_NAME") ON DELETE CASCADE,
    "FTS$FIELD_NAME" TEXT NOT NULL,
    "FTS$KEY"        INTEGER NOT NULL CHECK ("FTS$KEY" IN (0, 1)),
    "FTS$BOOST"      REAL,
    PRIMARY KEY ("FTS$INDEX_NAME", "FTS$FIELD_NAME")
);
"#;

pub const ANALYZERS_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS "FTS$ANALYZERS" (
    "FTS$ANALYZER_NAME" TEXT PRIMARY KEY,
    "FTS$BASE_ANALYZER" TEXT NOT NULL,
    "FTS$DESCRIPTION"   TEXT
);
"#;

pub const STOP_WORDS_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS "FTS$STOP_WORDS" (
    "FTS$ANALYZER_NAME" TEXT NOT NULL,
    "FTS$WORD"          TEXT NOT NULL,
    PRIMARY KEY ("FTS$ANALYZER_NAME", "FTS$WORD")
);
"#;

/// The newer change-log column shape (spec §6/§9 open question 2): three
/// nullable key columns rather than one variant column. Older two-column
/// shapes are rejected at `CatalogRepository::open` time.
pub const LOG_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS "FTS$LOG" (
    "FTS$LOG_ID"         INTEGER PRIMARY KEY AUTOINCREMENT,
    "FTS$RELATION_NAME"  TEXT NOT NULL,
    "FTS$DB_KEY"         BLOB,
    "FTS$REC_UUID"       BLOB,
    "FTS$REC_ID"         INTEGER,
    "FTS$CHANGE_TYPE"    TEXT NOT NULL CHECK ("FTS$CHANGE_TYPE" IN ('I', 'U', 'D'))
);
"#;

pub const REQUIRED_LOG_COLUMNS: [&str; 6] = [
    "FTS$LOG_ID",
    "FTS$RELATION_NAME",
    "FTS$DB_KEY",
    "FTS$REC_UUID",
    "FTS$REC_ID",
    "FTS$CHANGE_TYPE",
];

pub const ALL_INIT: [&str; 5] = [
    INDICES_INIT,
    INDEX_SEGMENTS_INIT,
    ANALYZERS_INIT,
    STOP_WORDS_INIT,
    LOG_INIT,
];
