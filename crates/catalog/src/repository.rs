//! The catalog repository: all reads and writes of `FTS$INDICES`,
//! `FTS$INDEX_SEGMENTS`, `FTS$ANALYZERS`, `FTS$STOP_WORDS`, and `FTS$LOG`
//! (spec §4.4). Mirrors the teacher's `SqlitePersistence`: idempotent table
//! creation on open, one `rusqlite::Connection` per instance, no connection
//! pooling since the host transaction already serializes access.

use fts_errors::{FtsError, Result};
use rusqlite::{params, OptionalExtension};

use crate::model::{ChangeType, Index, IndexSegment, IndexStatus, LogEntry, StopWord, UserAnalyzer};
use crate::schema;

/// Owns the connection to the host database's catalog tables.
pub struct CatalogRepository {
    conn: rusqlite::Connection,
}

impl CatalogRepository {
    /// Opens (creating if necessary) the catalog tables on `conn`. Rejects a
    /// pre-existing `FTS$LOG` table that is missing any of the newer
    /// three-column key shape (spec §9, open question 2).
    pub fn open(conn: rusqlite::Connection) -> Result<Self> {
        for ddl in schema::ALL_INIT {
            conn.execute_batch(ddl)
                .map_err(FtsError::index_library_error)?;
        }
        Self::validate_log_shape(&conn)?;
        Ok(Self { conn })
    }

    fn validate_log_shape(conn: &rusqlite::Connection) -> Result<()> {
        let mut stmt = conn
            .prepare("PRAGMA table_info(\"FTS$LOG\")")
            .map_err(FtsError::index_library_error)?;
        let present: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(FtsError::index_library_error)?
            .collect::<rusqlite::Result<_>>()
            .map_err(FtsError::index_library_error)?;
        for required in schema::REQUIRED_LOG_COLUMNS {
            if !present.iter().any(|c| c == required) {
                return Err(FtsError::no_config(format!(
                    "\"FTS$LOG\" is missing required column \"{required}\"; an older change-log \
                     shape is not supported"
                )));
            }
        }
        Ok(())
    }

    /// Runs `f` inside a transaction, rolling back on error. The autonomous
    /// transaction spec §5 calls for when updating index status as a side
    /// effect of another operation.
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self
            .conn
            .transaction()
            .map_err(FtsError::index_library_error)?;
        let result = f(&tx)?;
        tx.commit().map_err(FtsError::index_library_error)?;
        Ok(result)
    }

    pub fn all_indexes(&self) -> Result<Vec<Index>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT \"FTS$INDEX_NAME\", \"FTS$RELATION_NAME\", \"FTS$ANALYZER\", \
                 \"FTS$DESCRIPTION\", \"FTS$INDEX_STATUS\" FROM \"FTS$INDICES\" \
                 ORDER BY \"FTS$INDEX_NAME\"",
            )
            .map_err(FtsError::index_library_error)?;
        let rows = stmt
            .query_map([], Self::row_to_index)
            .map_err(FtsError::index_library_error)?;
        rows.collect::<rusqlite::Result<_>>()
            .map_err(FtsError::index_library_error)
    }

    pub fn get_index(&self, name: &str) -> Result<Option<Index>> {
        self.conn
            .query_row(
                "SELECT \"FTS$INDEX_NAME\", \"FTS$RELATION_NAME\", \"FTS$ANALYZER\", \
                 \"FTS$DESCRIPTION\", \"FTS$INDEX_STATUS\" FROM \"FTS$INDICES\" \
                 WHERE \"FTS$INDEX_NAME\" = ?1",
                params![name],
                Self::row_to_index,
            )
            .optional()
            .map_err(FtsError::index_library_error)
    }

    fn row_to_index(row: &rusqlite::Row<'_>) -> rusqlite::Result<Index> {
        let status_code: String = row.get(4)?;
        let status = IndexStatus::from_code(&status_code).unwrap_or(IndexStatus::NeedsRebuild);
        Ok(Index {
            name: row.get(0)?,
            relation_name: row.get(1)?,
            analyzer: row.get(2)?,
            description: row.get(3)?,
            status,
            segments: None,
        })
    }

    /// Loads `index.segments` in place, replacing whatever was there.
    pub fn fill_segments(&self, index: &mut Index) -> Result<()> {
        index.segments = Some(self.segments_for(&index.name)?);
        Ok(())
    }

    pub fn segments_for(&self, index_name: &str) -> Result<Vec<IndexSegment>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT \"FTS$INDEX_NAME\", \"FTS$FIELD_NAME\", \"FTS$KEY\", \"FTS$BOOST\" \
                 FROM \"FTS$INDEX_SEGMENTS\" WHERE \"FTS$INDEX_NAME\" = ?1 \
                 ORDER BY \"FTS$FIELD_NAME\"",
            )
            .map_err(FtsError::index_library_error)?;
        let rows = stmt
            .query_map(params![index_name], |row| {
                Ok(IndexSegment {
                    index_name: row.get(0)?,
                    field_name: row.get(1)?,
                    is_key: row.get::<_, i64>(2)? != 0,
                    boost: row.get(3)?,
                })
            })
            .map_err(FtsError::index_library_error)?;
        rows.collect::<rusqlite::Result<_>>()
            .map_err(FtsError::index_library_error)
    }

    pub fn has_index(&self, name: &str) -> Result<bool> {
        Ok(self.get_index(name)?.is_some())
    }

    pub fn has_index_field(&self, index_name: &str, field_name: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM \"FTS$INDEX_SEGMENTS\" WHERE \"FTS$INDEX_NAME\" = ?1 \
                 AND \"FTS$FIELD_NAME\" = ?2",
                params![index_name, field_name],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
            .map_err(FtsError::index_library_error)
    }

    pub fn has_key_field(&self, index_name: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM \"FTS$INDEX_SEGMENTS\" WHERE \"FTS$INDEX_NAME\" = ?1 \
                 AND \"FTS$KEY\" = 1",
                params![index_name],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
            .map_err(FtsError::index_library_error)
    }

    pub fn create_index(
        &self,
        name: &str,
        relation_name: &str,
        analyzer: &str,
        description: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO \"FTS$INDICES\" (\"FTS$INDEX_NAME\", \"FTS$RELATION_NAME\", \
                 \"FTS$ANALYZER\", \"FTS$DESCRIPTION\", \"FTS$INDEX_STATUS\") \
                 VALUES (?1, ?2, ?3, ?4, 'N')",
                params![name, relation_name, analyzer, description],
            )
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM \"FTS$INDICES\" WHERE \"FTS$INDEX_NAME\" = ?1",
                params![name],
            )
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    pub fn set_status(&self, name: &str, status: IndexStatus) -> Result<()> {
        self.conn
            .execute(
                "UPDATE \"FTS$INDICES\" SET \"FTS$INDEX_STATUS\" = ?1 WHERE \"FTS$INDEX_NAME\" = ?2",
                params![status.code().to_string(), name],
            )
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    pub fn add_index_field(
        &self,
        index_name: &str,
        field_name: &str,
        is_key: bool,
        boost: Option<f64>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO \"FTS$INDEX_SEGMENTS\" (\"FTS$INDEX_NAME\", \"FTS$FIELD_NAME\", \
                 \"FTS$KEY\", \"FTS$BOOST\") VALUES (?1, ?2, ?3, ?4)",
                params![index_name, field_name, is_key as i64, boost],
            )
            .map_err(FtsError::index_library_error)?;
        self.set_status(index_name, IndexStatus::NeedsRebuild)
    }

    pub fn drop_index_field(&self, index_name: &str, field_name: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM \"FTS$INDEX_SEGMENTS\" WHERE \"FTS$INDEX_NAME\" = ?1 \
                 AND \"FTS$FIELD_NAME\" = ?2",
                params![index_name, field_name],
            )
            .map_err(FtsError::index_library_error)?;
        self.set_status(index_name, IndexStatus::NeedsRebuild)
    }

    pub fn set_field_boost(&self, index_name: &str, field_name: &str, boost: f64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE \"FTS$INDEX_SEGMENTS\" SET \"FTS$BOOST\" = ?1 \
                 WHERE \"FTS$INDEX_NAME\" = ?2 AND \"FTS$FIELD_NAME\" = ?3",
                params![boost, index_name, field_name],
            )
            .map_err(FtsError::index_library_error)?;
        self.set_status(index_name, IndexStatus::NeedsRebuild)
    }

    pub fn get_analyzer(&self, name: &str) -> Result<Option<UserAnalyzer>> {
        self.conn
            .query_row(
                "SELECT \"FTS$ANALYZER_NAME\", \"FTS$BASE_ANALYZER\", \"FTS$DESCRIPTION\" \
                 FROM \"FTS$ANALYZERS\" WHERE \"FTS$ANALYZER_NAME\" = ?1",
                params![name],
                |row| {
                    Ok(UserAnalyzer {
                        name: row.get(0)?,
                        base_analyzer: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(FtsError::index_library_error)
    }

    pub fn all_analyzers(&self) -> Result<Vec<UserAnalyzer>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT \"FTS$ANALYZER_NAME\", \"FTS$BASE_ANALYZER\", \"FTS$DESCRIPTION\" \
                 FROM \"FTS$ANALYZERS\" ORDER BY \"FTS$ANALYZER_NAME\"",
            )
            .map_err(FtsError::index_library_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UserAnalyzer {
                    name: row.get(0)?,
                    base_analyzer: row.get(1)?,
                    description: row.get(2)?,
                })
            })
            .map_err(FtsError::index_library_error)?;
        rows.collect::<rusqlite::Result<_>>()
            .map_err(FtsError::index_library_error)
    }

    pub fn create_analyzer(
        &self,
        name: &str,
        base_analyzer: &str,
        description: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO \"FTS$ANALYZERS\" (\"FTS$ANALYZER_NAME\", \"FTS$BASE_ANALYZER\", \
                 \"FTS$DESCRIPTION\") VALUES (?1, ?2, ?3)",
                params![name, base_analyzer, description],
            )
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    pub fn drop_analyzer(&self, name: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM \"FTS$ANALYZERS\" WHERE \"FTS$ANALYZER_NAME\" = ?1",
                params![name],
            )
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    pub fn stop_words(&self, analyzer_name: &str) -> Result<Vec<StopWord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT \"FTS$ANALYZER_NAME\", \"FTS$WORD\" FROM \"FTS$STOP_WORDS\" \
                 WHERE \"FTS$ANALYZER_NAME\" = ?1 ORDER BY \"FTS$WORD\"",
            )
            .map_err(FtsError::index_library_error)?;
        let rows = stmt
            .query_map(params![analyzer_name], |row| {
                Ok(StopWord {
                    analyzer_name: row.get(0)?,
                    word: row.get(1)?,
                })
            })
            .map_err(FtsError::index_library_error)?;
        rows.collect::<rusqlite::Result<_>>()
            .map_err(FtsError::index_library_error)
    }

    /// Adds a stop word and marks every index built on `analyzer_name` for
    /// rebuild, in one transaction (spec §4.4's add-stop-word cascade).
    pub fn add_stop_word(&mut self, analyzer_name: &str, word: &str) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO \"FTS$STOP_WORDS\" (\"FTS$ANALYZER_NAME\", \"FTS$WORD\") \
                 VALUES (?1, ?2)",
                params![analyzer_name, word],
            )
            .map_err(FtsError::index_library_error)?;
            Self::mark_indexes_using_analyzer_dirty(tx, analyzer_name)
        })
    }

    pub fn delete_stop_word(&mut self, analyzer_name: &str, word: &str) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute(
                "DELETE FROM \"FTS$STOP_WORDS\" WHERE \"FTS$ANALYZER_NAME\" = ?1 \
                 AND \"FTS$WORD\" = ?2",
                params![analyzer_name, word],
            )
            .map_err(FtsError::index_library_error)?;
            Self::mark_indexes_using_analyzer_dirty(tx, analyzer_name)
        })
    }

    fn mark_indexes_using_analyzer_dirty(
        tx: &rusqlite::Transaction<'_>,
        analyzer_name: &str,
    ) -> Result<()> {
        tx.execute(
            "UPDATE \"FTS$INDICES\" SET \"FTS$INDEX_STATUS\" = 'U' \
             WHERE \"FTS$ANALYZER\" = ?1 AND \"FTS$INDEX_STATUS\" = 'C'",
            params![analyzer_name],
        )
        .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    pub fn append_log(
        &self,
        relation_name: &str,
        db_key: Option<&[u8]>,
        uuid: Option<[u8; 16]>,
        id: Option<i64>,
        change_type: ChangeType,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO \"FTS$LOG\" (\"FTS$RELATION_NAME\", \"FTS$DB_KEY\", \
                 \"FTS$REC_UUID\", \"FTS$REC_ID\", \"FTS$CHANGE_TYPE\") \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    relation_name,
                    db_key,
                    uuid.map(|u| u.to_vec()),
                    id,
                    change_type.code().to_string()
                ],
            )
            .map_err(FtsError::index_library_error)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Pulls up to `limit` pending log rows in insertion order (spec §4.7
    /// step 1).
    pub fn pending_log_entries(&self, limit: i64) -> Result<Vec<LogEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT \"FTS$LOG_ID\", \"FTS$RELATION_NAME\", \"FTS$DB_KEY\", \
                 \"FTS$REC_UUID\", \"FTS$REC_ID\", \"FTS$CHANGE_TYPE\" FROM \"FTS$LOG\" \
                 ORDER BY \"FTS$LOG_ID\" LIMIT ?1",
            )
            .map_err(FtsError::index_library_error)?;
        let rows = stmt
            .query_map(params![limit], Self::row_to_log_entry)
            .map_err(FtsError::index_library_error)?;
        rows.collect::<rusqlite::Result<_>>()
            .map_err(FtsError::index_library_error)
    }

    fn row_to_log_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
        let change_code: String = row.get(5)?;
        let uuid_bytes: Option<Vec<u8>> = row.get(3)?;
        Ok(LogEntry {
            log_id: row.get(0)?,
            relation_name: row.get(1)?,
            db_key: row.get(2)?,
            uuid: uuid_bytes.and_then(|v| v.try_into().ok()),
            id: row.get(4)?,
            change_type: ChangeType::from_code(&change_code).unwrap_or(ChangeType::Update),
        })
    }

    /// Deletes processed log rows up to and including `up_to_log_id` (spec
    /// §4.7 step 5).
    pub fn delete_log_entries_up_to(&self, up_to_log_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM \"FTS$LOG\" WHERE \"FTS$LOG_ID\" <= ?1",
                params![up_to_log_id],
            )
            .map_err(FtsError::index_library_error)
    }

    /// The underlying connection, for callers (the engine facade) that need
    /// to run relation-introspection or record-extraction queries against
    /// the same stand-in host database this repository's catalog tables
    /// live in.
    pub fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub fn pending_log_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM \"FTS$LOG\"", [], |row| row.get(0))
            .map_err(FtsError::index_library_error)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn open_mem() -> CatalogRepository {
        CatalogRepository::open(rusqlite::Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn open_creates_all_tables() {
        let repo = open_mem();
        assert!(repo.all_indexes().unwrap().is_empty());
    }

    #[test]
    fn create_and_fetch_index_round_trips() {
        let repo = open_mem();
        repo.create_index("idx_docs", "documents", "english", Some("demo"))
            .unwrap();
        let idx = repo.get_index("idx_docs").unwrap().unwrap();
        assert_eq!(idx.relation_name, "documents");
        assert_eq!(idx.status, IndexStatus::New);
    }

    #[test]
    fn add_index_field_marks_needs_rebuild() {
        let repo = open_mem();
        repo.create_index("idx_docs", "documents", "english", None)
            .unwrap();
        repo.set_status("idx_docs", IndexStatus::Complete).unwrap();
        repo.add_index_field("idx_docs", "body", false, Some(2.0))
            .unwrap();
        let idx = repo.get_index("idx_docs").unwrap().unwrap();
        assert_eq!(idx.status, IndexStatus::NeedsRebuild);
    }

    #[test]
    fn add_stop_word_cascades_to_complete_indexes_only() {
        let mut repo = open_mem();
        repo.create_analyzer("custom", "english", None).unwrap();
        repo.create_index("idx_a", "documents", "custom", None)
            .unwrap();
        repo.create_index("idx_b", "documents", "custom", None)
            .unwrap();
        repo.set_status("idx_a", IndexStatus::Complete).unwrap();
        repo.set_status("idx_b", IndexStatus::New).unwrap();

        repo.add_stop_word("custom", "the").unwrap();

        assert_eq!(
            repo.get_index("idx_a").unwrap().unwrap().status,
            IndexStatus::NeedsRebuild
        );
        assert_eq!(
            repo.get_index("idx_b").unwrap().unwrap().status,
            IndexStatus::New
        );
    }

    #[test]
    fn log_entries_round_trip_and_delete() {
        let repo = open_mem();
        let id1 = repo
            .append_log("documents", Some(&[1, 2, 3]), None, None, ChangeType::Insert)
            .unwrap();
        let id2 = repo
            .append_log("documents", Some(&[4, 5, 6]), None, None, ChangeType::Update)
            .unwrap();
        let pending = repo.pending_log_entries(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].log_id, id1);

        repo.delete_log_entries_up_to(id2).unwrap();
        assert_eq!(repo.pending_log_count().unwrap(), 0);
    }

    #[test]
    fn open_rejects_older_log_shape() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"CREATE TABLE "FTS$LOG" (
                "FTS$LOG_ID" INTEGER PRIMARY KEY,
                "FTS$RELATION_NAME" TEXT NOT NULL,
                "FTS$DB_KEY" BLOB,
                "FTS$CHANGE_TYPE" TEXT NOT NULL
            );"#,
        )
        .unwrap();
        let err = CatalogRepository::open(conn).unwrap_err();
        assert_eq!(err.short_msg(), "NoConfig");
    }
}
