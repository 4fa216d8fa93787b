//! Relation introspection (spec §4.3): look up table/column metadata and
//! classify columns for key eligibility. The host SQL dialect is out of
//! scope (spec §1), so this is a trait rather than a concrete query
//! builder -- `SqliteRelationCatalog` is the one implementation this crate
//! carries, the way the teacher's `Persistence` trait has `sqlite` as one
//! of several interchangeable backends.

use fts_errors::{FtsError, Result};

use crate::model::KeyKind;

/// A column's type metadata, as much as this crate needs to classify it
/// and to drive the extractor's type-aware rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationFieldInfo {
    pub name: String,
    pub sql_type: String,
    pub length: Option<i64>,
    pub scale: i64,
    pub nullable: bool,
}

impl RelationFieldInfo {
    /// Scale-0 integer, fixed-length 16-byte binary/char, or the
    /// `RDB$DB_KEY` pseudo-column (spec §4.3).
    pub fn key_kind(&self) -> Option<KeyKind> {
        if self.name.eq_ignore_ascii_case(DB_KEY_PSEUDO_COLUMN) {
            return Some(KeyKind::DbKey);
        }
        let ty = self.sql_type.to_ascii_uppercase();
        if self.scale == 0 && matches!(ty.as_str(), "INTEGER" | "SMALLINT" | "BIGINT") {
            return Some(KeyKind::IntId);
        }
        if matches!(ty.as_str(), "BINARY" | "CHAR" | "BLOB") && self.length == Some(16) {
            return Some(KeyKind::Uuid);
        }
        None
    }
}

/// Metadata lookups a relation-introspection backend must provide.
pub trait RelationCatalog {
    fn table_exists(&self, relation: &str) -> Result<bool>;
    fn column_info(&self, relation: &str, column: &str) -> Result<RelationFieldInfo>;
    fn primary_key_columns(&self, relation: &str) -> Result<Vec<String>>;
}

/// The pseudo-column name for row identity on relations without a usable
/// declared key (spec §3 invariant 1, §6).
pub const DB_KEY_PSEUDO_COLUMN: &str = "RDB$DB_KEY";

/// Resolves relation/column metadata against a `rusqlite::Connection`,
/// standing in for "any relational engine" (spec §1 scopes the real host
/// SQL dialect out; sqlite plays that role here, just as the teacher's own
/// `sqlite` crate is one of several interchangeable `Persistence` impls).
pub struct SqliteRelationCatalog<'conn> {
    conn: &'conn rusqlite::Connection,
}

impl<'conn> SqliteRelationCatalog<'conn> {
    pub fn new(conn: &'conn rusqlite::Connection) -> Self {
        Self { conn }
    }
}

impl RelationCatalog for SqliteRelationCatalog<'_> {
    fn table_exists(&self, relation: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [relation],
                |_| Ok(()),
            )
            .optional_bool()
    }

    fn column_info(&self, relation: &str, column: &str) -> Result<RelationFieldInfo> {
        if column.eq_ignore_ascii_case(DB_KEY_PSEUDO_COLUMN) {
            if !self.table_exists(relation)? {
                return Err(FtsError::no_such_relation(relation));
            }
            return Ok(RelationFieldInfo {
                name: DB_KEY_PSEUDO_COLUMN.to_string(),
                sql_type: "BINARY".to_string(),
                length: Some(16),
                scale: 0,
                nullable: false,
            });
        }

        if !self.table_exists(relation)? {
            return Err(FtsError::no_such_relation(relation));
        }

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{relation}\")"))
            .map_err(FtsError::index_library_error)?;
        let mut rows = stmt
            .query([])
            .map_err(FtsError::index_library_error)?;
        while let Some(row) = rows.next().map_err(FtsError::index_library_error)? {
            let name: String = row.get(1).map_err(FtsError::index_library_error)?;
            if !name.eq_ignore_ascii_case(column) {
                continue;
            }
            let decl_type: String = row.get(2).map_err(FtsError::index_library_error)?;
            let notnull: i64 = row.get(3).map_err(FtsError::index_library_error)?;
            let (sql_type, length) = parse_declared_type(&decl_type);
            return Ok(RelationFieldInfo {
                name,
                sql_type,
                length,
                scale: 0,
                nullable: notnull == 0,
            });
        }
        Err(FtsError::no_such_field(relation, column))
    }

    fn primary_key_columns(&self, relation: &str) -> Result<Vec<String>> {
        if !self.table_exists(relation)? {
            return Err(FtsError::no_such_relation(relation));
        }
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{relation}\")"))
            .map_err(FtsError::index_library_error)?;
        let mut pk_cols: Vec<(i64, String)> = Vec::new();
        let mut rows = stmt
            .query([])
            .map_err(FtsError::index_library_error)?;
        while let Some(row) = rows.next().map_err(FtsError::index_library_error)? {
            let pk_index: i64 = row.get(5).map_err(FtsError::index_library_error)?;
            if pk_index > 0 {
                let name: String = row.get(1).map_err(FtsError::index_library_error)?;
                pk_cols.push((pk_index, name));
            }
        }
        pk_cols.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(pk_cols.into_iter().map(|(_, name)| name).collect())
    }
}

/// `"VARCHAR(16)"` -> `("VARCHAR", Some(16))`; types without a parenthesized
/// length come back with `length = None`.
fn parse_declared_type(decl: &str) -> (String, Option<i64>) {
    match decl.find('(') {
        Some(open) => {
            let base = decl[..open].trim().to_ascii_uppercase();
            let len = decl[open + 1..]
                .trim_end_matches(')')
                .split(',')
                .next()
                .and_then(|s| s.trim().parse::<i64>().ok());
            (base, len)
        }
        None => (decl.trim().to_ascii_uppercase(), None),
    }
}

trait OptionalBool {
    fn optional_bool(self) -> Result<bool>;
}

impl OptionalBool for rusqlite::Result<()> {
    fn optional_bool(self) -> Result<bool> {
        match self {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(FtsError::index_library_error(e)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn conn_with_table() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE documents (
                id INTEGER PRIMARY KEY,
                uuid BINARY(16),
                title VARCHAR(200) NOT NULL,
                body TEXT
            );
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn table_exists_reflects_schema() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        assert!(cat.table_exists("documents").unwrap());
        assert!(!cat.table_exists("missing").unwrap());
    }

    #[test]
    fn int_primary_key_is_key_eligible() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        let info = cat.column_info("documents", "id").unwrap();
        assert_eq!(info.key_kind(), Some(KeyKind::IntId));
    }

    #[test]
    fn fixed_binary_16_is_key_eligible() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        let info = cat.column_info("documents", "uuid").unwrap();
        assert_eq!(info.key_kind(), Some(KeyKind::Uuid));
    }

    #[test]
    fn varchar_is_not_key_eligible() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        let info = cat.column_info("documents", "title").unwrap();
        assert_eq!(info.key_kind(), None);
    }

    #[test]
    fn db_key_pseudo_column_resolves_on_any_table() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        let info = cat.column_info("documents", "RDB$DB_KEY").unwrap();
        assert_eq!(info.key_kind(), Some(KeyKind::DbKey));
    }

    #[test]
    fn primary_key_columns_returns_declared_pk() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        assert_eq!(cat.primary_key_columns("documents").unwrap(), vec!["id"]);
    }

    #[test]
    fn missing_relation_is_an_error() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        let err = cat.column_info("ghost", "id").unwrap_err();
        assert_eq!(err.short_msg(), "NoSuchRelation");
    }

    #[test]
    fn missing_field_is_an_error() {
        let conn = conn_with_table();
        let cat = SqliteRelationCatalog::new(&conn);
        let err = cat.column_info("documents", "ghost").unwrap_err();
        assert_eq!(err.short_msg(), "NoSuchField");
    }
}
