//! Record extraction (spec §4.5): builds and runs the per-index SELECT that
//! materializes one or all rows as analyzer-ready text.

use fts_catalog::relation::{RelationCatalog, DB_KEY_PSEUDO_COLUMN};
use fts_catalog::{Index, KeyKind, KeyValue};
use fts_errors::{FtsError, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::render::{self, ColumnValue};

/// One field segment's definition, as needed by the extractor: the catalog
/// row plus the pre-resolved key kind of the relation's key column.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: String,
    pub relation: String,
    pub key_field: String,
    pub key_kind: KeyKind,
    /// `(field_name, boost)` for every non-key segment.
    pub fields: Vec<(String, Option<f64>)>,
}

impl IndexDefinition {
    /// Resolves an [`IndexDefinition`] from a catalog [`Index`] (with
    /// segments loaded) and a relation catalog, for the key kind lookup.
    pub fn from_index(index: &Index, relation_catalog: &dyn RelationCatalog) -> Result<Self> {
        let key_segment = index
            .key_segment()
            .ok_or_else(|| FtsError::index_not_built(&index.name))?;
        let info = relation_catalog.column_info(&index.relation_name, &key_segment.field_name)?;
        let key_kind = info
            .key_kind()
            .ok_or_else(|| FtsError::unsupported_key_type(&index.relation_name, &key_segment.field_name))?;
        Ok(Self {
            name: index.name.clone(),
            relation: index.relation_name.clone(),
            key_field: key_segment.field_name.clone(),
            key_kind,
            fields: index
                .field_segments()
                .into_iter()
                .map(|s| (s.field_name.clone(), s.boost))
                .collect(),
        })
    }
}

/// A single materialized row: the decoded key plus its analyzed field text.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub key: KeyValue,
    /// `(field_name, text, boost)`.
    pub fields: Vec<(String, String, Option<f64>)>,
}

/// Builds and executes the SELECT statements for one [`IndexDefinition`].
pub struct RecordExtractor<'a> {
    def: &'a IndexDefinition,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(def: &'a IndexDefinition) -> Self {
        Self { def }
    }

    fn key_select_expr(&self) -> &str {
        if self.def.key_field.eq_ignore_ascii_case(DB_KEY_PSEUDO_COLUMN) {
            "rowid"
        } else {
            &self.def.key_field
        }
    }

    fn select_list(&self) -> String {
        let mut cols = vec![quote_ident(self.key_select_expr())];
        cols.extend(self.def.fields.iter().map(|(f, _)| quote_ident(f)));
        cols.join(", ")
    }

    /// `WHERE <key> = ?` for the per-row refresh path.
    pub fn extract_one(&self, conn: &Connection, key: &KeyValue) -> Result<Option<ExtractedRecord>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.select_list(),
            quote_ident(&self.def.relation),
            quote_ident(self.key_select_expr()),
        );
        let mut stmt = conn.prepare(&sql).map_err(FtsError::index_library_error)?;
        let bound = key_bind_value(key);
        let mut rows = stmt
            .query(rusqlite::params![bound])
            .map_err(FtsError::index_library_error)?;
        match rows.next().map_err(FtsError::index_library_error)? {
            Some(row) => Ok(Some(self.row_to_record(row)?)),
            None => Ok(None),
        }
    }

    /// `WHERE <key> IS NOT NULL AND (f1 IS NOT NULL OR f2 IS NOT NULL OR …)`
    /// for the full-scan rebuild path.
    pub fn extract_all(&self, conn: &Connection) -> Result<Vec<ExtractedRecord>> {
        let key_expr = quote_ident(self.key_select_expr());
        let field_conditions: Vec<String> = self
            .def
            .fields
            .iter()
            .map(|(f, _)| format!("{} IS NOT NULL", quote_ident(f)))
            .collect();
        let where_clause = if field_conditions.is_empty() {
            format!("{key_expr} IS NOT NULL")
        } else {
            format!("{key_expr} IS NOT NULL AND ({})", field_conditions.join(" OR "))
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.select_list(),
            quote_ident(&self.def.relation),
            where_clause,
        );
        let mut stmt = conn.prepare(&sql).map_err(FtsError::index_library_error)?;
        let mut rows = stmt.query([]).map_err(FtsError::index_library_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(FtsError::index_library_error)? {
            out.push(self.row_to_record(row)?);
        }
        Ok(out)
    }

    fn row_to_record(&self, row: &rusqlite::Row<'_>) -> Result<ExtractedRecord> {
        let key = self.read_key(row, 0)?;
        let mut fields = Vec::with_capacity(self.def.fields.len());
        for (i, (name, boost)) in self.def.fields.iter().enumerate() {
            let value = read_column_value(row, i + 1)?;
            if let Some(text) = render::render(&value) {
                fields.push((name.clone(), text, *boost));
            }
        }
        Ok(ExtractedRecord { key, fields })
    }

    fn read_key(&self, row: &rusqlite::Row<'_>, idx: usize) -> Result<KeyValue> {
        match self.def.key_kind {
            KeyKind::IntId => {
                let n: i64 = row.get(idx).map_err(FtsError::index_library_error)?;
                Ok(KeyValue::IntId(n))
            }
            KeyKind::DbKey => {
                let n: i64 = row.get(idx).map_err(FtsError::index_library_error)?;
                Ok(KeyValue::DbKey(n.to_be_bytes().to_vec()))
            }
            KeyKind::Uuid => {
                let bytes: Vec<u8> = row.get(idx).map_err(FtsError::index_library_error)?;
                let arr: [u8; 16] = bytes
                    .try_into()
                    .map_err(|_| FtsError::malformed_key("uuid", &self.def.key_field))?;
                Ok(KeyValue::Uuid(arr))
            }
        }
    }
}

fn read_column_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<ColumnValue> {
    let value_ref = row.get_ref(idx).map_err(FtsError::index_library_error)?;
    Ok(match value_ref {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(i) => ColumnValue::Integer(i),
        ValueRef::Real(f) => ColumnValue::Float(f),
        ValueRef::Text(t) => {
            let s = String::from_utf8_lossy(t).into_owned();
            ColumnValue::Text(render::render_temporal(&s))
        }
        ValueRef::Blob(b) => {
            if b.len() > render::MAX_BLOB_TEXT_BYTES {
                ColumnValue::Text(stream_blob_text(b))
            } else {
                ColumnValue::Blob(b.to_vec())
            }
        }
    })
}

/// Renders an oversized BLOB/TEXT column (spec §4.5), decoding to UTF-8
/// once over the complete buffer rather than chunk-by-chunk: a chunk
/// boundary at an arbitrary byte count like [`render::BLOB_SEGMENT_BYTES`]
/// has no guarantee of landing on a char boundary, so decoding each chunk
/// separately would split any multi-byte character straddling one into
/// two replacement characters.
fn stream_blob_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn key_bind_value(key: &KeyValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match key {
        KeyValue::IntId(n) => Value::Integer(*n),
        KeyValue::DbKey(bytes) => {
            let arr: [u8; 8] = bytes.as_slice().try_into().unwrap_or([0; 8]);
            Value::Integer(i64::from_be_bytes(arr))
        }
        KeyValue::Uuid(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod test {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, body TEXT);
            INSERT INTO books (id, title, body) VALUES (1, 'The Raven', 'Once upon a midnight dreary');
            INSERT INTO books (id, title, body) VALUES (2, NULL, NULL);
            "#,
        )
        .unwrap();
        conn
    }

    fn def() -> IndexDefinition {
        IndexDefinition {
            name: "book_fts".to_string(),
            relation: "books".to_string(),
            key_field: "id".to_string(),
            key_kind: KeyKind::IntId,
            fields: vec![("title".to_string(), None), ("body".to_string(), Some(2.0))],
        }
    }

    #[test]
    fn extract_one_returns_matching_row() {
        let conn = setup();
        let def = def();
        let extractor = RecordExtractor::new(&def);
        let record = extractor
            .extract_one(&conn, &KeyValue::IntId(1))
            .unwrap()
            .unwrap();
        assert_eq!(record.key, KeyValue::IntId(1));
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.fields[0].1, "The Raven");
    }

    #[test]
    fn extract_one_missing_row_is_none() {
        let conn = setup();
        let def = def();
        let extractor = RecordExtractor::new(&def);
        assert!(extractor.extract_one(&conn, &KeyValue::IntId(99)).unwrap().is_none());
    }

    #[test]
    fn extract_all_skips_rows_with_every_field_null() {
        let conn = setup();
        let def = def();
        let extractor = RecordExtractor::new(&def);
        let records = extractor.extract_all(&conn).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, KeyValue::IntId(1));
    }
}
