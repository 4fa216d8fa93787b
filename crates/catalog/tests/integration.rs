//! End-to-end catalog tests against a real sqlite connection: repository
//! CRUD, relation introspection, and trigger generation wired together the
//! way `fts_engine` wires them, without going through that crate.

use fts_catalog::{
    CatalogRepository, IndexStatus, KeyKind, RelationCatalog, SqliteRelationCatalog, TriggerNames,
};
use rusqlite::Connection;

fn books_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, body TEXT);",
    )
    .unwrap();
    conn
}

#[test]
fn relation_catalog_classifies_integer_primary_key() {
    let conn = books_connection();
    let relation_catalog = SqliteRelationCatalog::new(&conn);
    assert!(relation_catalog.table_exists("books").unwrap());
    assert!(!relation_catalog.table_exists("missing").unwrap());

    let pk = relation_catalog.primary_key_columns("books").unwrap();
    assert_eq!(pk, vec!["id".to_string()]);

    let info = relation_catalog.column_info("books", "id").unwrap();
    assert_eq!(info.key_kind(), Some(KeyKind::IntId));

    let info = relation_catalog.column_info("books", "title").unwrap();
    assert_eq!(info.key_kind(), None);
}

#[test]
fn create_index_add_field_then_generate_trigger() {
    let conn = books_connection();
    let repo = CatalogRepository::open(conn).unwrap();
    let relation_catalog = SqliteRelationCatalog::new(repo.connection());

    repo.create_index("book_fts", "books", "english", None)
        .unwrap();
    repo.add_index_field("book_fts", "id", true, None).unwrap();
    repo.add_index_field("book_fts", "title", false, Some(2.0))
        .unwrap();
    repo.set_status("book_fts", IndexStatus::Complete).unwrap();

    let triggers = fts_catalog::trigger::generate_all(
        "books",
        &repo,
        &relation_catalog,
        &TriggerNames::default(),
        true,
        100,
    )
    .unwrap();

    assert_eq!(triggers.len(), 1);
    assert!(triggers[0].header.contains("\"id\""));
    assert!(triggers[0].script.contains("FTS$LOG_ID"));
    assert!(triggers[0].script.contains("CREATE TRIGGER"));
}

#[test]
fn inactive_index_is_excluded_from_trigger_generation() {
    let conn = books_connection();
    let repo = CatalogRepository::open(conn).unwrap();
    let relation_catalog = SqliteRelationCatalog::new(repo.connection());

    repo.create_index("book_fts", "books", "english", None)
        .unwrap();
    repo.add_index_field("book_fts", "id", true, None).unwrap();
    repo.set_status("book_fts", IndexStatus::Inactive).unwrap();

    let triggers = fts_catalog::trigger::generate_all(
        "books",
        &repo,
        &relation_catalog,
        &TriggerNames::default(),
        true,
        100,
    )
    .unwrap();
    assert!(triggers.is_empty());
}
