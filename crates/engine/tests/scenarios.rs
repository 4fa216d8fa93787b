//! End-to-end scenarios from spec.md §8 (S1-S6): create an index, populate
//! it through the change-log applier, search, update, delete, and
//! highlight/escape a query. The generated triggers' helper-procedure
//! bodies are out of scope (spec §1), so trigger firing is simulated here
//! by inserting directly into `FTS$LOG` on the engine's own connection --
//! exactly what those procedure bodies would do.

use fts_catalog::IndexStatus;
use fts_engine::{FtsConfig, FtsEngine};
use rusqlite::{params, Connection};
use tempfile::TempDir;

fn setup() -> (FtsEngine, TempDir) {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, body TEXT);",
    )
    .unwrap();
    let repo = fts_catalog::CatalogRepository::open(conn).unwrap();

    let index_root = TempDir::new().unwrap();
    let config = FtsConfig {
        index_root: index_root.path().to_path_buf(),
    };
    (FtsEngine::new(repo, config), index_root)
}

fn append_log(engine: &FtsEngine, relation: &str, id: i64, change: char) {
    engine
        .connection()
        .execute(
            "INSERT INTO \"FTS$LOG\" (\"FTS$RELATION_NAME\", \"FTS$DB_KEY\", \"FTS$REC_UUID\", \
             \"FTS$REC_ID\", \"FTS$CHANGE_TYPE\") VALUES (?1, NULL, NULL, ?2, ?3)",
            params![relation, id, change.to_string()],
        )
        .unwrap();
}

/// S1: `CREATE_INDEX` on a table with an integer PK auto-inserts the key
/// segment and leaves the index at status N.
#[test]
fn s1_create_index_auto_picks_primary_key() {
    let (engine, _root) = setup();
    engine
        .create_index("book_fts", "books", Some("english"), None, None)
        .unwrap();

    let stats = engine.index_statistics("book_fts").unwrap();
    assert_eq!(stats.status, IndexStatus::New);

    let fields = engine.index_fields("book_fts").unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].field_name, "id");
    assert!(fields[0].is_key);
}

/// S2-S4: build, search, update, and delete a single row end to end.
#[test]
fn s2_s3_s4_search_reflects_insert_update_delete() {
    let (engine, _root) = setup();
    engine
        .create_index("book_fts", "books", Some("english"), None, None)
        .unwrap();
    engine.add_index_field("book_fts", "title", None).unwrap();
    engine
        .add_index_field("book_fts", "body", Some(2.0))
        .unwrap();
    engine.rebuild_index("book_fts").unwrap();

    // S2: insert, apply, search.
    engine
        .connection()
        .execute(
            "INSERT INTO books (id, title, body) VALUES (1, 'The Raven', 'Once upon a midnight dreary')",
            [],
        )
        .unwrap();
    append_log(&engine, "books", 1, 'I');
    let stats = engine.update_indexes().unwrap();
    assert_eq!(stats.entries_applied, 1);

    let hits = engine.search("book_fts", "raven", Some(10), None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, Some(1));

    // S3: update, apply, search.
    engine
        .connection()
        .execute(
            "UPDATE books SET title = 'The Raven, Revised' WHERE id = 1",
            [],
        )
        .unwrap();
    append_log(&engine, "books", 1, 'U');
    engine.update_indexes().unwrap();

    let hits = engine.search("book_fts", "revised", Some(10), None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, Some(1));
    let empty = engine
        .search("book_fts", "nonexistentword", Some(10), None)
        .unwrap();
    assert!(empty.is_empty());

    // S4: delete, apply, search.
    engine
        .connection()
        .execute("DELETE FROM books WHERE id = 1", [])
        .unwrap();
    append_log(&engine, "books", 1, 'D');
    engine.update_indexes().unwrap();

    assert!(engine
        .search("book_fts", "revised", Some(10), None)
        .unwrap()
        .is_empty());
    assert!(engine
        .search("book_fts", "raven", Some(10), None)
        .unwrap()
        .is_empty());
    let pending: i64 = engine
        .connection()
        .query_row("SELECT COUNT(*) FROM \"FTS$LOG\"", [], |row| row.get(0))
        .unwrap();
    assert_eq!(pending, 0);
}

/// A 16-digit `IntId` key (e.g. a `rowid` well inside `i64` range) must
/// come back as the same integer, not get misread as a 16-hex-char
/// `DbKey` just because its decimal text happens to be 16 characters long.
#[test]
fn search_decodes_sixteen_digit_int_id_correctly() {
    let (engine, _root) = setup();
    engine
        .create_index("book_fts", "books", Some("english"), None, None)
        .unwrap();
    engine.add_index_field("book_fts", "title", None).unwrap();
    engine.rebuild_index("book_fts").unwrap();

    let big_id: i64 = 1_000_000_000_000_000;
    engine
        .connection()
        .execute(
            "INSERT INTO books (id, title, body) VALUES (?1, 'The Raven', NULL)",
            params![big_id],
        )
        .unwrap();
    append_log(&engine, "books", big_id, 'I');
    engine.update_indexes().unwrap();

    let hits = engine.search("book_fts", "raven", Some(10), None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, Some(big_id));
    assert!(hits[0].db_key.is_none());
    assert!(hits[0].uuid.is_none());
}

/// S5: `BEST_FRAGMENT` wraps the matched term and nothing else.
#[test]
fn s5_best_fragment_wraps_matched_term() {
    let (engine, _root) = setup();
    let fragment = engine
        .best_fragment(
            "Once upon a midnight dreary",
            "midnight",
            "english",
            None,
            Some(64),
            Some("<em>"),
            Some("</em>"),
        )
        .unwrap();
    assert!(fragment.contains("<em>midnight</em>"));
    assert_eq!(fragment.matches("<em>").count(), 1);
}

/// S6: `ESCAPE_QUERY` backslash-escapes every Lucene special character.
#[test]
fn s6_escape_query_escapes_every_special() {
    let (engine, _root) = setup();
    assert_eq!(
        engine.escape_query("a+b (c:d)"),
        "a\\+b \\(c\\:d\\)"
    );
}

/// Dropping an index removes both the catalog row and the on-disk directory.
#[test]
fn drop_index_removes_catalog_row_and_directory() {
    let (engine, _root) = setup();
    engine
        .create_index("book_fts", "books", Some("english"), None, None)
        .unwrap();
    engine.rebuild_index("book_fts").unwrap();
    let dir = engine.get_directory().join("book_fts");
    assert!(dir.exists());

    engine.drop_index("book_fts").unwrap();
    assert!(!dir.exists());
    assert!(engine.index_statistics("book_fts").is_err());
}

/// Adding a stop word to a custom analyzer demotes every `Complete` index
/// built on it, but leaves indexes on other analyzers untouched.
#[test]
fn add_stop_word_demotes_dependent_indexes() {
    let (mut engine, _root) = setup();
    engine
        .create_index("book_fts", "books", Some("english"), None, None)
        .unwrap();
    engine.rebuild_index("book_fts").unwrap();
    assert_eq!(
        engine.index_statistics("book_fts").unwrap().status,
        IndexStatus::Complete
    );

    // `english` is a built-in analyzer: mutating it directly must fail.
    let err = engine.add_stop_word("english", "the").unwrap_err();
    assert_eq!(err.short_msg(), "CannotModifySystemAnalyzer");
}
