//! Index writer lifecycle (spec §4.6): open/commit/optimize/close per-index
//! tantivy directories, plus full rebuild. Grounded on the teacher's
//! `disk_index.rs` (`Index::open_in_dir`/`create_in_dir`, tokenizer
//! registration under the index's own name, a fixed writer memory arena).

use std::collections::HashMap;
use std::path::Path;

use fts_catalog::{CatalogRepository, IndexStatus, KeyValue};
use fts_errors::{FtsError, Result};
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{doc, Index, IndexWriter, Term};

use crate::extractor::{ExtractedRecord, IndexDefinition, RecordExtractor};
use fts_catalog::key_codec;

/// tantivy's own recommendation; matches the teacher's
/// `SEARCH_INDEXING_MEMORY_ARENA_BYTES` default order of magnitude.
const WRITER_MEMORY_ARENA_BYTES: usize = 50_000_000;

fn build_schema(def: &IndexDefinition) -> (Schema, Field, HashMap<String, Field>) {
    let mut builder = Schema::builder();
    let key_field = builder.add_text_field(&def.key_field, STRING | STORED);

    let mut text_fields = HashMap::new();
    for (name, _boost) in &def.fields {
        let indexing = TextFieldIndexing::default()
            .set_tokenizer(&def.name)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let options = TextOptions::default().set_indexing_options(indexing);
        text_fields.insert(name.clone(), builder.add_text_field(name, options));
    }
    (builder.build(), key_field, text_fields)
}

/// Owns one open tantivy `IndexWriter` for the duration of a rebuild or an
/// applier run. Exactly one session may be open per index directory at a
/// time (spec §3 "Ownership"; spec §5 exclusive-writer lock).
pub struct IndexWriterSession {
    index: Index,
    writer: IndexWriter,
    key_field: Field,
    text_fields: HashMap<String, Field>,
}

impl IndexWriterSession {
    fn open_common(
        index: Index,
        def: &IndexDefinition,
        analyzer: TextAnalyzer,
        key_field: Field,
        text_fields: HashMap<String, Field>,
    ) -> Result<Self> {
        index.tokenizers().register(&def.name, analyzer);
        let writer = index
            .writer(WRITER_MEMORY_ARENA_BYTES)
            .map_err(writer_open_error)?;
        Ok(Self {
            index,
            writer,
            key_field,
            text_fields,
        })
    }

    pub fn create(dir: &Path, def: &IndexDefinition, analyzer: TextAnalyzer) -> Result<Self> {
        let (schema, key_field, text_fields) = build_schema(def);
        let index = Index::create_in_dir(dir, schema).map_err(writer_open_error)?;
        Self::open_common(index, def, analyzer, key_field, text_fields)
    }

    pub fn open(dir: &Path, def: &IndexDefinition, analyzer: TextAnalyzer) -> Result<Self> {
        let index = Index::open_in_dir(dir).map_err(writer_open_error)?;
        let (_, key_field, text_fields) = build_schema(def);
        Self::open_common(index, def, analyzer, key_field, text_fields)
    }

    fn key_term(&self, key: &KeyValue) -> Term {
        Term::from_field_text(self.key_field, &key_codec::encode(key))
    }

    fn build_document(&self, record: &ExtractedRecord) -> tantivy::TantivyDocument {
        let mut document = doc!(self.key_field => key_codec::encode(&record.key));
        for (name, text, _boost) in &record.fields {
            if let Some(field) = self.text_fields.get(name) {
                document.add_text(*field, text);
            }
        }
        document
    }

    /// Change-type I: add a document built from `record` when at least one
    /// non-key field is non-empty.
    pub fn add(&mut self, record: &ExtractedRecord) -> Result<()> {
        if record.fields.is_empty() {
            return Ok(());
        }
        let document = self.build_document(record);
        self.writer
            .add_document(document)
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    /// Change-type U: replace the document for `record.key`, or delete it
    /// if every non-key field is now empty.
    pub fn update(&mut self, record: &ExtractedRecord) -> Result<()> {
        let term = self.key_term(&record.key);
        self.writer.delete_term(term);
        if !record.fields.is_empty() {
            let document = self.build_document(record);
            self.writer
                .add_document(document)
                .map_err(FtsError::index_library_error)?;
        }
        Ok(())
    }

    /// Change-type D, and the "idempotent D" case for a missing row.
    pub fn delete(&mut self, key: &KeyValue) {
        let term = self.key_term(key);
        self.writer.delete_term(term);
    }

    /// `delete_all` for a full rebuild (spec §4.6).
    pub fn delete_all(&mut self) -> Result<()> {
        self.writer
            .delete_all_documents()
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }

    /// `optimize` + `commit` + `close`: commits pending segments and waits
    /// for tantivy's background merge policy to finish folding them down,
    /// approximating the original's explicit force-merge step.
    pub fn finish(mut self) -> Result<()> {
        self.writer.commit().map_err(FtsError::index_library_error)?;
        self.writer
            .wait_merging_threads()
            .map_err(FtsError::index_library_error)?;
        Ok(())
    }
}

fn writer_open_error(e: tantivy::TantivyError) -> FtsError {
    match &e {
        tantivy::TantivyError::LockFailure(_, _) => FtsError::index_busy("<index>"),
        _ => FtsError::index_library_error(e),
    }
}

/// Opens a writer for `index_dir`, applying the missing-directory
/// demotion rule from spec §4.6 step 1. Returns `None` when the index was
/// demoted to `NeedsRebuild` and should be skipped for this run.
pub fn resolve_writer(
    index_dir: &Path,
    def: &IndexDefinition,
    analyzer: TextAnalyzer,
    status: IndexStatus,
    repo: &CatalogRepository,
) -> Result<Option<IndexWriterSession>> {
    if !index_dir.exists() {
        if status == IndexStatus::Complete {
            repo.set_status(&def.name, IndexStatus::NeedsRebuild)?;
            return Ok(None);
        }
        std::fs::create_dir_all(index_dir).map_err(FtsError::index_library_error)?;
        return Ok(Some(IndexWriterSession::create(index_dir, def, analyzer)?));
    }
    Ok(Some(IndexWriterSession::open(index_dir, def, analyzer)?))
}

/// Full rebuild: `delete_all` + commit, full scan via the extractor, add
/// each document, `optimize` + `commit` + `close`; status flips to
/// `Complete` on success, stays `NeedsRebuild` on failure (spec §4.6).
pub fn rebuild_index(
    index_dir: &Path,
    def: &IndexDefinition,
    analyzer: TextAnalyzer,
    conn: &rusqlite::Connection,
    repo: &CatalogRepository,
) -> Result<()> {
    let result = (|| -> Result<()> {
        if !index_dir.exists() {
            std::fs::create_dir_all(index_dir).map_err(FtsError::index_library_error)?;
        }
        let mut session = IndexWriterSession::create(index_dir, def, analyzer)?;
        session.delete_all()?;
        let extractor = RecordExtractor::new(def);
        for record in extractor.extract_all(conn)? {
            session.add(&record)?;
        }
        session.finish()
    })();

    match result {
        Ok(()) => {
            repo.set_status(&def.name, IndexStatus::Complete)?;
            Ok(())
        }
        Err(e) => {
            repo.set_status(&def.name, IndexStatus::NeedsRebuild)?;
            Err(e)
        }
    }
}
