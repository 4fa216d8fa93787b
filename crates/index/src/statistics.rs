//! Read-only statistics and term listing over an on-disk index (spec
//! §4.11). tantivy's on-disk layout differs from Lucene's native one, so
//! the file-extension table below maps tantivy's actual extensions onto
//! the Lucene-named categories spec.md enumerates; this is the one place
//! this crate's on-disk format necessarily diverges from Lucene's (see
//! DESIGN.md).

use std::fs;
use std::path::{Path, PathBuf};

use fts_catalog::IndexStatus;
use fts_errors::{FtsError, Result};
use tantivy::Index;

/// Lucene-named file categories from spec.md §4.11, populated from
/// tantivy's own on-disk extensions rather than Lucene's native ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchFileType {
    Segments,
    SegmentsGen,
    Deletable,
    Norms,
    Freq,
    Prox,
    Terms,
    TermsIndex,
    FieldsIndex,
    Fields,
    VectorsFields,
    VectorsDocuments,
    VectorsIndex,
    CompoundFile,
    CompoundFileStore,
    Deletes,
    FieldInfos,
    PlainNorms,
    SeparateNorms,
    /// A recognised tantivy file with no close Lucene analogue (e.g. the
    /// managed-files ledger); still counted towards total byte size.
    Other,
}

/// Classifies a file name by its tantivy-native extension. `meta.json` and
/// `.managed.json` are tantivy-specific metadata with no single Lucene
/// counterpart, so they fall into [`SearchFileType::Other`] rather than
/// being force-mapped onto an unrelated Lucene category.
pub fn classify_file(file_name: &str) -> SearchFileType {
    if file_name == "meta.json" {
        return SearchFileType::Segments;
    }
    if file_name == ".managed.json" {
        return SearchFileType::SegmentsGen;
    }
    match file_name.rsplit('.').next() {
        Some("store") => SearchFileType::Fields,
        Some("term") => SearchFileType::Terms,
        Some("idx") => SearchFileType::TermsIndex,
        Some("pos") => SearchFileType::Prox,
        Some("fieldnorm") => SearchFileType::Norms,
        Some("fast") => SearchFileType::VectorsFields,
        Some("del") => SearchFileType::Deletes,
        _ => SearchFileType::Other,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStatistics {
    pub segment_name: String,
    pub document_count: u64,
    pub byte_size: u64,
    pub is_compound_file: bool,
    pub deletion_count: u64,
    pub deletion_file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStatistics {
    pub analyzer: String,
    pub status: IndexStatus,
    pub directory: PathBuf,
    pub exists: bool,
    pub optimized: bool,
    pub has_deletions: bool,
    pub document_count: u64,
    pub deleted_document_count: u64,
    pub field_count: usize,
    pub total_byte_size: u64,
    pub segments: Vec<SegmentStatistics>,
}

/// `(field, term, doc_freq)`, matching spec §4.11's `INDEX_TERMS` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermStatistic {
    pub field: String,
    pub term: String,
    pub doc_freq: u64,
}

/// Reads statistics for an index whose catalog row is `analyzer`/`status`
/// and whose on-disk directory is `directory`. Returns an "empty" snapshot
/// (zeroed counts, `exists = false`) when the directory does not exist,
/// rather than failing -- a dropped or not-yet-built index is a normal
/// state to introspect.
pub fn statistics(analyzer: &str, status: IndexStatus, directory: &Path) -> Result<IndexStatistics> {
    if !directory.exists() {
        return Ok(IndexStatistics {
            analyzer: analyzer.to_string(),
            status,
            directory: directory.to_path_buf(),
            exists: false,
            optimized: false,
            has_deletions: false,
            document_count: 0,
            deleted_document_count: 0,
            field_count: 0,
            total_byte_size: 0,
            segments: Vec::new(),
        });
    }

    let index = Index::open_in_dir(directory).map_err(FtsError::index_library_error)?;
    let searchable_segments = index
        .searchable_segment_metas()
        .map_err(FtsError::index_library_error)?;

    let mut segments = Vec::with_capacity(searchable_segments.len());
    let mut document_count = 0u64;
    let mut deleted_document_count = 0u64;
    for meta in &searchable_segments {
        let docs = meta.num_docs() as u64;
        let deletions = meta.num_deleted_docs() as u64;
        document_count += docs;
        deleted_document_count += deletions;
        segments.push(SegmentStatistics {
            segment_name: meta.id().uuid_string(),
            document_count: docs,
            byte_size: segment_byte_size(directory, meta),
            is_compound_file: true,
            deletion_count: deletions,
            deletion_file_name: if deletions > 0 {
                Some(format!("{}.del", meta.id().uuid_string()))
            } else {
                None
            },
        });
    }

    let total_byte_size = directory_byte_size(directory)?;

    Ok(IndexStatistics {
        analyzer: analyzer.to_string(),
        status,
        directory: directory.to_path_buf(),
        exists: true,
        optimized: searchable_segments.len() <= 1,
        has_deletions: deleted_document_count > 0,
        document_count,
        deleted_document_count,
        field_count: index.schema().fields().count(),
        total_byte_size,
        segments,
    })
}

fn segment_byte_size(directory: &Path, meta: &tantivy::SegmentMeta) -> u64 {
    let prefix = meta.id().uuid_string();
    fs::read_dir(directory)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn directory_byte_size(directory: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in fs::read_dir(directory).map_err(FtsError::index_library_error)? {
        let entry = entry.map_err(FtsError::index_library_error)?;
        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}

/// Lists `(field, term, doc_freq)` across every searchable segment (spec
/// §4.11's `INDEX_TERMS`).
pub fn index_terms(directory: &Path) -> Result<Vec<TermStatistic>> {
    let index = Index::open_in_dir(directory).map_err(FtsError::index_library_error)?;
    let reader = index.reader().map_err(FtsError::index_library_error)?;
    let searcher = reader.searcher();
    let schema = index.schema();

    let mut out = Vec::new();
    for (field, entry) in schema.fields() {
        if !entry.is_indexed() {
            continue;
        }
        for segment_reader in searcher.segment_readers() {
            let inverted = segment_reader
                .inverted_index(field)
                .map_err(FtsError::index_library_error)?;
            let mut stream = inverted
                .terms()
                .stream()
                .map_err(FtsError::index_library_error)?;
            while let Some((term_bytes, term_info)) = stream.next() {
                out.push(TermStatistic {
                    field: entry.name().to_string(),
                    term: String::from_utf8_lossy(term_bytes).into_owned(),
                    doc_freq: term_info.doc_freq as u64,
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_file_maps_known_extensions() {
        assert_eq!(classify_file("000000000000000000000000000001.store"), SearchFileType::Fields);
        assert_eq!(classify_file("000000000000000000000000000001.term"), SearchFileType::Terms);
        assert_eq!(classify_file("meta.json"), SearchFileType::Segments);
        assert_eq!(classify_file(".managed.json"), SearchFileType::SegmentsGen);
    }

    #[test]
    fn classify_file_falls_back_to_other() {
        assert_eq!(classify_file("something.unknownext"), SearchFileType::Other);
    }

    #[test]
    fn statistics_on_missing_directory_reports_not_exists() {
        let stats = statistics("english", IndexStatus::New, Path::new("/nonexistent/path")).unwrap();
        assert!(!stats.exists);
        assert_eq!(stats.document_count, 0);
    }
}
