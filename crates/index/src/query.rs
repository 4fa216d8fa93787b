//! Query executor (spec §4.8): parses a query against an index's analyzed
//! fields, searches, and decodes hits back to key values.

use std::path::Path;

use fts_catalog::relation::RelationCatalog;
use fts_catalog::{analyzer, CatalogRepository, IndexStatus, KeyValue};
use fts_errors::{FtsError, Result};
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser};
use tantivy::schema::Field;
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{Index, TantivyDocument};

use fts_catalog::key_codec;

/// The 8 191 UTF-8 octet bound shared by term length, fragment size, and
/// fragment length checks throughout the core (spec §4.8/§4.9).
pub const MAX_TERM_LEN_OCTETS: usize = 8191;

/// One search hit: the decoded key (exactly one of the three shapes is
/// populated, matching the index's key kind), its score, and an optional
/// explanation string when `explain` was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub relation_name: String,
    pub key_field_name: String,
    pub db_key: Option<Vec<u8>>,
    pub uuid: Option<[u8; 16]>,
    pub id: Option<i64>,
    pub score: f32,
    pub explanation: Option<String>,
}

impl SearchHit {
    fn from_key(relation_name: String, key_field_name: String, key: KeyValue, score: f32, explanation: Option<String>) -> Self {
        let mut hit = Self {
            relation_name,
            key_field_name,
            db_key: None,
            uuid: None,
            id: None,
            score,
            explanation,
        };
        match key {
            KeyValue::DbKey(bytes) => hit.db_key = Some(bytes),
            KeyValue::Uuid(bytes) => hit.uuid = Some(bytes),
            KeyValue::IntId(n) => hit.id = Some(n),
        }
        hit
    }
}

/// Runs a query against the on-disk directory for one index. Reopens the
/// `Index` for every call, matching the teacher's `index_reader_for_directory`
/// pattern of opening fresh rather than caching readers across calls.
pub struct QueryExecutor<'a> {
    repo: &'a CatalogRepository,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(repo: &'a CatalogRepository) -> Self {
        Self { repo }
    }

    /// Step 1-5 of spec §4.8.
    pub fn search(
        &self,
        index_name: &str,
        query_text: &str,
        index_dir: &Path,
        relation_catalog: &dyn RelationCatalog,
        limit: usize,
        explain: bool,
    ) -> Result<Vec<SearchHit>> {
        let mut index_row = self
            .repo
            .get_index(index_name)?
            .ok_or_else(|| FtsError::no_such_index(index_name))?;
        if index_row.status == IndexStatus::New || !index_dir.exists() {
            return Err(FtsError::index_not_built(index_name));
        }
        self.repo.fill_segments(&mut index_row)?;
        let key_segment = index_row
            .key_segment()
            .ok_or_else(|| FtsError::index_not_built(index_name))?;
        let key_field_name = key_segment.field_name.clone();
        let key_kind = relation_catalog
            .column_info(&index_row.relation_name, &key_field_name)?
            .key_kind()
            .ok_or_else(|| FtsError::unsupported_key_type(&index_row.relation_name, &key_field_name))?;

        let text_analyzer = analyzer::create_analyzer(self.repo, &index_row.analyzer)?;
        let field_segments = index_row.field_segments();

        let disk_index = Index::open_in_dir(index_dir).map_err(FtsError::index_library_error)?;
        disk_index.tokenizers().register(index_name, text_analyzer);

        let schema = disk_index.schema();
        let key_field = schema
            .get_field(&key_field_name)
            .map_err(FtsError::index_library_error)?;

        let query = build_query(&disk_index, index_name, &field_segments, query_text)?;

        let reader = disk_index.reader().map_err(FtsError::index_library_error)?;
        let searcher = reader.searcher();
        let top_docs = tantivy::collector::TopDocs::with_limit(limit);
        let results = searcher
            .search(&query, &top_docs)
            .map_err(FtsError::index_library_error)?;

        let mut hits = Vec::with_capacity(results.len());
        for (score, doc_address) in results {
            let retrieved: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(FtsError::index_library_error)?;
            let encoded_key = retrieved_key_text(&retrieved, key_field)?;
            let decoded = key_codec::decode(key_kind, &encoded_key)?;
            let explanation = if explain {
                Some(query.explain(&searcher, doc_address).map_err(FtsError::index_library_error)?.to_pretty_json())
            } else {
                None
            };
            hits.push(SearchHit::from_key(
                index_row.relation_name.clone(),
                key_field_name.clone(),
                decoded,
                score,
                explanation,
            ));
        }
        Ok(hits)
    }
}

fn build_query(
    index: &Index,
    tokenizer_name: &str,
    field_segments: &[&fts_catalog::IndexSegment],
    query_text: &str,
) -> Result<Box<dyn Query>> {
    let schema = index.schema();
    let fields: Vec<Field> = field_segments
        .iter()
        .filter_map(|s| schema.get_field(&s.field_name).ok())
        .collect();
    if fields.is_empty() {
        return Err(FtsError::index_not_built(tokenizer_name));
    }

    if fields.len() == 1 {
        let mut parser = QueryParser::for_index(index, fields);
        return parser
            .parse_query(query_text)
            .map(|q| q as Box<dyn Query>)
            .map_err(FtsError::index_library_error);
    }

    let mut parser = QueryParser::for_index(index, fields.clone());
    parser.set_conjunction_by_default();
    let boosted: Vec<(Occur, Box<dyn Query>)> = fields
        .iter()
        .filter_map(|field| {
            let name = schema.get_field_name(*field);
            let boost = field_segments
                .iter()
                .find(|s| s.field_name == name)
                .and_then(|s| s.boost);
            let mut single = QueryParser::for_index(index, vec![*field]);
            single.parse_query(query_text).ok().map(|q| {
                let q: Box<dyn Query> = match boost {
                    Some(b) => Box::new(tantivy::query::BoostQuery::new(q, b as f32)),
                    None => q,
                };
                (Occur::Should, q)
            })
        })
        .collect();
    Ok(Box::new(BooleanQuery::new(boosted)))
}

fn retrieved_key_text(document: &TantivyDocument, key_field: Field) -> Result<String> {
    document
        .get_first(key_field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| FtsError::index_library_error("document missing key field"))
}

/// Prefixes every Lucene special character with a backslash (spec §4.8).
pub fn escape_query(text: &str) -> String {
    const SPECIALS: &[char] = &[
        '+', '-', '!', '^', '"', '~', '*', '?', ':', '\\', '&', '|', '(', ')', '[', ']', '{', '}',
    ];
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Runs `analyzer_name`'s tokenizer over `text` and returns the resulting
/// terms. Each term must fit within [`MAX_TERM_LEN_OCTETS`] UTF-8 octets
/// (spec §4.8).
pub fn analyze(text: &str, mut built_analyzer: TextAnalyzer) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    let mut stream = built_analyzer.token_stream(text);
    while let Some(token) = tantivy::tokenizer::TokenStream::next(&mut stream) {
        if token.text.len() > MAX_TERM_LEN_OCTETS {
            return Err(FtsError::term_too_long(token.text.len()));
        }
        terms.push(token.text.clone());
    }
    Ok(terms)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escape_query_prefixes_every_special() {
        assert_eq!(escape_query("a+b (c:d)"), "a\\+b \\(c\\:d\\)");
    }

    #[test]
    fn escape_query_is_a_no_op_on_plain_text() {
        assert_eq!(escape_query("hello world"), "hello world");
    }

    #[test]
    fn analyze_splits_and_lowercases_with_simple_analyzer() {
        let built = fts_catalog::analyzer::create_analyzer(
            &CatalogRepository::open(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
            "simple",
        )
        .unwrap();
        let terms = analyze("Hello World", built).unwrap();
        assert_eq!(terms, vec!["hello", "world"]);
    }

    #[test]
    fn analyze_rejects_overly_long_term() {
        let built = fts_catalog::analyzer::create_analyzer(
            &CatalogRepository::open(rusqlite::Connection::open_in_memory().unwrap()).unwrap(),
            "keyword",
        )
        .unwrap();
        let long = "a".repeat(MAX_TERM_LEN_OCTETS + 1);
        let err = analyze(&long, built).unwrap_err();
        assert_eq!(err.short_msg(), "TermTooLong");
    }
}
