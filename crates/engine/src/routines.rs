//! The routine surface (spec §4.12/§6): one method per routine row, bound
//! to a single `FtsEngine` facade. Defaults (`limit=1000`, `explain=false`,
//! `size=512`, tag defaults, `max_fragments=10`, `multi_action=true`,
//! `position=100`) are Rust `Option` parameters resolved inside the
//! method, so the (out of scope) binding layer can forward `None` for an
//! omitted SQL argument rather than knowing the default itself.

use std::path::PathBuf;

use fts_catalog::model::IndexStatus;
use fts_catalog::relation::{RelationCatalog, SqliteRelationCatalog, DB_KEY_PSEUDO_COLUMN};
use fts_catalog::{analyzer, CatalogRepository, GeneratedTrigger, Index, IndexSegment, TriggerNames};
use fts_errors::{FtsError, Result};
use fts_index::extractor::IndexDefinition;
use fts_index::query::SearchHit;
use fts_index::statistics::{IndexStatistics, TermStatistic};
use fts_index::{writer, ApplyStats, ChangeLogApplier, QueryExecutor};

use crate::config::FtsConfig;

const DEFAULT_SEARCH_LIMIT: usize = 1000;
const DEFAULT_FRAGMENT_SIZE: usize = 512;
const DEFAULT_MAX_FRAGMENTS: usize = 10;
const DEFAULT_LEFT_TAG: &str = "<b>";
const DEFAULT_RIGHT_TAG: &str = "</b>";
const DEFAULT_MULTI_ACTION: bool = true;
const DEFAULT_TRIGGER_POSITION: i64 = 100;

/// Binds the catalog, the index-maintenance engine, and config resolution
/// together behind the routine surface. Owns the single `CatalogRepository`
/// connection this deployment uses for both catalog tables and (via
/// [`CatalogRepository::connection`]) the stand-in host relation tables.
pub struct FtsEngine {
    repo: CatalogRepository,
    config: FtsConfig,
}

impl FtsEngine {
    pub fn new(repo: CatalogRepository, config: FtsConfig) -> Self {
        Self { repo, config }
    }

    fn relation_catalog(&self) -> SqliteRelationCatalog<'_> {
        SqliteRelationCatalog::new(self.repo.connection())
    }

    /// The underlying connection, for the (out of scope) binding layer to
    /// run the host relation DML that the generated triggers react to,
    /// against the same database this engine's catalog tables live in.
    pub fn connection(&self) -> &rusqlite::Connection {
        self.repo.connection()
    }

    fn index_dir(&self, index_name: &str) -> PathBuf {
        self.config.index_dir_for(index_name)
    }

    fn require_index(&self, name: &str) -> Result<Index> {
        let mut index = self
            .repo
            .get_index(name)?
            .ok_or_else(|| FtsError::no_such_index(name))?;
        self.repo.fill_segments(&mut index)?;
        Ok(index)
    }

    fn definition_for(&self, index: &Index) -> Result<IndexDefinition> {
        IndexDefinition::from_index(index, &self.relation_catalog())
    }

    /// `CREATE_INDEX(name, relation, analyzer?, key_field?, description?)`.
    /// Auto-picks the relation's primary key, or `RDB$DB_KEY` when it has
    /// none or a composite one, when `key_field` is omitted.
    pub fn create_index(
        &self,
        name: &str,
        relation: &str,
        analyzer_name: Option<&str>,
        key_field: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        if self.repo.has_index(name)? {
            return Err(FtsError::index_already_exists(name));
        }
        let relation_catalog = self.relation_catalog();
        if !relation_catalog.table_exists(relation)? {
            return Err(FtsError::no_such_relation(relation));
        }

        let analyzer_name = analyzer_name.unwrap_or("standard");
        if !analyzer::is_builtin(analyzer_name) && self.repo.get_analyzer(analyzer_name)?.is_none() {
            return Err(FtsError::no_such_analyzer(analyzer_name));
        }

        let key_field = match key_field {
            Some(field) => field.to_string(),
            None => {
                let pk = relation_catalog.primary_key_columns(relation)?;
                match pk.len() {
                    1 => pk.into_iter().next().unwrap(),
                    0 => DB_KEY_PSEUDO_COLUMN.to_string(),
                    _ => return Err(FtsError::composite_pk_requires_explicit_key(relation)),
                }
            },
        };
        let key_info = relation_catalog.column_info(relation, &key_field)?;
        if key_info.key_kind().is_none() {
            return Err(FtsError::unsupported_key_type(relation, &key_field));
        }

        self.repo.create_index(name, relation, analyzer_name, description)?;
        self.repo.add_index_field(name, &key_field, true, None)?;
        // A freshly created index has no rebuild work pending; the key
        // segment insert above flips status to U via the generic
        // add_index_field cascade, but a brand-new index should read N.
        self.repo.set_status(name, IndexStatus::New)?;
        Ok(())
    }

    /// `DROP_INDEX(name)`: deletes catalog rows and the on-disk directory.
    pub fn drop_index(&self, name: &str) -> Result<()> {
        if !self.repo.has_index(name)? {
            return Err(FtsError::no_such_index(name));
        }
        let dir = self.index_dir(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(FtsError::index_library_error)?;
        }
        self.repo.drop_index(name)
    }

    /// `SET_INDEX_ACTIVE(name, bool)`: transitions I<->U.
    pub fn set_index_active(&self, name: &str, active: bool) -> Result<()> {
        let index = self.require_index(name)?;
        let next = match (index.status, active) {
            (IndexStatus::Inactive, true) => IndexStatus::NeedsRebuild,
            (status, false) if status.is_active() => IndexStatus::Inactive,
            (status, _) => status,
        };
        self.repo.set_status(name, next)
    }

    pub fn add_index_field(&self, name: &str, field: &str, boost: Option<f64>) -> Result<()> {
        self.ensure_field_exists(name, field)?;
        self.repo.add_index_field(name, field, false, boost)
    }

    pub fn drop_index_field(&self, name: &str, field: &str) -> Result<()> {
        let index = self.require_index(name)?;
        if !self.repo.has_index_field(name, field)? {
            return Err(FtsError::no_such_field(&index.relation_name, field));
        }
        self.repo.drop_index_field(name, field)
    }

    pub fn set_index_field_boost(&self, name: &str, field: &str, boost: f64) -> Result<()> {
        let index = self.require_index(name)?;
        if !self.repo.has_index_field(name, field)? {
            return Err(FtsError::no_such_field(&index.relation_name, field));
        }
        self.repo.set_field_boost(name, field, boost)
    }

    fn ensure_field_exists(&self, index_name: &str, field: &str) -> Result<()> {
        let index = self.require_index(index_name)?;
        self.relation_catalog()
            .column_info(&index.relation_name, field)?;
        Ok(())
    }

    /// `REBUILD_INDEX(name)`.
    pub fn rebuild_index(&self, name: &str) -> Result<()> {
        let index = self.require_index(name)?;
        let def = self.definition_for(&index)?;
        let built = analyzer::create_analyzer(&self.repo, &index.analyzer)?;
        writer::rebuild_index(&self.index_dir(name), &def, built, self.repo.connection(), &self.repo)
    }

    /// `OPTIMIZE_INDEX(name)`: opens the existing directory and lets the
    /// writer-close path fold segments down, without re-extracting rows.
    pub fn optimize_index(&self, name: &str) -> Result<()> {
        let index = self.require_index(name)?;
        let def = self.definition_for(&index)?;
        let built = analyzer::create_analyzer(&self.repo, &index.analyzer)?;
        let dir = self.index_dir(name);
        if !dir.exists() {
            return Err(FtsError::index_not_built(name));
        }
        let session = writer::IndexWriterSession::open(&dir, &def, built)?;
        session.finish()
    }

    /// `UPDATE_INDEXES()`: runs the applier to completion.
    pub fn update_indexes(&self) -> Result<ApplyStats> {
        let relation_catalog = SqliteRelationCatalog::new(self.repo.connection());
        let dir_resolver = |name: &str| self.config.index_dir_for(name);
        let applier = ChangeLogApplier::new(&relation_catalog, &dir_resolver);
        applier.run(&self.repo, self.repo.connection())
    }

    /// `SEARCH(index, query, limit=1000, explain=false)`.
    pub fn search(
        &self,
        index_name: &str,
        query_text: &str,
        limit: Option<usize>,
        explain: Option<bool>,
    ) -> Result<Vec<SearchHit>> {
        let executor = QueryExecutor::new(&self.repo);
        executor.search(
            index_name,
            query_text,
            &self.index_dir(index_name),
            &self.relation_catalog(),
            limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            explain.unwrap_or(false),
        )
    }

    /// `ANALYZE(text, analyzer)`.
    pub fn analyze(&self, text: &str, analyzer_name: &str) -> Result<Vec<String>> {
        let built = analyzer::create_analyzer(&self.repo, analyzer_name)?;
        fts_index::query::analyze(text, built)
    }

    /// `ESCAPE_QUERY(q)`.
    pub fn escape_query(&self, text: &str) -> String {
        fts_index::query::escape_query(text)
    }

    /// `BEST_FRAGMENT(text, query, analyzer, field?, size=512, left_tag='<b>', right_tag='</b>')`.
    #[allow(clippy::too_many_arguments)]
    pub fn best_fragment(
        &self,
        text: &str,
        query_text: &str,
        analyzer_name: &str,
        field_name: Option<&str>,
        fragment_size: Option<usize>,
        left_tag: Option<&str>,
        right_tag: Option<&str>,
    ) -> Result<String> {
        let built = analyzer::create_analyzer(&self.repo, analyzer_name)?;
        fts_index::highlighter::best_fragment(
            text,
            query_text,
            built,
            analyzer_name,
            field_name,
            fragment_size.unwrap_or(DEFAULT_FRAGMENT_SIZE),
            left_tag.unwrap_or(DEFAULT_LEFT_TAG),
            right_tag.unwrap_or(DEFAULT_RIGHT_TAG),
        )
    }

    /// `BEST_FRAGMENTS(..., max_fragments=10, ...)`.
    #[allow(clippy::too_many_arguments)]
    pub fn best_fragments(
        &self,
        text: &str,
        query_text: &str,
        analyzer_name: &str,
        field_name: Option<&str>,
        fragment_size: Option<usize>,
        left_tag: Option<&str>,
        right_tag: Option<&str>,
        max_fragments: Option<usize>,
    ) -> Result<Vec<String>> {
        let built = analyzer::create_analyzer(&self.repo, analyzer_name)?;
        fts_index::highlighter::best_fragments(
            text,
            query_text,
            built,
            analyzer_name,
            field_name,
            fragment_size.unwrap_or(DEFAULT_FRAGMENT_SIZE),
            left_tag.unwrap_or(DEFAULT_LEFT_TAG),
            right_tag.unwrap_or(DEFAULT_RIGHT_TAG),
            max_fragments.unwrap_or(DEFAULT_MAX_FRAGMENTS),
        )
    }

    pub fn index_statistics(&self, name: &str) -> Result<IndexStatistics> {
        let index = self.require_index(name)?;
        fts_index::statistics::statistics(&index.analyzer, index.status, &self.index_dir(name))
    }

    pub fn index_fields(&self, name: &str) -> Result<Vec<IndexSegment>> {
        let index = self.require_index(name)?;
        Ok(index.segments.unwrap_or_default())
    }

    /// `INDEX_FIELD_INFOS` exposes the same segment metadata as
    /// `INDEX_FIELDS`; the two are distinguished by the routine surface,
    /// not by this crate's data model.
    pub fn index_field_infos(&self, name: &str) -> Result<Vec<IndexSegment>> {
        self.index_fields(name)
    }

    pub fn index_segment_infos(&self, name: &str) -> Result<Vec<fts_index::statistics::SegmentStatistics>> {
        Ok(self.index_statistics(name)?.segments)
    }

    pub fn index_files(&self, name: &str) -> Result<Vec<(String, fts_index::statistics::SearchFileType)>> {
        let dir = self.index_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(FtsError::index_library_error)? {
            let entry = entry.map_err(FtsError::index_library_error)?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let kind = fts_index::statistics::classify_file(&file_name);
            out.push((file_name, kind));
        }
        Ok(out)
    }

    pub fn index_terms(&self, name: &str) -> Result<Vec<TermStatistic>> {
        fts_index::statistics::index_terms(&self.index_dir(name))
    }

    pub fn system_analyzers(&self) -> Vec<&'static str> {
        analyzer::builtin_names()
    }

    pub fn has_system_analyzer(&self, name: &str) -> bool {
        analyzer::is_builtin(name)
    }

    pub fn get_system_analyzer(&self, name: &str) -> Result<&'static str> {
        analyzer::builtin_names()
            .into_iter()
            .find(|n| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| FtsError::no_such_analyzer(name))
    }

    pub fn analyzer_stop_words(&self, analyzer_name: &str) -> Result<Vec<String>> {
        Ok(self
            .repo
            .stop_words(analyzer_name)?
            .into_iter()
            .map(|sw| sw.word)
            .collect())
    }

    pub fn add_stop_word(&mut self, analyzer_name: &str, word: &str) -> Result<()> {
        analyzer::ensure_mutable(analyzer_name)?;
        self.repo.add_stop_word(analyzer_name, &analyzer::normalize_stop_word(word))
    }

    pub fn drop_stop_word(&mut self, analyzer_name: &str, word: &str) -> Result<()> {
        analyzer::ensure_mutable(analyzer_name)?;
        self.repo.delete_stop_word(analyzer_name, &analyzer::normalize_stop_word(word))
    }

    /// `MAKE_TRIGGER(relation, multi_action=true, position=100)`.
    pub fn make_trigger(
        &self,
        relation: &str,
        multi_action: Option<bool>,
        position: Option<i64>,
    ) -> Result<Vec<GeneratedTrigger>> {
        fts_catalog::trigger::generate_all(
            relation,
            &self.repo,
            &self.relation_catalog(),
            &TriggerNames::default(),
            multi_action.unwrap_or(DEFAULT_MULTI_ACTION),
            position.unwrap_or(DEFAULT_TRIGGER_POSITION),
        )
    }

    /// `GET_DIRECTORY()`.
    pub fn get_directory(&self) -> PathBuf {
        self.config.index_root.clone()
    }

    /// `LUCENE_VERSION()`. There is no Lucene underneath this
    /// implementation; this returns the `tantivy` crate version that plays
    /// Lucene's role here (pinned in the workspace manifest), so callers
    /// asking "which index engine version" get a meaningful, truthful
    /// answer instead of a fabricated Lucene version string.
    pub fn lucene_version(&self) -> &'static str {
        "tantivy 0.22"
    }
}
