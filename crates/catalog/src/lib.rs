//! The full-text index catalog: entity model, schema DDL, key codec,
//! analyzer registry, relation introspection, and trigger generation
//! (spec §4.1-§4.4, §4.10).

pub mod analyzer;
pub mod key_codec;
pub mod model;
pub mod relation;
pub mod repository;
pub mod schema;
pub mod trigger;

pub use model::{ChangeType, Index, IndexSegment, IndexStatus, KeyKind, KeyValue, LogEntry, StopWord, UserAnalyzer};
pub use relation::{RelationCatalog, RelationFieldInfo, SqliteRelationCatalog, DB_KEY_PSEUDO_COLUMN};
pub use repository::CatalogRepository;
pub use trigger::{GeneratedTrigger, TriggerNames};
