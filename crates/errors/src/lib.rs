//! The error taxonomy shared by every crate in this workspace.
//!
//! Mirrors the shape of an `ErrorMetadata`-style error: a stable,
//! ScreamingCamelCase `short_msg` usable in tests and metrics, and a longer
//! developer-facing `msg`. Callers that only care about classifying an
//! error (e.g. to decide whether to retry) should match on [`FtsErrorCode`];
//! callers surfacing the error to a human should use the `Display` impl.

use std::borrow::Cow;

/// One entry per error kind enumerated in the specification's error-handling
/// section. Variants are data-free; the human-readable detail lives in
/// [`FtsError::msg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtsErrorCode {
    ArgumentNull,
    NoSuchIndex,
    IndexAlreadyExists,
    IndexNotBuilt,
    NoSuchRelation,
    NoSuchField,
    UnsupportedKeyType,
    CompositePkRequiresExplicitKey,
    NoSuchAnalyzer,
    BaseAnalyzerLacksStopwords,
    CannotModifySystemAnalyzer,
    MalformedKey,
    FragmentSizeOutOfRange,
    TermTooLong,
    FragmentTooLong,
    IndexBusy,
    NoConfig,
    IndexLibraryError,
}

impl FtsErrorCode {
    /// The ScreamingCamelCase tag used in tests and logs, independent of the
    /// (potentially parameterized) `msg` text.
    pub fn short_msg(self) -> &'static str {
        match self {
            Self::ArgumentNull => "ArgumentNull",
            Self::NoSuchIndex => "NoSuchIndex",
            Self::IndexAlreadyExists => "IndexAlreadyExists",
            Self::IndexNotBuilt => "IndexNotBuilt",
            Self::NoSuchRelation => "NoSuchRelation",
            Self::NoSuchField => "NoSuchField",
            Self::UnsupportedKeyType => "UnsupportedKeyType",
            Self::CompositePkRequiresExplicitKey => "CompositePkRequiresExplicitKey",
            Self::NoSuchAnalyzer => "NoSuchAnalyzer",
            Self::BaseAnalyzerLacksStopwords => "BaseAnalyzerLacksStopwords",
            Self::CannotModifySystemAnalyzer => "CannotModifySystemAnalyzer",
            Self::MalformedKey => "MalformedKey",
            Self::FragmentSizeOutOfRange => "FragmentSizeOutOfRange",
            Self::TermTooLong => "TermTooLong",
            Self::FragmentTooLong => "FragmentTooLong",
            Self::IndexBusy => "IndexBusy",
            Self::NoConfig => "NoConfig",
            Self::IndexLibraryError => "IndexLibraryError",
        }
    }
}

/// An error surfaced to a caller of this crate's public routines.
///
/// Carries enough structure that the (out of scope) routine-surface binding
/// layer can translate it into whatever status-vector shape the host's
/// external-routine ABI expects, without needing to string-match `msg`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{msg}")]
pub struct FtsError {
    pub code: FtsErrorCode,
    pub msg: Cow<'static, str>,
}

impl FtsError {
    pub fn new(code: FtsErrorCode, msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    pub fn short_msg(&self) -> &'static str {
        self.code.short_msg()
    }

    pub fn argument_null(arg: &str) -> Self {
        Self::new(
            FtsErrorCode::ArgumentNull,
            format!("Argument \"{arg}\" must not be null"),
        )
    }

    pub fn no_such_index(name: &str) -> Self {
        Self::new(
            FtsErrorCode::NoSuchIndex,
            format!("Index \"{name}\" does not exist"),
        )
    }

    pub fn index_already_exists(name: &str) -> Self {
        Self::new(
            FtsErrorCode::IndexAlreadyExists,
            format!("Index \"{name}\" already exists"),
        )
    }

    pub fn index_not_built(name: &str) -> Self {
        Self::new(
            FtsErrorCode::IndexNotBuilt,
            format!("Index \"{name}\" is not built"),
        )
    }

    pub fn no_such_relation(name: &str) -> Self {
        Self::new(
            FtsErrorCode::NoSuchRelation,
            format!("Relation \"{name}\" does not exist"),
        )
    }

    pub fn no_such_field(relation: &str, field: &str) -> Self {
        Self::new(
            FtsErrorCode::NoSuchField,
            format!("Field \"{field}\" does not exist on relation \"{relation}\""),
        )
    }

    pub fn unsupported_key_type(relation: &str, field: &str) -> Self {
        Self::new(
            FtsErrorCode::UnsupportedKeyType,
            format!("Field \"{field}\" on relation \"{relation}\" cannot be used as an FTS key"),
        )
    }

    pub fn composite_pk_requires_explicit_key(relation: &str) -> Self {
        Self::new(
            FtsErrorCode::CompositePkRequiresExplicitKey,
            format!(
                "Relation \"{relation}\" has a composite primary key; an explicit key_field is \
                 required"
            ),
        )
    }

    pub fn no_such_analyzer(name: &str) -> Self {
        Self::new(
            FtsErrorCode::NoSuchAnalyzer,
            format!("Analyzer \"{name}\" does not exist"),
        )
    }

    pub fn base_analyzer_lacks_stopwords(name: &str) -> Self {
        Self::new(
            FtsErrorCode::BaseAnalyzerLacksStopwords,
            format!("Base analyzer \"{name}\" does not support stop words"),
        )
    }

    pub fn cannot_modify_system_analyzer(name: &str) -> Self {
        Self::new(
            FtsErrorCode::CannotModifySystemAnalyzer,
            format!("Analyzer \"{name}\" is a built-in analyzer and cannot be modified"),
        )
    }

    pub fn malformed_key(kind: &str, text: &str) -> Self {
        Self::new(
            FtsErrorCode::MalformedKey,
            format!("\"{text}\" is not a valid {kind} key"),
        )
    }

    pub fn fragment_size_out_of_range(size: i64) -> Self {
        Self::new(
            FtsErrorCode::FragmentSizeOutOfRange,
            format!("Fragment size {size} must be between 1 and 8191"),
        )
    }

    pub fn term_too_long(len: usize) -> Self {
        Self::new(
            FtsErrorCode::TermTooLong,
            format!("Term of {len} UTF-8 octets exceeds the 8191 octet limit"),
        )
    }

    pub fn fragment_too_long(len: usize) -> Self {
        Self::new(
            FtsErrorCode::FragmentTooLong,
            format!("Fragment of {len} UTF-8 octets exceeds the 8191 octet limit"),
        )
    }

    pub fn index_busy(name: &str) -> Self {
        Self::new(
            FtsErrorCode::IndexBusy,
            format!("Index \"{name}\" is locked by another writer"),
        )
    }

    pub fn no_config(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::new(FtsErrorCode::NoConfig, reason)
    }

    pub fn index_library_error(source: impl std::fmt::Display) -> Self {
        Self::new(FtsErrorCode::IndexLibraryError, source.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FtsError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_msg_is_stable_regardless_of_formatted_text() {
        let a = FtsError::no_such_index("foo");
        let b = FtsError::no_such_index("bar");
        assert_eq!(a.short_msg(), b.short_msg());
        assert_eq!(a.short_msg(), "NoSuchIndex");
        assert_ne!(a.to_string(), b.to_string());
    }
}
