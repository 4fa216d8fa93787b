//! Name -> analyzer factory registry (spec §4.2).
//!
//! Built-in analyzer metadata is effectively constant, so it is exposed as
//! an immutable table value (spec §9, "Singletons and globals") rather than
//! a mutable global, the same way the teacher's search crate hands out a
//! fixed `convex_en()` tokenizer rather than a registry that could be
//! mutated at runtime.

use std::collections::HashSet;

use fts_errors::{FtsError, Result};
use once_cell::sync::Lazy;
use tantivy::tokenizer::{
    Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer, WhitespaceTokenizer,
};
#[cfg(test)]
use tantivy::tokenizer::TokenStream as _;

use crate::repository::CatalogRepository;

/// Words silently dropped if they end up longer than this after
/// tokenization. Matches the teacher's `convex_en()` constant; this system
/// has no analogous hard requirement but keeping a bound avoids pathological
/// memory use on malformed input.
const MAX_TERM_LENGTH: usize = 255;

/// A case-insensitively looked-up built-in analyzer descriptor.
pub struct BuiltinAnalyzer {
    pub name: &'static str,
    pub stop_words_supported: bool,
    factory: Box<dyn Fn(Option<&[String]>) -> TextAnalyzer + Send + Sync>,
}

impl BuiltinAnalyzer {
    pub fn build(&self, stop_words: Option<&[String]>) -> TextAnalyzer {
        (self.factory)(stop_words)
    }
}

fn stop_word_filter(stop_words: Option<&[String]>) -> Option<StopWordFilter> {
    match stop_words {
        Some(words) if !words.is_empty() => Some(StopWordFilter::remove(words.to_vec())),
        _ => None,
    }
}

fn simple_analyzer(stop_words: Option<&[String]>) -> TextAnalyzer {
    let builder = TextAnalyzer::builder(SimpleTokenizer)
        .filter(RemoveLongFilter::limit(MAX_TERM_LENGTH))
        .filter(LowerCaser);
    match stop_word_filter(stop_words) {
        Some(filter) => builder.filter(filter).build(),
        None => builder.build(),
    }
}

fn whitespace_analyzer(stop_words: Option<&[String]>) -> TextAnalyzer {
    let builder = TextAnalyzer::builder(WhitespaceTokenizer)
        .filter(RemoveLongFilter::limit(MAX_TERM_LENGTH))
        .filter(LowerCaser);
    match stop_word_filter(stop_words) {
        Some(filter) => builder.filter(filter).build(),
        None => builder.build(),
    }
}

fn keyword_analyzer(_stop_words: Option<&[String]>) -> TextAnalyzer {
    // Lucene's KeywordAnalyzer never splits or lowercases its input.
    TextAnalyzer::builder(RawTokenizer).build()
}

fn language_analyzer(language: Language) -> impl Fn(Option<&[String]>) -> TextAnalyzer {
    move |stop_words: Option<&[String]>| {
        let builder = TextAnalyzer::builder(SimpleTokenizer)
            .filter(RemoveLongFilter::limit(MAX_TERM_LENGTH))
            .filter(LowerCaser)
            .filter(Stemmer::new(language));
        match stop_word_filter(stop_words) {
            Some(filter) => builder.filter(filter).build(),
            None => builder.build(),
        }
    }
}

macro_rules! builtin {
    ($name:literal, $stop:literal, $factory:expr) => {
        BuiltinAnalyzer {
            name: $name,
            stop_words_supported: $stop,
            factory: Box::new($factory),
        }
    };
}

/// The immutable table of built-in analyzers. Lookups are case-insensitive
/// (spec §3 invariant 4). The `*_snowball` entries are `original_source`'s
/// separate `SNOWBALL(...)` family -- an independent superset of stemmers,
/// not aliases of the bare-language entries above.
static BUILTINS: Lazy<Vec<BuiltinAnalyzer>> = Lazy::new(|| {
    vec![
        builtin!("standard", true, simple_analyzer),
        builtin!("simple", false, simple_analyzer),
        builtin!("whitespace", false, whitespace_analyzer),
        builtin!("keyword", false, keyword_analyzer),
        builtin!("stop", true, simple_analyzer),
        builtin!("english", true, language_analyzer(Language::English)),
        builtin!("english_snowball", true, language_analyzer(Language::English)),
        builtin!("french", true, language_analyzer(Language::French)),
        builtin!("french_snowball", true, language_analyzer(Language::French)),
        builtin!("german", true, language_analyzer(Language::German)),
        builtin!("german_snowball", true, language_analyzer(Language::German)),
        builtin!("russian", true, language_analyzer(Language::Russian)),
        builtin!("russian_snowball", true, language_analyzer(Language::Russian)),
        builtin!("dutch", true, language_analyzer(Language::Dutch)),
        builtin!("dutch_snowball", true, language_analyzer(Language::Dutch)),
        builtin!("arabic", true, language_analyzer(Language::Arabic)),
        builtin!("greek", true, language_analyzer(Language::Greek)),
        // Lucene's BrazilianAnalyzer stems with a Portuguese-derived
        // algorithm; rust_stemmers only exposes the Portuguese variant.
        builtin!("brazilian", true, language_analyzer(Language::Portuguese)),
        // The rest of `original_source`'s SNOWBALL(...) family: an
        // independent superset of stemmers, not aliases of a bare-language
        // entry above (most of these languages have no bare entry at all).
        builtin!("danish_snowball", true, language_analyzer(Language::Danish)),
        builtin!("finnish_snowball", true, language_analyzer(Language::Finnish)),
        builtin!("hungarian_snowball", true, language_analyzer(Language::Hungarian)),
        builtin!("italian_snowball", true, language_analyzer(Language::Italian)),
        builtin!("norwegian_snowball", true, language_analyzer(Language::Norwegian)),
        builtin!("portuguese_snowball", true, language_analyzer(Language::Portuguese)),
        builtin!("romanian_snowball", true, language_analyzer(Language::Romanian)),
        builtin!("spanish_snowball", true, language_analyzer(Language::Spanish)),
        builtin!("swedish_snowball", true, language_analyzer(Language::Swedish)),
        builtin!("turkish_snowball", true, language_analyzer(Language::Turkish)),
        // SNOWBALL(PORTER) is the classic Porter algorithm; rust_stemmers'
        // `English` variant is already Porter2/Snowball-English, the
        // closest available approximation.
        builtin!("porter_snowball", true, language_analyzer(Language::English)),
        // No stemmer available for these in `rust_stemmers`; fall back to
        // normalization-only analyzers rather than failing outright.
        builtin!("czech", true, simple_analyzer),
        builtin!("persian", true, simple_analyzer),
        builtin!("chinese", false, whitespace_analyzer),
        builtin!("cjk", true, whitespace_analyzer),
    ]
});

fn find_builtin(name: &str) -> Option<&'static BuiltinAnalyzer> {
    BUILTINS
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
}

pub fn is_builtin(name: &str) -> bool {
    find_builtin(name).is_some()
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTINS.iter().map(|a| a.name).collect()
}

/// Build a tantivy analyzer for `name`. If `name` is built-in, its default
/// factory runs directly; otherwise `name` must resolve to a user-defined
/// analyzer row in the catalog, whose stop words (if any) are loaded and
/// passed to its base analyzer's factory.
pub fn create_analyzer(repo: &CatalogRepository, name: &str) -> Result<TextAnalyzer> {
    if let Some(builtin) = find_builtin(name) {
        return Ok(builtin.build(None));
    }

    let user_analyzer = repo
        .get_analyzer(name)?
        .ok_or_else(|| FtsError::no_such_analyzer(name))?;

    let base = find_builtin(&user_analyzer.base_analyzer)
        .ok_or_else(|| FtsError::no_such_analyzer(&user_analyzer.base_analyzer))?;

    let stop_words = repo.stop_words(name)?;
    if !stop_words.is_empty() && !base.stop_words_supported {
        return Err(FtsError::base_analyzer_lacks_stopwords(
            &user_analyzer.base_analyzer,
        ));
    }

    let words: Vec<String> = stop_words.into_iter().map(|sw| sw.word).collect();
    Ok(base.build(if words.is_empty() { None } else { Some(&words) }))
}

/// Whether adding/removing a stop word is legal for `name`: built-ins can
/// never be mutated (spec §7, `cannot-modify-system-analyzer`).
pub fn ensure_mutable(name: &str) -> Result<()> {
    if is_builtin(name) {
        Err(FtsError::cannot_modify_system_analyzer(name))
    } else {
        Ok(())
    }
}

pub fn normalize_stop_word(word: &str) -> String {
    word.trim().to_lowercase()
}

pub fn dedupe_words(words: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for w in words {
        if seen.insert(w.clone()) {
            out.push(w);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_lookup_is_case_insensitive() {
        assert!(is_builtin("ENGLISH"));
        assert!(is_builtin("English"));
        assert!(is_builtin("english"));
        assert!(!is_builtin("not_a_real_analyzer"));
    }

    #[test]
    fn snowball_family_covers_every_non_stemmed_language() {
        for name in [
            "danish_snowball",
            "finnish_snowball",
            "hungarian_snowball",
            "italian_snowball",
            "norwegian_snowball",
            "portuguese_snowball",
            "romanian_snowball",
            "spanish_snowball",
            "swedish_snowball",
            "turkish_snowball",
            "porter_snowball",
        ] {
            assert!(is_builtin(name), "{name} should be a builtin analyzer");
        }
    }

    #[test]
    fn chinese_does_not_support_stop_words_but_cjk_does() {
        assert!(!find_builtin("chinese").unwrap().stop_words_supported);
        assert!(find_builtin("cjk").unwrap().stop_words_supported);
    }

    #[test]
    fn keyword_analyzer_does_not_split_or_lowercase() {
        let mut analyzer = keyword_analyzer(None);
        let mut stream = analyzer.token_stream("Hello World");
        let mut tokens = vec![];
        while let Some(tok) = stream.next() {
            tokens.push(tok.text.clone());
        }
        assert_eq!(tokens, vec!["Hello World".to_string()]);
    }

    #[test]
    fn simple_analyzer_lowercases_and_splits() {
        let mut analyzer = simple_analyzer(None);
        let mut stream = analyzer.token_stream("Hello World");
        let mut tokens = vec![];
        while let Some(tok) = stream.next() {
            tokens.push(tok.text.clone());
        }
        assert_eq!(tokens, vec!["hello", "world"]);
    }

    #[test]
    fn ensure_mutable_rejects_builtins() {
        assert!(ensure_mutable("english").is_err());
        assert!(ensure_mutable("my_custom_analyzer").is_ok());
    }

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize_stop_word("  THE  "), "the");
    }
}
