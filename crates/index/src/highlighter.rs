//! Best-fragment highlighting (spec §4.9), built on
//! `tantivy::SnippetGenerator`. tantivy only hands back one top-scoring
//! snippet per call, so `best_fragments` asks for a snippet spanning the
//! whole input and slices it into up to `max_fragments` windows centered on
//! the generator's highlighted ranges, re-tagging them with the caller's
//! tags instead of tantivy's hardcoded `<b>...</b>`.

use fts_errors::{FtsError, Result};
use tantivy::query::Query;
use tantivy::schema::{Field, Schema, TEXT};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{Index, SnippetGenerator};

use crate::query::MAX_TERM_LEN_OCTETS;

fn validate_fragment_size(fragment_size: usize) -> Result<()> {
    if fragment_size == 0 || fragment_size > MAX_TERM_LEN_OCTETS {
        return Err(FtsError::fragment_size_out_of_range(fragment_size as i64));
    }
    Ok(())
}

/// Builds a throwaway in-memory index with a single analyzed field, solely
/// to hand `SnippetGenerator::create` a searcher/query/field triple; no
/// document is ever stored in it, since the generator's `snippet(text)`
/// call tokenizes the caller-supplied text directly. `field_name` (spec
/// §4.9's optional `field?` argument) names that field, so a qualified
/// `field:term` clause in `query_text` resolves the way it would against
/// the real index; it defaults to `"text"` when the caller omits it.
fn build_generator(
    query_text: &str,
    built_analyzer: TextAnalyzer,
    analyzer_name: &str,
    field_name: Option<&str>,
) -> Result<(SnippetGenerator, tantivy::Searcher)> {
    let mut builder = Schema::builder();
    let field: Field = builder.add_text_field(field_name.unwrap_or("text"), TEXT);
    let schema = builder.build();
    let index = Index::create_in_ram(schema);
    index.tokenizers().register(analyzer_name, built_analyzer);

    let mut parser = tantivy::query::QueryParser::for_index(&index, vec![field]);
    let query: Box<dyn Query> = parser
        .parse_query(query_text)
        .map_err(FtsError::index_library_error)?;

    let reader = index.reader().map_err(FtsError::index_library_error)?;
    let searcher = reader.searcher();
    let generator = SnippetGenerator::create(&searcher, &*query, field)
        .map_err(FtsError::index_library_error)?;
    Ok((generator, searcher))
}

/// The single best fragment for `text` against `query_text` (spec §4.9,
/// `BEST_FRAGMENT`).
pub fn best_fragment(
    text: &str,
    query_text: &str,
    built_analyzer: TextAnalyzer,
    analyzer_name: &str,
    field_name: Option<&str>,
    fragment_size: usize,
    left_tag: &str,
    right_tag: &str,
) -> Result<String> {
    validate_fragment_size(fragment_size)?;
    let (mut generator, _searcher) = build_generator(query_text, built_analyzer, analyzer_name, field_name)?;
    generator.set_max_num_chars(fragment_size);
    let snippet = generator.snippet(text);
    let rendered = retag(&snippet.to_html(), left_tag, right_tag);
    if rendered.len() > MAX_TERM_LEN_OCTETS {
        return Err(FtsError::fragment_too_long(rendered.len()));
    }
    Ok(rendered)
}

/// Up to `max_fragments` best fragments (spec §4.9, `BEST_FRAGMENTS`).
/// Generates one whole-text snippet to discover where the query's terms
/// hit, then windows `fragment_size` characters around each hit.
pub fn best_fragments(
    text: &str,
    query_text: &str,
    built_analyzer: TextAnalyzer,
    analyzer_name: &str,
    field_name: Option<&str>,
    fragment_size: usize,
    left_tag: &str,
    right_tag: &str,
    max_fragments: usize,
) -> Result<Vec<String>> {
    validate_fragment_size(fragment_size)?;
    let (mut generator, _searcher) = build_generator(query_text, built_analyzer, analyzer_name, field_name)?;
    generator.set_max_num_chars(text.chars().count().max(fragment_size));
    let snippet = generator.snippet(text);

    let mut fragments = Vec::new();
    for highlighted in snippet.highlighted().iter().take(max_fragments) {
        let window = window_around(text, highlighted.start, highlighted.end, fragment_size);
        let tagged = format!(
            "{}{left_tag}{}{right_tag}{}",
            &window.before,
            &window.hit,
            &window.after,
        );
        if tagged.len() > MAX_TERM_LEN_OCTETS {
            return Err(FtsError::fragment_too_long(tagged.len()));
        }
        fragments.push(tagged);
    }
    if fragments.is_empty() && !text.is_empty() {
        let rendered = retag(&snippet.to_html(), left_tag, right_tag);
        fragments.push(rendered);
    }
    Ok(fragments)
}

struct Window {
    before: String,
    hit: String,
    after: String,
}

/// Slices `fragment_size` bytes of context around the byte range
/// `[start, end)`, snapped to UTF-8 char boundaries.
fn window_around(text: &str, start: usize, end: usize, fragment_size: usize) -> Window {
    let half_context = fragment_size.saturating_sub(end - start) / 2;
    let mut window_start = start.saturating_sub(half_context);
    let mut window_end = (end + half_context).min(text.len());
    while window_start > 0 && !text.is_char_boundary(window_start) {
        window_start -= 1;
    }
    while window_end < text.len() && !text.is_char_boundary(window_end) {
        window_end += 1;
    }
    Window {
        before: text[window_start..start].to_string(),
        hit: text[start..end].to_string(),
        after: text[end..window_end].to_string(),
    }
}

/// Replaces tantivy's hardcoded `<b>`/`</b>` tags in rendered snippet HTML
/// with the caller's tags.
fn retag(html: &str, left_tag: &str, right_tag: &str) -> String {
    html.replace("<b>", left_tag).replace("</b>", right_tag)
}

#[cfg(test)]
mod test {
    use super::*;
    use fts_catalog::{analyzer, CatalogRepository};

    fn english_analyzer() -> TextAnalyzer {
        let repo = CatalogRepository::open(rusqlite::Connection::open_in_memory().unwrap()).unwrap();
        analyzer::create_analyzer(&repo, "english").unwrap()
    }

    #[test]
    fn best_fragment_wraps_matched_term() {
        let result = best_fragment(
            "Once upon a midnight dreary",
            "midnight",
            english_analyzer(),
            "english",
            None,
            64,
            "<em>",
            "</em>",
        )
        .unwrap();
        assert!(result.contains("<em>midnight</em>"));
        assert!(!result.contains("<em>midnight</em><em>"));
    }

    #[test]
    fn rejects_zero_fragment_size() {
        let err = best_fragment(
            "text",
            "text",
            english_analyzer(),
            "english",
            None,
            0,
            "<b>",
            "</b>",
        )
        .unwrap_err();
        assert_eq!(err.short_msg(), "FragmentSizeOutOfRange");
    }

    #[test]
    fn rejects_oversized_fragment_size() {
        let err = best_fragment(
            "text",
            "text",
            english_analyzer(),
            "english",
            None,
            9000,
            "<b>",
            "</b>",
        )
        .unwrap_err();
        assert_eq!(err.short_msg(), "FragmentSizeOutOfRange");
    }
}
