//! Text helpers shared by the fetcher, the analyzer and the console digest.
//!
//! - Markup stripping for comment bodies
//! - Truncation for logs and display (never for LLM-facing text)
//! - JSON extraction from chatty model responses
//! - Name normalization used to deduplicate merged facet entries

use itertools::Itertools;
use scraper::{Html, Node};

/// Elements whose boundaries separate words when flattened to text.
const BLOCK_TAGS: &[&str] = &[
    "p", "br", "blockquote", "li", "ul", "ol", "div", "h1", "h2", "h3", "h4", "pre",
];

/// Strip HTML markup from a comment body.
///
/// Entities are decoded by the parser, block-level boundaries become spaces
/// and runs of whitespace collapse to one space. Inline elements (`<i>`,
/// `<a>`, ...) do not introduce breaks, so `wo<i>rd</i>` stays `word`.
pub fn strip_markup(body: &str) -> String {
    let fragment = Html::parse_fragment(body);
    let mut out = String::with_capacity(body.len());

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => out.push(' '),
            _ => {}
        }
    }

    out.split_whitespace().join(" ")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the characters dropped.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}…(+{} chars)", total - max)
    }
}

/// Truncate for console display, appending `...` when anything was cut.
pub fn truncate_for_display(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head.trim_end())
    }
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A model response cut off by the token limit fails with an EOF error; this
/// lets the caller log it as truncation rather than as garbage.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Pull the outermost JSON object out of a model response.
///
/// Models are asked for bare JSON but routinely wrap it in prose or a code
/// fence. Returns the slice from the first `{` to the last `}`.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Normalize a facet entry's name for near-duplicate detection.
///
/// Case, punctuation, repeated whitespace and a leading article are ignored,
/// so "The cost of living" and "cost-of-living!" compare equal.
pub fn normalize_name(name: &str) -> String {
    let cleaned = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>();
    let words = cleaned.split_whitespace().collect::<Vec<_>>();
    let words = match words.as_slice() {
        ["the" | "a" | "an", rest @ ..] if !rest.is_empty() => rest,
        all => all,
    };
    words.join(" ")
}

/// Convert a URL path into a file-name friendly slug.
///
/// `/world/2024/mar/04/some-story` becomes `world_2024_mar_04_some-story`,
/// cut to `max` characters.
pub fn path_slug(path: &str, max: usize) -> String {
    path.trim_matches('/')
        .chars()
        .map(|c| match c {
            '/' => '_',
            c if c.is_alphanumeric() || c == '-' || c == '_' => c,
            _ => '-',
        })
        .take(max)
        .collect()
}

/// Capitalize the first character of a string.
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup_paragraphs_and_entities() {
        let body = "<p>First &amp; foremost.</p><p>Second <i>para</i>graph.</p>";
        assert_eq!(strip_markup(body), "First & foremost. Second paragraph.");
    }

    #[test]
    fn test_strip_markup_quotes_links_and_breaks() {
        let body = "<blockquote><p>quoted</p></blockquote><p>reply<br>line two <a href=\"https://x\">link</a></p>";
        assert_eq!(strip_markup(body), "quoted reply line two link");
    }

    #[test]
    fn test_strip_markup_plain_text_and_whitespace() {
        assert_eq!(strip_markup("  just   text \n here "), "just text here");
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 chars)"));
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let s = "café au lait ".repeat(20);
        let shown = truncate_for_display(&s, 4);
        assert_eq!(shown, "café...");
        assert!(truncate_for_log("éééé", 2).starts_with("éé…"));
    }

    #[test]
    fn test_looks_truncated() {
        let result: Result<serde_json::Value, _> = serde_json::from_str(r#"{"field": "value"#);
        assert!(looks_truncated(&result.unwrap_err()));

        let result: Result<serde_json::Value, _> = serde_json::from_str("{]");
        assert!(!looks_truncated(&result.unwrap_err()));
    }

    #[test]
    fn test_extract_json_object() {
        let fenced = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```\nAnything else?";
        assert_eq!(extract_json_object(fenced), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("The Cost of Living"), "cost of living");
        assert_eq!(normalize_name("cost-of-living!"), "cost of living");
        assert_eq!(normalize_name("  Housing   crisis "), "housing crisis");
        assert_eq!(normalize_name("The"), "the");
    }

    #[test]
    fn test_path_slug() {
        assert_eq!(
            path_slug("/world/2024/mar/04/some-story", 50),
            "world_2024_mar_04_some-story"
        );
        assert_eq!(path_slug("/a/b?c", 3), "a_b");
        assert_eq!(path_slug("/", 50), "");
    }

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("hello"), "Hello");
        assert_eq!(upcase(""), "");
    }
}
