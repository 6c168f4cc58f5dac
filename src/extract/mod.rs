//! Field-extraction engine
//!
//! Everything the engine pulls out of a page goes through these functions,
//! driven by [`SelectorConfig`] blocks: a CSS selector, an optional attribute
//! to read instead of text, and an optional regex refining the value. The
//! spider and the configuration validator share this module so that a config
//! that validates is a config that crawls.
//!
//! Field absence is not an error: a selector that matches nothing, an empty
//! extraction, and a non-matching pattern all yield `None`.

mod dates;

pub use dates::parse_standard_date_formats;

use crate::config::SelectorConfig;
use crate::ExtractError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// One extracted field value
///
/// For text extractions both the processed and the pre-processing markup of
/// the matched subtree are kept, so downstream consumers can recover what a
/// markup hook removed. Attribute extractions carry no markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedField {
    /// The extracted, pattern-refined, trimmed value
    pub text: String,

    /// Subtree markup after the markup hook ran
    pub processed_markup: Option<String>,

    /// Subtree markup as it appeared on the page
    pub original_markup: Option<String>,
}

/// Parses a CSS selector, mapping failure to an extraction error
pub fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::Selector(selector.to_string()))
}

/// Extracts all item containers from a parsed page, in document order
pub fn extract_items<'a>(
    html: &'a Html,
    config: &SelectorConfig,
) -> Result<Vec<ElementRef<'a>>, ExtractError> {
    let selector = parse_selector(&config.selector)?;
    Ok(html.select(&selector).collect())
}

/// Extracts one field from within an item container
///
/// # Arguments
///
/// * `scope` - The item container the selector runs inside
/// * `config` - The selector block for this field
/// * `process_markup` - Markup hook applied to text extractions before the
///   text is read (identity for most sources)
///
/// # Returns
///
/// * `Ok(Some(field))` - A non-empty value was extracted
/// * `Ok(None)` - No matching element, empty value, or non-matching pattern
/// * `Err(ExtractError)` - The selector or pattern itself is unusable
pub fn extract_field(
    scope: ElementRef,
    config: &SelectorConfig,
    process_markup: &dyn Fn(&str) -> String,
) -> Result<Option<ExtractedField>, ExtractError> {
    let selector = parse_selector(&config.selector)?;
    let element = match scope.select(&selector).next() {
        Some(element) => element,
        None => return Ok(None),
    };

    let (raw, processed_markup, original_markup) = match &config.attribute {
        Some(attribute) => match element.value().attr(attribute) {
            Some(value) => (value.to_string(), None, None),
            None => return Ok(None),
        },
        None => {
            let original = element.html();
            let processed = process_markup(&original);
            let text = if processed == original {
                normalized_text(element)
            } else {
                fragment_text(&processed)
            };
            (text, Some(processed), Some(original))
        }
    };

    if raw.is_empty() {
        return Ok(None);
    }

    let refined = match &config.pattern {
        Some(pattern) => match apply_pattern(pattern, &raw)? {
            Some(value) => value,
            None => return Ok(None),
        },
        None => raw,
    };

    let text = refined.trim();
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(ExtractedField {
        text: text.to_string(),
        processed_markup,
        original_markup,
    }))
}

/// Extracts links matching a selector, resolved against a base URL
///
/// The attribute defaults to `href`. A `pattern`, when set, filters the raw
/// attribute values; unlike [`extract_field`] it never substitutes a capture
/// group.
pub fn extract_links(
    html: &Html,
    config: &SelectorConfig,
    base: &Url,
) -> Result<Vec<Url>, ExtractError> {
    let selector = parse_selector(&config.selector)?;
    let attribute = config.attribute.as_deref().unwrap_or("href");

    let filter = match &config.pattern {
        Some(pattern) => Some(compile_pattern(pattern)?),
        None => None,
    };

    let mut links = Vec::new();
    for element in html.select(&selector) {
        let value = match element.value().attr(attribute) {
            Some(value) if !value.trim().is_empty() => value.trim(),
            _ => continue,
        };

        if let Some(regex) = &filter {
            if !regex.is_match(value) {
                continue;
            }
        }

        match base.join(value) {
            Ok(url) => links.push(url),
            Err(e) => {
                tracing::debug!("Skipping unresolvable link '{}': {}", value, e);
            }
        }
    }

    Ok(links)
}

/// The first link matching a next-page selector, or none
pub fn extract_next_page(
    html: &Html,
    config: &SelectorConfig,
    base: &Url,
) -> Result<Option<Url>, ExtractError> {
    Ok(extract_links(html, config, base)?.into_iter().next())
}

/// Removes subtrees matching the given selectors from a markup string
///
/// This is the building block for markup hooks that drop quoted-reply
/// blocks before text extraction. The input is reserialized by the parser,
/// so the returned markup is normalized even when nothing matches.
pub fn strip_markup_blocks(html: &str, selectors: &[&str]) -> String {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().inner_html();

    for selector_str in selectors {
        let selector = match Selector::parse(selector_str) {
            Ok(selector) => selector,
            Err(_) => continue,
        };
        for element in fragment.select(&selector) {
            let serialized = element.html();
            if let Some(pos) = result.find(&serialized) {
                result.replace_range(pos..pos + serialized.len(), "");
            }
        }
    }

    result
}

/// Removes angle-bracketed segments, typically email addresses in
/// "Name <user@host>" author strings
///
/// An unclosed bracket is left alone.
pub fn strip_emails(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        match rest[start..].find('>') {
            Some(offset) => {
                result.push_str(&rest[..start]);
                rest = &rest[start + offset + 1..];
            }
            None => break,
        }
    }
    result.push_str(rest);
    result.trim().to_string()
}

/// Text content of an element: nodes trimmed and joined with single spaces
fn normalized_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text content of a standalone markup string
fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    normalized_text(fragment.root_element())
}

/// Applies a refinement pattern: first capture group if the pattern has
/// groups, else the whole match; `None` when the pattern does not match
fn apply_pattern(pattern: &str, value: &str) -> Result<Option<String>, ExtractError> {
    let regex = compile_pattern(pattern)?;
    let captures = match regex.captures(value) {
        Some(captures) => captures,
        None => return Ok(None),
    };

    if captures.len() > 1 {
        Ok(captures.get(1).map(|m| m.as_str().to_string()))
    } else {
        Ok(captures.get(0).map(|m| m.as_str().to_string()))
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::Pattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: fn(&str) -> String = |s| s.to_string();

    fn first_item<'a>(html: &'a Html, selector: &str) -> ElementRef<'a> {
        let sel = Selector::parse(selector).unwrap();
        html.select(&sel).next().unwrap()
    }

    #[test]
    fn test_extract_field_text() {
        let html = Html::parse_document(
            r#"<div class="post"><h3 class="subject">  A <b>bold</b> thread  </h3></div>"#,
        );
        let item = first_item(&html, "div.post");

        let field = extract_field(item, &SelectorConfig::new("h3.subject"), &IDENTITY)
            .unwrap()
            .unwrap();
        assert_eq!(field.text, "A bold thread");
        assert!(field.original_markup.unwrap().contains("<b>bold</b>"));
    }

    #[test]
    fn test_extract_field_attribute() {
        let html = Html::parse_document(
            r#"<div class="post"><a class="permalink" href=" /topic=1.msg5 ">link</a></div>"#,
        );
        let item = first_item(&html, "div.post");

        let field = extract_field(
            item,
            &SelectorConfig::with_attribute("a.permalink", "href"),
            &IDENTITY,
        )
        .unwrap()
        .unwrap();
        assert_eq!(field.text, "/topic=1.msg5");
        assert!(field.original_markup.is_none());
        assert!(field.processed_markup.is_none());
    }

    #[test]
    fn test_extract_field_absent_selector() {
        let html = Html::parse_document(r#"<div class="post">text</div>"#);
        let item = first_item(&html, "div.post");

        let field = extract_field(item, &SelectorConfig::new("span.missing"), &IDENTITY).unwrap();
        assert!(field.is_none());
    }

    #[test]
    fn test_extract_field_absent_attribute() {
        let html = Html::parse_document(r#"<div class="post"><a class="x">text</a></div>"#);
        let item = first_item(&html, "div.post");

        let field = extract_field(
            item,
            &SelectorConfig::with_attribute("a.x", "href"),
            &IDENTITY,
        )
        .unwrap();
        assert!(field.is_none());
    }

    #[test]
    fn test_extract_field_empty_text_is_absent() {
        let html = Html::parse_document(r#"<div class="post"><span class="e">   </span></div>"#);
        let item = first_item(&html, "div.post");

        let field = extract_field(item, &SelectorConfig::new("span.e"), &IDENTITY).unwrap();
        assert!(field.is_none());
    }

    #[test]
    fn test_pattern_capture_group() {
        let html =
            Html::parse_document(r#"<div class="post"><h3>Re: The actual title</h3></div>"#);
        let item = first_item(&html, "div.post");

        let mut config = SelectorConfig::new("h3");
        config.pattern = Some("Re: (.*)".to_string());

        let field = extract_field(item, &config, &IDENTITY).unwrap().unwrap();
        assert_eq!(field.text, "The actual title");
    }

    #[test]
    fn test_pattern_whole_match_without_groups() {
        let html = Html::parse_document(r#"<div class="post"><span>id 4871 here</span></div>"#);
        let item = first_item(&html, "div.post");

        let mut config = SelectorConfig::new("span");
        config.pattern = Some(r"\d+".to_string());

        let field = extract_field(item, &config, &IDENTITY).unwrap().unwrap();
        assert_eq!(field.text, "4871");
    }

    #[test]
    fn test_pattern_non_match_is_absent() {
        let html = Html::parse_document(r#"<div class="post"><span>no digits</span></div>"#);
        let item = first_item(&html, "div.post");

        let mut config = SelectorConfig::new("span");
        config.pattern = Some(r"\d+".to_string());

        assert!(extract_field(item, &config, &IDENTITY).unwrap().is_none());
    }

    #[test]
    fn test_markup_hook_changes_text() {
        let html = Html::parse_document(
            r#"<div class="post"><div class="body"><div class="quote">quoted</div>fresh reply</div></div>"#,
        );
        let item = first_item(&html, "div.post");

        let strip_quotes = |markup: &str| strip_markup_blocks(markup, &["div.quote"]);
        let field = extract_field(item, &SelectorConfig::new("div.body"), &strip_quotes)
            .unwrap()
            .unwrap();

        assert_eq!(field.text, "fresh reply");
        assert!(field.original_markup.unwrap().contains("quoted"));
        assert!(!field.processed_markup.unwrap().contains("quoted"));
    }

    #[test]
    fn test_extract_items_document_order() {
        let html = Html::parse_document(
            r#"<div class="post" id="a"></div><div class="post" id="b"></div><div class="post" id="c"></div>"#,
        );
        let items = extract_items(&html, &SelectorConfig::new("div.post")).unwrap();
        let ids: Vec<_> = items
            .iter()
            .map(|i| i.value().attr("id").unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_extract_links_resolves_and_defaults_href() {
        let html = Html::parse_document(
            r#"<a class="t" href="/topic=1.0">one</a><a class="t" href="https://other.example.com/x">two</a><a class="t">no href</a>"#,
        );
        let base = Url::parse("https://forum.example.com/board=3.0").unwrap();

        let mut config = SelectorConfig::new("a.t");
        config.multiple = true;

        let links = extract_links(&html, &config, &base).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].as_str(), "https://forum.example.com/topic=1.0");
        assert_eq!(links[1].as_str(), "https://other.example.com/x");
    }

    #[test]
    fn test_extract_links_pattern_filters() {
        let html = Html::parse_document(
            r#"<a class="t" href="/topic=1.0">one</a><a class="t" href="/profile;u=4">profile</a>"#,
        );
        let base = Url::parse("https://forum.example.com/").unwrap();

        let mut config = SelectorConfig::new("a.t");
        config.pattern = Some("topic=".to_string());

        let links = extract_links(&html, &config, &base).unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].as_str().contains("topic=1.0"));
    }

    #[test]
    fn test_extract_next_page_first_link() {
        let html = Html::parse_document(
            r#"<a class="nav" href="/index?page=2">2</a><a class="nav" href="/index?page=3">3</a>"#,
        );
        let base = Url::parse("https://forum.example.com/index").unwrap();

        let next = extract_next_page(&html, &SelectorConfig::with_attribute("a.nav", "href"), &base)
            .unwrap()
            .unwrap();
        assert_eq!(next.as_str(), "https://forum.example.com/index?page=2");

        let none = extract_next_page(&html, &SelectorConfig::new("a.missing"), &base).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_strip_markup_blocks_multiple_selectors() {
        let html = r#"<div class="quoteheader">In reply to</div><div class="quote">old text</div><p>new text</p>"#;
        let stripped = strip_markup_blocks(html, &["div.quoteheader", "div.quote"]);
        assert!(!stripped.contains("old text"));
        assert!(!stripped.contains("In reply to"));
        assert!(stripped.contains("new text"));
    }

    #[test]
    fn test_strip_emails() {
        assert_eq!(strip_emails("Alice <alice@example.com>"), "Alice");
        assert_eq!(strip_emails("Bob"), "Bob");
        assert_eq!(strip_emails("<only@example.com>"), "");
        assert_eq!(strip_emails("a <x> b <y> c"), "a  b  c");
        assert_eq!(strip_emails("unclosed < stays"), "unclosed < stays");
    }

    #[test]
    fn test_bad_selector_is_an_error() {
        let html = Html::parse_document("<p>x</p>");
        assert!(extract_items(&html, &SelectorConfig::new("p[[")).is_err());
    }
}
