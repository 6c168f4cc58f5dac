//! Markdown front matter
//!
//! Repository files carry their metadata as YAML front matter between
//! `---` fences. Some older specification documents predate YAML and use
//! a looser `Key: value` preamble with indented continuation lines, so
//! YAML parsing falls back to that style when it fails.

use crate::extract::strip_emails;
use crate::ExtractError;
use chrono::NaiveDate;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

static TEMPLATE_TAG: OnceLock<Regex> = OnceLock::new();
static FRONT_MATTER: OnceLock<Regex> = OnceLock::new();
static FIRST_HEADING: OnceLock<Regex> = OnceLock::new();

fn template_tag() -> &'static Regex {
    TEMPLATE_TAG.get_or_init(|| Regex::new(r"(?s)\{%.*?%\}").expect("static pattern"))
}

fn front_matter() -> &'static Regex {
    FRONT_MATTER.get_or_init(|| Regex::new(r"(?ms)^---\s*$(.*?)^---\s*$").expect("static pattern"))
}

fn first_heading() -> &'static Regex {
    FIRST_HEADING.get_or_init(|| Regex::new(r"(?m)^#\s+(.+)$").expect("static pattern"))
}

/// A markdown file split into metadata and body
pub struct ParsedMarkdown {
    pub metadata: Mapping,
    pub body: String,
}

/// Splits a markdown text into front matter metadata and document body
///
/// Liquid-style `{% ... %}` template tags are removed first. A file with
/// no front matter yields empty metadata and the whole text as body.
pub fn parse_markdown(text: &str) -> ParsedMarkdown {
    let text = template_tag().replace_all(text, "");

    let Some(found) = front_matter().captures(&text) else {
        return ParsedMarkdown {
            metadata: Mapping::new(),
            body: text.trim().to_string(),
        };
    };

    let raw = found.get(1).map(|m| m.as_str()).unwrap_or("").trim();
    let end = found.get(0).map(|m| m.end()).unwrap_or(0);
    let body = text[end..].trim().to_string();

    let metadata = match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Mapping(mapping)) => mapping,
        _ => bip_style_front_matter(raw),
    };

    ParsedMarkdown { metadata, body }
}

/// `Key: value` preamble parser for pre-YAML specification documents
///
/// Lines without a colon continue the previous key. Single-valued keys
/// collapse to plain strings, except `Author`, which stays a list so a
/// lone author reads the same as several.
fn bip_style_front_matter(content: &str) -> Mapping {
    let mut entries: Vec<(String, Vec<String>)> = Vec::new();
    let mut current: Option<usize> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let values = vec![value.trim().to_string()];
            if let Some(position) = entries.iter().position(|(existing, _)| *existing == key) {
                entries[position].1 = values;
                current = Some(position);
            } else {
                entries.push((key, values));
                current = Some(entries.len() - 1);
            }
        } else if let Some(position) = current {
            entries[position].1.push(line.to_string());
        }
    }

    let mut metadata = Mapping::new();
    for (key, mut values) in entries {
        let value = if values.len() == 1 && key != "Author" {
            Value::String(values.remove(0))
        } else {
            Value::Sequence(values.into_iter().map(Value::String).collect())
        };
        metadata.insert(Value::String(key), value);
    }
    metadata
}

/// String-typed metadata lookup; non-string values read as absent
pub fn metadata_string<'a>(metadata: &'a Mapping, key: &str) -> Option<&'a str> {
    match metadata.get(key) {
        Some(Value::String(value)) => Some(value.as_str()),
        _ => None,
    }
}

/// Document title: front matter first, then the first markdown heading
pub fn front_matter_title(metadata: &Mapping, body: &str) -> String {
    if let Some(title) =
        metadata_string(metadata, "title").or_else(|| metadata_string(metadata, "Title"))
    {
        return title.to_string();
    }
    if let Some(heading) = first_heading().captures(body).and_then(|c| c.get(1)) {
        return heading.as_str().trim().to_string();
    }
    "Untitled".to_string()
}

/// Creation date from front matter
///
/// A `date` key must hold `YYYY-MM-DD`; anything else fails the file. A
/// `Created` key passes through unvalidated, as the older documents wrote
/// that field in the same shape by convention.
pub fn front_matter_created_at(metadata: &Mapping) -> Result<Option<String>, ExtractError> {
    if let Some(date) = metadata_string(metadata, "date") {
        return match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(parsed) => Ok(Some(parsed.format("%Y-%m-%d").to_string())),
            Err(_) => Err(ExtractError::UnparseableDate(date.to_string())),
        };
    }
    Ok(metadata_string(metadata, "Created").map(str::to_string))
}

/// Document language, defaulting to English
pub fn front_matter_language(metadata: &Mapping) -> String {
    metadata_string(metadata, "lang").unwrap_or("en").to_string()
}

/// Author list from either the `authors` or `Author` key
///
/// Either key may hold a single string or a list; embedded email
/// addresses in angle brackets are stripped from each entry.
pub fn front_matter_authors(metadata: &Mapping) -> Option<Vec<String>> {
    let raw = metadata
        .get("authors")
        .filter(|value| has_content(value))
        .or_else(|| metadata.get("Author").filter(|value| has_content(value)))?;

    let authors: Vec<String> = match raw {
        Value::String(author) => vec![strip_emails(author)],
        Value::Sequence(list) => list
            .iter()
            .filter_map(|value| value.as_str().map(strip_emails))
            .collect(),
        _ => return None,
    };

    if authors.is_empty() {
        None
    } else {
        Some(authors)
    }
}

/// Tag list; a bare string reads as a single tag
pub fn front_matter_tags(metadata: &Mapping) -> Option<Vec<String>> {
    match metadata.get("tags")? {
        Value::String(tag) => Some(vec![tag.clone()]),
        Value::Sequence(list) => {
            let tags: Vec<String> = list
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect();
            if tags.is_empty() {
                None
            } else {
                Some(tags)
            }
        }
        _ => None,
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        _ => true,
    }
}
