//! Stable document identity derived from URLs
//!
//! Forum permalinks embed an identifier in one of a few recognizable shapes.
//! The derivation tries explicit message and post identifiers first, falls
//! back to a slug of the last path segment, and hashes the whole URL as a
//! last resort, so re-crawling the same item always produces the same id.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use url::Url;

static ID_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn id_patterns() -> &'static [Regex] {
    ID_PATTERNS.get_or_init(|| {
        [
            r"msg(\d+)",
            r"post-(\d+)",
            r"#(\d+)",
            r"[#/]([a-zA-Z0-9-]+)$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("static pattern"))
        .collect()
    })
}

/// Derives a deterministic document id from an item permalink
///
/// The id is prefixed with the source name so ids from different sources
/// never collide in a shared index.
pub fn id_from_url(source: &str, url: &Url) -> String {
    let url_str = url.as_str();

    for pattern in id_patterns() {
        if let Some(m) = pattern.captures(url_str).and_then(|c| c.get(1)) {
            return format!("{}-{}", source, m.as_str());
        }
    }

    let last_segment = url
        .path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let slug = slugify(last_segment);
    if !slug.is_empty() {
        return format!("{}-{}", source, slug);
    }

    let digest = Sha256::digest(url_str.as_bytes());
    let encoded = hex::encode(digest);
    format!("{}-{}", source, &encoded[..12])
}

/// Converts a string to a URL-friendly slug
///
/// Whitespace and underscore runs become single hyphens, everything that is
/// not ASCII alphanumeric or a hyphen is dropped, and the result is
/// lowercased with leading and trailing hyphens stripped.
pub fn slugify(value: &str) -> String {
    let mut dashed = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if !c.is_ascii() {
            continue;
        }
        if c.is_ascii_whitespace() || c == '_' {
            pending_dash = true;
        } else {
            if pending_dash {
                dashed.push('-');
                pending_dash = false;
            }
            if c.is_ascii_alphanumeric() || c == '-' {
                dashed.push(c);
            }
        }
    }
    dashed.trim_matches('-').to_ascii_lowercase()
}

/// Pagination query parameters with no bearing on thread identity
const PAGINATION_PARAMS: &[&str] = &["page", "p", "start", "msg", "pagination"];

/// Canonical thread URL: the page URL with pagination parameters removed
///
/// Remaining parameters keep their order; parameters without a value are
/// dropped along with the pagination ones.
pub fn default_thread_url(url: &Url) -> String {
    let query = match url.query() {
        Some(query) if !query.is_empty() => query,
        _ => return url.to_string(),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| {
            param.split_once('=').is_some_and(|(name, _)| {
                !PAGINATION_PARAMS.contains(&name.to_ascii_lowercase().as_str())
            })
        })
        .collect();

    let mut clean = url.clone();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.set_query(Some(&kept.join("&")));
    }
    clean.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_id_from_message_url() {
        let id = id_from_url(
            "bitcointalk",
            &url("https://bitcointalk.org/index.php?topic=5399289.msg61980798#msg61980798"),
        );
        assert_eq!(id, "bitcointalk-61980798");
    }

    #[test]
    fn test_id_from_post_url() {
        let id = id_from_url("forum", &url("https://forum.example.com/thread/post-4871"));
        assert_eq!(id, "forum-4871");
    }

    #[test]
    fn test_id_from_fragment() {
        let id = id_from_url("forum", &url("https://forum.example.com/thread.html#42"));
        assert_eq!(id, "forum-42");
    }

    #[test]
    fn test_id_from_trailing_identifier() {
        let id = id_from_url("list", &url("https://lists.example.com/archive/2024-March"));
        assert_eq!(id, "list-2024-March");
    }

    #[test]
    fn test_id_from_slugged_path_segment() {
        let id = id_from_url("wiki", &url("https://wiki.example.com/Some_Page.html"));
        assert_eq!(id, "wiki-some-pagehtml");
    }

    #[test]
    fn test_id_hash_fallback() {
        let id = id_from_url("site", &url("https://example.com/"));
        assert!(id.starts_with("site-"));
        assert_eq!(id.len(), "site-".len() + 12);
        // Deterministic across calls
        assert_eq!(id, id_from_url("site", &url("https://example.com/")));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("snake_case_name"), "snake-case-name");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
        assert_eq!(slugify("bip-0001.mediawiki"), "bip-0001mediawiki");
        assert_eq!(slugify("déjà"), "dj");
        assert_eq!(slugify("..."), "");
    }

    #[test]
    fn test_thread_url_strips_pagination_params() {
        assert_eq!(
            default_thread_url(&url("https://forum.example.com/viewtopic?t=99&start=20")),
            "https://forum.example.com/viewtopic?t=99"
        );
        assert_eq!(
            default_thread_url(&url("https://forum.example.com/t/thing?Page=3")),
            "https://forum.example.com/t/thing"
        );
    }

    #[test]
    fn test_thread_url_keeps_other_params_and_fragment() {
        assert_eq!(
            default_thread_url(&url("https://forum.example.com/v?t=99&sort=new&page=2#anchor")),
            "https://forum.example.com/v?t=99&sort=new#anchor"
        );
    }

    #[test]
    fn test_thread_url_without_query() {
        assert_eq!(
            default_thread_url(&url("https://forum.example.com/thread/123")),
            "https://forum.example.com/thread/123"
        );
    }
}
