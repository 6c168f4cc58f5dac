use crate::config::validation::validate_scraping_config;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How to locate and read one value out of an HTML subtree
///
/// The same four knobs drive every extraction in the engine: a CSS
/// `selector`, an optional `attribute` to read instead of text content,
/// a `multiple` flag marking repeated containers, and an optional regex
/// `pattern` refining (or, for link extraction, filtering) the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// CSS selector locating the element(s)
    pub selector: String,

    /// Attribute to read; when absent, text content is extracted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// True when the selector is expected to match repeatedly
    #[serde(default)]
    pub multiple: bool,

    /// Regex applied to the extracted value (first capture group wins)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl SelectorConfig {
    /// Shorthand for a plain text-content selector
    pub fn new(selector: &str) -> SelectorConfig {
        SelectorConfig {
            selector: selector.to_string(),
            attribute: None,
            multiple: false,
            pattern: None,
        }
    }

    /// Shorthand for an attribute selector
    pub fn with_attribute(selector: &str, attribute: &str) -> SelectorConfig {
        SelectorConfig {
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
            multiple: false,
            pattern: None,
        }
    }
}

/// Selectors for the items of one page and their fields
///
/// `item_selector` locates the item containers; the field selectors run
/// relative to each container. Every field is optional: a source that has
/// no per-item author simply omits the author selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ItemConfig {
    /// Locates the item containers (index pages: the resource links)
    pub item_selector: SelectorConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<SelectorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<SelectorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<SelectorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<SelectorConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<SelectorConfig>,
}

/// One traversal level: its items, its pagination, and an optional
/// URL shape check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PageConfig {
    pub items: ItemConfig,

    /// Locates the next-page link; absent means the level never paginates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<SelectorConfig>,

    /// Regex a page URL of this level is expected to match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
}

/// The complete selector configuration of one web source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScrapingConfig {
    /// The listing level: enumerates resource links
    pub index_page: PageConfig,

    /// The content level: holds the extractable items
    pub resource_page: PageConfig,
}

/// Path of the selector file for a named source
pub fn selector_path(selectors_dir: &Path, source: &str) -> PathBuf {
    selectors_dir.join(format!("{source}.toml"))
}

/// Loads and validates the selector configuration for a source
///
/// # Arguments
///
/// * `selectors_dir` - Directory holding per-source selector files
/// * `source` - Source name; the file is `<selectors_dir>/<source>.toml`
///
/// # Returns
///
/// * `Ok(ScrapingConfig)` - Parsed and eagerly validated configuration
/// * `Err(ConfigError)` - Missing file, TOML error, or an invalid
///   selector/pattern
pub fn load_selector_file(selectors_dir: &Path, source: &str) -> Result<ScrapingConfig, ConfigError> {
    let path = selector_path(selectors_dir, source);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        ConfigError::Validation(format!(
            "selector file {} for source '{source}': {e}",
            path.display()
        ))
    })?;

    let config: ScrapingConfig = toml::from_str(&content)?;
    validate_scraping_config(&config)?;

    Ok(config)
}

/// A commented starter selector file for a new source
pub fn selector_template(source: &str) -> String {
    format!(
        r#"# Selector configuration for '{source}'
#
# Each selector block takes:
#   selector  = CSS selector (required)
#   attribute = attribute to read instead of text content
#   multiple  = true when the selector matches repeatedly
#   pattern   = regex refining the value (first capture group wins)

[index-page.items.item-selector]
selector = "a.topic-link"
attribute = "href"
multiple = true

[index-page.next-page]
selector = "a.next"
attribute = "href"

[resource-page.items.item-selector]
selector = "div.post"
multiple = true

[resource-page.items.title]
selector = "h3.subject"

[resource-page.items.author]
selector = "a.username"

[resource-page.items.date]
selector = "span.post-date"

[resource-page.items.content]
selector = "div.post-body"

[resource-page.items.url]
selector = "a.permalink"
attribute = "href"

[resource-page.next-page]
selector = "a.next"
attribute = "href"
"#
    )
}

/// Writes a starter selector file for a new source
///
/// Refuses to overwrite an existing file.
pub fn init_selector_file(selectors_dir: &Path, source: &str) -> Result<PathBuf, ConfigError> {
    let path = selector_path(selectors_dir, source);
    if path.exists() {
        return Err(ConfigError::Validation(format!(
            "selector file {} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, selector_template(source))?;
    Ok(path)
}
