use crate::config::selectors::{PageConfig, ScrapingConfig, SelectorConfig};
use crate::config::types::SourceManifest;
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire source manifest
pub fn validate_manifest(manifest: &SourceManifest) -> Result<(), ConfigError> {
    validate_settings(manifest)?;
    validate_sources(manifest)?;
    Ok(())
}

/// Validates the `[settings]` table
fn validate_settings(manifest: &SourceManifest) -> Result<(), ConfigError> {
    if manifest.settings.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "settings.batch-size must be >= 1, got {}",
            manifest.settings.batch_size
        )));
    }
    Ok(())
}

/// Validates every declared source
fn validate_sources(manifest: &SourceManifest) -> Result<(), ConfigError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for (kind, source) in manifest.sources() {
        if source.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} source with empty name",
                kind
            )));
        }

        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        if source.url.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' has an empty url",
                source.name
            )));
        }

        Url::parse(&source.domain).map_err(|e| {
            ConfigError::Validation(format!(
                "source '{}' domain '{}': {}",
                source.name, source.domain, e
            ))
        })?;

        if let Some(delay) = source.request_delay_ms {
            if delay < 1 {
                return Err(ConfigError::Validation(format!(
                    "source '{}' request-delay-ms must be >= 1, got {}",
                    source.name, delay
                )));
            }
        }

        if kind == crate::config::SourceKind::Web && source.directories.is_some() {
            return Err(ConfigError::Validation(format!(
                "web source '{}' sets 'directories', which only applies to repo sources",
                source.name
            )));
        }
    }

    Ok(())
}

/// Validates a selector configuration eagerly
///
/// Every CSS selector must parse and every regex pattern must compile, so
/// that a typo fails the run before the first fetch rather than in the
/// middle of a crawl.
pub fn validate_scraping_config(config: &ScrapingConfig) -> Result<(), ConfigError> {
    validate_page("index-page", &config.index_page)?;
    validate_page("resource-page", &config.resource_page)?;
    Ok(())
}

/// Validates one traversal level of a selector configuration
fn validate_page(context: &str, page: &PageConfig) -> Result<(), ConfigError> {
    let items = &page.items;
    validate_selector(
        &format!("{context}.items.item-selector"),
        &items.item_selector,
    )?;

    for (name, field) in [
        ("title", &items.title),
        ("author", &items.author),
        ("date", &items.date),
        ("content", &items.content),
        ("url", &items.url),
    ] {
        if let Some(selector) = field {
            validate_selector(&format!("{context}.items.{name}"), selector)?;
        }
    }

    if let Some(next_page) = &page.next_page {
        validate_selector(&format!("{context}.next-page"), next_page)?;
    }

    if let Some(pattern) = &page.url_pattern {
        compile_pattern(&format!("{context}.url-pattern"), pattern)?;
    }

    Ok(())
}

/// Validates one selector block
fn validate_selector(context: &str, config: &SelectorConfig) -> Result<(), ConfigError> {
    if Selector::parse(&config.selector).is_err() {
        return Err(ConfigError::InvalidSelector {
            selector: config.selector.clone(),
            context: context.to_string(),
        });
    }

    if let Some(pattern) = &config.pattern {
        compile_pattern(context, pattern)?;
    }

    Ok(())
}

/// Compiles a regex pattern, mapping failure to a configuration error
fn compile_pattern(context: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        context: context.to_string(),
        detail: e.to_string(),
    })
}
