//! Selector configuration dry runs
//!
//! Before a new selector file goes anywhere near a real crawl, the
//! validator exercises it against a bounded number of live pages: one
//! index page and one sample resource page, each followed through
//! pagination up to a small page budget. Field extraction runs on the
//! first item only, collecting a display sample per configured field.
//! Failures never abort sibling checks; everything lands in one report.

mod report;

pub use report::{build_tree, render, NodeStatus, ValidationNode};

use crate::config::{ItemConfig, PageConfig, ScrapingConfig, SelectorConfig};
use crate::crawler::Fetcher;
use crate::extract;
use crate::Result;
use scraper::{ElementRef, Html};
use std::time::Duration;
use url::Url;

/// Outcome of checking one configured field against the first item
#[derive(Debug, Clone)]
pub struct FieldCheck {
    pub sample: Option<String>,
    pub error: Option<String>,
}

/// Everything observed while validating one page type
#[derive(Debug, Clone)]
pub struct PageValidation {
    pub start_url: String,
    pub items_selector: String,
    pub items_count: usize,
    /// Field checks in configuration order, first page only
    pub fields: Vec<(String, FieldCheck)>,
    pub pagination_selector: Option<String>,
    pub pages_validated: usize,
    pub page_urls: Vec<String>,
    pub errors: Vec<String>,
}

struct PageCheck {
    items_count: usize,
    fields: Vec<(String, FieldCheck)>,
    next_url: Option<Url>,
    errors: Vec<String>,
}

/// Live dry run of one source's scraping configuration
pub struct ConfigValidator {
    source_name: String,
    source_url: String,
    resource_url: String,
    scraping: ScrapingConfig,
    max_pages: usize,
    fetcher: Fetcher,
}

impl ConfigValidator {
    pub fn new(
        source_name: &str,
        source_url: &str,
        resource_url: &str,
        scraping: ScrapingConfig,
        max_pages: usize,
        delay: Duration,
    ) -> Result<ConfigValidator> {
        // The fetcher's politeness delay doubles as the inter-page delay
        let fetcher = Fetcher::new(None, delay)?;
        Ok(ConfigValidator {
            source_name: source_name.to_string(),
            source_url: source_url.to_string(),
            resource_url: resource_url.to_string(),
            scraping,
            max_pages,
            fetcher,
        })
    }

    /// Validates both page types and assembles the report tree
    pub async fn validate(&mut self) -> ValidationNode {
        let index_config = self.scraping.index_page.clone();
        let index_url = self.source_url.clone();
        let index = self.validate_page(&index_url, &index_config).await;

        let resource_config = self.scraping.resource_page.clone();
        let resource_url = self.resource_url.clone();
        let resource = self.validate_page(&resource_url, &resource_config).await;

        build_tree(&self.source_name, &index, &resource)
    }

    async fn validate_page(&mut self, start_url: &str, config: &PageConfig) -> PageValidation {
        let mut page = PageValidation {
            start_url: start_url.to_string(),
            items_selector: config.items.item_selector.selector.clone(),
            items_count: 0,
            fields: Vec::new(),
            pagination_selector: config.next_page.as_ref().map(|next| next.selector.clone()),
            pages_validated: 0,
            page_urls: Vec::new(),
            errors: Vec::new(),
        };

        let mut current = match Url::parse(start_url) {
            Ok(url) => Some(url),
            Err(e) => {
                page.errors.push(format!("Invalid URL {start_url}: {e}"));
                return page;
            }
        };

        while let Some(url) = current.take() {
            if page.pages_validated >= self.max_pages {
                break;
            }
            page.page_urls.push(url.to_string());

            let outcome = self.check_single_page(&url, config).await;

            // Item and field results come from the first page only
            if page.pages_validated == 0 {
                page.items_count = outcome.items_count;
                page.fields = outcome.fields;
                page.errors.extend(outcome.errors);
            }
            page.pages_validated += 1;

            current = outcome.next_url;
        }

        page
    }

    async fn check_single_page(&mut self, url: &Url, config: &PageConfig) -> PageCheck {
        match self.fetcher.fetch_text(url).await {
            Ok(page) => inspect_page(&page.body, &page.url, config),
            Err(e) => PageCheck {
                items_count: 0,
                fields: Vec::new(),
                next_url: None,
                errors: vec![e.to_string()],
            },
        }
    }
}

fn inspect_page(body: &str, page_url: &Url, config: &PageConfig) -> PageCheck {
    let html = Html::parse_document(body);
    let mut outcome = PageCheck {
        items_count: 0,
        fields: Vec::new(),
        next_url: None,
        errors: Vec::new(),
    };

    let items = match extract::extract_items(&html, &config.items.item_selector) {
        Ok(items) => items,
        Err(e) => {
            outcome.errors.push(e.to_string());
            return outcome;
        }
    };
    outcome.items_count = items.len();

    if let Some(first) = items.first() {
        outcome.fields = check_fields(*first, &config.items);
    }

    if let Some(next_config) = &config.next_page {
        match extract::extract_next_page(&html, next_config, page_url) {
            Ok(next) => outcome.next_url = next,
            Err(e) => outcome.errors.push(e.to_string()),
        }
    }

    outcome
}

fn check_fields(item: ElementRef, config: &ItemConfig) -> Vec<(String, FieldCheck)> {
    let configured = [
        ("title", &config.title),
        ("author", &config.author),
        ("date", &config.date),
        ("content", &config.content),
        ("url", &config.url),
    ];

    let mut checks = Vec::new();
    for (name, field_config) in configured {
        let Some(field_config) = field_config else {
            continue;
        };
        checks.push((name.to_string(), check_field(item, field_config, name)));
    }
    checks
}

fn check_field(item: ElementRef, config: &SelectorConfig, field_name: &str) -> FieldCheck {
    match extract::extract_field(item, config, &raw_markup) {
        Ok(Some(field)) => FieldCheck {
            sample: Some(sample_of(field_name, &field.text)),
            error: None,
        },
        Ok(None) => FieldCheck {
            sample: None,
            error: Some("No content extracted".to_string()),
        },
        Err(e) => FieldCheck {
            sample: None,
            error: Some(e.to_string()),
        },
    }
}

/// Validation inspects what the page really serves, with no markup hooks
fn raw_markup(markup: &str) -> String {
    markup.to_string()
}

/// Display sample: long content shows its head and tail, everything else
/// is clipped at 100 characters
fn sample_of(field_name: &str, value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if field_name == "content" && chars.len() > 100 {
        let start: String = chars[..50].iter().collect();
        let end: String = chars[chars.len() - 50..].iter().collect();
        format!("{}...{}", start.trim_end(), end.trim_start())
    } else {
        chars.into_iter().take(100).collect()
    }
}
