//! The crawl state machine
//!
//! A crawl walks three page levels: the index page listing resources, each
//! resource's first page, and that resource's later pages via pagination.
//! Tasks drain from a single FIFO queue, one fetch at a time, so the
//! politeness delay in the fetcher bounds the request rate without any
//! further coordination.
//!
//! A source configured with `test-resources` skips index discovery and
//! pagination entirely and crawls exactly the listed resource pages.

use crate::config::{PageConfig, ScrapingConfig, Settings, SourceConfig};
use crate::crawler::behavior::{behavior_for, SourceBehavior};
use crate::crawler::fetcher::{Fetcher, DEFAULT_REQUEST_DELAY};
use crate::extract;
use crate::model::ScrapedDocument;
use crate::output::Output;
use crate::processor::Pipeline;
use crate::runner::{ScrapeStats, Scraper};
use crate::{ExtractError, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

/// One unit of crawl work
enum CrawlTask {
    /// An index page listing resources; `seed` marks the configured entry
    /// point, whose failure is fatal to the run
    Index { url: Url, seed: bool },

    /// A resource page; only the first page of a resource can hold its
    /// original post
    Resource { url: Url, first_page: bool },

    /// A parsed item awaiting its permalink visit
    Item { url: Url, document: ScrapedDocument },
}

/// Configuration-driven forum crawler
pub struct Spider {
    source: SourceConfig,
    scraping: ScrapingConfig,
    behavior: SourceBehavior,
    pipeline: Pipeline,
    fetcher: Fetcher,
    /// Lowercased author allow list, used when `filter_by_author` is set
    authors_of_interest: Vec<String>,
    queue: VecDeque<CrawlTask>,
    /// Already-enqueued page URLs; item permalinks are exempt
    seen: HashSet<String>,
    resources_to_process: u64,
    documents_indexed: u64,
}

/// Everything parsed out of one resource page
struct ResourcePageOutcome {
    documents: Vec<(Url, ScrapedDocument)>,
    next_page: Option<Url>,
}

impl Spider {
    pub fn new(
        source: SourceConfig,
        scraping: ScrapingConfig,
        pipeline: Pipeline,
        settings: &Settings,
        authors_of_interest: Vec<String>,
    ) -> Result<Spider> {
        let delay = source
            .request_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_DELAY);
        let fetcher = Fetcher::new(settings.user_agent.as_deref(), delay)?;
        let behavior = behavior_for(&source.name);

        Ok(Spider {
            source,
            scraping,
            behavior,
            pipeline,
            fetcher,
            authors_of_interest,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            resources_to_process: 0,
            documents_indexed: 0,
        })
    }

    fn seed_queue(&mut self) -> Result<()> {
        if self.source.has_test_resources() {
            tracing::info!(
                "Test resources configured for '{}'; skipping index discovery",
                self.source.name
            );
            let resources: Vec<Url> = self
                .source
                .test_resources
                .iter()
                .map(|raw| Url::parse(raw))
                .collect::<std::result::Result<_, _>>()?;
            for url in resources {
                self.enqueue_resource(url, true);
            }
        } else {
            let url = Url::parse(&self.source.url)?;
            self.seen.insert(url.to_string());
            self.queue.push_back(CrawlTask::Index { url, seed: true });
        }
        Ok(())
    }

    /// Enqueues a resource page unless its URL was already scheduled
    fn enqueue_resource(&mut self, url: Url, first_page: bool) {
        if !self.seen.insert(url.to_string()) {
            tracing::debug!("Already queued, skipping {}", url);
            return;
        }
        if first_page {
            self.resources_to_process += 1;
        }
        self.queue.push_back(CrawlTask::Resource { url, first_page });
    }

    async fn crawl_index(&mut self, url: &Url, seed: bool) -> Result<()> {
        let page = match self.fetcher.fetch_text(url).await {
            Ok(page) => page,
            Err(e) if seed => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping index page {}: {}", url, e);
                return Ok(());
            }
        };

        let (resources, next_page) = parse_index_page(&page.body, &page.url, &self.scraping.index_page)?;
        tracing::info!("Discovered {} resources on {}", resources.len(), page.url);

        for resource in resources {
            self.enqueue_resource(resource, true);
        }

        if let Some(next) = next_page {
            if self.seen.insert(next.to_string()) {
                tracing::info!("Following next index page");
                self.queue.push_back(CrawlTask::Index {
                    url: next,
                    seed: false,
                });
            }
        }
        Ok(())
    }

    async fn crawl_resource(&mut self, url: &Url, first_page: bool) -> Result<()> {
        let page = match self.fetcher.fetch_text(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Skipping resource page {}: {}", url, e);
                return Ok(());
            }
        };

        let outcome = self.parse_resource_page(&page.body, &page.url, first_page)?;

        for (item_url, document) in outcome.documents {
            self.queue.push_back(CrawlTask::Item {
                url: item_url,
                document,
            });
        }

        if let Some(next) = outcome.next_page {
            tracing::info!("Following pagination");
            self.enqueue_resource(next, false);
        }
        Ok(())
    }

    fn parse_resource_page(
        &self,
        body: &str,
        page_url: &Url,
        first_page: bool,
    ) -> std::result::Result<ResourcePageOutcome, ExtractError> {
        let config = &self.scraping.resource_page;
        let html = Html::parse_document(body);
        let thread_url = (self.behavior.thread_url)(page_url);

        let items = extract::extract_items(&html, &config.items.item_selector)?;
        tracing::debug!("Found {} items on page {}", items.len(), page_url);

        let mut documents = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match self.parse_item(item, page_url, &thread_url, first_page, index) {
                Ok(Some(parsed)) => documents.push(parsed),
                Ok(None) => {}
                Err(e) => tracing::warn!("Error parsing item on {}: {}", page_url, e),
            }
        }

        // Pagination is honored only outside test mode
        let next_page = match &config.next_page {
            Some(next_config) if !self.source.has_test_resources() => {
                extract::extract_next_page(&html, next_config, page_url)?
            }
            _ => None,
        };

        Ok(ResourcePageOutcome {
            documents,
            next_page,
        })
    }

    fn parse_item(
        &self,
        item: ElementRef,
        page_url: &Url,
        thread_url: &str,
        first_page: bool,
        index: usize,
    ) -> std::result::Result<Option<(Url, ScrapedDocument)>, ExtractError> {
        let items_config = &self.scraping.resource_page.items;
        let hook = self.behavior.process_markup;

        let mut author = match &items_config.author {
            Some(config) => extract::extract_field(item, config, &hook)?.map(|field| field.text),
            None => None,
        };
        if author.is_none() {
            author = self.source.default_author.clone();
        }

        if self.source.filter_by_author {
            match &author {
                None => {
                    tracing::debug!("Discarding item without author on {}", page_url);
                    return Ok(None);
                }
                Some(name) if !self.authors_of_interest.contains(&name.to_lowercase()) => {
                    tracing::debug!("Discarding item by '{}': not on the allow list", name);
                    return Ok(None);
                }
                Some(_) => {}
            }
        }

        let extracted_url = match &items_config.url {
            Some(config) => extract::extract_field(item, config, &hook)?.map(|field| field.text),
            None => None,
        };
        let item_url = match extracted_url {
            Some(href) => match (self.behavior.resolve_url)(page_url, &href) {
                Some(resolved) => resolved,
                None => {
                    tracing::warn!("Could not resolve item URL '{}' on {}", href, page_url);
                    return Ok(None);
                }
            },
            // Singleton pages are their own permalink
            None if !items_config.item_selector.multiple => page_url.clone(),
            None => {
                tracing::warn!(
                    "Could not extract item URL and page {} has multiple items",
                    page_url
                );
                return Ok(None);
            }
        };

        let title = match &items_config.title {
            Some(config) => extract::extract_field(item, config, &hook)?.map(|field| field.text),
            None => None,
        };
        let Some(title) = title else {
            return Err(ExtractError::MissingTitle);
        };

        // Empty body is legal: a post may consist entirely of stripped quotes
        let body = match &items_config.content {
            Some(config) => extract::extract_field(item, config, &hook)?.map(|field| field.text),
            None => None,
        }
        .unwrap_or_default();

        let id = (self.behavior.generate_id)(&self.source.name, &item_url);
        let mut document =
            ScrapedDocument::new(&id, &title, &body, &self.source.domain, item_url.as_str());
        document.doc_type = Some((self.behavior.determine_type)(first_page, index).to_string());
        document.authors = author.map(|author| vec![author]);

        if items_config.item_selector.multiple {
            document.thread_url = Some(thread_url.to_string());
        }

        if let Some(config) = &items_config.date {
            if let Some(field) = extract::extract_field(item, config, &hook)? {
                document.created_at = (self.behavior.parse_date)(&field.text);
                if document.created_at.is_none() {
                    tracing::warn!("Unparseable date '{}' for item {}", field.text, id);
                }
            }
        }

        Ok(Some((item_url, document)))
    }

    /// Visits an item's own page, then routes it through the pipeline into
    /// the output
    async fn visit_item(
        &mut self,
        url: Url,
        mut document: ScrapedDocument,
        output: &mut dyn Output,
    ) -> Result<()> {
        let page = match self.fetcher.fetch_text(&url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Skipping item {}: permalink fetch failed: {}", document.id, e);
                return Ok(());
            }
        };

        (self.behavior.customize)(&mut document, &page.body);

        let document = match self.pipeline.run(document).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Dropping document: {}", e);
                return Ok(());
            }
        };

        output.index_document(document).await?;
        self.documents_indexed += 1;
        Ok(())
    }
}

#[async_trait]
impl Scraper for Spider {
    fn kind(&self) -> &'static str {
        "spider"
    }

    async fn scrape(&mut self, output: &mut dyn Output) -> Result<ScrapeStats> {
        self.seed_queue()?;

        let start = std::time::Instant::now();
        let mut tasks_done = 0u64;

        while let Some(task) = self.queue.pop_front() {
            match task {
                CrawlTask::Index { url, seed } => self.crawl_index(&url, seed).await?,
                CrawlTask::Resource { url, first_page } => {
                    self.crawl_resource(&url, first_page).await?
                }
                CrawlTask::Item { url, document } => {
                    self.visit_item(url, document, output).await?
                }
            }

            tasks_done += 1;
            if tasks_done % 10 == 0 {
                tracing::info!(
                    "Progress: {} tasks done, {} queued, {} documents indexed",
                    tasks_done,
                    self.queue.len(),
                    self.documents_indexed
                );
            }
        }

        tracing::info!(
            "Crawl of '{}' complete: {} documents from {} resources in {:?}",
            self.source.name,
            self.documents_indexed,
            self.resources_to_process,
            start.elapsed()
        );

        Ok(ScrapeStats {
            resources_to_process: self.resources_to_process,
            documents_indexed: self.documents_indexed,
            last_commit_hash: None,
        })
    }
}

fn parse_index_page(
    body: &str,
    base: &Url,
    config: &PageConfig,
) -> std::result::Result<(Vec<Url>, Option<Url>), ExtractError> {
    let html = Html::parse_document(body);

    // An index-level url-pattern narrows which listed links are resources
    let mut link_config = config.items.item_selector.clone();
    if config.url_pattern.is_some() {
        link_config.pattern = config.url_pattern.clone();
    }
    let resources = extract::extract_links(&html, &link_config, base)?;

    let next_page = match &config.next_page {
        Some(next_config) => extract::extract_next_page(&html, next_config, base)?,
        None => None,
    };

    Ok((resources, next_page))
}
