//! Run orchestration
//!
//! One run = one source, one scraper, one output. The runner resolves
//! configuration eagerly (an unknown source, processor, or output name
//! fails before anything is fetched and before any run is recorded),
//! then wraps the scrape in a [`RunRecord`] that is persisted exactly
//! once, successful or not. Runs driven by a source's `test-resources`
//! list are never recorded; they exist to exercise configuration, not to
//! advance incremental state.

use crate::config::{self, SourceKind, SourceManifest};
use crate::crawler::Spider;
use crate::model::{RunRecord, RunStats};
use crate::output::{self, IndexStats, Output};
use crate::processor::Pipeline;
use crate::sync::RepoScraper;
use crate::{GleanError, Result};
use async_trait::async_trait;

/// What a scraper reports when it finishes cleanly
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Resources discovered (web) or files eligible (repo)
    pub resources_to_process: u64,

    /// Documents handed to the output layer
    pub documents_indexed: u64,

    /// HEAD commit after a repository sync
    pub last_commit_hash: Option<String>,
}

/// One source-shaped ingestion strategy
#[async_trait]
pub trait Scraper: Send {
    /// Label recorded with every run ("spider" or "repository")
    fn kind(&self) -> &'static str;

    async fn scrape(&mut self, output: &mut dyn Output) -> Result<ScrapeStats>;
}

/// Everything a finished run has to show for itself
pub struct RunSummary {
    pub record: RunRecord,
    pub index: IndexStats,
}

/// Runs one source end to end against the named output
pub async fn run_source(
    manifest: &SourceManifest,
    source_name: &str,
    output_name: &str,
) -> Result<RunSummary> {
    // Configuration phase. Nothing here counts as a run yet.
    let (kind, source) = manifest.require(source_name)?;
    let mut output = output::create(output_name, &manifest.settings)?;
    let pipeline = Pipeline::from_names(&source.processors)?;
    let test_mode = source.has_test_resources();

    let mut scraper: Box<dyn Scraper> = match kind {
        SourceKind::Web => {
            let scraping =
                config::load_selector_file(&manifest.settings.selectors_dir, &source.name)?;
            let allow_list = manifest.allow_list(source);
            Box::new(Spider::new(
                source.clone(),
                scraping,
                pipeline,
                &manifest.settings,
                allow_list,
            )?)
        }
        SourceKind::Repository => Box::new(RepoScraper::new(
            source.clone(),
            manifest.settings.clone(),
            pipeline,
        )),
    };

    let mut record = RunRecord::begin(scraper.kind(), &source.name, &source.domain);
    tracing::info!("Starting {} run for source '{}'", scraper.kind(), source.name);

    let scrape_result = scraper.scrape(output.as_mut()).await;
    let flush_result = output.flush().await;

    let outcome = match (scrape_result, flush_result) {
        (Ok(stats), Ok(())) => Ok(stats),
        (Ok(_), Err(e)) => Err(GleanError::Output(e)),
        (Err(e), _) => Err(e),
    };

    match &outcome {
        Ok(stats) => {
            record.complete(
                RunStats {
                    resources_to_process: stats.resources_to_process,
                    documents_indexed: stats.documents_indexed,
                },
                stats.last_commit_hash.clone(),
            );
            tracing::info!(
                "Run for '{}' finished: {} resources, {} documents ({})",
                source.name,
                stats.resources_to_process,
                stats.documents_indexed,
                output.stats()
            );
        }
        Err(e) => {
            record.fail(&e.to_string());
            tracing::error!("Run for '{}' failed: {}", source.name, e);
        }
    }

    if test_mode {
        tracing::info!("Test resources configured; run not recorded");
    } else if let Err(e) = output.record_run(&record).await {
        tracing::error!("Failed to record run for '{}': {}", source.name, e);
    }

    let index = output.stats();
    if let Err(e) = output.close().await {
        tracing::error!("Failed to close output: {}", e);
    }

    outcome.map(move |_| RunSummary { record, index })
}
