//! Gleaner main entry point
//!
//! Command-line interface for the gleaner content indexer: scrape runs,
//! source inspection, selector validation, and run history.

use anyhow::Context;
use clap::{Parser, Subcommand};
use gleaner::config::{self, SourceKind, SourceManifest};
use gleaner::crawler::DEFAULT_REQUEST_DELAY;
use gleaner::validator::{self, ConfigValidator};
use gleaner::{output, runner};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gleaner: declarative crawling and indexing for forum and
/// repository-hosted sources
#[derive(Parser, Debug)]
#[command(name = "gleaner")]
#[command(version)]
#[command(about = "Declarative crawling and indexing engine", long_about = None)]
struct Cli {
    /// Path to the source manifest
    #[arg(long, global = true, default_value = "gleaner.toml", value_name = "FILE")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one source end to end
    Scrape {
        /// Source name from the manifest
        #[arg(long)]
        source: String,

        /// Output backend to write to
        #[arg(long, default_value = "sqlite")]
        output: String,
    },

    /// List every configured source
    ListSources,

    /// Print the resolved configuration of one source
    ShowConfig {
        #[arg(long)]
        source: String,
    },

    /// Dry-run a selector configuration against live pages
    Validate {
        #[arg(long)]
        source: String,

        /// Resource page to sample (defaults to the first test resource)
        #[arg(long)]
        resource_url: Option<String>,

        /// Pagination pages to follow per page type
        #[arg(long, default_value_t = 2)]
        max_pages: usize,

        /// Emit the report as JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Write a starter selector file for a web source
    Init {
        #[arg(long)]
        source: String,
    },

    /// Show recent run records
    Runs {
        /// Restrict to one source
        #[arg(long)]
        source: Option<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Output backend to read from
        #[arg(long, default_value = "sqlite")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading manifest from: {}", cli.config.display());
    let manifest = SourceManifest::load(&cli.config)
        .with_context(|| format!("failed to load manifest {}", cli.config.display()))?;

    match cli.command {
        Command::Scrape { source, output } => handle_scrape(&manifest, &source, &output).await,
        Command::ListSources => {
            handle_list_sources(&manifest);
            Ok(())
        }
        Command::ShowConfig { source } => handle_show_config(&manifest, &source),
        Command::Validate {
            source,
            resource_url,
            max_pages,
            json,
        } => handle_validate(&manifest, &source, resource_url, max_pages, json).await,
        Command::Init { source } => handle_init(&manifest, &source),
        Command::Runs {
            source,
            limit,
            output,
        } => handle_runs(&manifest, source.as_deref(), limit, &output).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gleaner=info,warn"),
            1 => EnvFilter::new("gleaner=debug,info"),
            2 => EnvFilter::new("gleaner=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn handle_scrape(
    manifest: &SourceManifest,
    source: &str,
    output: &str,
) -> anyhow::Result<()> {
    let summary = runner::run_source(manifest, source, output).await?;

    let duration = summary.record.duration_seconds().unwrap_or(0);
    println!("✓ Run finished in {}s: {}", duration, summary.index);
    println!(
        "  {} resources to process, {} documents indexed",
        summary.record.stats.resources_to_process, summary.record.stats.documents_indexed
    );
    Ok(())
}

fn handle_list_sources(manifest: &SourceManifest) {
    let sources: Vec<_> = manifest.sources().collect();
    println!("Configured sources ({}):", sources.len());
    for (kind, source) in sources {
        println!("  - {} ({}): {}", source.name, kind, source.url);
    }
}

fn handle_show_config(manifest: &SourceManifest, name: &str) -> anyhow::Result<()> {
    let (kind, source) = manifest.require(name)?;

    println!("Source: {} ({})", source.name, kind);
    println!("  Domain: {}", source.domain);
    println!("  URL: {}", source.url);
    if source.filter_by_author {
        println!(
            "  Author filtering: enabled ({} authors of interest)",
            manifest.allow_list(source).len()
        );
    }
    if !source.processors.is_empty() {
        println!("  Processors: {}", source.processors.join(", "));
    }
    if let Some(doc_type) = &source.doc_type {
        println!("  Type: {}", doc_type);
    }
    if source.has_test_resources() {
        println!("  Test resources: {}", source.test_resources.len());
    }

    match kind {
        SourceKind::Web => {
            let path = config::selector_path(&manifest.settings.selectors_dir, &source.name);
            if path.exists() {
                let scraping =
                    config::load_selector_file(&manifest.settings.selectors_dir, &source.name)?;
                println!("  Selector file: {} (valid)", path.display());
                println!(
                    "    Index items: {}",
                    scraping.index_page.items.item_selector.selector
                );
                println!(
                    "    Resource items: {}",
                    scraping.resource_page.items.item_selector.selector
                );
            } else {
                println!("  Selector file: {} (missing)", path.display());
            }
        }
        SourceKind::Repository => {
            println!("  File extensions: {}", source.file_extensions.join(", "));
            if let Some(directories) = &source.directories {
                println!("  Directories:");
                for (prefix, doc_type) in directories {
                    println!("    {prefix} -> {doc_type}");
                }
            }
        }
    }

    Ok(())
}

async fn handle_validate(
    manifest: &SourceManifest,
    name: &str,
    resource_url: Option<String>,
    max_pages: usize,
    json: bool,
) -> anyhow::Result<()> {
    let (kind, source) = manifest.require(name)?;
    anyhow::ensure!(
        kind == SourceKind::Web,
        "source '{}' is not a web source; only selector configurations can be validated",
        name
    );

    let scraping = config::load_selector_file(&manifest.settings.selectors_dir, &source.name)?;
    let resource_url = resource_url
        .or_else(|| source.test_resources.first().cloned())
        .context("no resource page to sample: pass --resource-url or configure test-resources")?;
    let delay = source
        .request_delay_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or(DEFAULT_REQUEST_DELAY);

    let mut dry_run = ConfigValidator::new(
        &source.name,
        &source.url,
        &resource_url,
        scraping,
        max_pages,
        delay,
    )?;
    let tree = dry_run.validate().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{}", validator::render(&tree));
    }

    if tree.has_failures() {
        anyhow::bail!("validation reported failures");
    }
    if !json {
        println!("\n✓ Configuration is valid");
    }
    Ok(())
}

fn handle_init(manifest: &SourceManifest, name: &str) -> anyhow::Result<()> {
    let (kind, source) = manifest.require(name)?;
    anyhow::ensure!(
        kind == SourceKind::Web,
        "source '{}' is not a web source; repository sources need no selector file",
        name
    );

    let path = config::init_selector_file(&manifest.settings.selectors_dir, &source.name)?;
    println!("✓ Wrote selector template to {}", path.display());
    println!("  Edit the selectors, then check them with: gleaner validate --source {name}");
    Ok(())
}

async fn handle_runs(
    manifest: &SourceManifest,
    source: Option<&str>,
    limit: usize,
    output_name: &str,
) -> anyhow::Result<()> {
    let mut output = output::create(output_name, &manifest.settings)?;
    let runs = output.recent_runs(source, limit).await?;

    if runs.is_empty() {
        println!("No recorded runs");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<20} {:<8} {:>10} {:>10}",
        "SOURCE", "SCRAPER", "STARTED", "STATUS", "RESOURCES", "INDEXED"
    );
    for run in &runs {
        println!(
            "{:<20} {:<12} {:<20} {:<8} {:>10} {:>10}",
            run.source,
            run.scraper,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            if run.success { "ok" } else { "failed" },
            run.stats.resources_to_process,
            run.stats.documents_indexed
        );
        if let Some(error) = &run.error_message {
            println!("    error: {error}");
        }
    }

    output.close().await?;
    Ok(())
}
