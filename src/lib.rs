//! Gleaner: a configuration-driven content ingestion engine
//!
//! This crate crawls web forums and mailing-list archives through declarative
//! selector configurations, syncs git-backed document repositories by commit
//! diff, and upserts the resulting normalized documents idempotently into a
//! local index, recording an audit row for every run.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod processor;
pub mod runner;
pub mod sync;
pub mod validator;

use thiserror::Error;

/// Main error type for Gleaner operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Processor error: {0}")]
    Processor(#[from] processor::ProcessError),

    #[error("git {operation} failed for {repo}: {detail}")]
    Git {
        operation: String,
        repo: String,
        detail: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown source '{name}' (available: {available})")]
    UnknownSource { name: String, available: String },

    #[error("Unknown processor '{0}'")]
    UnknownProcessor(String),

    #[error("Unknown output '{0}' (available: sqlite, memory)")]
    UnknownOutput(String),

    #[error("Invalid CSS selector '{selector}' in {context}")]
    InvalidSelector { selector: String, context: String },

    #[error("Invalid regex pattern '{pattern}' in {context}: {detail}")]
    InvalidPattern {
        pattern: String,
        context: String,
        detail: String,
    },
}

/// Extraction-specific errors
///
/// These surface only for item-level problems the spider recovers from
/// locally; field absence is never an error.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid CSS selector: {0}")]
    Selector(String),

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("Item has no title")]
    MissingTitle,

    #[error("Unparseable date: {0}")]
    UnparseableDate(String),
}

/// Result type alias for Gleaner operations
pub type Result<T> = std::result::Result<T, GleanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{ScrapingConfig, SelectorConfig, Settings, SourceConfig, SourceKind, SourceManifest};
pub use model::{OriginalContent, RunRecord, RunStats, ScrapedDocument};
pub use output::{IndexStats, Output};
