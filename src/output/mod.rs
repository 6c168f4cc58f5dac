//! Output layer
//!
//! Outputs receive parsed documents, buffer them, and upsert them
//! idempotently into an index keyed by document id:
//!
//! - a new id inserts the document
//! - an id whose stored content hash matches the incoming one is a no-op
//! - anything else updates, merging only the fields the incoming document
//!   actually provides (an absent optional field never erases a stored one)
//!
//! Outputs also persist [`RunRecord`]s, which is what the incremental sync
//! engine reads to find the last successful run of a source.

mod memory;
mod sqlite_output;

pub use memory::MemoryOutput;
pub use sqlite_output::SqliteOutput;

use crate::config::Settings;
use crate::model::{RunRecord, ScrapedDocument};
use crate::ConfigError;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors from the output layer
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Counters for one output's lifetime, across all flushes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Documents written for the first time
    pub inserted: u64,

    /// Documents whose stored content was replaced
    pub updated: u64,

    /// Upserts skipped because the content hash matched
    pub unchanged: u64,

    /// Documents that could not be written
    pub failed: u64,
}

impl IndexStats {
    /// Documents that reached the index in some form
    pub fn indexed(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} unchanged, {} failed",
            self.inserted, self.updated, self.unchanged, self.failed
        )
    }
}

/// Where one upsert landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// A destination for documents and run records
///
/// `index_document` buffers; a flush happens when the buffer reaches the
/// configured batch size, on an explicit `flush`, and on `close`. A flush
/// is atomic per document, not per batch: one failing document is logged
/// and counted, the rest of the batch still lands.
#[async_trait]
pub trait Output: Send {
    fn name(&self) -> &'static str;

    /// Stamps `indexed_at` and buffers the document for the next flush
    async fn index_document(&mut self, document: ScrapedDocument) -> OutputResult<()>;

    /// Writes out everything buffered
    async fn flush(&mut self) -> OutputResult<()>;

    /// Flushes and releases the output
    async fn close(&mut self) -> OutputResult<()>;

    /// The most recent run of this source that finished with `success=true`
    async fn get_last_successful_run(&mut self, source: &str) -> OutputResult<Option<RunRecord>>;

    /// Persists a finished run record
    async fn record_run(&mut self, record: &RunRecord) -> OutputResult<()>;

    /// Recent runs, newest first, optionally restricted to one source
    async fn recent_runs(&mut self, source: Option<&str>, limit: usize)
        -> OutputResult<Vec<RunRecord>>;

    /// Lifetime counters for this output
    fn stats(&self) -> IndexStats;
}

/// Builds the configured output by name
///
/// Unknown names fail here, before any page is fetched.
pub fn create(name: &str, settings: &Settings) -> crate::Result<Box<dyn Output>> {
    match name {
        "sqlite" => Ok(Box::new(SqliteOutput::open(
            &settings.database_path,
            settings.batch_size,
        )?)),
        "memory" => Ok(Box::new(MemoryOutput::new(settings.batch_size))),
        _ => Err(ConfigError::UnknownOutput(name.to_string()).into()),
    }
}

/// Merge for the update path of an upsert: the incoming document wins
/// wherever it provides a value, the stored document fills the gaps
pub(crate) fn merge_documents(
    stored: ScrapedDocument,
    incoming: ScrapedDocument,
) -> ScrapedDocument {
    ScrapedDocument {
        id: incoming.id,
        title: incoming.title,
        body: incoming.body,
        domain: incoming.domain,
        url: incoming.url,
        authors: incoming.authors.or(stored.authors),
        thread_url: incoming.thread_url.or(stored.thread_url),
        created_at: incoming.created_at.or(stored.created_at),
        doc_type: incoming.doc_type.or(stored.doc_type),
        language: incoming.language.or(stored.language),
        tags: incoming.tags.or(stored.tags),
        indexed_at: incoming.indexed_at.or(stored.indexed_at),
        original: incoming.original.or(stored.original),
    }
}

/// Write-time timestamp, ISO 8601 with microseconds
pub(crate) fn index_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_incoming_provided_fields() {
        let mut stored = ScrapedDocument::new("a-1", "Old title", "old body", "d", "u");
        stored.authors = Some(vec!["alice".to_string()]);
        stored.created_at = Some("2024-01-01T00:00:00".to_string());

        let mut incoming = ScrapedDocument::new("a-1", "New title", "new body", "d", "u");
        incoming.tags = Some(vec!["tag".to_string()]);

        let merged = merge_documents(stored, incoming);
        assert_eq!(merged.title, "New title");
        assert_eq!(merged.body, "new body");
        // Not provided by the update, kept from the stored document
        assert_eq!(merged.authors, Some(vec!["alice".to_string()]));
        assert_eq!(merged.created_at.as_deref(), Some("2024-01-01T00:00:00"));
        // Newly provided
        assert_eq!(merged.tags, Some(vec!["tag".to_string()]));
    }

    #[test]
    fn test_create_unknown_output() {
        let settings = Settings::default();
        assert!(create("elasticsearch", &settings).is_err());
    }

    #[test]
    fn test_index_stats_display() {
        let stats = IndexStats {
            inserted: 3,
            updated: 1,
            unchanged: 2,
            failed: 0,
        };
        assert_eq!(stats.to_string(), "3 inserted, 1 updated, 2 unchanged, 0 failed");
        assert_eq!(stats.indexed(), 6);
    }
}
