//! SQLite-backed output
//!
//! The default destination: a single local database file holding the
//! document index and the run history. Documents are stored as discrete
//! columns with list and structured fields serialized as JSON, plus the
//! content hash that drives the unchanged-content no-op.

use crate::model::{OriginalContent, RunRecord, RunStats, ScrapedDocument};
use crate::output::{
    index_timestamp, merge_documents, IndexStats, Output, OutputError, OutputResult, UpsertOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SCHEMA_SQL: &str = r#"
-- Indexed documents, one row per document id
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    authors TEXT,
    domain TEXT NOT NULL,
    url TEXT NOT NULL,
    thread_url TEXT,
    created_at TEXT,
    doc_type TEXT,
    language TEXT,
    tags TEXT,
    indexed_at TEXT,
    original TEXT,
    content_hash TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_domain ON documents(domain);

-- One row per scrape attempt, successful or not
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scraper TEXT NOT NULL,
    source TEXT NOT NULL,
    domain TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    success INTEGER NOT NULL,
    error_message TEXT,
    last_commit_hash TEXT,
    resources_to_process INTEGER NOT NULL,
    documents_indexed INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_runs_source ON runs(source, started_at);
"#;

const RUN_COLUMNS: &str = "scraper, source, domain, started_at, finished_at, success, \
     error_message, last_commit_hash, resources_to_process, documents_indexed";

/// Output writing to a local SQLite database
pub struct SqliteOutput {
    conn: Connection,
    batch_size: usize,
    buffer: Vec<ScrapedDocument>,
    stats: IndexStats,
}

impl SqliteOutput {
    /// Opens (creating if needed) the database at `path`
    pub fn open(path: &Path, batch_size: usize) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            stats: IndexStats::default(),
        })
    }

    /// In-memory database for tests
    #[cfg(test)]
    pub fn open_in_memory(batch_size: usize) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn,
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            stats: IndexStats::default(),
        })
    }

    /// Number of documents currently stored
    pub fn document_count(&self) -> OutputResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Loads one document by id
    pub fn get_document(&self, id: &str) -> OutputResult<Option<ScrapedDocument>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, authors, domain, url, thread_url, created_at, \
             doc_type, language, tags, indexed_at, original FROM documents WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                    row.get::<_, Option<String>>(11)?,
                    row.get::<_, Option<String>>(12)?,
                ))
            })
            .optional()?;

        let Some((
            id,
            title,
            body,
            authors,
            domain,
            url,
            thread_url,
            created_at,
            doc_type,
            language,
            tags,
            indexed_at,
            original,
        )) = row
        else {
            return Ok(None);
        };

        Ok(Some(ScrapedDocument {
            id,
            title,
            body,
            authors: from_json(authors)?,
            domain,
            url,
            thread_url,
            created_at,
            doc_type,
            language,
            tags: from_json(tags)?,
            indexed_at,
            original: from_json::<OriginalContent>(original)?,
        }))
    }

    fn upsert(&self, document: ScrapedDocument) -> OutputResult<UpsertOutcome> {
        let incoming_hash = document.content_hash();
        let stored_hash: Option<String> = self
            .conn
            .query_row(
                "SELECT content_hash FROM documents WHERE id = ?1",
                params![document.id],
                |row| row.get(0),
            )
            .optional()?;

        match stored_hash {
            None => {
                self.write_document(&document, &incoming_hash, true)?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(hash) if hash == incoming_hash => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                let stored = self
                    .get_document(&document.id)?
                    .unwrap_or_else(|| document.clone());
                let merged = merge_documents(stored, document);
                self.write_document(&merged, &incoming_hash, false)?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    fn write_document(
        &self,
        document: &ScrapedDocument,
        content_hash: &str,
        insert: bool,
    ) -> OutputResult<()> {
        let sql = if insert {
            "INSERT INTO documents (id, title, body, authors, domain, url, thread_url, \
             created_at, doc_type, language, tags, indexed_at, original, content_hash) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        } else {
            "UPDATE documents SET title = ?2, body = ?3, authors = ?4, domain = ?5, \
             url = ?6, thread_url = ?7, created_at = ?8, doc_type = ?9, language = ?10, \
             tags = ?11, indexed_at = ?12, original = ?13, content_hash = ?14 WHERE id = ?1"
        };

        self.conn.execute(
            sql,
            params![
                document.id,
                document.title,
                document.body,
                to_json(&document.authors)?,
                document.domain,
                document.url,
                document.thread_url,
                document.created_at,
                document.doc_type,
                document.language,
                to_json(&document.tags)?,
                document.indexed_at,
                to_json(&document.original)?,
                content_hash,
            ],
        )?;
        Ok(())
    }

    fn flush_buffer(&mut self) -> OutputResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch: Vec<ScrapedDocument> = self.buffer.drain(..).collect();
        tracing::debug!("Flushing {} documents", batch.len());

        for document in batch {
            let id = document.id.clone();
            match self.upsert(document) {
                Ok(UpsertOutcome::Inserted) => self.stats.inserted += 1,
                Ok(UpsertOutcome::Updated) => self.stats.updated += 1,
                Ok(UpsertOutcome::Unchanged) => self.stats.unchanged += 1,
                Err(e) => {
                    self.stats.failed += 1;
                    tracing::error!("Failed to index document {}: {}", id, e);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Output for SqliteOutput {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn index_document(&mut self, mut document: ScrapedDocument) -> OutputResult<()> {
        document.indexed_at = Some(index_timestamp());
        self.buffer.push(document);
        if self.buffer.len() >= self.batch_size {
            self.flush_buffer()?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> OutputResult<()> {
        self.flush_buffer()
    }

    async fn close(&mut self) -> OutputResult<()> {
        self.flush_buffer()
    }

    async fn get_last_successful_run(&mut self, source: &str) -> OutputResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM runs WHERE source = ?1 AND success = 1 \
             ORDER BY id DESC LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let record = stmt.query_row(params![source], row_to_run).optional()?;
        Ok(record)
    }

    async fn record_run(&mut self, record: &RunRecord) -> OutputResult<()> {
        let sql = format!("INSERT INTO runs ({RUN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)");
        self.conn.execute(
            &sql,
            params![
                record.scraper,
                record.source,
                record.domain,
                record.started_at.to_rfc3339(),
                record.finished_at.map(|dt| dt.to_rfc3339()),
                record.success as i64,
                record.error_message,
                record.last_commit_hash,
                record.stats.resources_to_process as i64,
                record.stats.documents_indexed as i64,
            ],
        )?;
        Ok(())
    }

    async fn recent_runs(
        &mut self,
        source: Option<&str>,
        limit: usize,
    ) -> OutputResult<Vec<RunRecord>> {
        let records = match source {
            Some(source) => {
                let sql = format!(
                    "SELECT {RUN_COLUMNS} FROM runs WHERE source = ?1 \
                     ORDER BY id DESC LIMIT ?2"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![source, limit as i64], row_to_run)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT ?1"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![limit as i64], row_to_run)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    fn stats(&self) -> IndexStats {
        self.stats
    }
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let started_raw: String = row.get(3)?;
    let finished_raw: Option<String> = row.get(4)?;

    Ok(RunRecord {
        scraper: row.get(0)?,
        source: row.get(1)?,
        domain: row.get(2)?,
        started_at: parse_timestamp(3, &started_raw)?,
        finished_at: finished_raw
            .map(|raw| parse_timestamp(4, &raw))
            .transpose()?,
        success: row.get::<_, i64>(5)? != 0,
        error_message: row.get(6)?,
        last_commit_hash: row.get(7)?,
        stats: RunStats {
            resources_to_process: row.get::<_, i64>(8)? as u64,
            documents_indexed: row.get::<_, i64>(9)? as u64,
        },
    })
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> OutputResult<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(OutputError::from)
}

fn from_json<T: serde::de::DeserializeOwned>(value: Option<String>) -> OutputResult<Option<T>> {
    value
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(OutputError::from)
}
