//! In-memory output
//!
//! Mirrors the SQLite output's upsert and run-record semantics without
//! touching disk. Used for dry runs and by tests that assert on exactly
//! what a crawl produced.

use crate::model::{RunRecord, ScrapedDocument};
use crate::output::{
    index_timestamp, merge_documents, IndexStats, Output, OutputResult, UpsertOutcome,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Output retaining everything in memory
pub struct MemoryOutput {
    batch_size: usize,
    buffer: Vec<ScrapedDocument>,
    documents: BTreeMap<String, (String, ScrapedDocument)>,
    runs: Vec<RunRecord>,
    stats: IndexStats,
}

impl MemoryOutput {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            buffer: Vec::new(),
            documents: BTreeMap::new(),
            runs: Vec::new(),
            stats: IndexStats::default(),
        }
    }

    /// All stored documents in id order
    pub fn documents(&self) -> Vec<&ScrapedDocument> {
        self.documents.values().map(|(_, doc)| doc).collect()
    }

    pub fn get_document(&self, id: &str) -> Option<&ScrapedDocument> {
        self.documents.get(id).map(|(_, doc)| doc)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    fn upsert(&mut self, document: ScrapedDocument) -> UpsertOutcome {
        let incoming_hash = document.content_hash();
        match self.documents.remove(&document.id) {
            None => {
                self.documents
                    .insert(document.id.clone(), (incoming_hash, document));
                UpsertOutcome::Inserted
            }
            Some((stored_hash, stored)) if stored_hash == incoming_hash => {
                self.documents
                    .insert(stored.id.clone(), (stored_hash, stored));
                UpsertOutcome::Unchanged
            }
            Some((_, stored)) => {
                let merged = merge_documents(stored, document);
                self.documents
                    .insert(merged.id.clone(), (incoming_hash, merged));
                UpsertOutcome::Updated
            }
        }
    }

    fn flush_buffer(&mut self) {
        for document in std::mem::take(&mut self.buffer) {
            match self.upsert(document) {
                UpsertOutcome::Inserted => self.stats.inserted += 1,
                UpsertOutcome::Updated => self.stats.updated += 1,
                UpsertOutcome::Unchanged => self.stats.unchanged += 1,
            }
        }
    }
}

#[async_trait]
impl Output for MemoryOutput {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn index_document(&mut self, mut document: ScrapedDocument) -> OutputResult<()> {
        document.indexed_at = Some(index_timestamp());
        self.buffer.push(document);
        if self.buffer.len() >= self.batch_size {
            self.flush_buffer();
        }
        Ok(())
    }

    async fn flush(&mut self) -> OutputResult<()> {
        self.flush_buffer();
        Ok(())
    }

    async fn close(&mut self) -> OutputResult<()> {
        self.flush_buffer();
        Ok(())
    }

    async fn get_last_successful_run(&mut self, source: &str) -> OutputResult<Option<RunRecord>> {
        Ok(self
            .runs
            .iter()
            .rev()
            .find(|run| run.source == source && run.success)
            .cloned())
    }

    async fn record_run(&mut self, record: &RunRecord) -> OutputResult<()> {
        self.runs.push(record.clone());
        Ok(())
    }

    async fn recent_runs(
        &mut self,
        source: Option<&str>,
        limit: usize,
    ) -> OutputResult<Vec<RunRecord>> {
        Ok(self
            .runs
            .iter()
            .rev()
            .filter(|run| source.map_or(true, |name| run.source == name))
            .take(limit)
            .cloned()
            .collect())
    }

    fn stats(&self) -> IndexStats {
        self.stats
    }
}
