use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters persisted with every run record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Resources discovered (web) or files eligible (repo) this run
    pub resources_to_process: u64,

    /// Documents handed to the output layer this run
    pub documents_indexed: u64,
}

/// The audit record of one scrape attempt
///
/// Created when a run starts and persisted exactly once when it ends,
/// whether the run succeeded or failed. For repository sources the
/// record also carries the commit hash the next incremental run diffs
/// against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Which scraper ran ("spider" or "repository")
    pub scraper: String,

    /// Source name the run belongs to
    pub source: String,

    /// Canonical site root of the source
    pub domain: String,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// HEAD after a successful repository sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_hash: Option<String>,

    pub stats: RunStats,
}

impl RunRecord {
    /// Starts a new record; `success` stays false until `complete`
    pub fn begin(scraper: &str, source: &str, domain: &str) -> RunRecord {
        RunRecord {
            scraper: scraper.to_string(),
            source: source.to_string(),
            domain: domain.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            success: false,
            error_message: None,
            last_commit_hash: None,
            stats: RunStats::default(),
        }
    }

    /// Closes the record as successful
    pub fn complete(&mut self, stats: RunStats, last_commit_hash: Option<String>) {
        self.finished_at = Some(Utc::now());
        self.success = true;
        self.error_message = None;
        self.last_commit_hash = last_commit_hash;
        self.stats = stats;
    }

    /// Closes the record as failed
    pub fn fail(&mut self, message: &str) {
        self.finished_at = Some(Utc::now());
        self.success = false;
        self.error_message = Some(message.to_string());
    }

    /// Run duration in seconds, once finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_unfinished() {
        let record = RunRecord::begin("spider", "forum", "https://forum.example.com");
        assert!(!record.success);
        assert!(record.finished_at.is_none());
        assert!(record.duration_seconds().is_none());
        assert_eq!(record.stats, RunStats::default());
    }

    #[test]
    fn test_complete_sets_outcome() {
        let mut record = RunRecord::begin("repository", "docs", "https://docs.example.com");
        record.complete(
            RunStats {
                resources_to_process: 4,
                documents_indexed: 3,
            },
            Some("abc123".to_string()),
        );

        assert!(record.success);
        assert!(record.finished_at.is_some());
        assert_eq!(record.last_commit_hash.as_deref(), Some("abc123"));
        assert_eq!(record.stats.documents_indexed, 3);
        assert!(record.duration_seconds().unwrap() >= 0);
    }

    #[test]
    fn test_fail_records_message() {
        let mut record = RunRecord::begin("spider", "forum", "https://forum.example.com");
        record.fail("index fetch failed");

        assert!(!record.success);
        assert_eq!(record.error_message.as_deref(), Some("index fetch failed"));
        assert!(record.finished_at.is_some());
    }
}
