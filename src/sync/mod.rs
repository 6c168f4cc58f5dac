//! Repository sources
//!
//! Git-hosted document collections are ingested by cloning the repository
//! and parsing eligible markdown files, incrementally after the first run.

mod git;
mod markdown;
mod repo;

pub use git::GitSync;
pub use markdown::{parse_markdown, ParsedMarkdown};
pub use repo::RepoScraper;
