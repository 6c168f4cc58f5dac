//! Data model for Gleaner
//!
//! The two record shapes the whole engine revolves around: the normalized
//! document every source produces, and the audit record every run leaves
//! behind.

mod document;
mod run;

pub use document::{OriginalContent, ScrapedDocument};
pub use run::{RunRecord, RunStats};
