//! Configuration module for Gleaner
//!
//! This module handles the source manifest (which sources exist, where their
//! data lives, how polite to be) and the per-source selector configurations
//! (how to traverse and extract a web source). Both are TOML on disk and are
//! validated eagerly: a bad configuration fails before any fetch begins.
//!
//! # Example
//!
//! ```no_run
//! use gleaner::config::SourceManifest;
//! use std::path::Path;
//!
//! let manifest = SourceManifest::load(Path::new("sources.toml")).unwrap();
//! for (kind, source) in manifest.sources() {
//!     println!("{} ({kind}): {}", source.name, source.url);
//! }
//! ```

mod selectors;
mod types;
mod validation;

// Re-export types
pub use selectors::{
    init_selector_file, load_selector_file, selector_path, selector_template, ItemConfig,
    PageConfig, ScrapingConfig, SelectorConfig,
};
pub use types::{Settings, SourceConfig, SourceKind, SourceManifest};

// Re-export validation entry points
pub use validation::{validate_manifest, validate_scraping_config};
