use crate::config::validation::validate_manifest;
use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Engine-wide settings, the `[settings]` table of the source manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Directory where repository sources are cloned
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Path to the SQLite index database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory holding per-source selector configuration files
    #[serde(default = "default_selectors_dir")]
    pub selectors_dir: PathBuf,

    /// Documents buffered before a flush to the output
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// User-agent header sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Optional JSON file holding a shared author allow-list
    /// (an array of usernames, merged into every source's own list)
    #[serde(default)]
    pub authors_file: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("gleaner.db")
}

fn default_selectors_dir() -> PathBuf {
    PathBuf::from("selectors")
}

fn default_batch_size() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: default_data_dir(),
            database_path: default_database_path(),
            selectors_dir: default_selectors_dir(),
            batch_size: default_batch_size(),
            user_agent: None,
            authors_file: None,
        }
    }
}

/// One declared source, from the `[[web]]` or `[[repo]]` manifest tables
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Unique source name; prefixes every document id
    pub name: String,

    /// Canonical site root, e.g. "https://forum.example.com"
    pub domain: String,

    /// Seed URL (web sources: the index page; repo sources: the clone URL)
    pub url: String,

    /// When true, items whose author is missing or not on the allow-list
    /// are discarded
    #[serde(default)]
    pub filter_by_author: bool,

    /// Author assigned to items that extract none
    #[serde(default)]
    pub default_author: Option<String>,

    /// Author allow-list, matched case-insensitively
    #[serde(default)]
    pub authors_of_interest: Vec<String>,

    /// Literal resource URLs (web) or file paths (repo) for test mode
    #[serde(default)]
    pub test_resources: Vec<String>,

    /// Ordered processor names applied to every document
    #[serde(default)]
    pub processors: Vec<String>,

    /// Document type assigned when nothing more specific applies
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,

    /// Repository sources: path prefix -> document type. When present,
    /// files outside every prefix are ignored.
    #[serde(default)]
    pub directories: Option<std::collections::BTreeMap<String, String>>,

    /// Repository sources: eligible file extensions
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,

    /// Minimum milliseconds between requests to this source's domain.
    /// The engine-wide default is never relaxed implicitly.
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
}

fn default_file_extensions() -> Vec<String> {
    vec![".md".to_string()]
}

impl SourceConfig {
    /// True when the source declares literal test resources
    pub fn has_test_resources(&self) -> bool {
        !self.test_resources.is_empty()
    }
}

/// Which scraper a source is handled by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Web,
    Repository,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Web => write!(f, "web"),
            SourceKind::Repository => write!(f, "repo"),
        }
    }
}

/// The full source manifest: settings plus the two source groups
#[derive(Debug, Clone, Deserialize)]
pub struct SourceManifest {
    #[serde(default)]
    pub settings: Settings,

    /// Web sources, crawled by the selector-driven spider
    #[serde(default)]
    pub web: Vec<SourceConfig>,

    /// Repository sources, synced by commit diff
    #[serde(default)]
    pub repo: Vec<SourceConfig>,

    /// Usernames loaded from `settings.authors-file`, if configured
    #[serde(skip)]
    pub shared_authors: Vec<String>,
}

impl SourceManifest {
    /// Loads and validates a manifest from a TOML file
    ///
    /// The shared authors file, when configured, is resolved relative to the
    /// manifest's directory and read here so that a missing or malformed
    /// file fails before any run starts.
    pub fn load(path: &Path) -> Result<SourceManifest, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut manifest: SourceManifest = toml::from_str(&content)?;

        validate_manifest(&manifest)?;

        if let Some(authors_file) = manifest.settings.authors_file.clone() {
            let resolved = match path.parent() {
                Some(dir) if authors_file.is_relative() => dir.join(&authors_file),
                _ => authors_file,
            };
            manifest.shared_authors = load_authors_file(&resolved)?;
        }

        Ok(manifest)
    }

    /// Iterates every source with its kind, web group first
    pub fn sources(&self) -> impl Iterator<Item = (SourceKind, &SourceConfig)> {
        self.web
            .iter()
            .map(|s| (SourceKind::Web, s))
            .chain(self.repo.iter().map(|s| (SourceKind::Repository, s)))
    }

    /// Finds a source by name across both groups
    pub fn find(&self, name: &str) -> Option<(SourceKind, &SourceConfig)> {
        self.sources().find(|(_, s)| s.name == name)
    }

    /// Finds a source by name, or fails listing what exists
    pub fn require(&self, name: &str) -> Result<(SourceKind, &SourceConfig), ConfigError> {
        self.find(name).ok_or_else(|| ConfigError::UnknownSource {
            name: name.to_string(),
            available: self
                .sources()
                .map(|(_, s)| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// The effective author allow-list for a source, lowercased:
    /// its own list plus the shared list
    pub fn allow_list(&self, source: &SourceConfig) -> Vec<String> {
        source
            .authors_of_interest
            .iter()
            .chain(self.shared_authors.iter())
            .map(|a| a.to_lowercase())
            .collect()
    }
}

/// Reads a JSON array of usernames
fn load_authors_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let authors: Vec<String> = serde_json::from_str(&content).map_err(|e| {
        ConfigError::Validation(format!("authors file {}: {}", path.display(), e))
    })?;
    Ok(authors)
}
