//! Incremental repository synchronization
//!
//! A repository source is cloned under the data directory and walked
//! file by file. A full pass indexes every tracked file; once a run has
//! recorded a commit hash, later runs only touch the files git reports
//! as changed since that hash. Test-mode sources index exactly the
//! listed file paths and never advance the sync point.

use crate::config::{Settings, SourceConfig};
use crate::crawler::slugify;
use crate::model::{OriginalContent, ScrapedDocument};
use crate::output::Output;
use crate::processor::Pipeline;
use crate::runner::{ScrapeStats, Scraper};
use crate::sync::git::GitSync;
use crate::sync::markdown::{
    front_matter_authors, front_matter_created_at, front_matter_language, front_matter_tags,
    front_matter_title, metadata_string, parse_markdown,
};
use crate::Result;
use async_trait::async_trait;
use serde_yaml::Mapping;
use std::path::Path;

/// Files that document the repository rather than its content
const EXCLUDED_FILES: &[&str] = &["README.md", "CONTRIBUTING.md", "LICENSE.md"];

/// Markdown-file scraper for git-hosted sources
pub struct RepoScraper {
    source: SourceConfig,
    pipeline: Pipeline,
    git: GitSync,
}

impl RepoScraper {
    pub fn new(source: SourceConfig, settings: Settings, pipeline: Pipeline) -> RepoScraper {
        let repo_path = settings.data_dir.join(slugify(&source.name));
        RepoScraper {
            source,
            pipeline,
            git: GitSync::new(repo_path),
        }
    }

    /// Decides whether a repository path is worth parsing at all
    ///
    /// Hidden files, repository boilerplate, files outside the configured
    /// directories, and foreign extensions are all skipped silently.
    fn is_relevant_file(&self, file_path: &str) -> bool {
        let file_name = Path::new(file_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_path);

        if file_name.starts_with('.') {
            return false;
        }
        if EXCLUDED_FILES.contains(&file_name) {
            return false;
        }
        if let Some(directories) = &self.source.directories {
            if !directories
                .keys()
                .any(|prefix| file_path.starts_with(prefix.as_str()))
            {
                return false;
            }
        }
        self.source
            .file_extensions
            .iter()
            .any(|extension| file_path.ends_with(extension.as_str()))
    }

    fn parse_file(&self, file_path: &str) -> Result<ScrapedDocument> {
        let text = std::fs::read_to_string(self.git.path().join(file_path))?;
        let parsed = parse_markdown(&text);

        let id = self.generate_id(file_path);
        let title = front_matter_title(&parsed.metadata, &parsed.body);
        let created_at = front_matter_created_at(&parsed.metadata)?;
        let url = self.document_url(file_path, &parsed.metadata);

        let mut document =
            ScrapedDocument::new(&id, &title, &parsed.body, &self.source.domain, &url);
        document.created_at = created_at;
        document.doc_type = self.document_type(file_path);
        document.language = Some(front_matter_language(&parsed.metadata));
        document.authors = front_matter_authors(&parsed.metadata);
        document.tags = front_matter_tags(&parsed.metadata);

        // Mediawiki bodies keep their unconverted form attached
        if file_path.ends_with(".mediawiki") {
            document.original = Some(OriginalContent {
                format: "mediawiki".to_string(),
                body: parsed.body,
            });
        }

        Ok(document)
    }

    fn generate_id(&self, file_path: &str) -> String {
        let stem = Path::new(file_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_path);
        format!("{}-{}", self.source.name.to_lowercase(), slugify(stem))
    }

    fn document_url(&self, file_path: &str, metadata: &Mapping) -> String {
        let base = &self.source.domain;
        if let Some(permalink) = metadata_string(metadata, "permalink") {
            return format!("{base}{permalink}");
        }
        if base.starts_with("https://github.com/") {
            return format!("{base}/blob/master/{file_path}");
        }
        format!("{}/{}", base, file_path.replace(".md", ""))
    }

    /// Document type from the directory map, or the source-level default
    fn document_type(&self, file_path: &str) -> Option<String> {
        match &self.source.directories {
            None => self.source.doc_type.clone(),
            Some(directories) => directories
                .iter()
                .find(|(prefix, _)| file_path.starts_with(prefix.as_str()))
                .map(|(_, doc_type)| doc_type.clone()),
        }
    }
}

#[async_trait]
impl Scraper for RepoScraper {
    fn kind(&self) -> &'static str {
        "repository"
    }

    async fn scrape(&mut self, output: &mut dyn Output) -> Result<ScrapeStats> {
        let previous_hash = output
            .get_last_successful_run(&self.source.name)
            .await?
            .and_then(|run| run.last_commit_hash);

        self.git.clone_or_update(&self.source.url).await?;
        let head = self.git.head_hash().await?;

        let files = if self.source.has_test_resources() {
            tracing::info!(
                "Test resources configured for '{}': {:?}",
                self.source.name,
                self.source.test_resources
            );
            self.source.test_resources.clone()
        } else {
            match &previous_hash {
                Some(previous) => {
                    tracing::info!("Syncing '{}' since commit {}", self.source.name, previous);
                    self.git.changed_files(previous).await?
                }
                None => {
                    tracing::info!(
                        "No previous sync point for '{}'; processing every tracked file",
                        self.source.name
                    );
                    self.git.tracked_files().await?
                }
            }
        };

        let resources_to_process = files.len() as u64;
        let mut documents_indexed = 0u64;

        for file_path in &files {
            if !self.is_relevant_file(file_path) {
                continue;
            }
            tracing::info!("Processing file: {}", file_path);

            let document = match self.parse_file(file_path) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("Failed to parse file {}: {}", file_path, e);
                    continue;
                }
            };
            let document = match self.pipeline.run(document).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("Dropping document from {}: {}", file_path, e);
                    continue;
                }
            };

            output.index_document(document).await?;
            documents_indexed += 1;
        }

        tracing::info!(
            "Repository sync of '{}' complete: {} documents from {} candidate files",
            self.source.name,
            documents_indexed,
            resources_to_process
        );

        Ok(ScrapeStats {
            resources_to_process,
            documents_indexed,
            last_commit_hash: Some(head),
        })
    }
}
