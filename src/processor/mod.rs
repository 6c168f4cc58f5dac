//! Document processors
//!
//! Each source may name an ordered list of processors in the manifest; the
//! pipeline runs them over every document between parsing and indexing.
//! Pipelines are built eagerly at startup so an unknown processor name
//! fails the run before any page is fetched.

use crate::model::ScrapedDocument;
use crate::{ConfigError, ConfigResult};
use async_trait::async_trait;
use thiserror::Error;

/// Processor failure, attributed to the processor that raised it
#[derive(Debug, Error)]
#[error("processor '{processor}': {detail}")]
pub struct ProcessError {
    pub processor: &'static str,
    pub detail: String,
}

/// A single document transformation step
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, document: ScrapedDocument)
        -> Result<ScrapedDocument, ProcessError>;
}

/// An ordered chain of processors
pub struct Pipeline {
    processors: Vec<Box<dyn Processor>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("processors", &self.names())
            .finish()
    }
}

impl Pipeline {
    /// A pipeline that passes documents through unchanged
    pub fn empty() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Builds a pipeline from configured processor names, in order
    pub fn from_names(names: &[String]) -> ConfigResult<Self> {
        let mut processors: Vec<Box<dyn Processor>> = Vec::with_capacity(names.len());
        for name in names {
            processors.push(create(name)?);
        }
        Ok(Self { processors })
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Runs every processor over the document, in configuration order
    pub async fn run(&self, mut document: ScrapedDocument) -> Result<ScrapedDocument, ProcessError> {
        for processor in &self.processors {
            document = processor.process(document).await?;
        }
        Ok(document)
    }
}

fn create(name: &str) -> ConfigResult<Box<dyn Processor>> {
    match name {
        "normalize_whitespace" => Ok(Box::new(NormalizeWhitespace)),
        "strip_author_emails" => Ok(Box::new(StripAuthorEmails)),
        _ => Err(ConfigError::UnknownProcessor(name.to_string())),
    }
}

/// Collapses whitespace runs in the body to single spaces
struct NormalizeWhitespace;

#[async_trait]
impl Processor for NormalizeWhitespace {
    fn name(&self) -> &'static str {
        "normalize_whitespace"
    }

    async fn process(
        &self,
        mut document: ScrapedDocument,
    ) -> Result<ScrapedDocument, ProcessError> {
        document.body = document.body.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(document)
    }
}

/// Removes angle-bracketed email addresses from author names
struct StripAuthorEmails;

#[async_trait]
impl Processor for StripAuthorEmails {
    fn name(&self) -> &'static str {
        "strip_author_emails"
    }

    async fn process(
        &self,
        mut document: ScrapedDocument,
    ) -> Result<ScrapedDocument, ProcessError> {
        if let Some(authors) = document.authors.take() {
            let cleaned: Vec<String> = authors
                .iter()
                .map(|author| crate::extract::strip_emails(author))
                .filter(|author| !author.is_empty())
                .collect();
            document.authors = if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            };
        }
        Ok(document)
    }
}
