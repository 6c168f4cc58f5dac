use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Pre-conversion body of a document whose source format is lossy to keep
/// (mediawiki files, raw forum post HTML)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalContent {
    /// Format tag, e.g. "mediawiki" or "html"
    pub format: String,

    /// The unconverted body
    pub body: String,
}

/// One normalized document, the unit every source emits
///
/// Optional fields are omitted from serialization entirely so that the
/// output layer's merge-only-provided-fields upsert can distinguish
/// "not extracted this run" from "extracted as empty".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedDocument {
    /// Deterministic id, prefixed with the source name
    pub id: String,

    pub title: String,

    /// Normalized text body; empty is legal (quote-only forum posts)
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    /// Canonical site root of the source
    pub domain: String,

    /// Canonical URL of this document
    pub url: String,

    /// Pagination-stripped resource URL; set only for repeated-item
    /// resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_url: Option<String>,

    /// Creation date, normalized to ISO 8601 (no timezone; sources rarely
    /// publish one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Document type ("original_post", "reply", or a source-defined type)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Stamped by the output layer at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<OriginalContent>,
}

impl ScrapedDocument {
    /// A document with the required fields set and everything else empty
    pub fn new(id: &str, title: &str, body: &str, domain: &str, url: &str) -> ScrapedDocument {
        ScrapedDocument {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            authors: None,
            domain: domain.to_string(),
            url: url.to_string(),
            thread_url: None,
            created_at: None,
            doc_type: None,
            language: None,
            tags: None,
            indexed_at: None,
            original: None,
        }
    }

    /// SHA-256 over the document's content, excluding `indexed_at`
    ///
    /// Two documents with the same hash are the same content; the output
    /// layer uses this to turn re-indexing an unchanged document into a
    /// no-op. Field boundaries are delimited so that adjacent fields
    /// cannot alias ("ab" + "c" vs "a" + "bc").
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();

        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0x1f]);
        };

        field(&self.id);
        field(&self.title);
        field(&self.body);
        field(&self.domain);
        field(&self.url);

        let mut optional = |value: &Option<String>| match value {
            Some(v) => {
                hasher.update([1]);
                hasher.update(v.as_bytes());
                hasher.update([0x1f]);
            }
            None => hasher.update([0, 0x1f]),
        };

        optional(&self.thread_url);
        optional(&self.created_at);
        optional(&self.doc_type);
        optional(&self.language);

        let mut list = |values: &Option<Vec<String>>| match values {
            Some(vs) => {
                hasher.update([1]);
                for v in vs {
                    hasher.update(v.as_bytes());
                    hasher.update([0x1e]);
                }
                hasher.update([0x1f]);
            }
            None => hasher.update([0, 0x1f]),
        };

        list(&self.authors);
        list(&self.tags);

        match &self.original {
            Some(original) => {
                hasher.update([1]);
                hasher.update(original.format.as_bytes());
                hasher.update([0x1e]);
                hasher.update(original.body.as_bytes());
            }
            None => hasher.update([0]),
        }

        hex::encode(hasher.finalize())
    }
}
