//! Per-source behavior hooks
//!
//! Most of what differs between forum sources is declarative and lives in
//! the selector file. The few things that are not (id derivation quirks,
//! thread-URL shapes, date formats, markup cleanup) are collected here as a
//! strategy of plain functions, resolved once per run by source name.

use crate::crawler::identity::{default_thread_url, id_from_url};
use crate::extract::{parse_standard_date_formats, strip_markup_blocks};
use crate::model::ScrapedDocument;
use chrono::{Local, NaiveDateTime, NaiveTime};
use url::Url;

/// Source-specific hook points for the crawl state machine
///
/// The default set covers well-behaved sources; `behavior_for` swaps in
/// overrides where a source deviates.
#[derive(Clone, Copy)]
pub struct SourceBehavior {
    /// Derives the document id from the resolved item URL
    pub generate_id: fn(source: &str, url: &Url) -> String,

    /// Resolves an extracted item href into the item's permalink URL
    pub resolve_url: fn(page_url: &Url, href: &str) -> Option<Url>,

    /// Canonical thread URL for a resource page
    pub thread_url: fn(&Url) -> String,

    /// Item type label from page position
    pub determine_type: fn(first_page: bool, index: usize) -> &'static str,

    /// Rewrites item markup before text extraction
    pub process_markup: fn(&str) -> String,

    /// Parses an extracted date string to ISO 8601
    pub parse_date: fn(&str) -> Option<String>,

    /// Final adjustment of a parsed document, given its fetched permalink page
    pub customize: fn(&mut ScrapedDocument, page_body: &str),
}

impl Default for SourceBehavior {
    fn default() -> Self {
        Self {
            generate_id: id_from_url,
            resolve_url: default_resolve_url,
            thread_url: default_thread_url,
            determine_type: default_type,
            process_markup: |markup| markup.to_string(),
            parse_date: parse_standard_date_formats,
            customize: |_, _| {},
        }
    }
}

/// Resolves the behavior set for a source by name
pub fn behavior_for(source: &str) -> SourceBehavior {
    match source {
        "bitcointalk" => SourceBehavior {
            thread_url: bitcointalk_thread_url,
            process_markup: strip_quote_blocks,
            parse_date: parse_forum_date,
            ..SourceBehavior::default()
        },
        _ => SourceBehavior::default(),
    }
}

/// The first item of the first page is the post that opened the thread
fn default_type(first_page: bool, index: usize) -> &'static str {
    if first_page && index == 0 {
        "original_post"
    } else {
        "reply"
    }
}

/// Joins an extracted href against the page it appeared on
fn default_resolve_url(page_url: &Url, href: &str) -> Option<Url> {
    page_url.join(href).ok()
}

/// BitcoinTalk topic URLs end in `.N` where N is the page start offset
fn bitcointalk_thread_url(url: &Url) -> String {
    let raw = url.as_str();
    match raw.rsplit_once('.') {
        Some((head, _)) => head.to_string(),
        None => raw.to_string(),
    }
}

/// Drops quoted-reply blocks so the body holds only the post's own words
fn strip_quote_blocks(markup: &str) -> String {
    strip_markup_blocks(markup, &[".quoteheader", ".quote"])
}

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Forum post dates: `Month DD, YYYY, HH:MM(:SS) AM/PM`, a relative
/// "Today at" form, and an appended "Last edit:" note on edited posts
fn parse_forum_date(date_text: &str) -> Option<String> {
    let text = match date_text.split_once("Last edit:") {
        Some((before, _)) => before.trim(),
        None => date_text.trim(),
    };

    let today_time = text
        .strip_prefix("Today at ")
        .or_else(|| text.strip_prefix("Todayat "));
    if let Some(time_text) = today_time {
        let time = NaiveTime::parse_from_str(time_text.trim(), "%I:%M:%S %p").ok()?;
        let today = Local::now().date_naive();
        return Some(today.and_time(time).format(ISO_FORMAT).to_string());
    }

    for format in ["%B %d, %Y, %I:%M:%S %p", "%B %d, %Y, %I:%M %p"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.format(ISO_FORMAT).to_string());
        }
    }

    None
}
