//! Web crawling
//!
//! The crawler turns a source's selector configuration into indexed
//! documents: the [`Spider`] walks index and resource pages through a
//! single-worker queue, the [`Fetcher`] enforces the politeness delay,
//! and a [`SourceBehavior`] supplies the per-source extraction hooks.

mod behavior;
mod fetcher;
mod identity;
mod spider;

pub use behavior::{behavior_for, SourceBehavior};
pub use fetcher::{FetchedPage, Fetcher, DEFAULT_REQUEST_DELAY};
pub use identity::{default_thread_url, id_from_url, slugify};
pub use spider::Spider;
