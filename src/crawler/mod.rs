//! Crawler module for listing page sweeps
//!
//! This module contains the crawl half of a run, including:
//! - Seed URL generation over a rolling date window
//! - HTTP fetching with retry and backoff
//! - Event identifier extraction from HTML
//! - Aggregation of identifiers across pages

mod aggregator;
mod event_id;
mod extractor;
mod fetcher;
mod seeds;

pub use aggregator::{Aggregator, CrawlOutcome, CrawlStats, PolitenessDelay};
pub use event_id::EventId;
pub use extractor::extract_event_ids;
pub use fetcher::{
    build_http_client, is_retryable_status, FetchResult, HttpFetcher, PageFetcher, RetryPolicy,
};
pub use seeds::{DateWindow, PageRequest, SeedTemplate, SeedUrls};
