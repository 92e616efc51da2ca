//! Crawl aggregation
//!
//! The aggregator drives every page request through fetch and extraction,
//! merges the per-page identifier sets into one run-wide set and counts what
//! it attempted. Concurrency is bounded by a semaphore; with a single permit
//! pages are processed strictly one after another.

use crate::config::FetchConfig;
use crate::crawler::extractor::extract_event_ids;
use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::seeds::{PageRequest, SeedUrls};
use crate::crawler::EventId;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// How often progress is logged, in pages
const PROGRESS_INTERVAL: u64 = 10;

/// Randomized pause taken after every page attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    pub min: Duration,
    pub max: Duration,
}

impl PolitenessDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.politeness_min_ms),
            Duration::from_millis(config.politeness_max_ms),
        )
    }

    /// No pause at all (for tests)
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draws a delay uniformly from `[min, max]`
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            self.min
        } else {
            Duration::from_millis(fastrand::u64(min..=max))
        }
    }
}

/// Counters for one crawl pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Pages attempted, whether they succeeded or not
    pub pages_crawled: u64,

    /// Pages that failed after all retries
    pub pages_failed: u64,

    /// Size of the final identifier set
    pub unique_ids_found: usize,
}

/// Result of a crawl pass
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Every identifier found, in ascending numeric order
    pub ids: BTreeSet<EventId>,
    pub stats: CrawlStats,
}

impl CrawlOutcome {
    /// The identifiers as a numerically sorted list
    pub fn sorted_ids(&self) -> Vec<EventId> {
        self.ids.iter().cloned().collect()
    }
}

/// What one page contributed
#[derive(Debug)]
enum PageResult {
    Extracted {
        ids: BTreeSet<EventId>,
        status_code: u16,
    },
    Failed(String),
}

#[derive(Debug)]
struct PageOutcome {
    request: PageRequest,
    result: PageResult,
}

/// Drives fetch and extraction over a seed sequence
pub struct Aggregator {
    fetcher: Arc<dyn PageFetcher>,
    politeness: PolitenessDelay,
    max_concurrent: usize,
}

impl Aggregator {
    /// Creates an aggregator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Page source, shared by all workers
    /// * `politeness` - Pause each worker takes after a page attempt
    /// * `max_concurrent` - Number of pages in flight at once (at least 1)
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        politeness: PolitenessDelay,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fetcher,
            politeness,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Crawls every page request and merges the identifiers found
    ///
    /// Page failures are counted and skipped; they never abort the pass.
    pub async fn crawl(&self, seeds: &SeedUrls) -> CrawlOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut outcome = CrawlOutcome::default();
        let start_time = Instant::now();

        for request in seeds.iter() {
            // The semaphore is never closed, so acquisition only fails if that
            // invariant breaks.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!("Worker pool closed unexpectedly: {}", e);
                    break;
                }
            };

            let fetcher = Arc::clone(&self.fetcher);
            let politeness = self.politeness;
            tasks.spawn(async move {
                let page = process_page(fetcher.as_ref(), request).await;
                tokio::time::sleep(politeness.sample()).await;
                drop(permit);
                page
            });

            while let Some(joined) = tasks.try_join_next() {
                self.merge(&mut outcome, joined, start_time, seeds.len());
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.merge(&mut outcome, joined, start_time, seeds.len());
        }

        outcome.stats.unique_ids_found = outcome.ids.len();

        tracing::info!(
            "Crawl finished: {} pages ({} failed), {} unique ids in {:?}",
            outcome.stats.pages_crawled,
            outcome.stats.pages_failed,
            outcome.stats.unique_ids_found,
            start_time.elapsed()
        );

        outcome
    }

    /// Folds one finished page into the run-wide outcome
    fn merge(
        &self,
        outcome: &mut CrawlOutcome,
        joined: Result<PageOutcome, JoinError>,
        start_time: Instant,
        total: usize,
    ) {
        outcome.stats.pages_crawled += 1;

        match joined {
            Ok(PageOutcome {
                request,
                result: PageResult::Extracted { ids, status_code },
            }) => {
                tracing::debug!(
                    "Seed {} page {}: HTTP {}, {} ids",
                    request.seed_index,
                    request.page,
                    status_code,
                    ids.len()
                );
                outcome.ids.extend(ids);
            }
            Ok(PageOutcome {
                request,
                result: PageResult::Failed(reason),
            }) => {
                tracing::debug!("Skipping {}: {}", request.url, reason);
                outcome.stats.pages_failed += 1;
            }
            Err(e) => {
                tracing::error!("Page task failed: {}", e);
                outcome.stats.pages_failed += 1;
            }
        }

        if outcome.stats.pages_crawled % PROGRESS_INTERVAL == 0 {
            let elapsed = start_time.elapsed();
            let rate = outcome.stats.pages_crawled as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {}/{} pages, {} unique ids, {:.2} pages/sec",
                outcome.stats.pages_crawled,
                total,
                outcome.ids.len(),
                rate
            );
        }
    }
}

/// Fetches and extracts a single page
async fn process_page(fetcher: &dyn PageFetcher, request: PageRequest) -> PageOutcome {
    let result = match fetcher.fetch(&request.url).await {
        FetchResult::Fetched {
            body,
            final_url,
            status_code,
        } => PageResult::Extracted {
            ids: extract_event_ids(&body, &final_url),
            status_code,
        },
        FetchResult::Failed {
            attempts, reason, ..
        } => PageResult::Failed(format!("{} after {} attempts", reason, attempts)),
    };

    PageOutcome { request, result }
}
