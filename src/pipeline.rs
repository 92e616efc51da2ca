//! Sweep pipeline - one run from seed generation to notification
//!
//! This module wires the stages of a run together:
//! - Generating the page requests for the date window
//! - Crawling and aggregating identifiers
//! - Upserting identifiers into the store
//! - Triggering the downstream refresh
//! - Recording the run in the ledger

use crate::config::Config;
use crate::crawler::{
    Aggregator, CrawlStats, DateWindow, EventId, HttpFetcher, PolitenessDelay, SeedUrls,
};
use crate::notify::{Notifier, NotifyResponse};
use crate::state::JobPhase;
use crate::storage::{EventStore, RunStatus, RunSummary, SqliteEventStore, UpsertOutcome};
use crate::SweepError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// How the downstream trigger went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationStatus {
    /// The service answered (with any status)
    Delivered(NotifyResponse),
    /// The request never got an answer
    Failed(String),
}

impl NotificationStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: CrawlStats,
    /// Identifiers found, in ascending numeric order
    pub ids: Vec<EventId>,
    pub upsert: UpsertOutcome,
    pub notification: NotificationStatus,
    /// Ledger row ID, if the ledger write succeeded
    pub run_id: Option<i64>,
}

/// A single sweep run
pub struct Pipeline {
    seeds: SeedUrls,
    aggregator: Aggregator,
    store: Box<dyn EventStore>,
    notifier: Notifier,
    phase: JobPhase,
    config_hash: String,
}

impl Pipeline {
    /// Builds every component of a run from the configuration
    ///
    /// The date window starts today (local time).
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to run
    /// * `Err(SweepError)` - A component could not be built
    pub fn new(config: &Config) -> Result<Self, SweepError> {
        let window = DateWindow::starting_today(config.site.window_days)?;
        let seeds = SeedUrls::from_config(&config.site, window)?;

        let fetcher = HttpFetcher::new(&config.fetch, &config.user_agent)?;
        let aggregator = Aggregator::new(
            Arc::new(fetcher),
            PolitenessDelay::from_config(&config.fetch),
            config.fetch.max_concurrent_fetches as usize,
        );

        let store = SqliteEventStore::from_config(&config.storage)?;
        let notifier = Notifier::from_config(&config.notify)?;

        Ok(Self::with_components(
            seeds,
            aggregator,
            Box::new(store),
            notifier,
        ))
    }

    /// Assembles a pipeline from prebuilt components
    pub fn with_components(
        seeds: SeedUrls,
        aggregator: Aggregator,
        store: Box<dyn EventStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            seeds,
            aggregator,
            store,
            notifier,
            phase: JobPhase::Start,
            config_hash: String::new(),
        }
    }

    /// Sets the configuration hash recorded in the ledger
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn seeds(&self) -> &SeedUrls {
        &self.seeds
    }

    /// Moves to `to`, rejecting transitions the phase graph does not allow
    pub fn advance(&mut self, to: JobPhase) -> Result<(), SweepError> {
        if !self.phase.can_transition_to(to) {
            return Err(SweepError::InvalidTransition {
                from: self.phase,
                to,
            });
        }

        tracing::debug!("Phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Runs the sweep once
    ///
    /// Progress lines go to stdout. A persistence failure aborts the run
    /// and is returned; a notification failure is logged and reported in
    /// the returned [`RunReport`] with the identifiers left persisted.
    pub async fn run(&mut self) -> Result<RunReport, SweepError> {
        let started_at = Utc::now();

        self.advance(JobPhase::Seeding)?;
        let window = *self.seeds.window();
        println!(
            "Scraping events from {} to {}",
            window.start_param(),
            window.end_param()
        );
        if let Some(sample) = self.seeds.sample_url() {
            println!("Sample URL: {}", sample);
        }
        tracing::info!(
            "{} page requests across {} seed paths",
            self.seeds.len(),
            self.seeds.templates().len()
        );

        self.advance(JobPhase::Crawling)?;
        let outcome = self.aggregator.crawl(&self.seeds).await;

        self.advance(JobPhase::Aggregated)?;
        println!("Pages crawled: {}", outcome.stats.pages_crawled);
        println!("Unique event IDs found: {}", outcome.stats.unique_ids_found);
        let ids = outcome.sorted_ids();

        self.advance(JobPhase::Persisting)?;
        let upsert = match self.store.upsert_event_ids(&ids) {
            Ok(upsert) => upsert,
            Err(e) => {
                tracing::error!("Failed to persist {} ids: {}", ids.len(), e);
                self.advance(JobPhase::Failed)?;

                let summary = RunSummary {
                    error_message: Some(e.to_string()),
                    ..self.summary(
                        started_at,
                        &outcome.stats,
                        UpsertOutcome::default(),
                        None,
                        RunStatus::Failed,
                    )
                };
                self.record(&summary);

                return Err(e.into());
            }
        };
        println!(
            "Upserted {} IDs (changed {}) to {}",
            ids.len(),
            upsert.changed(),
            self.store.describe()
        );

        self.advance(JobPhase::Notifying)?;
        let notification = match self.notifier.notify().await {
            Ok(response) => {
                println!(
                    "Triggered backend to fetch events: {} {}",
                    response.status, response.body
                );
                if !response.is_success() {
                    tracing::warn!("Backend answered the trigger with HTTP {}", response.status);
                }
                NotificationStatus::Delivered(response)
            }
            Err(e) => {
                tracing::error!("Failed to trigger backend: {}", e);
                NotificationStatus::Failed(e.to_string())
            }
        };

        self.advance(JobPhase::Done)?;

        let summary = match &notification {
            NotificationStatus::Delivered(response) => self.summary(
                started_at,
                &outcome.stats,
                upsert,
                Some(response.status),
                RunStatus::Completed,
            ),
            NotificationStatus::Failed(message) => RunSummary {
                error_message: Some(message.clone()),
                ..self.summary(
                    started_at,
                    &outcome.stats,
                    upsert,
                    None,
                    RunStatus::NotifyFailed,
                )
            },
        };
        let run_id = self.record(&summary);

        Ok(RunReport {
            stats: outcome.stats,
            ids,
            upsert,
            notification,
            run_id,
        })
    }

    fn summary(
        &self,
        started_at: DateTime<Utc>,
        stats: &CrawlStats,
        upsert: UpsertOutcome,
        notify_status: Option<u16>,
        status: RunStatus,
    ) -> RunSummary {
        RunSummary {
            started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
            pages_crawled: stats.pages_crawled,
            pages_failed: stats.pages_failed,
            unique_ids: stats.unique_ids_found as u64,
            inserted: upsert.inserted,
            modified: upsert.modified,
            notify_status,
            status,
            error_message: None,
        }
    }

    /// Writes the ledger row; a failure here never fails the run
    fn record(&self, summary: &RunSummary) -> Option<i64> {
        match self.store.record_run(summary) {
            Ok(id) => {
                tracing::info!("Recorded run {} ({})", id, summary.status.to_db_string());
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Failed to record run: {}", e);
                None
            }
        }
    }
}

/// Runs one sweep with the given configuration
pub async fn run_job(config: Config) -> Result<RunReport, SweepError> {
    Pipeline::new(&config)?.run().await
}

/// Runs one sweep and tags its ledger row with `config_hash`
pub async fn run_job_with_hash(config: Config, config_hash: &str) -> Result<RunReport, SweepError> {
    Pipeline::new(&config)?
        .with_config_hash(config_hash)
        .run()
        .await
}
