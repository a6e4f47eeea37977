use async_trait::async_trait;
use std::time::Duration;

use crate::errors::EngineError;
use crate::models::{Listing, RawListing};
use crate::normalizer;

/// Trait that all source adapters must implement.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Returns the name of the source this adapter covers.
    fn name(&self) -> &str;

    /// Fetches the source and extracts zero or more raw candidate records.
    async fn scrape(&self) -> Result<Vec<RawListing>, EngineError>;

    /// Returns whether this scraper is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// What one aggregation pass produced.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    /// Normalized listings in source order, per-source order preserved.
    pub listings: Vec<Listing>,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
}

/// Registry that runs all configured source adapters.
pub struct ScraperRegistry {
    scrapers: Vec<Box<dyn Scraper>>,
    adapter_timeout: Duration,
}

impl ScraperRegistry {
    pub fn new(adapter_timeout: Duration) -> Self {
        Self {
            scrapers: Vec::new(),
            adapter_timeout,
        }
    }

    pub fn register(&mut self, scraper: Box<dyn Scraper>) {
        self.scrapers.push(scraper);
    }

    /// Run every enabled adapter and collect the normalized yields.
    ///
    /// Each adapter runs under the configured time budget. A failing or
    /// timed-out adapter contributes zero records and a logged warning;
    /// the remaining adapters still run.
    pub async fn scrape_all(&self) -> AggregateOutcome {
        let mut outcome = AggregateOutcome::default();

        for scraper in &self.scrapers {
            if !scraper.is_enabled() {
                continue;
            }

            tracing::info!("Scraping from {}", scraper.name());

            let result = tokio::time::timeout(self.adapter_timeout, scraper.scrape()).await;

            match result {
                Ok(Ok(raws)) => {
                    let mut listings = normalizer::normalize_all(raws);
                    tracing::info!("Found {} listings from {}", listings.len(), scraper.name());
                    outcome.listings.append(&mut listings);
                    outcome.sources_succeeded += 1;
                }
                Ok(Err(e)) => {
                    tracing::warn!("Failed to scrape from {}: {}", scraper.name(), e);
                    outcome.sources_failed += 1;
                }
                Err(_) => {
                    let e = EngineError::Timeout(self.adapter_timeout.as_secs());
                    tracing::warn!("Failed to scrape from {}: {}", scraper.name(), e);
                    outcome.sources_failed += 1;
                }
            }
        }

        outcome
    }

    pub fn list_scrapers(&self) -> Vec<String> {
        self.scrapers.iter().map(|s| s.name().to_string()).collect()
    }
}
