mod airtable;
mod browser;
mod config;
mod errors;
mod filter;
mod http_client;
mod models;
mod normalizer;
mod scraper_trait;
mod scrapers;
mod sync;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use airtable::AirtableClient;
use config::{AirtableConfig, Config};
use filter::FilterCriteria;
use scraper_trait::{Scraper, ScraperRegistry};
use scrapers::{BizQuestScraper, DealStreamScraper, SbaFeedScraper};
use sync::SyncEngine;

#[derive(Parser, Debug)]
#[command(name = "dealfinder")]
#[command(about = "Aggregates business-for-sale listings and syncs them to Airtable", long_about = None)]
struct Args {
    /// Test URL fetching - fetch and print HTML from a URL
    #[arg(long)]
    test_url: Option<String>,

    /// Test a specific scraper and print its raw yields
    #[arg(long)]
    test_scraper: Option<String>,

    /// Save HTML to file when using --test-url
    #[arg(long)]
    save_html: Option<String>,

    /// Run the full pipeline but skip the Airtable upload
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real deployments set the variables directly
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Handle test-url command
    if let Some(url) = args.test_url {
        return test_url_fetch(&url, args.save_html.as_deref()).await;
    }

    if !std::path::Path::new("data/config.yaml").exists() {
        eprintln!("No config file found, creating default data/config.yaml");
        Config::create_default()?;
    }

    let config = Config::load()?;

    // Initialize logging - use RUST_LOG env var if set, otherwise use config
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        tracing::info!("Logging level set from RUST_LOG environment variable");
    } else {
        let level = config.tracing_level.to_lowercase();
        let env_filter = match level.as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                eprintln!("Invalid tracing level '{}', using 'info'", level);
                tracing::Level::INFO
            }
        };

        tracing_subscriber::fmt().with_max_level(env_filter).init();

        tracing::info!("Logging level set to: {} (from data/config.yaml)", level);
    }

    // Handle test-scraper command
    if let Some(scraper_name) = args.test_scraper {
        return test_scraper(&scraper_name, &config).await;
    }

    tracing::info!("Running deal engine...");

    // Missing credentials are the one fatal condition and must abort before
    // any network activity.
    let store = if args.dry_run {
        None
    } else {
        let airtable_config = AirtableConfig::from_env()?;
        Some(AirtableClient::new(&airtable_config)?)
    };

    let registry = build_registry(&config);
    tracing::info!("Registered scrapers: {:?}", registry.list_scrapers());

    let outcome = registry.scrape_all().await;
    tracing::info!(
        "Found {} total listings ({} sources ok, {} failed)",
        outcome.listings.len(),
        outcome.sources_succeeded,
        outcome.sources_failed
    );

    if outcome.sources_succeeded == 0 {
        anyhow::bail!("all source adapters failed, nothing was aggregated");
    }

    let criteria = FilterCriteria::new(
        config.min_price,
        config.max_price,
        config.required_locations.clone(),
    );
    let total = outcome.listings.len();
    let filtered = filter::filter_listings(outcome.listings, &criteria);
    tracing::info!("After filtering: {} listings (from {} total)", filtered.len(), total);

    if filtered.is_empty() {
        tracing::info!("No listings match criteria");
        return Ok(());
    }

    match store {
        Some(store) => {
            tracing::info!("Uploading to Airtable...");
            let report = SyncEngine::new(&store).sync_all(&filtered).await;
            tracing::info!(
                "Upload complete: {} inserted, {} already present, {} failed",
                report.inserted,
                report.skipped_existing,
                report.failed
            );
        }
        None => {
            tracing::info!("Dry run, skipping upload of {} listings", filtered.len());
            for listing in &filtered {
                println!(
                    "[{}] {} | price: {} | location: {}",
                    listing.source,
                    listing.title,
                    listing.price.as_deref().unwrap_or("?"),
                    listing.location.as_deref().unwrap_or("?"),
                );
            }
        }
    }

    Ok(())
}

fn build_registry(config: &Config) -> ScraperRegistry {
    let adapter_timeout = Duration::from_secs(config.adapter_timeout_seconds);
    let mut registry = ScraperRegistry::new(adapter_timeout);

    registry.register(Box::new(DealStreamScraper::new(
        &config.dealstream_url,
        // Leave the registry timeout room to surface browser failures
        adapter_timeout.saturating_sub(Duration::from_secs(10)),
    )));
    registry.register(Box::new(BizQuestScraper::new(
        &config.bizquest_url,
        config.request_delay_ms,
    )));
    registry.register(Box::new(SbaFeedScraper::new(&config.sba_feed_url)));

    registry
}

/// Test URL fetching - downloads and prints the HTML response
async fn test_url_fetch(url: &str, save_path: Option<&str>) -> Result<()> {
    println!("Testing URL fetch: {}", url);
    println!("{}", "=".repeat(80));

    let user_agent = http_client::random_user_agent();
    println!("User-Agent: {}", user_agent);

    let client = http_client::create_http_client(user_agent)?;

    println!("Sending request...");
    let response = client.get(url).send().await?;

    println!("Status: {}", response.status());
    println!("\nResponse Headers:");
    for (name, value) in response.headers() {
        println!("  {}: {:?}", name, value);
    }

    println!("{}", "=".repeat(80));

    let body = response.text().await?;

    if let Some(path) = save_path {
        std::fs::write(path, &body)?;
        println!("HTML saved to: {}", path);
    } else {
        println!("Response body:");
        println!("{}", "=".repeat(80));
        println!("{}", body);
    }

    println!("{}", "=".repeat(80));
    println!("Total length: {} bytes", body.len());

    // Check for common CAPTCHA indicators
    let lower_body = body.to_lowercase();
    if lower_body.contains("captcha") || lower_body.contains("cloudflare") {
        println!("\nWARNING: Response may contain CAPTCHA or anti-bot protection!");
        println!("Consider:");
        println!("  - Increasing request_delay_ms in config");
        println!("  - Using the rendered-page path instead of plain HTTP");
        println!("  - Using a different IP/proxy");
    }

    Ok(())
}

/// Test a specific scraper
async fn test_scraper(scraper_name: &str, config: &Config) -> Result<()> {
    println!("Testing scraper: {}", scraper_name);
    println!("{}", "=".repeat(80));

    let adapter_timeout = Duration::from_secs(config.adapter_timeout_seconds);

    let scraper: Box<dyn Scraper> = match scraper_name.to_lowercase().as_str() {
        "dealstream" => Box::new(DealStreamScraper::new(
            &config.dealstream_url,
            adapter_timeout,
        )),
        "bizquest" => Box::new(BizQuestScraper::new(
            &config.bizquest_url,
            config.request_delay_ms,
        )),
        "sba" => Box::new(SbaFeedScraper::new(&config.sba_feed_url)),
        name => {
            eprintln!("Unknown scraper: {}", name);
            eprintln!("Available scrapers: dealstream, bizquest, sba");
            return Ok(());
        }
    };

    println!("Running scraper...");
    match tokio::time::timeout(adapter_timeout, scraper.scrape()).await {
        Ok(Ok(raws)) => {
            let listings = normalizer::normalize_all(raws);
            println!("Found {} listings", listings.len());
            println!("{}", "=".repeat(80));

            for (i, listing) in listings.iter().enumerate() {
                println!("\nListing #{}", i + 1);
                println!("Title: {}", listing.title);
                println!("Price: {:?}", listing.price);
                println!("Location: {:?}", listing.location);
                println!("URL: {:?}", listing.url);
                if let Some(desc) = &listing.description {
                    println!("Description: {}", desc);
                }
                println!("Source: {}", listing.source);
                println!("{}", "-".repeat(80));
            }

            if listings.is_empty() {
                println!("No listings found. This might mean:");
                println!("  - The scraper selectors need updating");
                println!("  - The website structure has changed");
                println!("  - No listings match the search criteria");
            }
        }
        Ok(Err(e)) => {
            eprintln!("Error scraping: {}", e);
        }
        Err(_) => {
            eprintln!(
                "Scraper timed out after {} seconds",
                config.adapter_timeout_seconds
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airtable::{DealStore, NaturalKey};
    use async_trait::async_trait;
    use errors::EngineError;
    use models::RawListing;
    use serde_json::{Map, Value};
    use std::sync::Mutex;

    struct FixedScraper;

    #[async_trait]
    impl Scraper for FixedScraper {
        fn name(&self) -> &str {
            "X"
        }

        async fn scrape(&self) -> Result<Vec<RawListing>, EngineError> {
            let mut raw = RawListing::new("X");
            raw.title = Some("ABC Plumbing".to_string());
            raw.price = Some("$120,000".to_string());
            raw.location = Some("Houston, TX".to_string());
            Ok(vec![raw])
        }
    }

    struct BrokenScraper;

    #[async_trait]
    impl Scraper for BrokenScraper {
        fn name(&self) -> &str {
            "Y"
        }

        async fn scrape(&self) -> Result<Vec<RawListing>, EngineError> {
            Err(EngineError::Fetch("rendering crashed".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<Map<String, Value>>>,
    }

    #[async_trait]
    impl DealStore for RecordingStore {
        async fn exists(&self, key: &NaturalKey) -> Result<bool, EngineError> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().any(|fields| {
                match key {
                    NaturalKey::Url(url) => {
                        fields.get("URL").and_then(Value::as_str) == Some(url.as_str())
                    }
                    NaturalKey::TitleSource { title, source } => {
                        fields.get("Title").and_then(Value::as_str) == Some(title.as_str())
                            && fields.get("Source").and_then(Value::as_str)
                                == Some(source.as_str())
                    }
                }
            }))
        }

        async fn insert(&self, fields: &Map<String, Value>) -> Result<(), EngineError> {
            self.records.lock().unwrap().push(fields.clone());
            Ok(())
        }
    }

    /// One source yields a Houston listing, the other fails outright; the
    /// surviving record flows through filtering into exactly one store
    /// record, and a second identical run adds nothing.
    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let mut registry = ScraperRegistry::new(Duration::from_secs(5));
        registry.register(Box::new(FixedScraper));
        registry.register(Box::new(BrokenScraper));

        let outcome = registry.scrape_all().await;
        assert_eq!(outcome.sources_succeeded, 1);
        assert_eq!(outcome.sources_failed, 1);
        assert_eq!(outcome.listings.len(), 1);

        let criteria = FilterCriteria::new(
            Some(50_000),
            Some(5_000_000),
            vec!["houston".to_string(), "texas".to_string()],
        );
        let filtered = filter::filter_listings(outcome.listings, &criteria);
        assert_eq!(filtered.len(), 1);

        let store = RecordingStore::default();
        let engine = SyncEngine::new(&store);

        let report = engine.sync_all(&filtered).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed, 0);

        {
            let records = store.records.lock().unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["Source"], "X");
            assert_eq!(records[0]["Title"], "ABC Plumbing");
            assert_eq!(records[0]["Price"], "$120,000");
            assert_eq!(records[0]["Location"], "Houston, TX");
            assert!(!records[0].contains_key("URL"));
        }

        // Re-running the same filtered set must not duplicate anything
        let second = engine.sync_all(&filtered).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped_existing, 1);
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }
}
