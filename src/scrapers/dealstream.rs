use async_trait::async_trait;
use chrono::Utc;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;

use crate::browser::BrowserSession;
use crate::errors::EngineError;
use crate::models::{format_price, RawListing};
use crate::normalizer::truncate_description;
use crate::scraper_trait::Scraper;

const SOURCE: &str = "DealStream";

/// Selector candidates signalling that the listing grid has rendered.
/// Checked in priority order; the page layout changes often enough that no
/// single one can be trusted.
const READY_SELECTORS: &[&str] = &[
    "div[data-testid*='listing']",
    "div[class*='listing']",
    "article[class*='card']",
    ".listing-card",
    "[data-cy='listing-card']",
];

/// Rendered-page adapter for DealStream.
///
/// The listing grid is rendered client-side, so this adapter drives a
/// headless browser and then reads the JSON-LD structured data the page
/// embeds instead of scraping the markup itself.
pub struct DealStreamScraper {
    url: String,
    browser_timeout: Duration,
}

impl DealStreamScraper {
    pub fn new(url: &str, browser_timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            browser_timeout,
        }
    }

    /// Pull listings out of the JSON-LD blocks of a rendered page.
    ///
    /// Zero matching blocks is a normal outcome (empty result, not an
    /// error); individual malformed blocks are skipped.
    fn parse_structured_listings(html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);

        let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
            return Vec::new();
        };

        let mut listings = Vec::new();

        for script in document.select(&selector) {
            let raw_json: String = script.text().collect();

            let data: Value = match serde_json::from_str(&raw_json) {
                Ok(data) => data,
                Err(e) => {
                    tracing::debug!("Skipping malformed JSON-LD block: {}", e);
                    continue;
                }
            };

            if data.get("@type").and_then(Value::as_str) != Some("SearchResultsPage") {
                continue;
            }

            let Some(about) = data.get("about").and_then(Value::as_array) else {
                continue;
            };

            for wrapper in about {
                let Some(item) = wrapper.get("item") else {
                    continue;
                };
                if let Some(listing) = Self::extract_product(item) {
                    listings.push(listing);
                }
            }
        }

        listings
    }

    /// Map one `Product` item to a raw record, or `None` when it fails the
    /// quality bar (no URL, or a title too short to be a real listing name).
    fn extract_product(item: &Value) -> Option<RawListing> {
        if item.get("@type").and_then(Value::as_str) != Some("Product") {
            return None;
        }

        let title = item
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Business Listing")
            .replace(" - DealStream", "");
        let url = item.get("url").and_then(Value::as_str).unwrap_or_default();

        if url.is_empty() || title.chars().count() <= 5 {
            return None;
        }

        let offers = item.get("offers");
        let price = offers.and_then(Self::extract_offer_price);
        let location = offers.and_then(Self::extract_offer_location);

        let description = item
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(truncate_description);

        let mut raw = RawListing::new(SOURCE);
        raw.title = Some(title);
        raw.url = Some(url.to_string());
        raw.price = price;
        raw.location = location;
        raw.description = description;
        raw.scraped_at = Some(Utc::now());
        Some(raw)
    }

    /// Price from the nested offer, reformatted with a currency prefix and
    /// thousands separators.
    fn extract_offer_price(offers: &Value) -> Option<String> {
        let price = offers.get("price")?;

        let magnitude = match price {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64))?,
            Value::String(s) => {
                let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().ok()?
            }
            _ => return None,
        };

        Some(format_price(magnitude))
    }

    /// Location from the offer's address: "City, Region" when both are
    /// present, region alone when the city is absent.
    fn extract_offer_location(offers: &Value) -> Option<String> {
        let address = offers.get("availableAtOrFrom")?.get("address")?;

        let city = address
            .get("addressLocality")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let region = address
            .get("addressRegion")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if !city.is_empty() && !region.is_empty() {
            Some(format!("{city}, {region}"))
        } else if !region.is_empty() {
            Some(region.to_string())
        } else {
            None
        }
    }
}

#[async_trait]
impl Scraper for DealStreamScraper {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn scrape(&self) -> Result<Vec<RawListing>, EngineError> {
        let session = BrowserSession::launch(self.browser_timeout).await?;

        // The session must be closed on every path out of here, including
        // fetch failures.
        let fetched = session.fetch_rendered(&self.url, READY_SELECTORS).await;
        session.close().await;

        let html = fetched?;
        tracing::debug!("Rendered {} chars of HTML from {}", html.len(), self.url);

        let listings = Self::parse_structured_listings(&html);
        tracing::info!("Parsed {} structured listings from DealStream", listings.len());

        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_json_ld(json: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{json}</script></head>
            <body><div class="listing-grid"></div></body></html>"#
        )
    }

    const SEARCH_RESULTS: &str = r#"{
        "@type": "SearchResultsPage",
        "about": [
            {
                "item": {
                    "@type": "Product",
                    "name": "ABC Plumbing Company - DealStream",
                    "url": "https://dealstream.com/listing/abc-plumbing",
                    "description": "Established plumbing business serving the Houston metro.",
                    "offers": {
                        "price": 120000,
                        "availableAtOrFrom": {
                            "address": {
                                "addressLocality": "Houston",
                                "addressRegion": "TX"
                            }
                        }
                    }
                }
            },
            {
                "item": {
                    "@type": "Product",
                    "name": "Gulf Coast Logistics",
                    "url": "https://dealstream.com/listing/gulf-coast",
                    "offers": {
                        "price": "2,500,000",
                        "availableAtOrFrom": {
                            "address": { "addressRegion": "TX" }
                        }
                    }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parses_products_from_search_results_page() {
        let html = page_with_json_ld(SEARCH_RESULTS);
        let listings = DealStreamScraper::parse_structured_listings(&html);

        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.source, "DealStream");
        assert_eq!(first.title.as_deref(), Some("ABC Plumbing Company"));
        assert_eq!(
            first.url.as_deref(),
            Some("https://dealstream.com/listing/abc-plumbing")
        );
        assert_eq!(first.price.as_deref(), Some("$120,000"));
        assert_eq!(first.location.as_deref(), Some("Houston, TX"));
        assert!(first.scraped_at.is_some());
    }

    #[test]
    fn test_source_suffix_stripped_from_title() {
        let html = page_with_json_ld(SEARCH_RESULTS);
        let listings = DealStreamScraper::parse_structured_listings(&html);
        assert!(!listings[0].title.as_deref().unwrap().contains("DealStream"));
    }

    #[test]
    fn test_region_only_location() {
        let html = page_with_json_ld(SEARCH_RESULTS);
        let listings = DealStreamScraper::parse_structured_listings(&html);
        assert_eq!(listings[1].location.as_deref(), Some("TX"));
    }

    #[test]
    fn test_string_price_reformatted() {
        let html = page_with_json_ld(SEARCH_RESULTS);
        let listings = DealStreamScraper::parse_structured_listings(&html);
        assert_eq!(listings[1].price.as_deref(), Some("$2,500,000"));
    }

    #[test]
    fn test_item_without_url_discarded() {
        let json = r#"{
            "@type": "SearchResultsPage",
            "about": [
                { "item": { "@type": "Product", "name": "No URL Business" } }
            ]
        }"#;
        let listings = DealStreamScraper::parse_structured_listings(&page_with_json_ld(json));
        assert!(listings.is_empty());
    }

    #[test]
    fn test_short_title_discarded() {
        let json = r#"{
            "@type": "SearchResultsPage",
            "about": [
                { "item": { "@type": "Product", "name": "Shop",
                            "url": "https://dealstream.com/listing/shop" } }
            ]
        }"#;
        let listings = DealStreamScraper::parse_structured_listings(&page_with_json_ld(json));
        assert!(listings.is_empty(), "5-char-or-shorter titles fail the quality bar");
    }

    #[test]
    fn test_missing_address_means_absent_location() {
        let json = r#"{
            "@type": "SearchResultsPage",
            "about": [
                { "item": { "@type": "Product", "name": "Unlocated Business",
                            "url": "https://dealstream.com/listing/u",
                            "offers": { "price": 75000 } } }
            ]
        }"#;
        let listings = DealStreamScraper::parse_structured_listings(&page_with_json_ld(json));
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].location, None);
        assert_eq!(listings[0].price.as_deref(), Some("$75,000"));
    }

    #[test]
    fn test_long_description_truncated() {
        let long_description = "x".repeat(450);
        let json = format!(
            r#"{{
                "@type": "SearchResultsPage",
                "about": [
                    {{ "item": {{ "@type": "Product", "name": "Verbose Business",
                                "url": "https://dealstream.com/listing/v",
                                "description": "{long_description}" }} }}
                ]
            }}"#
        );
        let listings = DealStreamScraper::parse_structured_listings(&page_with_json_ld(&json));
        let description = listings[0].description.as_deref().unwrap();
        assert_eq!(description.chars().count(), 203);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn test_malformed_json_ld_block_skipped() {
        let html = format!(
            r#"<html><head>
            <script type="application/ld+json">{{not valid json</script>
            <script type="application/ld+json">{SEARCH_RESULTS}</script>
            </head><body></body></html>"#
        );
        let listings = DealStreamScraper::parse_structured_listings(&html);
        assert_eq!(listings.len(), 2, "good block still parsed after a bad one");
    }

    #[test]
    fn test_page_without_structured_data_yields_empty() {
        let html = "<html><body><h1>No script tags here</h1></body></html>";
        let listings = DealStreamScraper::parse_structured_listings(html);
        assert!(listings.is_empty());
    }

    #[test]
    fn test_non_search_results_json_ld_ignored() {
        let json = r#"{ "@type": "Organization", "name": "DealStream Inc" }"#;
        let listings = DealStreamScraper::parse_structured_listings(&page_with_json_ld(json));
        assert!(listings.is_empty());
    }
}
