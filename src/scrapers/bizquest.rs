use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};

use crate::errors::EngineError;
use crate::http_client;
use crate::models::RawListing;
use crate::scraper_trait::Scraper;

const SOURCE: &str = "BizQuest";

/// Bounded work per run: only this many candidate containers are processed.
const MAX_CONTAINERS: usize = 20;

/// Container selectors tried in priority order; the first one yielding at
/// least one match wins.
const CONTAINER_SELECTORS: &[&str] = &[
    "div[class*='listing']",
    "article[class*='listing']",
    "div[class*='result']",
    "li[class*='result']",
    ".listing-card",
];

/// Class keywords for the generic fallback when no priority selector hits.
const CONTAINER_KEYWORDS: &[&str] = &["listing", "business", "opportunity", "result", "card"];

/// Place names recognized in container text when no "City, ST" pattern is
/// found.
const KNOWN_PLACES: &[&str] = &[
    "Houston",
    "Dallas",
    "Austin",
    "San Antonio",
    "Fort Worth",
    "Texas",
];

/// Plain-HTTP adapter for BizQuest.
///
/// The listing pages are server-rendered, so a browser-like reqwest session
/// is enough: warm up on the home page for cookies, pause like a human,
/// then parse the listing containers heuristically.
pub struct BizQuestScraper {
    client: reqwest::Client,
    url: String,
    base_origin: String,
    request_delay_ms: u64,
}

impl BizQuestScraper {
    pub fn new(url: &str, request_delay_ms: u64) -> Self {
        let base_origin = base_origin_of(url)
            .unwrap_or_else(|| "https://www.bizquest.com".to_string());

        Self {
            client: http_client::create_http_client(http_client::random_user_agent())
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.to_string(),
            base_origin,
            request_delay_ms,
        }
    }

    fn parse_listings(html: &str, base_origin: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);

        let mut listings = Vec::new();
        let containers = Self::find_containers(&document);

        if containers.is_empty() {
            tracing::warn!("No listing containers found. Page structure may have changed.");
            return listings;
        }

        for element in containers.into_iter().take(MAX_CONTAINERS) {
            // Heuristics are per-container: anything missing skips the
            // container, never the adapter.
            let Some((title, href)) = Self::extract_title(&element) else {
                continue;
            };

            let text: String = element.text().collect::<Vec<_>>().join(" ");

            let mut raw = RawListing::new(SOURCE);
            raw.title = Some(title);
            raw.url = href.map(|h| Self::resolve_url(&h, base_origin));
            raw.price = Self::extract_price(&text);
            raw.location = Self::extract_location(&text);
            raw.scraped_at = Some(Utc::now());
            listings.push(raw);
        }

        listings
    }

    /// Locate candidate listing containers, falling back to a keyword match
    /// on class attributes when none of the known selectors hit.
    fn find_containers<'a>(document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector_str in CONTAINER_SELECTORS {
            if let Ok(selector) = Selector::parse(selector_str) {
                let matches: Vec<ElementRef<'a>> = document.select(&selector).collect();
                if !matches.is_empty() {
                    tracing::debug!(
                        "Found {} containers with selector: {}",
                        matches.len(),
                        selector_str
                    );
                    return matches;
                }
            }
        }

        tracing::debug!("No priority selector matched, trying keyword fallback");

        let Ok(generic) = Selector::parse("div, article, li, section") else {
            return Vec::new();
        };

        document
            .select(&generic)
            .filter(|el| {
                el.value().attr("class").is_some_and(|class| {
                    let class = class.to_lowercase();
                    CONTAINER_KEYWORDS.iter().any(|kw| class.contains(kw))
                })
            })
            .collect()
    }

    /// Title and, when the title element is a link, its href.
    ///
    /// Tries an anchor whose class suggests a title, then any heading, then
    /// any anchor; the first with at least 5 chars of text wins.
    fn extract_title(element: &ElementRef) -> Option<(String, Option<String>)> {
        let candidates = ["a[class*='title']", "h1, h2, h3, h4, h5, h6", "a"];

        for candidate in candidates {
            let Ok(selector) = Selector::parse(candidate) else {
                continue;
            };

            for found in element.select(&selector) {
                let text: String = found.text().collect::<String>().trim().to_string();
                if text.chars().count() >= 5 {
                    let href = if found.value().name() == "a" {
                        found.value().attr("href").map(String::from)
                    } else {
                        None
                    };
                    return Some((text, href));
                }
            }
        }

        None
    }

    /// Convert a relative listing path to an absolute URL.
    fn resolve_url(href: &str, base_origin: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{base_origin}{href}")
        } else {
            format!("{base_origin}/{href}")
        }
    }

    /// First currency-prefixed numeral run in the container text.
    fn extract_price(text: &str) -> Option<String> {
        let price_regex = regex::Regex::new(r"\$[0-9][0-9,]*").ok()?;
        price_regex.find(text).map(|m| m.as_str().to_string())
    }

    /// First "City, ST" run, else the first known place name in the text.
    fn extract_location(text: &str) -> Option<String> {
        if let Ok(city_state_regex) =
            regex::Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)*, [A-Z]{2}\b")
        {
            if let Some(m) = city_state_regex.find(text) {
                return Some(m.as_str().to_string());
            }
        }

        let lower = text.to_lowercase();
        KNOWN_PLACES
            .iter()
            .find(|place| lower.contains(&place.to_lowercase()))
            .map(|place| place.to_string())
    }
}

#[async_trait]
impl Scraper for BizQuestScraper {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn scrape(&self) -> Result<Vec<RawListing>, EngineError> {
        // Cookie/session priming before the target page
        http_client::warm_up(&self.client, &self.base_origin).await;
        http_client::human_delay(500, 500 + self.request_delay_ms).await;

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::Fetch(format!("failed to fetch {}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Fetch(format!(
                "{} returned {status}",
                self.url
            )));
        }

        let html = response.text().await?;
        tracing::debug!("Fetched {} bytes from {}", html.len(), self.url);

        Ok(Self::parse_listings(&html, &self.base_origin))
    }
}

/// `scheme://host` of a URL, the base listing paths resolve against.
fn base_origin_of(url: &str) -> Option<String> {
    let parsed = url.parse::<reqwest::Url>().ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{host}", parsed.scheme()))
}
