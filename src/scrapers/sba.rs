use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use chrono::Utc;
use std::io::Cursor;
use std::time::Duration;

use crate::errors::EngineError;
use crate::models::RawListing;
use crate::scraper_trait::Scraper;

const SOURCE: &str = "SBA-7a";

const COL_BUSINESS: &str = "Business Name";
const COL_CITY: &str = "City";
const COL_STATE: &str = "State";
const COL_AMOUNT: &str = "Gross Approval";

/// Tabular-feed adapter for the SBA 7(a) lender activity file.
///
/// The feed is published as either a spreadsheet or a delimited-text file;
/// the format is detected from the Content-Type header or the file
/// extension. Rows missing the mapped columns fall back to defaults rather
/// than failing.
pub struct SbaFeedScraper {
    client: reqwest::Client,
    url: String,
}

impl SbaFeedScraper {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            url: url.to_string(),
        }
    }

    fn is_spreadsheet(url: &str, content_type: &str) -> bool {
        content_type.contains("spreadsheet")
            || url.ends_with(".xls")
            || url.ends_with(".xlsx")
    }

    fn parse_xlsx(bytes: &[u8]) -> Result<Vec<RawListing>, EngineError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| EngineError::Parse(format!("failed to open workbook: {e}")))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| EngineError::Parse("workbook has no sheets".to_string()))?
            .map_err(|e| EngineError::Parse(format!("failed to read sheet: {e}")))?;

        let mut rows = range.rows();

        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default();

        let listings = rows
            .map(|row| {
                let get = |name: &str| {
                    headers
                        .iter()
                        .position(|h| h.as_str() == name)
                        .and_then(|i| row.get(i))
                        .map(cell_text)
                        .unwrap_or_default()
                };

                Self::row_to_listing(
                    &get(COL_BUSINESS),
                    &get(COL_CITY),
                    &get(COL_STATE),
                    &get(COL_AMOUNT),
                )
            })
            .collect();

        Ok(listings)
    }

    fn parse_csv(bytes: &[u8]) -> Result<Vec<RawListing>, EngineError> {
        let mut reader = csv::Reader::from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| EngineError::Parse(format!("failed to read CSV headers: {e}")))?
            .clone();

        let mut listings = Vec::new();

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!("Skipping malformed CSV row: {}", e);
                    continue;
                }
            };

            let get = |name: &str| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .and_then(|i| record.get(i))
                    .unwrap_or_default()
                    .to_string()
            };

            listings.push(Self::row_to_listing(
                &get(COL_BUSINESS),
                &get(COL_CITY),
                &get(COL_STATE),
                &get(COL_AMOUNT),
            ));
        }

        Ok(listings)
    }

    /// Synthesize the single-line title the feed's columns map into.
    fn row_to_listing(business: &str, city: &str, state: &str, amount: &str) -> RawListing {
        let business = if business.is_empty() { "Unknown" } else { business };

        let mut raw = RawListing::new(SOURCE);
        raw.title = Some(format!("{business} — ${amount} in {city}, {state}"));
        raw.scraped_at = Some(Utc::now());
        raw
    }
}

/// Cell contents as trimmed text; empty cells become the empty string.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

#[async_trait]
impl Scraper for SbaFeedScraper {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn scrape(&self) -> Result<Vec<RawListing>, EngineError> {
        tracing::info!("Fetching SBA loan feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::Fetch(format!("failed to fetch feed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Fetch(format!("feed returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = response.bytes().await?;

        if Self::is_spreadsheet(&self.url, &content_type) {
            Self::parse_xlsx(&bytes)
        } else {
            Self::parse_csv(&bytes)
        }
    }
}
