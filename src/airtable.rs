use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::AirtableConfig;
use crate::errors::EngineError;
use crate::models::Listing;

/// How a listing is recognized as "the same" across runs.
///
/// The URL is the stablest identifier the sources give us; the tabular feed
/// has no URLs, so its synthesized titles plus the source name stand in.
#[derive(Debug, Clone, PartialEq)]
pub enum NaturalKey {
    Url(String),
    TitleSource { title: String, source: String },
}

impl NaturalKey {
    pub fn for_listing(listing: &Listing) -> Self {
        match &listing.url {
            Some(url) => NaturalKey::Url(url.clone()),
            None => NaturalKey::TitleSource {
                title: listing.title.clone(),
                source: listing.source.clone(),
            },
        }
    }
}

/// The destination store as the sync engine sees it: an existence check by
/// natural key and an insert. Kept as a trait so the engine can run against
/// an in-memory double in tests.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn exists(&self, key: &NaturalKey) -> Result<bool, EngineError>;
    async fn insert(&self, fields: &Map<String, Value>) -> Result<(), EngineError>;
}

/// Airtable REST client for one base/table.
pub struct AirtableClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl AirtableClient {
    pub fn new(config: &AirtableConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "https://api.airtable.com/v0/{}/{}",
                config.base_id,
                urlencoding::encode(&config.table)
            ),
            token: config.token.clone(),
        })
    }

    /// Airtable formula matching exactly the records with this natural key.
    fn existence_formula(key: &NaturalKey) -> String {
        match key {
            NaturalKey::Url(url) => format!("{{URL}} = '{}'", escape_formula_str(url)),
            NaturalKey::TitleSource { title, source } => format!(
                "AND({{Title}} = '{}', {{Source}} = '{}')",
                escape_formula_str(title),
                escape_formula_str(source)
            ),
        }
    }
}

/// Escape a value for interpolation into a single-quoted Airtable formula
/// string.
fn escape_formula_str(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl DealStore for AirtableClient {
    async fn exists(&self, key: &NaturalKey) -> Result<bool, EngineError> {
        let formula = Self::existence_formula(key);
        let url = format!(
            "{}?maxRecords=1&filterByFormula={}",
            self.endpoint,
            urlencoding::encode(&formula)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| EngineError::Upload(format!("existence check failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Upload(format!(
                "existence check returned {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Upload(format!("existence check returned bad JSON: {e}")))?;

        let found = body
            .get("records")
            .and_then(Value::as_array)
            .map(|records| !records.is_empty())
            .unwrap_or(false);

        Ok(found)
    }

    async fn insert(&self, fields: &Map<String, Value>) -> Result<(), EngineError> {
        // typecast lets Airtable coerce values into the column types it has
        let body = json!({
            "fields": fields,
            "typecast": true,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Upload(format!("insert request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Upload(format!(
                "insert returned {status}: {body}"
            )));
        }

        Ok(())
    }
}
