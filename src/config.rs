use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

/// Runtime configuration: source URLs, filter criteria and scraper knobs.
///
/// Loaded from `data/config.yaml` with environment-variable overrides.
/// Destination-store credentials are deliberately not part of this file;
/// they come from the environment only, see [`AirtableConfig`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_dealstream_url")]
    pub dealstream_url: String,
    #[serde(default = "default_bizquest_url")]
    pub bizquest_url: String,
    #[serde(default = "default_sba_feed_url")]
    pub sba_feed_url: String,

    /// Inclusive price bounds. Listings with unknown price always pass.
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    /// Case-insensitive substrings matched against location and title.
    /// Empty means no location filtering.
    #[serde(default)]
    pub required_locations: Vec<String>,

    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Hard per-adapter budget. Rendered-page fetches are the slowest step
    /// and must not stall the whole run.
    #[serde(default = "default_adapter_timeout_seconds")]
    pub adapter_timeout_seconds: u64,
}

fn default_dealstream_url() -> String {
    "https://dealstream.com/texas-businesses-for-sale".to_string()
}

fn default_bizquest_url() -> String {
    "https://www.bizquest.com/texas/houston-businesses-for-sale/".to_string()
}

fn default_sba_feed_url() -> String {
    "https://sba-llms-prd-public.sbalenderportal.com/SBA-Monthly-Lender7AActivity.xlsx".to_string()
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_adapter_timeout_seconds() -> u64 {
    120
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "data/config.yaml";

        let mut config: Config = if let Ok(config_str) = fs::read_to_string(config_path) {
            serde_yaml::from_str(&config_str)?
        } else {
            Config::default()
        };

        // Override with environment variables if present
        if let Ok(url) = env::var("DEALSTREAM_URL") {
            config.dealstream_url = url;
        }

        if let Ok(url) = env::var("BIZQUEST_URL") {
            config.bizquest_url = url;
        }

        if let Ok(url) = env::var("SBA_FEED_URL") {
            config.sba_feed_url = url;
        }

        if let Ok(min_price) = env::var("MIN_PRICE") {
            config.min_price = Some(
                min_price
                    .parse()
                    .context("Failed to parse MIN_PRICE environment variable")?,
            );
        }

        if let Ok(max_price) = env::var("MAX_PRICE") {
            config.max_price = Some(
                max_price
                    .parse()
                    .context("Failed to parse MAX_PRICE environment variable")?,
            );
        }

        if let Ok(locations) = env::var("REQUIRED_LOCATIONS") {
            // Parse comma-separated location substrings
            config.required_locations = locations
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(tracing_level) = env::var("TRACING_LEVEL") {
            config.tracing_level = tracing_level;
        }

        if let Ok(request_delay) = env::var("REQUEST_DELAY_MS") {
            config.request_delay_ms = request_delay
                .parse()
                .context("Failed to parse REQUEST_DELAY_MS environment variable")?;
        }

        if let Ok(timeout) = env::var("ADAPTER_TIMEOUT_SECONDS") {
            config.adapter_timeout_seconds = timeout
                .parse()
                .context("Failed to parse ADAPTER_TIMEOUT_SECONDS environment variable")?;
        }

        if let (Some(min), Some(max)) = (config.min_price, config.max_price) {
            if min > max {
                anyhow::bail!("min_price ({}) must not exceed max_price ({})", min, max);
            }
        }

        Ok(config)
    }

    pub fn create_default() -> Result<()> {
        std::fs::create_dir_all("data")?;

        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write("data/config.yaml", config_str)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dealstream_url: default_dealstream_url(),
            bizquest_url: default_bizquest_url(),
            sba_feed_url: default_sba_feed_url(),
            min_price: Some(50_000),
            max_price: Some(5_000_000),
            required_locations: vec![
                "houston".to_string(),
                "texas".to_string(),
                "tx".to_string(),
            ],
            tracing_level: default_tracing_level(),
            request_delay_ms: default_request_delay_ms(),
            adapter_timeout_seconds: default_adapter_timeout_seconds(),
        }
    }
}

/// Destination-store credentials, environment only.
///
/// Missing required values are the one fatal condition of a run and must
/// abort before any network activity.
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub base_id: String,
    pub table: String,
    pub token: String,
}

impl AirtableConfig {
    pub fn from_env() -> Result<Self> {
        let base_id = env::var("AIRTABLE_BASE")
            .context("AIRTABLE_BASE is required (set it in the environment or .env)")?;
        let token = env::var("AIRTABLE_TOKEN")
            .context("AIRTABLE_TOKEN is required (set it in the environment or .env)")?;
        let table = env::var("AIRTABLE_TABLE").unwrap_or_else(|_| "Deals".to_string());

        if base_id.trim().is_empty() {
            anyhow::bail!("AIRTABLE_BASE must not be empty");
        }

        if token.trim().is_empty() {
            anyhow::bail!("AIRTABLE_TOKEN must not be empty");
        }

        Ok(Self {
            base_id,
            table,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_texas_focus() {
        let config = Config::default();
        assert_eq!(config.min_price, Some(50_000));
        assert_eq!(config.max_price, Some(5_000_000));
        assert!(config.required_locations.contains(&"houston".to_string()));
        assert!(config.required_locations.contains(&"tx".to_string()));
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.dealstream_url, config.dealstream_url);
        assert_eq!(parsed.min_price, config.min_price);
        assert_eq!(parsed.required_locations, config.required_locations);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "min_price: 10000\nmax_price: 200000\n";
        let parsed: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.min_price, Some(10_000));
        assert_eq!(parsed.max_price, Some(200_000));
        assert_eq!(parsed.adapter_timeout_seconds, 120);
        assert!(parsed.required_locations.is_empty());
        assert!(parsed.dealstream_url.contains("dealstream.com"));
    }
}
