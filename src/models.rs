use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum description length kept on a canonical listing, not counting the
/// truncation marker.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// What a source adapter emits at the extraction boundary.
///
/// Everything except `source` is optional: absent means "the source did not
/// give us this", never empty-string, so downstream stages can tell unknown
/// from empty. The normalizer turns these into [`Listing`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub source: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl RawListing {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }
}

/// Canonical business-for-sale listing, the unit of work through the
/// pipeline. Produced only by the normalizer and read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub source: String,
    pub title: String,
    pub url: Option<String>,
    /// Formatted price string like `"$120,000"`. The digits must resolve to
    /// a non-negative integer magnitude; see [`Listing::price_magnitude`].
    pub price: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Listing {
    /// Numeric magnitude of the formatted price, if it parses.
    ///
    /// `"$1,250,000"` -> `Some(1250000)`. Listings whose price does not
    /// parse are treated as unknown-price by the filter.
    pub fn price_magnitude(&self) -> Option<u64> {
        parse_price_magnitude(self.price.as_deref()?)
    }
}

/// Extract the integer magnitude from a formatted price string.
pub fn parse_price_magnitude(price_text: &str) -> Option<u64> {
    let digits: String = price_text
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return None;
    }

    digits.parse::<u64>().ok()
}

/// Format a price magnitude with a currency prefix and thousands separators:
/// `1234567` -> `"$1,234,567"`.
pub fn format_price(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    format!("${out}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_magnitude_with_separators() {
        assert_eq!(parse_price_magnitude("$120,000"), Some(120_000));
        assert_eq!(parse_price_magnitude("$1,250,000"), Some(1_250_000));
    }

    #[test]
    fn test_parse_price_magnitude_plain_number() {
        assert_eq!(parse_price_magnitude("49999"), Some(49_999));
    }

    #[test]
    fn test_parse_price_magnitude_no_digits() {
        assert_eq!(parse_price_magnitude("Call for price"), None);
        assert_eq!(parse_price_magnitude(""), None);
    }

    #[test]
    fn test_format_price_small() {
        assert_eq!(format_price(850), "$850");
    }

    #[test]
    fn test_format_price_thousands() {
        assert_eq!(format_price(50_000), "$50,000");
    }

    #[test]
    fn test_format_price_millions() {
        assert_eq!(format_price(1_234_567), "$1,234,567");
    }

    #[test]
    fn test_format_price_round_trips_magnitude() {
        let formatted = format_price(5_000_000);
        assert_eq!(parse_price_magnitude(&formatted), Some(5_000_000));
    }

    #[test]
    fn test_price_magnitude_on_listing() {
        let listing = Listing {
            source: "DealStream".to_string(),
            title: "ABC Plumbing".to_string(),
            url: None,
            price: Some("$120,000".to_string()),
            location: None,
            description: None,
            scraped_at: Utc::now(),
        };
        assert_eq!(listing.price_magnitude(), Some(120_000));
    }

    #[test]
    fn test_price_magnitude_absent() {
        let listing = Listing {
            source: "SBA-7a".to_string(),
            title: "Bakery".to_string(),
            url: None,
            price: None,
            location: None,
            description: None,
            scraped_at: Utc::now(),
        };
        assert_eq!(listing.price_magnitude(), None);
    }
}
