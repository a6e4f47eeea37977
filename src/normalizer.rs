use chrono::Utc;

use crate::models::{Listing, RawListing, MAX_DESCRIPTION_CHARS};

/// Coerce an adapter's raw record into the canonical listing shape.
///
/// Returns `None` when the record cannot satisfy the canonical invariants
/// (missing source or title); such records are dropped at the boundary.
/// Optional fields stay absent rather than becoming empty strings, and
/// `scraped_at` is filled exactly once for records whose adapter did not
/// stamp it.
pub fn normalize(raw: RawListing) -> Option<Listing> {
    let source = raw.source.trim();
    if source.is_empty() {
        tracing::debug!("Dropping record with empty source");
        return None;
    }

    let title = raw.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        tracing::debug!("Dropping {} record with empty title", source);
        return None;
    }

    Some(Listing {
        source: source.to_string(),
        title: title.to_string(),
        url: non_empty(raw.url),
        price: non_empty(raw.price),
        location: non_empty(raw.location),
        description: non_empty(raw.description).map(|d| truncate_description(&d)),
        scraped_at: raw.scraped_at.unwrap_or_else(Utc::now),
    })
}

/// Normalize a batch, dropping records that fail the canonical invariants.
pub fn normalize_all(raws: Vec<RawListing>) -> Vec<Listing> {
    raws.into_iter().filter_map(normalize).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Bound a description to [`MAX_DESCRIPTION_CHARS`] characters plus an
/// ellipsis marker. Counting chars rather than bytes keeps the cut on a
/// char boundary.
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        let truncated: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        format!("{truncated}...")
    } else {
        description.to_string()
    }
}
