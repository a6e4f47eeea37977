use serde_json::{Map, Value};

use crate::airtable::{DealStore, NaturalKey};
use crate::models::Listing;

/// Outcome counts for one sync pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Pushes filtered listings into the destination store, skipping listings
/// whose natural key already exists so repeated runs never create duplicate
/// records.
pub struct SyncEngine<'a, S: DealStore> {
    store: &'a S,
}

impl<'a, S: DealStore> SyncEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Sync every listing, in order, each attempt independent of the rest.
    ///
    /// A failed existence check counts as a failed listing rather than
    /// risking a duplicate insert. Inserts get a single attempt; retry is an
    /// extension point, see `EngineError::is_retryable`.
    pub async fn sync_all(&self, listings: &[Listing]) -> SyncReport {
        let mut report = SyncReport::default();

        for listing in listings {
            let key = NaturalKey::for_listing(listing);

            match self.store.exists(&key).await {
                Ok(true) => {
                    tracing::debug!("Already in store, skipping: {}", listing.title);
                    report.skipped_existing += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Existence check failed for '{}': {}", listing.title, e);
                    report.failed += 1;
                    continue;
                }
            }

            let fields = build_record(listing);
            match self.store.insert(&fields).await {
                Ok(()) => {
                    tracing::info!("Uploaded: {}", listing.title);
                    report.inserted += 1;
                }
                Err(e) => {
                    tracing::warn!("Upload failed for '{}': {}", listing.title, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Destination record for a listing. `Source` and `Title` always present;
/// optional fields attached only when the listing has them, so absent values
/// never overwrite destination-side defaults with nulls.
pub fn build_record(listing: &Listing) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("Source".to_string(), Value::String(listing.source.clone()));
    fields.insert("Title".to_string(), Value::String(listing.title.clone()));

    if let Some(url) = &listing.url {
        fields.insert("URL".to_string(), Value::String(url.clone()));
    }
    if let Some(price) = &listing.price {
        fields.insert("Price".to_string(), Value::String(price.clone()));
    }
    if let Some(location) = &listing.location {
        fields.insert("Location".to_string(), Value::String(location.clone()));
    }

    fields
}
