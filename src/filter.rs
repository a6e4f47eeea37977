use crate::models::Listing;

/// Price and geography criteria applied to the aggregated listing set.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Inclusive lower bound on the price magnitude.
    pub min_price: Option<u64>,
    /// Inclusive upper bound on the price magnitude.
    pub max_price: Option<u64>,
    /// Case-insensitive substrings matched against location and title.
    /// Empty means every location passes.
    pub required_locations: Vec<String>,
}

impl FilterCriteria {
    pub fn new(
        min_price: Option<u64>,
        max_price: Option<u64>,
        required_locations: Vec<String>,
    ) -> Self {
        Self {
            min_price,
            max_price,
            required_locations,
        }
    }
}

/// Apply the criteria, preserving input order.
///
/// Listings with an absent or unparseable price bypass the price bounds:
/// unknown price passes. A change to that policy needs product sign-off.
pub fn filter_listings(listings: Vec<Listing>, criteria: &FilterCriteria) -> Vec<Listing> {
    listings
        .into_iter()
        .filter(|listing| passes_price(listing, criteria) && passes_location(listing, criteria))
        .collect()
}

fn passes_price(listing: &Listing, criteria: &FilterCriteria) -> bool {
    if criteria.min_price.is_none() && criteria.max_price.is_none() {
        return true;
    }

    let Some(magnitude) = listing.price_magnitude() else {
        // Unknown price passes
        return true;
    };

    if let Some(min) = criteria.min_price {
        if magnitude < min {
            return false;
        }
    }

    if let Some(max) = criteria.max_price {
        if magnitude > max {
            return false;
        }
    }

    true
}

fn passes_location(listing: &Listing, criteria: &FilterCriteria) -> bool {
    if criteria.required_locations.is_empty() {
        return true;
    }

    let location = listing
        .location
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let title = listing.title.to_lowercase();

    criteria
        .required_locations
        .iter()
        .any(|required| {
            let required = required.to_lowercase();
            location.contains(&required) || title.contains(&required)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn listing(title: &str, price: Option<&str>, location: Option<&str>) -> Listing {
        Listing {
            source: "DealStream".to_string(),
            title: title.to_string(),
            url: None,
            price: price.map(String::from),
            location: location.map(String::from),
            description: None,
            scraped_at: Utc::now(),
        }
    }

    fn texas_criteria() -> FilterCriteria {
        FilterCriteria::new(
            Some(50_000),
            Some(5_000_000),
            vec!["houston".to_string(), "texas".to_string(), "tx".to_string()],
        )
    }

    #[test]
    fn test_price_below_min_excluded() {
        let result = filter_listings(
            vec![listing("Shop in Houston", Some("$49,999"), None)],
            &texas_criteria(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_price_bounds_are_inclusive() {
        let result = filter_listings(
            vec![
                listing("Shop in Houston", Some("$50,000"), None),
                listing("Plant in Houston", Some("$5,000,000"), None),
            ],
            &texas_criteria(),
        );
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_price_above_max_excluded() {
        let result = filter_listings(
            vec![listing("Refinery in Houston", Some("$5,000,001"), None)],
            &texas_criteria(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_unknown_price_passes_bounds() {
        let result = filter_listings(
            vec![
                listing("Shop in Houston", None, None),
                listing("Cafe in Houston", Some("Call for price"), None),
            ],
            &texas_criteria(),
        );
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_location_matches_on_location_field() {
        let result = filter_listings(
            vec![listing("Coffee Shop", Some("$100,000"), Some("Dallas, TX"))],
            &texas_criteria(),
        );
        assert_eq!(result.len(), 1, "'Dallas, TX' should match 'tx'");
    }

    #[test]
    fn test_location_matches_on_title_fallback() {
        let result = filter_listings(
            vec![listing("Bakery — $85,000 in Houston, TX", None, None)],
            &texas_criteria(),
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_no_location_and_no_title_match_excluded() {
        let result = filter_listings(
            vec![listing("Coffee Shop", Some("$100,000"), None)],
            &texas_criteria(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_location_match_is_case_insensitive() {
        let result = filter_listings(
            vec![listing("Coffee Shop", Some("$100,000"), Some("HOUSTON"))],
            &texas_criteria(),
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_empty_required_locations_passes_all() {
        let criteria = FilterCriteria::new(None, None, vec![]);
        let result = filter_listings(
            vec![listing("Coffee Shop", None, None)],
            &criteria,
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_filter_preserves_order() {
        let input = vec![
            listing("A Houston", Some("$60,000"), None),
            listing("B too cheap", Some("$10,000"), Some("Houston")),
            listing("C Houston", Some("$70,000"), None),
            listing("D Houston", None, None),
        ];

        let result = filter_listings(input, &texas_criteria());
        let titles: Vec<&str> = result.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["A Houston", "C Houston", "D Houston"]);
    }
}
