// Listing search
// Conjunctive filters over active listings, with an optional date window that drops every listing
// holding an occupying booking in that window.

use crate::availability::AvailabilityEngine;
use crate::config::ServiceConfig;
use crate::error::{BookingError, Result};
use crate::models::{Amenity, Listing};
use crate::pagination::{Page, PageRequest};
use crate::store::EntityStore;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListingSearch {
    pub location: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub guests: Option<u32>,
    // Matches listings offering any of these
    pub amenities: Option<Vec<Amenity>>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub page: PageRequest,
}

impl ListingSearch {
    /// Applies the non-date predicates to one listing.
    pub fn matches(&self, listing: &Listing) -> bool {
        if !listing.is_active {
            return false;
        }

        if let Some(text) = self.location.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let hit = [&listing.title, &listing.location, &listing.address]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !self
            .min_price
            .map_or(true, |min| listing.price_per_night >= min)
        {
            return false;
        }

        if !self
            .max_price
            .map_or(true, |max| listing.price_per_night <= max)
        {
            return false;
        }

        if !self.guests.map_or(true, |guests| listing.max_guests >= guests) {
            return false;
        }

        self.amenities.as_ref().map_or(true, |wanted| {
            wanted.is_empty() || wanted.iter().any(|a| listing.amenities.contains(a))
        })
    }
}

pub struct SearchService {
    store: Arc<dyn EntityStore>,
    availability: AvailabilityEngine,
    config: Arc<ServiceConfig>,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        availability: AvailabilityEngine,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            store,
            availability,
            config,
        }
    }

    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &ListingSearch) -> Result<Page<Listing>> {
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(BookingError::validation(
                    "Minimum price cannot exceed maximum price",
                ));
            }
        }

        // The date filter applies only when both ends are given
        let excluded = match (query.check_in, query.check_out) {
            (Some(check_in), Some(check_out)) => {
                let range = self.availability.validate_window(check_in, check_out)?;
                Some(self.availability.unavailable_listings(range).await?)
            }
            _ => None,
        };

        let mut results: Vec<Listing> = self
            .store
            .list_listings()
            .await?
            .into_iter()
            .filter(|listing| query.matches(listing))
            .filter(|listing| {
                excluded
                    .as_ref()
                    .map_or(true, |ids| !ids.contains(&listing.id))
            })
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        debug!(
            matched = results.len(),
            excluded_by_dates = excluded.as_ref().map_or(0, |ids| ids.len()),
            "Listing search evaluated"
        );
        Page::paginate(results, &query.page, &self.config)
    }
}
