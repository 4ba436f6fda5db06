// Rating aggregator
// Listing ratings are a cache over the review records: recomputed from scratch after every review
// create/delete, one listing at a time. Host aggregates are computed when a profile is read.

use crate::error::Result;
use crate::locks::ListingLocks;
use crate::models::{ListingId, UserId};
use crate::stats::ServiceStats;
use crate::store::EntityStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

impl RatingSummary {
    pub const EMPTY: RatingSummary = RatingSummary {
        average: 0.0,
        count: 0,
    };

    /// Mean rating rounded half-up to one decimal; zero reviews gives 0.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0u64), |(sum, count), r| (sum + r as u64, count + 1));
        if count == 0 {
            return Self::EMPTY;
        }
        // Integer rounding on tenths avoids float drift at the .x5 boundary
        let tenths = (sum * 20 + count) / (2 * count);
        RatingSummary {
            average: tenths as f64 / 10.0,
            count: count as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HostStats {
    pub total_listings: u32,
    pub total_bookings: u32,
    pub host_rating: f64,
}

pub struct RatingAggregator {
    store: Arc<dyn EntityStore>,
    locks: ListingLocks,
    stats: Arc<ServiceStats>,
}

impl RatingAggregator {
    pub fn new(store: Arc<dyn EntityStore>, stats: Arc<ServiceStats>) -> Self {
        Self {
            store,
            locks: ListingLocks::new(),
            stats,
        }
    }

    /// Reads every review of the listing, recomputes and writes the cached fields.
    pub async fn recompute_listing(&self, listing_id: ListingId) -> Result<RatingSummary> {
        let _guard = self.locks.lock(listing_id).await;

        let reviews = self.store.reviews_for_listing(listing_id).await?;
        let summary = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));
        self.store
            .set_listing_rating(listing_id, summary.average, summary.count)
            .await?;

        ServiceStats::incr(&self.stats.rating_recomputations);
        debug!(%listing_id, average = summary.average, count = summary.count, "Listing rating recomputed");
        Ok(summary)
    }

    pub async fn on_review_committed(&self, listing_id: ListingId) -> Option<RatingSummary> {
        self.refresh_best_effort(listing_id).await
    }

    pub async fn on_review_removed(&self, listing_id: ListingId) -> Option<RatingSummary> {
        self.refresh_best_effort(listing_id).await
    }

    // The cache is not authoritative, so a failed refresh never fails the review operation
    async fn refresh_best_effort(&self, listing_id: ListingId) -> Option<RatingSummary> {
        match self.recompute_listing(listing_id).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                ServiceStats::incr(&self.stats.rating_writeback_failures);
                warn!(%listing_id, error = %err, "Failed to refresh listing rating");
                None
            }
        }
    }

    /// Host aggregates straight from the records: active listings, bookings on any of the
    /// host's listings, and the rounded mean over all their reviews.
    pub async fn host_stats(&self, host_id: UserId) -> Result<HostStats> {
        let listings = self.store.listings_by_host(host_id).await?;
        let listing_ids: Vec<ListingId> = listings.iter().map(|l| l.id).collect();

        let (bookings, reviews) = futures::try_join!(
            self.store.bookings_for_listings(&listing_ids),
            self.store.reviews_for_listings(&listing_ids),
        )?;

        Ok(HostStats {
            total_listings: listings.iter().filter(|l| l.is_active).count() as u32,
            total_bookings: bookings.len() as u32,
            host_rating: RatingSummary::from_ratings(reviews.iter().map(|r| r.rating)).average,
        })
    }

    /// Computes host stats and caches them on the user record. A failed cache write is logged
    /// and the freshly computed stats are still returned.
    pub async fn refresh_host_stats(&self, host_id: UserId) -> Result<HostStats> {
        let stats = self.host_stats(host_id).await?;

        let cached = self
            .store
            .update_user(
                host_id,
                Box::new(move |user: &mut crate::models::User| {
                    user.host_info.total_listings = stats.total_listings;
                    user.host_info.total_bookings = stats.total_bookings;
                    user.host_info.host_rating = stats.host_rating;
                }),
            )
            .await;
        match cached {
            Ok(_) => info!(%host_id, ?stats, "Host stats refreshed"),
            Err(err) => {
                ServiceStats::incr(&self.stats.host_stats_cache_failures);
                warn!(%host_id, error = %err, "Failed to cache host stats");
            }
        }
        Ok(stats)
    }
}
