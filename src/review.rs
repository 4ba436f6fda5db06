// Reviews
// Only guests with a completed stay may review, once per listing. Every create and delete is
// followed by an explicit rating recompute for the listing.

use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::error::{BookingError, EntityKind, Result};
use crate::models::{ListingId, ListingSummary, Principal, Review, ReviewId};
use crate::pagination::{Page, PageRequest};
use crate::rating::RatingAggregator;
use crate::stats::ServiceStats;
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewReview {
    pub listing_id: ListingId,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingBucket {
    pub rating: u8,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingReviews {
    pub listing: ListingSummary,
    pub reviews: Page<Review>,
    // Highest star first, only ratings that occur
    pub distribution: Vec<RatingBucket>,
}

pub struct ReviewService {
    store: Arc<dyn EntityStore>,
    aggregator: Arc<RatingAggregator>,
    clock: Arc<dyn Clock>,
    config: Arc<ServiceConfig>,
    stats: Arc<ServiceStats>,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        aggregator: Arc<RatingAggregator>,
        clock: Arc<dyn Clock>,
        config: Arc<ServiceConfig>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            store,
            aggregator,
            clock,
            config,
            stats,
        }
    }

    fn validate(&self, request: &NewReview) -> Result<()> {
        if !(1..=5).contains(&request.rating) {
            return Err(BookingError::validation("Rating must be between 1 and 5"));
        }
        let comment = request.comment.trim();
        if comment.is_empty() {
            return Err(BookingError::validation("Comment is required"));
        }
        if comment.chars().count() > self.config.max_comment_length {
            return Err(BookingError::validation(format!(
                "Comment cannot exceed {} characters",
                self.config.max_comment_length
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(user_id = %principal.id, listing_id = %request.listing_id))]
    pub async fn create(&self, principal: &Principal, request: NewReview) -> Result<Review> {
        self.validate(&request)?;

        if self.store.get_listing(request.listing_id).await?.is_none() {
            return Err(BookingError::not_found(
                EntityKind::Listing,
                request.listing_id,
            ));
        }

        if !self
            .store
            .has_completed_booking(principal.id, request.listing_id)
            .await?
        {
            return Err(BookingError::ReviewNotEligible {
                user_id: principal.id,
                listing_id: request.listing_id,
            });
        }

        let review = Review {
            id: Uuid::new_v4(),
            listing_id: request.listing_id,
            user_id: principal.id,
            rating: request.rating,
            comment: request.comment.trim().to_string(),
            created_at: self.clock.now(),
        };
        // Uniqueness on (user, listing) is enforced by the store
        self.store.insert_review(review.clone()).await?;

        ServiceStats::incr(&self.stats.reviews_created);
        info!(review_id = %review.id, rating = review.rating, "Review created");

        self.aggregator.on_review_committed(review.listing_id).await;
        Ok(review)
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn delete(&self, principal: &Principal, review_id: ReviewId) -> Result<Review> {
        let review = self
            .store
            .get_review(review_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Review, review_id))?;

        if !principal.owns_or_admin(review.user_id) {
            return Err(BookingError::unauthorized(
                "Not authorized to delete this review",
            ));
        }

        let removed = self.store.delete_review(review_id).await?;
        ServiceStats::incr(&self.stats.reviews_deleted);
        info!(%review_id, listing_id = %removed.listing_id, "Review deleted");

        self.aggregator.on_review_removed(removed.listing_id).await;
        Ok(removed)
    }

    /// Public review page for a listing: newest first, with the star distribution and the
    /// listing's cached aggregate.
    pub async fn listing_reviews(
        &self,
        listing_id: ListingId,
        page: &PageRequest,
    ) -> Result<ListingReviews> {
        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Listing, listing_id))?;

        let mut reviews = self.store.reviews_for_listing(listing_id).await?;
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut counts = [0usize; 5];
        for review in &reviews {
            if let Some(slot) = counts.get_mut(review.rating.saturating_sub(1) as usize) {
                *slot += 1;
            }
        }
        let distribution = (1..=5u8)
            .rev()
            .map(|rating| RatingBucket {
                rating,
                count: counts[(rating - 1) as usize],
            })
            .filter(|bucket| bucket.count > 0)
            .collect();

        Ok(ListingReviews {
            listing: listing.summary(),
            reviews: Page::paginate(reviews, page, &self.config)?,
            distribution,
        })
    }
}
