// Marketplace facade
// Wires the services over one store, clock, config and stats set, and exposes the public
// operation surface.

use crate::availability::{AvailabilityEngine, AvailabilityReport};
use crate::booking::{BookingManager, NewBooking};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, ServiceConfig};
use crate::error::Result;
use crate::listing::ListingService;
use crate::models::{Booking, BookingId, Listing, ListingId, Principal, Review};
use crate::pagination::Page;
use crate::profile::ProfileService;
use crate::rating::RatingAggregator;
use crate::review::{NewReview, ReviewService};
use crate::search::{ListingSearch, SearchService};
use crate::stats::ServiceStats;
use crate::store::{EntityStore, InMemoryStore};
use crate::system::SystemService;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

pub struct Marketplace {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    availability: AvailabilityEngine,
    bookings: BookingManager,
    aggregator: Arc<RatingAggregator>,
    reviews: ReviewService,
    search: SearchService,
    listings: ListingService,
    profiles: ProfileService,
    system: SystemService,
    stats: Arc<ServiceStats>,
}

impl Marketplace {
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        info!(
            cancellation_window_hours = config.cancellation_window_hours,
            "Marketplace initialized"
        );
        Ok(Self::assemble(Arc::new(config), store, clock))
    }

    /// In-memory store and wall clock with default configuration.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    // Default config always validates
    pub fn with_store(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self::assemble(Arc::new(ServiceConfig::default()), store, clock)
    }

    fn assemble(
        config: Arc<ServiceConfig>,
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stats = Arc::new(ServiceStats::default());
        let availability = AvailabilityEngine::new(store.clone(), clock.clone());
        let aggregator = Arc::new(RatingAggregator::new(store.clone(), stats.clone()));

        Self {
            bookings: BookingManager::new(
                store.clone(),
                availability.clone(),
                clock.clone(),
                config.clone(),
                stats.clone(),
            ),
            reviews: ReviewService::new(
                store.clone(),
                aggregator.clone(),
                clock.clone(),
                config.clone(),
                stats.clone(),
            ),
            search: SearchService::new(store.clone(), availability.clone(), config.clone()),
            listings: ListingService::new(store.clone(), clock.clone()),
            profiles: ProfileService::new(store.clone(), aggregator.clone(), clock.clone(), config),
            system: SystemService::new(store.clone(), clock.clone(), stats.clone()),
            store,
            clock,
            availability,
            aggregator,
            stats,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn availability(&self) -> &AvailabilityEngine {
        &self.availability
    }

    pub fn bookings(&self) -> &BookingManager {
        &self.bookings
    }

    pub fn ratings(&self) -> &RatingAggregator {
        &self.aggregator
    }

    pub fn reviews(&self) -> &ReviewService {
        &self.reviews
    }

    pub fn listings(&self) -> &ListingService {
        &self.listings
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    pub fn system(&self) -> &SystemService {
        &self.system
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    pub async fn search_listings(&self, query: &ListingSearch) -> Result<Page<Listing>> {
        self.search.search(query).await
    }

    pub async fn create_booking(&self, principal: &Principal, request: NewBooking) -> Result<Booking> {
        self.bookings.create(principal, request).await
    }

    pub async fn cancel_booking(
        &self,
        principal: &Principal,
        booking_id: BookingId,
        reason: Option<String>,
    ) -> Result<Booking> {
        self.bookings.cancel(principal, booking_id, reason).await
    }

    pub async fn check_availability(
        &self,
        listing_id: ListingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<AvailabilityReport> {
        self.availability
            .check_availability(listing_id, check_in, check_out)
            .await
    }

    pub async fn create_review(&self, principal: &Principal, request: NewReview) -> Result<Review> {
        self.reviews.create(principal, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorKind;
    use crate::listing::NewListing;
    use crate::models::{Amenity, BookingStatus, Role, User};
    use chrono::{TimeZone, Utc};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ServiceConfig {
            max_page_size: 0,
            ..Default::default()
        };
        let result = Marketplace::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn test_stay_to_review_flow() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
        ));
        let market = Marketplace::with_store(Arc::new(InMemoryStore::new()), clock.clone());

        let host = User::new("Hoa", "hoa@example.com", Role::Host, clock.now());
        market.store().insert_user(host.clone()).await.unwrap();
        let host = host.principal();
        let guest = Principal::new(uuid::Uuid::new_v4(), Role::User);

        let listing = market
            .listings()
            .create(
                &host,
                NewListing {
                    title: "Lotus Homestay".to_string(),
                    description: "Family rooms near the old town".to_string(),
                    location: "Hoi An".to_string(),
                    address: "3 Nguyen Thai Hoc".to_string(),
                    coordinates: None,
                    price_per_night: 1_000_000.0,
                    max_guests: 4,
                    bedrooms: 2,
                    bathrooms: 2,
                    amenities: vec![Amenity::Wifi, Amenity::Pool],
                    images: vec![],
                },
            )
            .await
            .unwrap();

        let booking = market
            .create_booking(
                &guest,
                NewBooking {
                    listing_id: listing.id,
                    check_in: date(6, 1),
                    check_out: date(6, 5),
                    guests: 2,
                    total_price: 4_000_000.0,
                    payment_method: None,
                },
            )
            .await
            .unwrap();

        let report = market
            .check_availability(listing.id, date(6, 3), date(6, 7))
            .await
            .unwrap();
        assert!(!report.available);

        // Review before the stay is completed is refused
        let review = NewReview {
            listing_id: listing.id,
            rating: 5,
            comment: "Wonderful".to_string(),
        };
        assert_eq!(
            market
                .create_review(&guest, review.clone())
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::State
        );

        market.bookings().confirm(&host, booking.id).await.unwrap();
        let completed = market.bookings().complete(&host, booking.id).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        market.create_review(&guest, review).await.unwrap();
        let stored = market.listings().get(listing.id).await.unwrap();
        assert_eq!((stored.average_rating, stored.total_reviews), (5.0, 1));

        // Completed stays no longer hold the dates
        let found = market
            .search_listings(&ListingSearch {
                check_in: Some(date(6, 2)),
                check_out: Some(date(6, 4)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.total, 1);

        let report = market.stats().report();
        assert_eq!(report.bookings_created, 1);
        assert_eq!(report.reviews_created, 1);
    }
}
