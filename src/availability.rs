// Availability engine
// Owns the one conflict predicate used by booking creation, the store's exclusion check and search.

use crate::clock::{start_of_day, Clock};
use crate::error::{BookingError, EntityKind, Result};
use crate::models::{Booking, BookingWindow, ListingId, ListingSummary};
use crate::store::EntityStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Half-open stay `[check_in, check_out)`: the checkout day is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self> {
        if check_in >= check_out {
            return Err(BookingError::validation(
                "Check-out date must be after check-in date",
            ));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    // Ranges read back from stored bookings were validated on the way in
    pub(crate) fn from_stored(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && self.check_out > other.check_in
    }
}

/// The conflict predicate. Cancelled and completed bookings never conflict.
pub fn conflicts_with(booking: &Booking, range: &StayRange) -> bool {
    booking.status.is_occupying() && booking.stay().overlaps(range)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    pub listing_id: ListingId,
    pub range: StayRange,
    pub available: bool,
    pub conflicts: Vec<Booking>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestedStay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
}

// Response of the public availability check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub available: bool,
    pub listing: ListingSummary,
    pub requested: RequestedStay,
    pub conflicting_bookings: Vec<BookingWindow>,
}

#[derive(Clone)]
pub struct AvailabilityEngine {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityEngine {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Checks ordering and rejects a check-in instant (00:00 UTC of the check-in date) that has
    /// already passed.
    pub fn validate_window(&self, check_in: NaiveDate, check_out: NaiveDate) -> Result<StayRange> {
        let range = StayRange::new(check_in, check_out)?;
        if start_of_day(range.check_in()) < self.clock.now() {
            return Err(BookingError::validation(
                "Check-in date cannot be in the past",
            ));
        }
        Ok(range)
    }

    #[instrument(skip(self))]
    pub async fn is_available(
        &self,
        listing_id: ListingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Availability> {
        let range = self.validate_window(check_in, check_out)?;
        self.availability_for(listing_id, range).await
    }

    // For callers that already validated the window
    pub(crate) async fn availability_for(
        &self,
        listing_id: ListingId,
        range: StayRange,
    ) -> Result<Availability> {
        let conflicts = self.store.occupying_bookings(listing_id, range).await?;
        debug!(
            %listing_id,
            conflicts = conflicts.len(),
            "Evaluated availability"
        );
        Ok(Availability {
            listing_id,
            range,
            available: conflicts.is_empty(),
            conflicts,
        })
    }

    /// Listings holding at least one occupying booking that overlaps `range`.
    pub async fn unavailable_listings(&self, range: StayRange) -> Result<HashSet<ListingId>> {
        Ok(self.store.listings_with_conflicts(range).await?)
    }

    #[instrument(skip(self))]
    pub async fn check_availability(
        &self,
        listing_id: ListingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<AvailabilityReport> {
        let range = self.validate_window(check_in, check_out)?;

        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| BookingError::not_found(EntityKind::Listing, listing_id))?;

        let availability = self.availability_for(listing_id, range).await?;

        Ok(AvailabilityReport {
            available: availability.available,
            listing: listing.summary(),
            requested: RequestedStay {
                check_in: range.check_in(),
                check_out: range.check_out(),
                nights: range.nights(),
            },
            conflicting_bookings: availability
                .conflicts
                .iter()
                .map(Booking::window)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::ErrorKind;
    use crate::models::BookingStatus;
    use crate::store::{test_support, InMemoryStore};
    use test_case::test_case;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(from: u32, to: u32) -> StayRange {
        StayRange::new(date(2025, 6, from), date(2025, 6, to)).unwrap()
    }

    fn engine(store: Arc<InMemoryStore>) -> AvailabilityEngine {
        let clock = Arc::new(FixedClock::new(start_of_day(date(2025, 5, 1))));
        AvailabilityEngine::new(store, clock)
    }

    #[test_case(1, 5, 3, 7, true; "partial overlap")]
    #[test_case(1, 5, 5, 8, false; "touching checkout boundary")]
    #[test_case(5, 8, 1, 5, false; "touching checkin boundary")]
    #[test_case(1, 10, 3, 4, true; "containment")]
    #[test_case(3, 4, 1, 10, true; "contained")]
    #[test_case(1, 2, 9, 10, false; "disjoint")]
    fn test_half_open_overlap(a1: u32, a2: u32, b1: u32, b2: u32, expected: bool) {
        assert_eq!(range(a1, a2).overlaps(&range(b1, b2)), expected);
        assert_eq!(range(b1, b2).overlaps(&range(a1, a2)), expected);
    }

    #[test]
    fn test_range_requires_checkout_after_checkin() {
        let same_day = StayRange::new(date(2025, 6, 1), date(2025, 6, 1));
        assert_eq!(same_day.unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(range(1, 5).nights(), 4);
    }

    #[test_case(BookingStatus::Pending, true)]
    #[test_case(BookingStatus::Confirmed, true)]
    #[test_case(BookingStatus::Cancelled, false)]
    #[test_case(BookingStatus::Completed, false)]
    fn test_only_occupying_bookings_conflict(status: BookingStatus, expected: bool) {
        let booking = test_support::booking(
            uuid::Uuid::new_v4(),
            date(2025, 6, 1),
            date(2025, 6, 5),
            status,
        );
        assert_eq!(conflicts_with(&booking, &range(3, 7)), expected);
    }

    #[tokio::test]
    async fn test_past_check_in_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine(store);
        let err = engine
            .is_available(uuid::Uuid::new_v4(), date(2025, 4, 30), date(2025, 5, 2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // At midnight the check-in instant is exactly now
        assert!(engine
            .validate_window(date(2025, 5, 1), date(2025, 5, 2))
            .is_ok());
    }

    #[test]
    fn test_same_day_check_in_rejected_after_midnight() {
        let clock = Arc::new(FixedClock::new(start_of_day(date(2025, 6, 1))));
        let engine = AvailabilityEngine::new(Arc::new(InMemoryStore::new()), clock.clone());
        assert!(engine
            .validate_window(date(2025, 6, 1), date(2025, 6, 3))
            .is_ok());

        clock.advance(chrono::Duration::hours(15));
        let err = engine
            .validate_window(date(2025, 6, 1), date(2025, 6, 3))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(engine
            .validate_window(date(2025, 6, 2), date(2025, 6, 3))
            .is_ok());
    }

    #[tokio::test]
    async fn test_is_available_reports_conflicts_and_is_repeatable() {
        let store = Arc::new(InMemoryStore::new());
        let listing = test_support::listing(uuid::Uuid::new_v4(), 4, 1_000_000.0);
        store.insert_listing(listing.clone()).await.unwrap();
        let existing = test_support::booking(
            listing.id,
            date(2025, 6, 1),
            date(2025, 6, 5),
            BookingStatus::Confirmed,
        );
        store.insert_booking(existing.clone()).await.unwrap();
        let cancelled = test_support::booking(
            listing.id,
            date(2025, 6, 3),
            date(2025, 6, 4),
            BookingStatus::Cancelled,
        );
        store.insert_booking(cancelled).await.unwrap();

        let engine = engine(store);
        let first = engine
            .is_available(listing.id, date(2025, 6, 3), date(2025, 6, 7))
            .await
            .unwrap();
        assert!(!first.available);
        assert_eq!(first.conflicts, vec![existing]);

        let second = engine
            .is_available(listing.id, date(2025, 6, 3), date(2025, 6, 7))
            .await
            .unwrap();
        assert_eq!(first, second);

        let free = engine
            .is_available(listing.id, date(2025, 6, 5), date(2025, 6, 8))
            .await
            .unwrap();
        assert!(free.available);
    }

    #[tokio::test]
    async fn test_check_availability_needs_active_listing() {
        let store = Arc::new(InMemoryStore::new());
        let mut listing = test_support::listing(uuid::Uuid::new_v4(), 2, 500.0);
        listing.is_active = false;
        store.insert_listing(listing.clone()).await.unwrap();

        let engine = engine(store);
        let err = engine
            .check_availability(listing.id, date(2025, 6, 1), date(2025, 6, 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_check_availability_report() {
        let store = Arc::new(InMemoryStore::new());
        let listing = test_support::listing(uuid::Uuid::new_v4(), 2, 500.0);
        store.insert_listing(listing.clone()).await.unwrap();
        let pending = test_support::booking(
            listing.id,
            date(2025, 6, 2),
            date(2025, 6, 4),
            BookingStatus::Pending,
        );
        store.insert_booking(pending.clone()).await.unwrap();

        let report = engine(store)
            .check_availability(listing.id, date(2025, 6, 1), date(2025, 6, 3))
            .await
            .unwrap();
        assert!(!report.available);
        assert_eq!(report.requested.nights, 2);
        assert_eq!(report.listing.id, listing.id);
        assert_eq!(report.conflicting_bookings, vec![pending.window()]);
    }
}
