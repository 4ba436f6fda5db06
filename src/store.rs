// Entity store
// Persistence contract for listings, bookings, reviews and users, plus the in-memory implementation
// used by the service and the tests. The store enforces the two hard constraints itself:
// no overlapping occupying bookings per listing, and one review per (user, listing).

use crate::availability::{conflicts_with, StayRange};
use crate::error::{EntityKind, StoreError};
use crate::models::{
    Booking, BookingId, BookingStatus, Listing, ListingId, Review, ReviewId, User, UserId,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub type Mutation<T> = Box<dyn FnOnce(&mut T) + Send>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub listings: usize,
    pub bookings: usize,
    pub reviews: usize,
    pub users: usize,
}

#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    async fn insert_listing(&self, listing: Listing) -> Result<(), StoreError>;

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, StoreError>;

    // Atomic read-modify-write of a single listing
    async fn update_listing(
        &self,
        id: ListingId,
        mutation: Mutation<Listing>,
    ) -> Result<Listing, StoreError>;

    // Writes the derived rating fields; only the rating aggregator calls this
    async fn set_listing_rating(
        &self,
        id: ListingId,
        average_rating: f64,
        total_reviews: u32,
    ) -> Result<(), StoreError>;

    async fn list_listings(&self) -> Result<Vec<Listing>, StoreError>;

    async fn listings_by_host(&self, host_id: UserId) -> Result<Vec<Listing>, StoreError>;

    /// Inserts a booking, failing with `StoreError::Overlap` when an occupying booking would
    /// overlap another occupying booking on the same listing.
    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;

    /// Replaces a booking only if its stored status still equals `expected`.
    async fn replace_booking(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> Result<Booking, StoreError>;

    async fn occupying_bookings(
        &self,
        listing_id: ListingId,
        range: StayRange,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn listings_with_conflicts(
        &self,
        range: StayRange,
    ) -> Result<HashSet<ListingId>, StoreError>;

    async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError>;

    async fn bookings_for_listings(
        &self,
        listing_ids: &[ListingId],
    ) -> Result<Vec<Booking>, StoreError>;

    async fn has_completed_booking(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<bool, StoreError>;

    async fn booking_counts_by_status(
        &self,
    ) -> Result<BTreeMap<BookingStatus, usize>, StoreError>;

    /// Inserts a review, failing with `StoreError::DuplicateReview` if the user already
    /// reviewed the listing.
    async fn insert_review(&self, review: Review) -> Result<(), StoreError>;

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError>;

    async fn delete_review(&self, id: ReviewId) -> Result<Review, StoreError>;

    async fn reviews_for_listing(&self, listing_id: ListingId) -> Result<Vec<Review>, StoreError>;

    async fn reviews_for_listings(
        &self,
        listing_ids: &[ListingId],
    ) -> Result<Vec<Review>, StoreError>;

    async fn insert_user(&self, user: User) -> Result<(), StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn update_user(&self, id: UserId, mutation: Mutation<User>) -> Result<User, StoreError>;

    async fn record_counts(&self) -> Result<RecordCounts, StoreError>;
}

#[derive(Default)]
struct BookingTable {
    by_id: HashMap<BookingId, Booking>,
    by_listing: HashMap<ListingId, Vec<BookingId>>,
}

impl BookingTable {
    fn on_listing<'a>(&'a self, listing_id: &ListingId) -> impl Iterator<Item = &'a Booking> + 'a {
        self.by_listing
            .get(listing_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.by_id.get(id))
    }
}

#[derive(Default)]
struct ReviewTable {
    by_id: HashMap<ReviewId, Review>,
    by_author: HashMap<(UserId, ListingId), ReviewId>,
}

pub struct InMemoryStore {
    listings: DashMap<ListingId, Listing>,
    users: DashMap<UserId, User>,
    bookings: RwLock<BookingTable>,
    reviews: RwLock<ReviewTable>,
    available: AtomicBool,
    failing_listing_writes: AtomicUsize,
    failing_user_writes: AtomicUsize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            listings: DashMap::new(),
            users: DashMap::new(),
            bookings: RwLock::new(BookingTable::default()),
            reviews: RwLock::new(ReviewTable::default()),
            available: AtomicBool::new(true),
            failing_listing_writes: AtomicUsize::new(0),
            failing_user_writes: AtomicUsize::new(0),
        }
    }

    // Fault injection: every operation fails while the store is marked unavailable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.available.store(!unavailable, Ordering::SeqCst);
    }

    pub fn fail_next_listing_updates(&self, count: usize) {
        self.failing_listing_writes.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_user_updates(&self, count: usize) {
        self.failing_user_writes.store(count, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("entity store is offline".to_string()))
        }
    }

    fn take_injected_failure(counter: &AtomicUsize, what: &str) -> Result<(), StoreError> {
        let consumed = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            Err(StoreError::Unavailable(format!("{} write failed", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn insert_listing(&self, listing: Listing) -> Result<(), StoreError> {
        self.ensure_available()?;
        if self.listings.contains_key(&listing.id) {
            return Err(StoreError::DuplicateId(listing.id));
        }
        self.listings.insert(listing.id, listing);
        Ok(())
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        self.ensure_available()?;
        Ok(self.listings.get(&id).map(|l| l.clone()))
    }

    async fn update_listing(
        &self,
        id: ListingId,
        mutation: Mutation<Listing>,
    ) -> Result<Listing, StoreError> {
        self.ensure_available()?;
        Self::take_injected_failure(&self.failing_listing_writes, "listing")?;
        let mut entry = self
            .listings
            .get_mut(&id)
            .ok_or(StoreError::Missing(EntityKind::Listing, id))?;
        mutation(entry.value_mut());
        Ok(entry.clone())
    }

    async fn set_listing_rating(
        &self,
        id: ListingId,
        average_rating: f64,
        total_reviews: u32,
    ) -> Result<(), StoreError> {
        self.ensure_available()?;
        Self::take_injected_failure(&self.failing_listing_writes, "listing")?;
        let mut entry = self
            .listings
            .get_mut(&id)
            .ok_or(StoreError::Missing(EntityKind::Listing, id))?;
        entry.average_rating = average_rating;
        entry.total_reviews = total_reviews;
        Ok(())
    }

    async fn list_listings(&self) -> Result<Vec<Listing>, StoreError> {
        self.ensure_available()?;
        Ok(self.listings.iter().map(|l| l.clone()).collect())
    }

    async fn listings_by_host(&self, host_id: UserId) -> Result<Vec<Listing>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .listings
            .iter()
            .filter(|l| l.host_id == host_id)
            .map(|l| l.clone())
            .collect())
    }

    async fn insert_booking(&self, booking: Booking) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut table = self.bookings.write();
        if table.by_id.contains_key(&booking.id) {
            return Err(StoreError::DuplicateId(booking.id));
        }

        // Exclusion constraint, checked under the table write lock
        if booking.status.is_occupying() {
            let stay = booking.stay();
            let conflicts: Vec<_> = table
                .on_listing(&booking.listing_id)
                .filter(|existing| conflicts_with(existing, &stay))
                .map(Booking::window)
                .collect();
            if !conflicts.is_empty() {
                return Err(StoreError::Overlap {
                    listing_id: booking.listing_id,
                    conflicts,
                });
            }
        }

        table
            .by_listing
            .entry(booking.listing_id)
            .or_default()
            .push(booking.id);
        table.by_id.insert(booking.id, booking);
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        self.ensure_available()?;
        Ok(self.bookings.read().by_id.get(&id).cloned())
    }

    async fn replace_booking(
        &self,
        booking: Booking,
        expected: BookingStatus,
    ) -> Result<Booking, StoreError> {
        self.ensure_available()?;
        let mut table = self.bookings.write();
        let current = table
            .by_id
            .get_mut(&booking.id)
            .ok_or(StoreError::Missing(EntityKind::Booking, booking.id))?;
        if current.status != expected {
            return Err(StoreError::StaleWrite {
                expected,
                actual: current.status,
            });
        }
        *current = booking.clone();
        Ok(booking)
    }

    async fn occupying_bookings(
        &self,
        listing_id: ListingId,
        range: StayRange,
    ) -> Result<Vec<Booking>, StoreError> {
        self.ensure_available()?;
        let table = self.bookings.read();
        let mut conflicts: Vec<Booking> = table
            .on_listing(&listing_id)
            .filter(|b| conflicts_with(b, &range))
            .cloned()
            .collect();
        conflicts.sort_by_key(|b| b.check_in);
        Ok(conflicts)
    }

    async fn listings_with_conflicts(
        &self,
        range: StayRange,
    ) -> Result<HashSet<ListingId>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .bookings
            .read()
            .by_id
            .values()
            .filter(|b| conflicts_with(b, &range))
            .map(|b| b.listing_id)
            .collect())
    }

    async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .bookings
            .read()
            .by_id
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_listings(
        &self,
        listing_ids: &[ListingId],
    ) -> Result<Vec<Booking>, StoreError> {
        self.ensure_available()?;
        let table = self.bookings.read();
        Ok(listing_ids
            .iter()
            .flat_map(|id| table.on_listing(id))
            .cloned()
            .collect())
    }

    async fn has_completed_booking(
        &self,
        user_id: UserId,
        listing_id: ListingId,
    ) -> Result<bool, StoreError> {
        self.ensure_available()?;
        Ok(self
            .bookings
            .read()
            .on_listing(&listing_id)
            .any(|b| b.user_id == user_id && b.status == BookingStatus::Completed))
    }

    async fn booking_counts_by_status(
        &self,
    ) -> Result<BTreeMap<BookingStatus, usize>, StoreError> {
        self.ensure_available()?;
        let mut counts = BTreeMap::new();
        for booking in self.bookings.read().by_id.values() {
            *counts.entry(booking.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_review(&self, review: Review) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut table = self.reviews.write();
        let key = (review.user_id, review.listing_id);
        if table.by_author.contains_key(&key) {
            return Err(StoreError::DuplicateReview {
                user_id: review.user_id,
                listing_id: review.listing_id,
            });
        }
        if table.by_id.contains_key(&review.id) {
            return Err(StoreError::DuplicateId(review.id));
        }
        table.by_author.insert(key, review.id);
        table.by_id.insert(review.id, review);
        Ok(())
    }

    async fn get_review(&self, id: ReviewId) -> Result<Option<Review>, StoreError> {
        self.ensure_available()?;
        Ok(self.reviews.read().by_id.get(&id).cloned())
    }

    async fn delete_review(&self, id: ReviewId) -> Result<Review, StoreError> {
        self.ensure_available()?;
        let mut table = self.reviews.write();
        let review = table
            .by_id
            .remove(&id)
            .ok_or(StoreError::Missing(EntityKind::Review, id))?;
        table.by_author.remove(&(review.user_id, review.listing_id));
        Ok(review)
    }

    async fn reviews_for_listing(&self, listing_id: ListingId) -> Result<Vec<Review>, StoreError> {
        self.reviews_for_listings(&[listing_id]).await
    }

    async fn reviews_for_listings(
        &self,
        listing_ids: &[ListingId],
    ) -> Result<Vec<Review>, StoreError> {
        self.ensure_available()?;
        let wanted: HashSet<&ListingId> = listing_ids.iter().collect();
        Ok(self
            .reviews
            .read()
            .by_id
            .values()
            .filter(|r| wanted.contains(&r.listing_id))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.ensure_available()?;
        if self.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateId(user.id));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.ensure_available()?;
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn update_user(&self, id: UserId, mutation: Mutation<User>) -> Result<User, StoreError> {
        self.ensure_available()?;
        Self::take_injected_failure(&self.failing_user_writes, "user")?;
        let mut entry = self
            .users
            .get_mut(&id)
            .ok_or(StoreError::Missing(EntityKind::User, id))?;
        mutation(entry.value_mut());
        Ok(entry.clone())
    }

    async fn record_counts(&self) -> Result<RecordCounts, StoreError> {
        self.ensure_available()?;
        Ok(RecordCounts {
            listings: self.listings.len(),
            bookings: self.bookings.read().by_id.len(),
            reviews: self.reviews.read().by_id.len(),
            users: self.users.len(),
        })
    }
}

// Record builders shared by the unit tests across modules
#[cfg(test)]
pub mod test_support {
    use crate::models::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    pub fn listing(host_id: UserId, max_guests: u32, price_per_night: f64) -> Listing {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Listing {
            id: Uuid::new_v4(),
            host_id,
            title: "Riverside Homestay".to_string(),
            description: "Quiet rooms by the river".to_string(),
            location: "Hoi An".to_string(),
            address: "12 Bach Dang".to_string(),
            coordinates: None,
            price_per_night,
            max_guests,
            bedrooms: 2,
            bathrooms: 1,
            amenities: vec![Amenity::Wifi],
            images: vec![],
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn booking(
        listing_id: ListingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        status: BookingStatus,
    ) -> Booking {
        booking_for(listing_id, Uuid::new_v4(), check_in, check_out, status)
    }

    pub fn booking_for(
        listing_id: ListingId,
        user_id: UserId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        status: BookingStatus,
    ) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            listing_id,
            user_id,
            check_in,
            check_out,
            guests: 2,
            total_price: 1_000_000.0,
            payment_method: PaymentMethod::default(),
            status,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    pub fn review(listing_id: ListingId, user_id: UserId, rating: u8) -> Review {
        Review {
            id: Uuid::new_v4(),
            listing_id,
            user_id,
            rating,
            comment: "Lovely stay".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use test_support::{booking, booking_for, listing, review};

    fn date(m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_exclusion_constraint_rejects_overlap() {
        let store = InMemoryStore::new();
        let listing_id = uuid::Uuid::new_v4();
        let first = booking(listing_id, date(6, 1), date(6, 5), BookingStatus::Confirmed);
        store.insert_booking(first.clone()).await.unwrap();

        let overlapping = booking(listing_id, date(6, 3), date(6, 7), BookingStatus::Pending);
        match store.insert_booking(overlapping).await {
            Err(StoreError::Overlap { conflicts, .. }) => {
                assert_eq!(conflicts, vec![first.window()])
            }
            other => panic!("Expected overlap, got {:?}", other),
        }

        // Other listings and touching ranges are unaffected
        store
            .insert_booking(booking(
                uuid::Uuid::new_v4(),
                date(6, 3),
                date(6, 7),
                BookingStatus::Pending,
            ))
            .await
            .unwrap();
        store
            .insert_booking(booking(listing_id, date(6, 5), date(6, 8), BookingStatus::Pending))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_occupying_bookings_skip_constraint() {
        let store = InMemoryStore::new();
        let listing_id = uuid::Uuid::new_v4();
        store
            .insert_booking(booking(listing_id, date(6, 1), date(6, 5), BookingStatus::Confirmed))
            .await
            .unwrap();
        store
            .insert_booking(booking(listing_id, date(6, 1), date(6, 5), BookingStatus::Completed))
            .await
            .unwrap();
        assert_eq!(store.record_counts().await.unwrap().bookings, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_admit_one_booking() {
        let store = Arc::new(InMemoryStore::new());
        let listing_id = uuid::Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .insert_booking(booking(
                            listing_id,
                            date(7, 1),
                            date(7, 4),
                            BookingStatus::Pending,
                        ))
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let admitted = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(()))))
            .count();
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_replace_booking_compares_status() {
        let store = InMemoryStore::new();
        let original = booking(uuid::Uuid::new_v4(), date(6, 1), date(6, 5), BookingStatus::Pending);
        store.insert_booking(original.clone()).await.unwrap();

        let mut confirmed = original.clone();
        confirmed.status = BookingStatus::Confirmed;
        store
            .replace_booking(confirmed.clone(), BookingStatus::Pending)
            .await
            .unwrap();

        let result = store.replace_booking(confirmed, BookingStatus::Pending).await;
        assert_eq!(
            result,
            Err(StoreError::StaleWrite {
                expected: BookingStatus::Pending,
                actual: BookingStatus::Confirmed
            })
        );
    }

    #[tokio::test]
    async fn test_review_uniqueness_per_user_and_listing() {
        let store = InMemoryStore::new();
        let (listing_id, user_id) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let first = review(listing_id, user_id, 5);
        store.insert_review(first.clone()).await.unwrap();
        assert!(matches!(
            store.insert_review(review(listing_id, user_id, 3)).await,
            Err(StoreError::DuplicateReview { .. })
        ));

        // Deleting frees the slot
        store.delete_review(first.id).await.unwrap();
        store.insert_review(review(listing_id, user_id, 3)).await.unwrap();
        assert_eq!(store.reviews_for_listing(listing_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_completed_booking_lookup() {
        let store = InMemoryStore::new();
        let (listing_id, user_id) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        store
            .insert_booking(booking_for(
                listing_id,
                user_id,
                date(3, 1),
                date(3, 3),
                BookingStatus::Confirmed,
            ))
            .await
            .unwrap();
        assert!(!store.has_completed_booking(user_id, listing_id).await.unwrap());

        store
            .insert_booking(booking_for(
                listing_id,
                user_id,
                date(2, 1),
                date(2, 3),
                BookingStatus::Completed,
            ))
            .await
            .unwrap();
        assert!(store.has_completed_booking(user_id, listing_id).await.unwrap());
    }

    #[test]
    fn test_host_and_booking_lookups() {
        let store = InMemoryStore::new();
        let host = uuid::Uuid::new_v4();
        let (first, second) = (listing(host, 2, 100.0), listing(host, 4, 200.0));

        tokio_test::block_on(async {
            store.insert_listing(first.clone()).await.unwrap();
            store.insert_listing(second.clone()).await.unwrap();
            store
                .insert_listing(listing(uuid::Uuid::new_v4(), 2, 100.0))
                .await
                .unwrap();
            assert_eq!(store.listings_by_host(host).await.unwrap().len(), 2);
            assert!(matches!(
                store.insert_listing(first.clone()).await,
                Err(StoreError::DuplicateId(_))
            ));

            for (listing_id, status) in [
                (first.id, BookingStatus::Pending),
                (second.id, BookingStatus::Cancelled),
                (second.id, BookingStatus::Completed),
            ] {
                store
                    .insert_booking(booking(listing_id, date(8, 1), date(8, 3), status))
                    .await
                    .unwrap();
            }
            let on_host = store
                .bookings_for_listings(&[first.id, second.id])
                .await
                .unwrap();
            assert_eq!(on_host.len(), 3);

            let window = StayRange::new(date(8, 2), date(8, 4)).unwrap();
            let blocked = store.listings_with_conflicts(window).await.unwrap();
            assert_eq!(blocked, HashSet::from([first.id]));

            let counts = store.booking_counts_by_status().await.unwrap();
            assert_eq!(counts.get(&BookingStatus::Pending), Some(&1));
            assert_eq!(counts.get(&BookingStatus::Confirmed), None);
        });
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryStore::new();
        let item = listing(uuid::Uuid::new_v4(), 2, 100.0);
        store.insert_listing(item.clone()).await.unwrap();

        store.fail_next_listing_updates(1);
        assert!(matches!(
            store.set_listing_rating(item.id, 4.0, 1).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_listing_rating(item.id, 4.0, 1).await.unwrap();

        store.set_unavailable(true);
        assert!(matches!(
            store.get_listing(item.id).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_unavailable(false);
        let stored = store.get_listing(item.id).await.unwrap().unwrap();
        assert_eq!(stored.average_rating, 4.0);
    }
}
