// Booking lifecycle manager
// Creation runs check-then-insert inside the listing's lock, and the store re-checks overlap on insert.
// Status changes are compare-and-set on the stored status, so two cancels cannot both succeed.

use crate::availability::AvailabilityEngine;
use crate::clock::{start_of_day, Clock};
use crate::config::ServiceConfig;
use crate::error::{BookingError, EntityKind, Result};
use crate::locks::ListingLocks;
use crate::models::{
    Booking, BookingId, BookingStatus, ListingId, PaymentMethod, Principal,
};
use crate::pagination::{Page, PageRequest};
use crate::stats::ServiceStats;
use crate::store::EntityStore;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewBooking {
    pub listing_id: ListingId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub total_price: f64,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub page: PageRequest,
}

pub struct BookingManager {
    store: Arc<dyn EntityStore>,
    availability: AvailabilityEngine,
    locks: ListingLocks,
    clock: Arc<dyn Clock>,
    config: Arc<ServiceConfig>,
    stats: Arc<ServiceStats>,
}

impl BookingManager {
    pub fn new(
        store: Arc<dyn EntityStore>,
        availability: AvailabilityEngine,
        clock: Arc<dyn Clock>,
        config: Arc<ServiceConfig>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            store,
            availability,
            locks: ListingLocks::new(),
            clock,
            config,
            stats,
        }
    }

    #[instrument(skip(self, request), fields(user_id = %principal.id, listing_id = %request.listing_id))]
    pub async fn create(&self, principal: &Principal, request: NewBooking) -> Result<Booking> {
        if request.guests == 0 {
            return Err(BookingError::validation("Must have at least 1 guest"));
        }
        if !request.total_price.is_finite() || request.total_price < 0.0 {
            return Err(BookingError::validation("Total price must be positive"));
        }
        let range = self
            .availability
            .validate_window(request.check_in, request.check_out)?;

        let listing = self
            .store
            .get_listing(request.listing_id)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| BookingError::not_found(EntityKind::Listing, request.listing_id))?;

        if request.guests > listing.max_guests {
            return Err(BookingError::validation(format!(
                "Maximum guests allowed: {}",
                listing.max_guests
            )));
        }

        let _guard = self.locks.lock(listing.id).await;

        let availability = self.availability.availability_for(listing.id, range).await?;
        if !availability.available {
            ServiceStats::incr(&self.stats.booking_conflicts);
            warn!(
                conflicts = availability.conflicts.len(),
                "Rejected booking for occupied dates"
            );
            return Err(BookingError::DateConflict {
                listing_id: listing.id,
                conflicts: availability.conflicts.iter().map(Booking::window).collect(),
            });
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            listing_id: listing.id,
            user_id: principal.id,
            check_in: range.check_in(),
            check_out: range.check_out(),
            guests: request.guests,
            total_price: request.total_price,
            payment_method: request.payment_method.unwrap_or_default(),
            status: BookingStatus::Pending,
            created_at: self.clock.now(),
            cancelled_at: None,
            cancel_reason: None,
        };

        if let Err(err) = self.store.insert_booking(booking.clone()).await {
            let err = BookingError::from(err);
            if matches!(err, BookingError::DateConflict { .. }) {
                ServiceStats::incr(&self.stats.booking_conflicts);
            }
            return Err(err);
        }

        ServiceStats::incr(&self.stats.bookings_created);
        info!(booking_id = %booking.id, nights = range.nights(), "Booking created");
        Ok(booking)
    }

    #[instrument(skip(self, reason), fields(user_id = %principal.id))]
    pub async fn cancel(
        &self,
        principal: &Principal,
        booking_id: BookingId,
        reason: Option<String>,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        if !principal.owns_or_admin(booking.user_id) {
            return Err(BookingError::unauthorized(
                "Not authorized to cancel this booking",
            ));
        }

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(BookingError::InvalidState {
                    status: booking.status,
                    message: "booking is already cancelled".to_string(),
                })
            }
            BookingStatus::Completed => {
                return Err(BookingError::InvalidState {
                    status: booking.status,
                    message: "cannot cancel completed booking".to_string(),
                })
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let now = self.clock.now();
        let window_hours = self.config.cancellation_window_hours;
        let remaining = start_of_day(booking.check_in) - now;
        // Exactly the window is still allowed
        if remaining < chrono::Duration::hours(window_hours) {
            return Err(BookingError::CancellationWindowClosed {
                window_hours,
                hours_remaining: remaining.num_hours(),
            });
        }

        let mut cancelled = booking.clone();
        cancelled.status = BookingStatus::Cancelled;
        cancelled.cancelled_at = Some(now);
        cancelled.cancel_reason = Some(
            reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| self.config.default_cancel_reason.clone()),
        );

        let cancelled = self.store.replace_booking(cancelled, booking.status).await?;
        ServiceStats::incr(&self.stats.bookings_cancelled);
        info!(%booking_id, "Booking cancelled");
        Ok(cancelled)
    }

    /// Host of the listing (or an admin) accepts a pending booking.
    pub async fn confirm(&self, principal: &Principal, booking_id: BookingId) -> Result<Booking> {
        self.transition(principal, booking_id, BookingStatus::Confirmed)
            .await
    }

    /// Host of the listing (or an admin) closes out a confirmed stay.
    pub async fn complete(&self, principal: &Principal, booking_id: BookingId) -> Result<Booking> {
        self.transition(principal, booking_id, BookingStatus::Completed)
            .await
    }

    async fn transition(
        &self,
        principal: &Principal,
        booking_id: BookingId,
        next: BookingStatus,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        let host_id = self.listing_host(booking.listing_id).await?;
        if !principal.owns_or_admin(host_id) {
            return Err(BookingError::unauthorized(format!(
                "Only the listing host can mark a booking {}",
                next
            )));
        }

        if !booking.status.can_transition_to(next) {
            return Err(BookingError::InvalidState {
                status: booking.status,
                message: format!("cannot move to {}", next),
            });
        }

        let mut updated = booking.clone();
        updated.status = next;
        let updated = self.store.replace_booking(updated, booking.status).await?;
        info!(%booking_id, from = %booking.status, to = %next, "Booking status changed");
        Ok(updated)
    }

    /// Visible to the guest who booked, the listing host and admins.
    pub async fn get(&self, principal: &Principal, booking_id: BookingId) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if principal.owns_or_admin(booking.user_id) {
            return Ok(booking);
        }
        let host_id = self.listing_host(booking.listing_id).await?;
        if principal.id == host_id {
            Ok(booking)
        } else {
            Err(BookingError::unauthorized("Not authorized to view this booking"))
        }
    }

    // Newest first
    pub async fn list_for_user(
        &self,
        principal: &Principal,
        filter: &BookingFilter,
    ) -> Result<Page<Booking>> {
        let mut bookings: Vec<Booking> = self
            .store
            .bookings_for_user(principal.id)
            .await?
            .into_iter()
            .filter(|b| filter.status.map_or(true, |status| b.status == status))
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Page::paginate(bookings, &filter.page, &self.config)
    }

    async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Booking, booking_id))
    }

    async fn listing_host(&self, listing_id: ListingId) -> Result<Uuid> {
        self.store
            .get_listing(listing_id)
            .await?
            .map(|l| l.host_id)
            .ok_or_else(|| BookingError::not_found(EntityKind::Listing, listing_id))
    }
}
