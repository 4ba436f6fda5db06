// Error types for the booking core
// Every failure carries a kind so callers can branch on it instead of parsing messages.

use crate::models::{BookingStatus, BookingWindow, ListingId, UserId};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    State,
    TransientStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Listing,
    Booking,
    Review,
    User,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Listing => "Listing",
            EntityKind::Booking => "Booking",
            EntityKind::Review => "Review",
            EntityKind::User => "User",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("Listing {listing_id} is not available for the selected dates ({} conflicting booking(s))", .conflicts.len())]
    DateConflict {
        listing_id: ListingId,
        conflicts: Vec<BookingWindow>,
    },

    #[error("User {user_id} has already reviewed listing {listing_id}")]
    DuplicateReview {
        user_id: UserId,
        listing_id: ListingId,
    },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Invalid booking state: booking is {status}, {message}")]
    InvalidState {
        status: BookingStatus,
        message: String,
    },

    #[error("Cannot cancel booking less than {window_hours} hours before check-in ({hours_remaining}h remaining)")]
    CancellationWindowClosed {
        window_hours: i64,
        hours_remaining: i64,
    },

    #[error("User {user_id} has no completed stay at listing {listing_id}")]
    ReviewNotEligible {
        user_id: UserId,
        listing_id: ListingId,
    },

    #[error("Store unavailable: {0}")]
    TransientStore(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::NotFound { .. } => ErrorKind::NotFound,
            BookingError::DateConflict { .. } | BookingError::DuplicateReview { .. } => {
                ErrorKind::Conflict
            }
            BookingError::Authorization(_) => ErrorKind::Authorization,
            BookingError::InvalidState { .. }
            | BookingError::CancellationWindowClosed { .. }
            | BookingError::ReviewNotEligible { .. } => ErrorKind::State,
            BookingError::TransientStore(_) => ErrorKind::TransientStore,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BookingError::Authorization(message.into())
    }

    pub fn not_found(entity: EntityKind, id: Uuid) -> Self {
        BookingError::NotFound { entity, id }
    }
}

// Errors raised by the persistence layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("{0} not found: {1}")]
    Missing(EntityKind, Uuid),

    #[error("Record already exists: {0}")]
    DuplicateId(Uuid),

    #[error("Booking on listing {listing_id} overlaps {} occupying booking(s)", .conflicts.len())]
    Overlap {
        listing_id: ListingId,
        conflicts: Vec<BookingWindow>,
    },

    #[error("Review already exists for user {user_id} on listing {listing_id}")]
    DuplicateReview {
        user_id: UserId,
        listing_id: ListingId,
    },

    #[error("Stale write: expected status {expected}, found {actual}")]
    StaleWrite {
        expected: BookingStatus,
        actual: BookingStatus,
    },
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => BookingError::TransientStore(message),
            StoreError::Missing(entity, id) => BookingError::NotFound { entity, id },
            StoreError::DuplicateId(id) => {
                BookingError::Validation(format!("Record already exists: {}", id))
            }
            StoreError::Overlap {
                listing_id,
                conflicts,
            } => BookingError::DateConflict {
                listing_id,
                conflicts,
            },
            StoreError::DuplicateReview {
                user_id,
                listing_id,
            } => BookingError::DuplicateReview {
                user_id,
                listing_id,
            },
            StoreError::StaleWrite { actual, .. } => BookingError::InvalidState {
                status: actual,
                message: "booking was modified concurrently".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
