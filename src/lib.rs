// Core of the homestay booking marketplace

// Domain, persistence and shared plumbing
pub mod clock;
pub mod config;
pub mod error;
pub mod locks;
pub mod models;
pub mod pagination;
pub mod stats;
pub mod store;

// Services
pub mod app;
pub mod availability;
pub mod booking;
pub mod listing;
pub mod profile;
pub mod rating;
pub mod review;
pub mod search;
pub mod seed;
pub mod system;

// Re-export key types for convenience
pub use app::Marketplace;
pub use availability::{Availability, AvailabilityEngine, AvailabilityReport, StayRange};
pub use booking::{BookingFilter, BookingManager, NewBooking};
pub use config::{ConfigError, ServiceConfig};
pub use error::{BookingError, ErrorKind, StoreError};
pub use listing::{ListingPatch, ListingService, NewListing};
pub use models::{Booking, BookingStatus, Listing, Principal, Review, Role, User};
pub use pagination::{Page, PageRequest};
pub use profile::{Dashboard, ProfileService, ProfileUpdate};
pub use rating::{HostStats, RatingAggregator, RatingSummary};
pub use review::{NewReview, ReviewService};
pub use search::{ListingSearch, SearchService};
pub use seed::seed_demo_data;
pub use store::{EntityStore, InMemoryStore};
