// Listing management
// Hosts create and edit their own listings; deactivation is a soft delete that hides the listing
// from search and booking. Rating fields are never written here.

use crate::clock::Clock;
use crate::error::{BookingError, EntityKind, Result};
use crate::models::{Amenity, Coordinates, Listing, ListingId, ListingImage, Principal, Role};
use crate::store::EntityStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub location: String,
    pub address: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub price_per_night: f64,
    pub max_guests: u32,
    pub bedrooms: u32,
    pub bathrooms: u32,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Editable listing fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub price_per_night: Option<f64>,
    pub max_guests: Option<u32>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub amenities: Option<Vec<Amenity>>,
    pub images: Option<Vec<String>>,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BookingError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(BookingError::validation("Price must be positive"));
    }
    Ok(())
}

// Keeps the first occurrence of each amenity, in request order
fn unique_amenities(mut amenities: Vec<Amenity>) -> Vec<Amenity> {
    let mut seen = HashSet::with_capacity(amenities.len());
    amenities.retain(|amenity| seen.insert(*amenity));
    amenities
}

fn validate_capacity(max_guests: u32) -> Result<()> {
    if max_guests == 0 {
        return Err(BookingError::validation("Must accommodate at least 1 guest"));
    }
    Ok(())
}

impl ListingPatch {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("Title", &self.title),
            ("Description", &self.description),
            ("Location", &self.location),
            ("Address", &self.address),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        if let Some(price) = self.price_per_night {
            validate_price(price)?;
        }
        if let Some(max_guests) = self.max_guests {
            validate_capacity(max_guests)?;
        }
        Ok(())
    }

    fn apply(self, listing: &mut Listing) {
        if let Some(title) = self.title {
            listing.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            listing.description = description;
        }
        if let Some(location) = self.location {
            listing.location = location.trim().to_string();
        }
        if let Some(address) = self.address {
            listing.address = address.trim().to_string();
        }
        if self.coordinates.is_some() {
            listing.coordinates = self.coordinates;
        }
        if let Some(price) = self.price_per_night {
            listing.price_per_night = price;
        }
        if let Some(max_guests) = self.max_guests {
            listing.max_guests = max_guests;
        }
        if let Some(bedrooms) = self.bedrooms {
            listing.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = self.bathrooms {
            listing.bathrooms = bathrooms;
        }
        if let Some(amenities) = self.amenities {
            listing.amenities = unique_amenities(amenities);
        }
        if let Some(images) = self.images {
            listing.images = images.into_iter().map(ListingImage::new).collect();
        }
    }
}

pub struct ListingService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl ListingService {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, request), fields(host_id = %principal.id))]
    pub async fn create(&self, principal: &Principal, request: NewListing) -> Result<Listing> {
        if !matches!(principal.role, Role::Host | Role::Admin) {
            return Err(BookingError::unauthorized("Only hosts can create listings"));
        }
        require_text("Title", &request.title)?;
        require_text("Description", &request.description)?;
        require_text("Location", &request.location)?;
        require_text("Address", &request.address)?;
        validate_price(request.price_per_night)?;
        validate_capacity(request.max_guests)?;

        let now = self.clock.now();
        let listing = Listing {
            id: Uuid::new_v4(),
            host_id: principal.id,
            title: request.title.trim().to_string(),
            description: request.description,
            location: request.location.trim().to_string(),
            address: request.address.trim().to_string(),
            coordinates: request.coordinates,
            price_per_night: request.price_per_night,
            max_guests: request.max_guests,
            bedrooms: request.bedrooms,
            bathrooms: request.bathrooms,
            amenities: unique_amenities(request.amenities),
            images: request.images.into_iter().map(ListingImage::new).collect(),
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_listing(listing.clone()).await?;

        info!(listing_id = %listing.id, "Listing created");
        Ok(listing)
    }

    /// Public lookup; inactive listings read as missing.
    pub async fn get(&self, listing_id: ListingId) -> Result<Listing> {
        self.store
            .get_listing(listing_id)
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| BookingError::not_found(EntityKind::Listing, listing_id))
    }

    #[instrument(skip(self, patch), fields(user_id = %principal.id))]
    pub async fn update(
        &self,
        principal: &Principal,
        listing_id: ListingId,
        patch: ListingPatch,
    ) -> Result<Listing> {
        self.authorize_owner(principal, listing_id).await?;
        patch.validate()?;

        let now = self.clock.now();
        let updated = self
            .store
            .update_listing(
                listing_id,
                Box::new(move |listing: &mut Listing| {
                    patch.apply(listing);
                    listing.updated_at = now;
                }),
            )
            .await?;
        info!(%listing_id, "Listing updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn deactivate(&self, principal: &Principal, listing_id: ListingId) -> Result<Listing> {
        self.authorize_owner(principal, listing_id).await?;

        let now = self.clock.now();
        let updated = self
            .store
            .update_listing(
                listing_id,
                Box::new(move |listing: &mut Listing| {
                    listing.is_active = false;
                    listing.updated_at = now;
                }),
            )
            .await?;
        info!(%listing_id, "Listing deactivated");
        Ok(updated)
    }

    async fn authorize_owner(&self, principal: &Principal, listing_id: ListingId) -> Result<()> {
        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| BookingError::not_found(EntityKind::Listing, listing_id))?;
        if !principal.owns_or_admin(listing.host_id) {
            return Err(BookingError::unauthorized(
                "Not authorized to modify this listing",
            ));
        }
        Ok(())
    }
}
