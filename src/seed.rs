// Demo data
// Populates a marketplace with an admin, two hosts, two guests, five listings, a few bookings and
// reviews. Dates are relative to the marketplace clock so the data stays bookable.

use crate::app::Marketplace;
use crate::booking::NewBooking;
use crate::error::Result;
use crate::listing::NewListing;
use crate::models::{
    Amenity, Booking, BookingStatus, Coordinates, Listing, PaymentMethod, Review, Role, User,
};
use crate::review::NewReview;
use chrono::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub admin: User,
    pub hosts: Vec<User>,
    pub guests: Vec<User>,
    pub listings: Vec<Listing>,
    pub bookings: Vec<Booking>,
    pub reviews: Vec<Review>,
}

struct ListingSeed {
    title: &'static str,
    location: &'static str,
    address: &'static str,
    price: f64,
    max_guests: u32,
    bedrooms: u32,
    bathrooms: u32,
    amenities: &'static [Amenity],
    coordinates: (f64, f64),
    host: usize,
}

const LISTINGS: &[ListingSeed] = &[
    ListingSeed {
        title: "Mountain view villa in Da Lat",
        location: "Da Lat",
        address: "123 Tran Phu, Ward 4, Da Lat, Lam Dong",
        price: 1_500_000.0,
        max_guests: 6,
        bedrooms: 3,
        bathrooms: 2,
        amenities: &[
            Amenity::Wifi,
            Amenity::Pool,
            Amenity::Parking,
            Amenity::AirConditioning,
            Amenity::Kitchen,
        ],
        coordinates: (11.9404, 108.4583),
        host: 0,
    },
    ListingSeed {
        title: "Modern apartment in central Ha Noi",
        location: "Ha Noi",
        address: "456 Hoan Kiem, Hoan Kiem District, Ha Noi",
        price: 2_000_000.0,
        max_guests: 4,
        bedrooms: 2,
        bathrooms: 1,
        amenities: &[
            Amenity::Wifi,
            Amenity::AirConditioning,
            Amenity::Tv,
            Amenity::Kitchen,
            Amenity::Elevator,
        ],
        coordinates: (21.0285, 105.8542),
        host: 1,
    },
    ListingSeed {
        title: "Beach villa in Nha Trang",
        location: "Nha Trang",
        address: "789 Tran Phu, Nha Trang, Khanh Hoa",
        price: 3_000_000.0,
        max_guests: 8,
        bedrooms: 4,
        bathrooms: 3,
        amenities: &[
            Amenity::Wifi,
            Amenity::Pool,
            Amenity::Parking,
            Amenity::AirConditioning,
            Amenity::Bbq,
            Amenity::Garden,
        ],
        coordinates: (12.2388, 109.1967),
        host: 0,
    },
    ListingSeed {
        title: "Traditional wooden house in Sapa",
        location: "Sapa",
        address: "321 Cau May, Sapa, Lao Cai",
        price: 800_000.0,
        max_guests: 4,
        bedrooms: 2,
        bathrooms: 1,
        amenities: &[
            Amenity::Wifi,
            Amenity::Fireplace,
            Amenity::Garden,
            Amenity::Balcony,
        ],
        coordinates: (22.3380, 103.8442),
        host: 1,
    },
    ListingSeed {
        title: "Cozy studio in District 1",
        location: "Ho Chi Minh City",
        address: "159 Nguyen Hue, District 1, Ho Chi Minh City",
        price: 1_200_000.0,
        max_guests: 2,
        bedrooms: 1,
        bathrooms: 1,
        amenities: &[
            Amenity::Wifi,
            Amenity::AirConditioning,
            Amenity::Tv,
            Amenity::Kitchen,
            Amenity::Elevator,
        ],
        coordinates: (10.7769, 106.7009),
        host: 0,
    },
];

pub async fn seed_demo_data(market: &Marketplace) -> Result<SeedSummary> {
    let store = market.store();
    let now = market.clock().now();
    let today = market.clock().today();

    let admin = User::new("Admin User", "admin@example.com", Role::Admin, now);
    let hosts = vec![
        User::new("Host Duc", "duc.host@example.com", Role::Host, now),
        User::new("Host Mai", "mai.host@example.com", Role::Host, now),
    ];
    let guests = vec![
        User::new("Guest Khach", "khach@example.com", Role::User, now),
        User::new("Guest Lan", "lan@example.com", Role::User, now),
    ];
    for user in std::iter::once(&admin).chain(&hosts).chain(&guests) {
        store.insert_user(user.clone()).await?;
    }

    let mut listings = Vec::with_capacity(LISTINGS.len());
    for seed in LISTINGS {
        let slug = seed.location.to_lowercase().replace(' ', "-");
        let listing = market
            .listings()
            .create(
                &hosts[seed.host].principal(),
                NewListing {
                    title: seed.title.to_string(),
                    description: format!("{} hosted by {}", seed.title, hosts[seed.host].name),
                    location: seed.location.to_string(),
                    address: seed.address.to_string(),
                    coordinates: Some(Coordinates {
                        latitude: seed.coordinates.0,
                        longitude: seed.coordinates.1,
                    }),
                    price_per_night: seed.price,
                    max_guests: seed.max_guests,
                    bedrooms: seed.bedrooms,
                    bathrooms: seed.bathrooms,
                    amenities: seed.amenities.to_vec(),
                    images: vec![
                        format!("https://example.com/{}1.jpg", slug),
                        format!("https://example.com/{}2.jpg", slug),
                    ],
                },
            )
            .await?;
        listings.push(listing);
    }

    let mut bookings = Vec::new();
    let mut reviews = Vec::new();

    // Finished stays are history, so they go straight to the store
    for (guest, rating, comment) in [
        (&guests[0], 5, "Beautiful view and a very kind host"),
        (&guests[1], 4, "Lovely villa, a bit far from town"),
    ] {
        let nights = 3;
        let check_in = today - Duration::days(30 + 5 * rating as i64);
        let stay = Booking {
            id: Uuid::new_v4(),
            listing_id: listings[0].id,
            user_id: guest.id,
            check_in,
            check_out: check_in + Duration::days(nights),
            guests: 2,
            total_price: listings[0].price_per_night * nights as f64,
            payment_method: PaymentMethod::BankTransfer,
            status: BookingStatus::Completed,
            created_at: now - Duration::days(60),
            cancelled_at: None,
            cancel_reason: None,
        };
        store.insert_booking(stay.clone()).await?;
        bookings.push(stay);

        let review = market
            .create_review(
                &guest.principal(),
                NewReview {
                    listing_id: listings[0].id,
                    rating,
                    comment: comment.to_string(),
                },
            )
            .await?;
        reviews.push(review);
    }

    let upcoming = market
        .create_booking(
            &guests[0].principal(),
            NewBooking {
                listing_id: listings[1].id,
                check_in: today + Duration::days(14),
                check_out: today + Duration::days(17),
                guests: 2,
                total_price: listings[1].price_per_night * 3.0,
                payment_method: Some(PaymentMethod::CreditCard),
            },
        )
        .await?;
    let upcoming = market
        .bookings()
        .confirm(&hosts[1].principal(), upcoming.id)
        .await?;
    bookings.push(upcoming);

    let pending = market
        .create_booking(
            &guests[1].principal(),
            NewBooking {
                listing_id: listings[2].id,
                check_in: today + Duration::days(30),
                check_out: today + Duration::days(33),
                guests: 6,
                total_price: listings[2].price_per_night * 3.0,
                payment_method: Some(PaymentMethod::EWallet),
            },
        )
        .await?;
    bookings.push(pending);

    info!(
        users = 1 + hosts.len() + guests.len(),
        listings = listings.len(),
        bookings = bookings.len(),
        reviews = reviews.len(),
        "Demo data seeded"
    );

    Ok(SeedSummary {
        admin,
        hosts,
        guests,
        listings,
        bookings,
        reviews,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seed_is_consistent() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap(),
        ));
        let market = Marketplace::with_store(Arc::new(InMemoryStore::new()), clock);
        let seeded = seed_demo_data(&market).await.unwrap();

        let counts = market.store().record_counts().await.unwrap();
        assert_eq!(counts.users, 5);
        assert_eq!(counts.listings, 5);
        assert_eq!(counts.bookings, 4);
        assert_eq!(counts.reviews, 2);

        let villa = market.listings().get(seeded.listings[0].id).await.unwrap();
        assert_eq!((villa.average_rating, villa.total_reviews), (4.5, 2));
        assert_eq!(seeded.bookings[2].status, BookingStatus::Confirmed);
        assert_eq!(seeded.bookings[3].status, BookingStatus::Pending);
    }
}
