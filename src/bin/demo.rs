// Seeds an in-memory marketplace and walks through search, booking, a date conflict and a
// cancellation.

use anyhow::{Context, Result};
use chrono::Duration;
use homestay_booking::{
    seed_demo_data, BookingError, ListingSearch, Marketplace, NewBooking, ServiceConfig,
};
use homestay_booking::clock::SystemClock;
use homestay_booking::store::InMemoryStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homestay_booking=info,homestay_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = ServiceConfig::from_env().context("loading HOMESTAY_* configuration")?;
    let market = Marketplace::new(config, Arc::new(InMemoryStore::new()), Arc::new(SystemClock))?;
    let seeded = seed_demo_data(&market).await?;
    let today = market.clock().today();

    let check_in = today + Duration::days(7);
    let check_out = today + Duration::days(10);
    let results = market
        .search_listings(&ListingSearch {
            guests: Some(4),
            amenities: Some(vec![homestay_booking::models::Amenity::Pool]),
            check_in: Some(check_in),
            check_out: Some(check_out),
            ..Default::default()
        })
        .await?;
    for listing in &results.items {
        info!(
            title = %listing.title,
            price = listing.price_per_night,
            rating = listing.average_rating,
            "Search result"
        );
    }

    let listing = results
        .items
        .first()
        .context("seed data should match the demo search")?;
    let guest = seeded.guests[1].principal();
    let booking = market
        .create_booking(
            &guest,
            NewBooking {
                listing_id: listing.id,
                check_in,
                check_out,
                guests: 4,
                total_price: listing.price_per_night * 3.0,
                payment_method: None,
            },
        )
        .await?;
    info!(booking_id = %booking.id, status = %booking.status, "Booked");

    let rival = seeded.guests[0].principal();
    let clash = market
        .create_booking(
            &rival,
            NewBooking {
                listing_id: listing.id,
                check_in: check_in + Duration::days(1),
                check_out: check_out + Duration::days(1),
                guests: 2,
                total_price: listing.price_per_night * 3.0,
                payment_method: None,
            },
        )
        .await;
    match clash {
        Err(BookingError::DateConflict { conflicts, .. }) => {
            warn!(conflicts = conflicts.len(), "Overlapping request rejected as expected")
        }
        other => anyhow::bail!("expected a date conflict, got {:?}", other),
    }

    let cancelled = market
        .cancel_booking(&guest, booking.id, Some("Plans changed".to_string()))
        .await?;
    info!(
        booking_id = %cancelled.id,
        reason = cancelled.cancel_reason.as_deref().unwrap_or_default(),
        "Cancelled"
    );

    let report = market
        .check_availability(listing.id, check_in, check_out)
        .await?;
    info!(available = report.available, nights = report.requested.nights, "Dates released");

    let stats = market.system().system_stats(&seeded.admin.principal()).await?;
    info!(
        listings = stats.records.listings,
        bookings = stats.records.bookings,
        reviews = stats.records.reviews,
        "System stats"
    );
    println!("{}", serde_json::to_string_pretty(&stats.operations)?);

    Ok(())
}
