use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use homestay_booking::clock::FixedClock;
use homestay_booking::models::{Amenity, Booking, BookingStatus, Listing, PaymentMethod};
use homestay_booking::{EntityStore, InMemoryStore, ListingSearch, Marketplace};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

const AMENITIES: [Amenity; 6] = [
    Amenity::Wifi,
    Amenity::Pool,
    Amenity::Parking,
    Amenity::Kitchen,
    Amenity::Garden,
    Amenity::AirConditioning,
];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

// Listings with a handful of random stays each over the summer
async fn populate(store: &InMemoryStore, listings: usize) -> Vec<Uuid> {
    let mut rng = thread_rng();
    let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut ids = Vec::with_capacity(listings);

    for i in 0..listings {
        let listing = Listing {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: format!("Homestay {}", i),
            description: "Benchmark listing".to_string(),
            location: ["Da Lat", "Hoi An", "Sapa", "Ha Noi"][i % 4].to_string(),
            address: format!("{} Tran Phu", i),
            coordinates: None,
            price_per_night: rng.gen_range(300_000.0..3_000_000.0),
            max_guests: rng.gen_range(1..9),
            bedrooms: 2,
            bathrooms: 1,
            amenities: AMENITIES
                .choose_multiple(&mut rng, 3)
                .copied()
                .collect(),
            images: vec![],
            is_active: true,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: created + Duration::minutes(i as i64),
            updated_at: created,
        };
        ids.push(listing.id);
        store.insert_listing(listing.clone()).await.unwrap();

        for _ in 0..5 {
            let check_in = base_date() + Duration::days(rng.gen_range(0..80));
            let booking = Booking {
                id: Uuid::new_v4(),
                listing_id: listing.id,
                user_id: Uuid::new_v4(),
                check_in,
                check_out: check_in + Duration::days(rng.gen_range(1..6)),
                guests: 1,
                total_price: 1_000_000.0,
                payment_method: PaymentMethod::Cash,
                status: *[BookingStatus::Pending, BookingStatus::Confirmed, BookingStatus::Cancelled]
                    .choose(&mut rng)
                    .unwrap(),
                created_at: created,
                cancelled_at: None,
                cancel_reason: None,
            };
            // Random stays may collide; the store rejects those
            let _ = store.insert_booking(booking).await;
        }
    }
    ids
}

fn setup(rt: &Runtime, listings: usize) -> (Arc<Marketplace>, Vec<Uuid>) {
    rt.block_on(async {
        let store = Arc::new(InMemoryStore::new());
        let ids = populate(&store, listings).await;
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
        ));
        (Arc::new(Marketplace::with_store(store, clock)), ids)
    })
}

pub fn availability_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("availability_check");

    for listings in [100, 1_000].iter() {
        let (market, ids) = setup(&rt, *listings);
        group.bench_with_input(BenchmarkId::from_parameter(listings), listings, |b, _| {
            b.to_async(&rt).iter(|| {
                let market = Arc::clone(&market);
                let mut rng = thread_rng();
                let listing_id = *ids.choose(&mut rng).unwrap();
                let check_in = base_date() + Duration::days(rng.gen_range(0..80));
                let check_out = check_in + Duration::days(rng.gen_range(1..8));
                async move {
                    black_box(
                        market
                            .availability()
                            .is_available(listing_id, check_in, check_out)
                            .await
                            .unwrap(),
                    )
                }
            });
        });
    }
    group.finish();
}

pub fn search_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("listing_search");

    for listings in [100, 1_000].iter() {
        let (market, _) = setup(&rt, *listings);
        group.bench_with_input(BenchmarkId::from_parameter(listings), listings, |b, _| {
            b.to_async(&rt).iter(|| {
                let market = Arc::clone(&market);
                let mut rng = thread_rng();
                let check_in = base_date() + Duration::days(rng.gen_range(0..80));
                let query = ListingSearch {
                    location: Some("da lat".to_string()),
                    guests: Some(rng.gen_range(1..5)),
                    amenities: Some(vec![*AMENITIES.choose(&mut rng).unwrap()]),
                    check_in: Some(check_in),
                    check_out: Some(check_in + Duration::days(3)),
                    ..Default::default()
                };
                async move { black_box(market.search_listings(&query).await.unwrap()) }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, availability_benchmark, search_benchmark);
criterion_main!(benches);
