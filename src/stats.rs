// Operation counters for the booking core, reported through the admin system stats

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct ServiceStats {
    pub bookings_created: AtomicUsize,
    pub booking_conflicts: AtomicUsize,
    pub bookings_cancelled: AtomicUsize,
    pub reviews_created: AtomicUsize,
    pub reviews_deleted: AtomicUsize,
    pub rating_recomputations: AtomicUsize,
    pub rating_writeback_failures: AtomicUsize,
    pub host_stats_cache_failures: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatsReport {
    pub bookings_created: usize,
    pub booking_conflicts: usize,
    pub bookings_cancelled: usize,
    pub reviews_created: usize,
    pub reviews_deleted: usize,
    pub rating_recomputations: usize,
    pub rating_writeback_failures: usize,
    pub host_stats_cache_failures: usize,
}

impl ServiceStats {
    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn report(&self) -> ServiceStatsReport {
        ServiceStatsReport {
            bookings_created: self.bookings_created.load(Ordering::SeqCst),
            booking_conflicts: self.booking_conflicts.load(Ordering::SeqCst),
            bookings_cancelled: self.bookings_cancelled.load(Ordering::SeqCst),
            reviews_created: self.reviews_created.load(Ordering::SeqCst),
            reviews_deleted: self.reviews_deleted.load(Ordering::SeqCst),
            rating_recomputations: self.rating_recomputations.load(Ordering::SeqCst),
            rating_writeback_failures: self.rating_writeback_failures.load(Ordering::SeqCst),
            host_stats_cache_failures: self.host_stats_cache_failures.load(Ordering::SeqCst),
        }
    }
}
