// Admin system stats

use crate::clock::Clock;
use crate::error::{BookingError, Result};
use crate::models::{BookingStatus, Principal};
use crate::stats::{ServiceStats, ServiceStatsReport};
use crate::store::{EntityStore, RecordCounts};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: i64,
    pub records: RecordCounts,
    pub bookings_by_status: BTreeMap<BookingStatus, usize>,
    pub operations: ServiceStatsReport,
}

pub struct SystemService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    stats: Arc<ServiceStats>,
    started_at: DateTime<Utc>,
}

impl SystemService {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>, stats: Arc<ServiceStats>) -> Self {
        let started_at = clock.now();
        Self {
            store,
            clock,
            stats,
            started_at,
        }
    }

    pub async fn system_stats(&self, principal: &Principal) -> Result<SystemStats> {
        if !principal.is_admin() {
            return Err(BookingError::unauthorized("Admin access required"));
        }

        let (records, bookings_by_status) = futures::try_join!(
            self.store.record_counts(),
            self.store.booking_counts_by_status(),
        )?;

        Ok(SystemStats {
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.started_at,
            uptime_seconds: (self.clock.now() - self.started_at).num_seconds(),
            records,
            bookings_by_status,
            operations: self.stats.report(),
        })
    }
}
