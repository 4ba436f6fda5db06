// Per-listing serialization points
// Work for one listing runs one request at a time; different listings never wait on each other.

use crate::models::ListingId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct ListingLocks {
    locks: DashMap<ListingId, Arc<Mutex<()>>>,
}

impl ListingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, listing_id: ListingId) -> OwnedMutexGuard<()> {
        // Clone the Arc out first so no map shard stays locked across the await
        let lock = self.locks.entry(listing_id).or_default().clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
