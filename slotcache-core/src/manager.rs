//! Registry of cache cores across databases and slots.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use hashbrown::HashMap;

use slotcache_common::ids::SlotIndex;
use slotcache_store::process;

use crate::cache::{CacheInfo, SlotCache};

/// Holds one cache core per `(db name, slot index)` and drives the periodic
/// maintenance over all of them.
#[derive(Default)]
pub struct CacheManager {
    cores: RwLock<HashMap<(String, SlotIndex), Arc<SlotCache>>>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cores = self.cores.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CacheManager")
            .field("cores", &cores.len())
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the cache core serving one slot, replacing any previous one.
    pub fn register(&self, db_name: impl Into<String>, slot: SlotIndex, cache: Arc<SlotCache>) {
        let mut cores = self.cores.write().unwrap_or_else(PoisonError::into_inner);
        let _ = cores.insert((db_name.into(), slot), cache);
    }

    /// The cache core serving one slot, if registered.
    #[must_use]
    pub fn get(&self, db_name: &str, slot: SlotIndex) -> Option<Arc<SlotCache>> {
        let cores = self.cores.read().unwrap_or_else(PoisonError::into_inner);
        cores.get(&(db_name.to_owned(), slot)).cloned()
    }

    /// Removes one registration.
    pub fn unregister(&self, db_name: &str, slot: SlotIndex) {
        let mut cores = self.cores.write().unwrap_or_else(PoisonError::into_inner);
        let _ = cores.remove(&(db_name.to_owned(), slot));
    }

    /// Process-wide hit ratio in `[0, 1]`.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let (hits, misses) = process::hit_and_miss();
        let all = hits + misses;
        if all == 0 {
            return 0.0;
        }
        hits as f64 / all as f64
    }

    /// Clears the process-wide hit/miss counters.
    pub fn clear_hit_ratio(&self) {
        process::reset_hit_and_miss();
    }

    /// Runs one expiration batch on every registered core and reports the hit
    /// ratio.
    pub fn process_cron_task(&self) {
        let cores = self.cores.read().unwrap_or_else(PoisonError::into_inner);
        for cache in cores.values() {
            let _ = cache.active_expire_cycle();
        }
        info!(hit_ratio = self.hit_ratio(), "cache cron cycle finished");
    }

    /// Aggregate counters over every registered core.
    #[must_use]
    pub fn info(&self) -> Vec<((String, SlotIndex), CacheInfo)> {
        let cores = self.cores.read().unwrap_or_else(PoisonError::into_inner);
        cores
            .iter()
            .map(|(id, cache)| (id.clone(), cache.info()))
            .collect()
    }
}
