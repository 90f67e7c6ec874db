//! Process-wide shard-store state: hit/miss counters, used-memory gauge and
//! the forwarded store configuration.
//!
//! Modeled as one static singleton with atomic counters. Shards update it from
//! any thread; `Info` readers snapshot the numbers without extra locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

static HITS: AtomicU64 = AtomicU64::new(0);
static MISSES: AtomicU64 = AtomicU64::new(0);
static USED_MEMORY: AtomicU64 = AtomicU64::new(0);

static CONFIG: RwLock<Option<StoreConfig>> = RwLock::new(None);

/// Store-level knobs forwarded verbatim from the cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Memory budget in bytes; zero means unlimited.
    pub maxmemory: u64,
    /// Eviction policy name.
    pub maxmemory_policy: String,
    /// Eviction sampling width.
    pub maxmemory_samples: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            maxmemory: 0,
            maxmemory_policy: "noeviction".to_owned(),
            maxmemory_samples: 5,
        }
    }
}

/// Replaces the process-wide store configuration.
pub fn set_config(config: &StoreConfig) {
    let mut slot = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(config.clone());
}

/// Current process-wide store configuration.
#[must_use]
pub fn config() -> StoreConfig {
    let slot = CONFIG.read().unwrap_or_else(PoisonError::into_inner);
    slot.clone().unwrap_or_default()
}

/// Records one read that was answered from a shard.
pub(crate) fn record_hit() {
    let _ = HITS.fetch_add(1, Ordering::Relaxed);
}

/// Records one read that missed every shard.
pub(crate) fn record_miss() {
    let _ = MISSES.fetch_add(1, Ordering::Relaxed);
}

/// Adjusts the used-memory gauge by a signed byte delta.
pub(crate) fn charge_memory(delta: i64) {
    if delta >= 0 {
        let _ = USED_MEMORY.fetch_add(delta.unsigned_abs(), Ordering::Relaxed);
    } else {
        let _ = USED_MEMORY.fetch_sub(delta.unsigned_abs(), Ordering::Relaxed);
    }
}

/// Process-wide used-memory figure in bytes.
#[must_use]
pub fn used_memory() -> u64 {
    USED_MEMORY.load(Ordering::Relaxed)
}

/// Snapshot of `(hits, misses)` since the last reset.
#[must_use]
pub fn hit_and_miss() -> (u64, u64) {
    (HITS.load(Ordering::Relaxed), MISSES.load(Ordering::Relaxed))
}

/// Clears the hit/miss counters.
pub fn reset_hit_and_miss() {
    HITS.store(0, Ordering::Relaxed);
    MISSES.store(0, Ordering::Relaxed);
}
