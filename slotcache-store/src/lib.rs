//! Single-shard, thread-unsafe in-memory store with Redis data types.
//!
//! One [`ShardStore`] is one shard of a cache core. It is deliberately not
//! `Sync`-aware: the cache core serializes every call through a per-shard
//! mutex, so the store can stay free of interior locking. Expired entries are
//! removed lazily on access and in bounded batches by
//! [`ShardStore::active_expire_cycle`].

pub mod containers;
pub mod entry;
pub mod process;
pub mod types;
pub mod zset;

mod hashes;
mod keyspace;
mod lists;
mod sets;
mod strings;
mod zsets;

use slotcache_common::error::{CacheError, CacheResult};

use crate::containers::{HotMap, HotSet};
use crate::entry::{Entry, Value, now_unix_seconds};

/// One independent key/value shard.
#[derive(Debug, Default)]
pub struct ShardStore {
    entries: HotMap<Vec<u8>, Entry>,
    expires: HotSet<Vec<u8>>,
    used_bytes: u64,
}

fn entry_size(key: &[u8], entry: &Entry) -> u64 {
    key.len() as u64 + entry.value.size_bytes()
}

/// Normalizes a possibly negative Redis index range against a length.
/// Returns `None` when the normalized range is empty or reversed.
pub(crate) fn normalize_index_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len_i64 = i64::try_from(len).unwrap_or(i64::MAX);
    let mut start = if start < 0 {
        len_i64.saturating_add(start)
    } else {
        start
    };
    let mut stop = if stop < 0 {
        len_i64.saturating_add(stop)
    } else {
        stop
    };
    if start < 0 {
        start = 0;
    }
    if stop >= len_i64 {
        stop = len_i64 - 1;
    }
    if stop < 0 || start > stop || start >= len_i64 {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

impl ShardStore {
    /// Creates an empty shard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys. Expired-but-unpurged keys still count until a
    /// lazy purge or an expire cycle reaps them.
    #[must_use]
    pub fn db_size(&self) -> usize {
        self.entries.len()
    }

    /// Drops every key in this shard.
    pub fn flush(&mut self) {
        process::charge_memory(-(self.used_bytes as i64));
        self.used_bytes = 0;
        self.entries.clear();
        self.expires.clear();
    }

    pub(crate) fn purge_expired_key(&mut self, key: &[u8]) {
        let now = now_unix_seconds();
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now))
        {
            let _ = self.remove_entry(key);
        }
    }

    /// Read access that feeds the process-wide hit/miss counters.
    pub(crate) fn read_entry(&mut self, key: &[u8]) -> CacheResult<&Entry> {
        self.purge_expired_key(key);
        match self.entries.get(key) {
            Some(entry) => {
                process::record_hit();
                Ok(entry)
            }
            None => {
                process::record_miss();
                Err(CacheError::KeyNotInCache)
            }
        }
    }

    /// Read access that bypasses the hit/miss counters, for keyspace
    /// management and guard checks.
    pub(crate) fn peek_entry(&mut self, key: &[u8]) -> Option<&Entry> {
        self.purge_expired_key(key);
        self.entries.get(key)
    }

    /// Inserts or replaces one entry, keeping the expires index and the
    /// used-memory gauge in sync.
    pub(crate) fn insert_entry(&mut self, key: Vec<u8>, entry: Entry) {
        let delta_in = entry_size(&key, &entry);
        if entry.expire_at_unix_secs.is_some() {
            let _ = self.expires.insert(key.clone());
        } else {
            let _ = self.expires.remove(&key);
        }
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            let delta_out = entry_size(&key, &previous);
            self.apply_memory_delta(delta_in as i64 - delta_out as i64);
        } else {
            self.apply_memory_delta(delta_in as i64);
        }
    }

    pub(crate) fn remove_entry(&mut self, key: &[u8]) -> Option<Entry> {
        let removed = self.entries.remove(key)?;
        let _ = self.expires.remove(key);
        self.apply_memory_delta(-(entry_size(key, &removed) as i64));
        Some(removed)
    }

    fn apply_memory_delta(&mut self, delta: i64) {
        self.used_bytes = self.used_bytes.saturating_add_signed(delta);
        process::charge_memory(delta);
    }

    /// Runs one mutation against an existing entry, recomputing its memory
    /// charge and dropping the key when a collection mutates to empty.
    pub(crate) fn mutate_entry<R>(
        &mut self,
        key: &[u8],
        op: impl FnOnce(&mut Entry) -> CacheResult<R>,
    ) -> CacheResult<R> {
        self.purge_expired_key(key);
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(CacheError::KeyNotInCache);
        };
        let size_before = entry_size(key, entry);
        let result = op(entry);
        let now_empty = entry.value.is_empty_collection();
        let size_after = if now_empty { 0 } else { entry_size(key, entry) };
        self.apply_memory_delta(size_after as i64 - size_before as i64);
        if now_empty {
            let _ = self.entries.remove(key);
            let _ = self.expires.remove(key);
        }
        result
    }

    /// Ensures a collection key exists before a write-through mutation,
    /// creating it with `make` when absent.
    pub(crate) fn ensure_entry(&mut self, key: &[u8], make: impl FnOnce() -> Value) {
        self.purge_expired_key(key);
        if !self.entries.contains_key(key) {
            self.insert_entry(key.to_vec(), Entry::new(make()));
        }
    }
}

impl Drop for ShardStore {
    fn drop(&mut self) {
        process::charge_memory(-(self.used_bytes as i64));
    }
}

pub use entry::{Entry as StoredEntry, Value as StoredValue};
pub use types::{BeforeOrAfter, FieldValue, LexBound, ScoreBound, ScoreMember};

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
