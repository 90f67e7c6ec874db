//! String command layer, including the bitmap group.
//!
//! Write-through shapes apply unconditionally; the `xx` family guards on key
//! existence under the shard mutex, so the cache never synthesizes entries it
//! has no authority to produce.

use slotcache_common::error::{CacheError, CacheResult};

use crate::cache::SlotCache;

impl SlotCache {
    /// Write-through set with a relative TTL.
    pub fn set(&self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.set(key, value, ttl_secs))
    }

    /// Write-through set without expiry.
    pub fn set_without_ttl(&self, key: &[u8], value: Vec<u8>) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.set(key, value, 0))
    }

    /// Create-only set with a relative TTL.
    pub fn setnx(&self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.setnx(key, value, ttl_secs))
    }

    /// Create-only set without expiry.
    pub fn setnx_without_ttl(&self, key: &[u8], value: Vec<u8>) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.setnx(key, value, 0))
    }

    /// Update-only set with a relative TTL.
    pub fn setxx(&self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.setxx(key, value, ttl_secs))
    }

    /// Update-only set without expiry.
    pub fn setxx_without_ttl(&self, key: &[u8], value: Vec<u8>) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.setxx(key, value, 0))
    }

    /// Whole-value read.
    pub fn get(&self, key: &[u8]) -> CacheResult<Vec<u8>> {
        self.inner().with_shard(key, |store| store.get(key))
    }

    /// `INCR`, applied only to an already cached key.
    pub fn incrxx(&self, key: &[u8]) -> CacheResult<i64> {
        self.incr_by_xx(key, 1)
    }

    /// `DECR`, applied only to an already cached key.
    pub fn decrxx(&self, key: &[u8]) -> CacheResult<i64> {
        self.incr_by_xx(key, -1)
    }

    /// `INCRBY`, applied only to an already cached key.
    pub fn incr_by_xx(&self, key: &[u8], delta: i64) -> CacheResult<i64> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.incr_by(key, delta)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// `DECRBY`, applied only to an already cached key.
    pub fn decr_by_xx(&self, key: &[u8], delta: i64) -> CacheResult<i64> {
        self.incr_by_xx(key, delta.checked_neg().ok_or(CacheError::NotSupported)?)
    }

    /// `INCRBYFLOAT`, applied only to an already cached key.
    pub fn incr_by_float_xx(&self, key: &[u8], delta: f64) -> CacheResult<f64> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.incr_by_float(key, delta)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// `APPEND`, applied only to an already cached key.
    pub fn appendxx(&self, key: &[u8], suffix: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.append(key, suffix)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Byte-range read.
    pub fn get_range(&self, key: &[u8], start: i64, end: i64) -> CacheResult<Vec<u8>> {
        self.inner().with_shard(key, |store| store.get_range(key, start, end))
    }

    /// `SETRANGE`, applied only to an already cached key.
    pub fn set_range_xx(&self, key: &[u8], offset: usize, payload: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.set_range(key, offset, payload)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Value length in bytes.
    pub fn strlen(&self, key: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.strlen(key))
    }

    /// Per-key batch read; each key resolves independently so the caller can
    /// fall through to the backing store for the misses alone.
    pub fn mget(&self, keys: &[Vec<u8>]) -> Vec<CacheResult<Vec<u8>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Write-through batch set without expiry.
    pub fn mset(&self, pairs: &[(Vec<u8>, Vec<u8>)]) -> CacheResult<()> {
        for (key, value) in pairs {
            self.set_without_ttl(key, value.clone())?;
        }
        Ok(())
    }

    /// Write-through bit set.
    pub fn set_bit(&self, key: &[u8], offset: usize, bit: bool) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| store.set_bit(key, offset, bit))
    }

    /// Bit set applied only to an already cached key.
    pub fn set_bit_if_exists(&self, key: &[u8], offset: usize, bit: bool) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.set_bit(key, offset, bit)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Single-bit read.
    pub fn get_bit(&self, key: &[u8], offset: usize) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| store.get_bit(key, offset))
    }

    /// Population count, optionally over a byte range.
    pub fn bit_count(&self, key: &[u8], range: Option<(i64, i64)>) -> CacheResult<u64> {
        self.inner().with_shard(key, |store| store.bit_count(key, range))
    }

    /// First position of a bit, optionally bounded by byte indices.
    pub fn bit_pos(
        &self,
        key: &[u8],
        bit: bool,
        start: Option<i64>,
        end: Option<i64>,
    ) -> CacheResult<i64> {
        self.inner().with_shard(key, |store| store.bit_pos(key, bit, start, end))
    }
}
