//! List command layer.

use slotcache_common::error::{CacheError, CacheResult};

use slotcache_store::BeforeOrAfter;

use crate::cache::SlotCache;

impl SlotCache {
    /// Element at a possibly negative index.
    pub fn lindex(&self, key: &[u8], index: i64) -> CacheResult<Option<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.lindex(key, index))
    }

    /// Write-through pivot-relative insert.
    pub fn linsert(
        &self,
        key: &[u8],
        side: BeforeOrAfter,
        pivot: &[u8],
        value: Vec<u8>,
    ) -> CacheResult<i64> {
        self.inner()
            .with_shard(key, |store| store.linsert(key, side, pivot, value))
    }

    /// Number of elements.
    pub fn llen(&self, key: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.llen(key))
    }

    /// Write-through head pop.
    pub fn lpop(&self, key: &[u8]) -> CacheResult<Vec<u8>> {
        self.inner().with_shard(key, |store| store.lpop(key))
    }

    /// Write-through head push.
    pub fn lpush(&self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.lpush(key, values))
    }

    /// Head push applied only to an already cached key.
    pub fn lpushx(&self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.lpushx(key, values)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Index-range read.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.lrange(key, start, stop))
    }

    /// Write-through occurrence removal.
    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.lrem(key, count, value))
    }

    /// Write-through element overwrite.
    pub fn lset(&self, key: &[u8], index: i64, value: Vec<u8>) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.lset(key, index, value))
    }

    /// Write-through trim.
    pub fn ltrim(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.ltrim(key, start, stop))
    }

    /// Write-through tail pop.
    pub fn rpop(&self, key: &[u8]) -> CacheResult<Vec<u8>> {
        self.inner().with_shard(key, |store| store.rpop(key))
    }

    /// Write-through tail push.
    pub fn rpush(&self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.rpush(key, values))
    }

    /// Tail push applied only to an already cached key.
    pub fn rpushx(&self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.rpushx(key, values)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Create-only tail push with a relative TTL.
    pub fn rpushnx(&self, key: &[u8], values: &[Vec<u8>], ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                return Err(CacheError::KeyExists);
            }
            let _ = store.rpush(key, values)?;
            if ttl_secs > 0 {
                store.expire(key, ttl_secs)?;
            }
            Ok(())
        })
    }

    /// Create-only tail push without expiry.
    pub fn rpushnx_without_ttl(&self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<()> {
        self.rpushnx(key, values, 0)
    }
}
