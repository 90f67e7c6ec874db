//! Hash command layer.

use slotcache_common::error::{CacheError, CacheResult};

use slotcache_store::FieldValue;

use crate::cache::SlotCache;

impl SlotCache {
    /// Write-through field delete.
    pub fn hdel(&self, key: &[u8], fields: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.hdel(key, fields))
    }

    /// Write-through field set.
    pub fn hset(&self, key: &[u8], field: &[u8], value: Vec<u8>) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| store.hset(key, field, value))
    }

    /// Field set applied only to an already cached key.
    pub fn hset_if_exists(&self, key: &[u8], field: &[u8], value: Vec<u8>) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.hset(key, field, value)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// `HSETNX` semantics on a key that must already be cached.
    pub fn hset_if_exists_field_absent(
        &self,
        key: &[u8],
        field: &[u8],
        value: Vec<u8>,
    ) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.hsetnx(key, field, value)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Write-through batch field set.
    pub fn hmset(&self, key: &[u8], pairs: &[FieldValue]) -> CacheResult<()> {
        self.inner().with_shard(key, |store| store.hmset(key, pairs))
    }

    /// Create-only batch field set with a relative TTL.
    pub fn hmsetnx(&self, key: &[u8], pairs: &[FieldValue], ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                return Err(CacheError::KeyExists);
            }
            store.hmset(key, pairs)?;
            if ttl_secs > 0 {
                store.expire(key, ttl_secs)?;
            }
            Ok(())
        })
    }

    /// Create-only batch field set without expiry.
    pub fn hmsetnx_without_ttl(&self, key: &[u8], pairs: &[FieldValue]) -> CacheResult<()> {
        self.hmsetnx(key, pairs, 0)
    }

    /// Batch field set applied only to an already cached key.
    pub fn hmsetxx(&self, key: &[u8], pairs: &[FieldValue]) -> CacheResult<()> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.hmset(key, pairs)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// One field read; `None` means the cached hash has no such field.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.hget(key, field))
    }

    /// Batch field read preserving request order.
    pub fn hmget(&self, key: &[u8], fields: &[Vec<u8>]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        self.inner().with_shard(key, |store| store.hmget(key, fields))
    }

    /// Every field/value pair.
    pub fn hgetall(&self, key: &[u8]) -> CacheResult<Vec<FieldValue>> {
        self.inner().with_shard(key, |store| store.hgetall(key))
    }

    /// Every field name.
    pub fn hkeys(&self, key: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.hkeys(key))
    }

    /// Every field payload.
    pub fn hvals(&self, key: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.hvals(key))
    }

    /// Field membership.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| store.hexists(key, field))
    }

    /// `HINCRBY`, applied only to an already cached key.
    pub fn hincr_by_xx(&self, key: &[u8], field: &[u8], delta: i64) -> CacheResult<i64> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.hincr_by(key, field, delta)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// `HINCRBYFLOAT`, applied only to an already cached key.
    pub fn hincr_by_float_xx(&self, key: &[u8], field: &[u8], delta: f64) -> CacheResult<f64> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.hincr_by_float(key, field, delta)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Number of fields.
    pub fn hlen(&self, key: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.hlen(key))
    }

    /// Byte length of one field's payload.
    pub fn hstrlen(&self, key: &[u8], field: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.hstrlen(key, field))
    }
}
