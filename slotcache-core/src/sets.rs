//! Set command layer.

use slotcache_common::error::{CacheError, CacheResult};

use crate::cache::SlotCache;

impl SlotCache {
    /// Write-through member add.
    pub fn sadd(&self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.sadd(key, members))
    }

    /// Member add applied only to an already cached key.
    pub fn sadd_if_exists(&self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                store.sadd(key, members)
            } else {
                Err(CacheError::KeyNotExist)
            }
        })
    }

    /// Create-only member add with a relative TTL.
    pub fn saddnx(&self, key: &[u8], members: &[Vec<u8>], ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard(key, |store| {
            if store.exists(key) {
                return Err(CacheError::KeyExists);
            }
            let _ = store.sadd(key, members)?;
            if ttl_secs > 0 {
                store.expire(key, ttl_secs)?;
            }
            Ok(())
        })
    }

    /// Create-only member add without expiry.
    pub fn saddnx_without_ttl(&self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<()> {
        self.saddnx(key, members, 0)
    }

    /// Number of members.
    pub fn scard(&self, key: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.scard(key))
    }

    /// Membership test.
    pub fn sismember(&self, key: &[u8], member: &[u8]) -> CacheResult<bool> {
        self.inner().with_shard(key, |store| store.sismember(key, member))
    }

    /// Every member.
    pub fn smembers(&self, key: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.smembers(key))
    }

    /// Write-through member removal.
    pub fn srem(&self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| store.srem(key, members))
    }

    /// Random members with the Redis count convention.
    pub fn srandmember(&self, key: &[u8], count: i64) -> CacheResult<Vec<Vec<u8>>> {
        self.inner().with_shard(key, |store| store.srandmember(key, count))
    }
}
