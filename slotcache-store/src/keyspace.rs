//! Keyspace management: existence, deletion, TTL handling and active expiry.

use rand::Rng;

use slotcache_common::error::{CacheError, CacheResult};

use crate::ShardStore;
use crate::entry::now_unix_seconds;

/// Upper bound of expires-index keys inspected per active expire cycle.
const ACTIVE_EXPIRE_SAMPLE: usize = 20;

impl ShardStore {
    /// True when the key is live in this shard.
    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.peek_entry(key).is_some()
    }

    /// Removes one key. Deleting an absent key is a no-op.
    pub fn del(&mut self, key: &[u8]) -> CacheResult<()> {
        let _ = self.remove_entry(key);
        Ok(())
    }

    /// Applies a relative TTL in seconds. Non-positive TTLs delete the key.
    pub fn expire(&mut self, key: &[u8], ttl_secs: i64) -> CacheResult<()> {
        if self.peek_entry(key).is_none() {
            return Err(CacheError::KeyNotInCache);
        }
        match u64::try_from(ttl_secs) {
            Ok(delta) if delta > 0 => {
                self.set_deadline(key, Some(now_unix_seconds().saturating_add(delta)));
            }
            _ => {
                let _ = self.remove_entry(key);
            }
        }
        Ok(())
    }

    /// Applies an absolute deadline in unix seconds. Past deadlines delete the key.
    pub fn expireat(&mut self, key: &[u8], deadline_unix_secs: i64) -> CacheResult<()> {
        if self.peek_entry(key).is_none() {
            return Err(CacheError::KeyNotInCache);
        }
        match u64::try_from(deadline_unix_secs) {
            Ok(deadline) if deadline > now_unix_seconds() => {
                self.set_deadline(key, Some(deadline));
            }
            _ => {
                let _ = self.remove_entry(key);
            }
        }
        Ok(())
    }

    /// Remaining TTL in seconds; `-1` when the key has no expiry.
    pub fn ttl(&mut self, key: &[u8]) -> CacheResult<i64> {
        let Some(entry) = self.peek_entry(key) else {
            return Err(CacheError::KeyNotInCache);
        };
        match entry.expire_at_unix_secs {
            None => Ok(-1),
            Some(deadline) => {
                let remaining = deadline.saturating_sub(now_unix_seconds());
                Ok(i64::try_from(remaining).unwrap_or(i64::MAX))
            }
        }
    }

    /// Drops the expiry of one key. Returns true when an expiry was removed.
    pub fn persist(&mut self, key: &[u8]) -> CacheResult<bool> {
        let Some(entry) = self.peek_entry(key) else {
            return Err(CacheError::KeyNotInCache);
        };
        let had_deadline = entry.expire_at_unix_secs.is_some();
        if had_deadline {
            self.set_deadline(key, None);
        }
        Ok(had_deadline)
    }

    /// Redis-compatible type name of one key.
    pub fn type_name(&mut self, key: &[u8]) -> CacheResult<&'static str> {
        match self.peek_entry(key) {
            Some(entry) => Ok(entry.value.type_name()),
            None => Err(CacheError::KeyNotInCache),
        }
    }

    /// Picks one live key at random.
    pub fn random_key(&mut self) -> CacheResult<Vec<u8>> {
        if self.entries.is_empty() {
            return Err(CacheError::KeyNotInCache);
        }
        let skip = rand::thread_rng().gen_range(0..self.entries.len());
        self.entries
            .keys()
            .nth(skip)
            .cloned()
            .ok_or(CacheError::KeyNotInCache)
    }

    /// Removes a bounded batch of expired keys. Returns how many were dropped.
    pub fn active_expire_cycle(&mut self) -> usize {
        let now = now_unix_seconds();
        let doomed: Vec<Vec<u8>> = self
            .expires
            .iter()
            .take(ACTIVE_EXPIRE_SAMPLE)
            .filter(|key| {
                self.entries
                    .get(key.as_slice())
                    .is_some_and(|entry| entry.is_expired(now))
            })
            .cloned()
            .collect();
        for key in &doomed {
            let _ = self.remove_entry(key);
        }
        doomed.len()
    }

    fn set_deadline(&mut self, key: &[u8], deadline: Option<u64>) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        entry.expire_at_unix_secs = deadline;
        if deadline.is_some() {
            let _ = self.expires.insert(key.to_vec());
        } else {
            let _ = self.expires.remove(key);
        }
    }
}
