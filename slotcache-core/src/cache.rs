//! Cache core for one slot: shard pool, lifecycle and generic key operations.
//!
//! Locking pattern: the core `RwLock` guards the identity of the shard array
//! (`init`/`reset`/`destroy`/`reset_config` are writers, every per-key
//! operation is a reader); one `Mutex` per shard serializes store access.
//! Lock order is always core rwlock → shard mutex, and a shard mutex is never
//! held across a backing-store call — authoritative lengths are read before
//! the mutex is taken.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use rand::Rng;
use tracing::{error, warn};

use slotcache_common::config::{CacheConfig, CachePosition, TTL_NONE, extend_items_per_key};
use slotcache_common::error::{CacheError, CacheResult};
use slotcache_common::ids::ShardCount;

use slotcache_store::process::{self, StoreConfig};
use slotcache_store::{FieldValue, ScoreMember, ShardStore};

use crate::backing::BackingStore;
use crate::loader::{CacheLoader, KeyType};

/// Lifecycle state of one cache core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No shards exist.
    None,
    /// Shards are being built.
    Init,
    /// Serving traffic.
    Ok,
    /// Tear-down-and-rebuild in progress.
    Reset,
    /// Shards are being torn down.
    Destroy,
}

impl CacheStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Init,
            2 => Self::Ok,
            3 => Self::Reset,
            4 => Self::Destroy,
            _ => Self::None,
        }
    }
}

/// Aggregate counters exposed by [`SlotCache::info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    /// Lifecycle state.
    pub status: CacheStatus,
    /// Shard fan-out.
    pub cache_num: usize,
    /// Live keys across every shard.
    pub keys_num: usize,
    /// Process-wide used-memory figure in bytes.
    pub used_memory: u64,
    /// Process-wide read hits.
    pub hits: u64,
    /// Process-wide read misses.
    pub misses: u64,
    /// Reload requests admitted since the daemon started.
    pub async_load_keys_num: u64,
    /// Current reload queue depth.
    pub waiting_load_keys_num: usize,
}

pub(crate) struct CoreState {
    pub(crate) shards: Vec<Mutex<ShardStore>>,
    pub(crate) position: CachePosition,
    pub(crate) items_per_key: usize,
}

impl CoreState {
    fn shard_for_key(&self, key: &[u8]) -> Option<&Mutex<ShardStore>> {
        if self.shards.is_empty() {
            return None;
        }
        let index = crc32fast::hash(key) as usize % self.shards.len();
        self.shards.get(index)
    }
}

/// Shared internals: the loader thread holds these weakly.
pub(crate) struct CacheInner {
    pub(crate) state: RwLock<CoreState>,
    status: AtomicU8,
    backing: Mutex<Option<Weak<dyn BackingStore>>>,
}

/// The sharded cache fronting one slot of the backing store.
pub struct SlotCache {
    inner: Arc<CacheInner>,
    loader: RwLock<CacheLoader>,
}

impl std::fmt::Debug for SlotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loader = self.loader.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SlotCache")
            .field("status", &self.status())
            .field("loader", &*loader)
            .finish_non_exhaustive()
    }
}

impl SlotCache {
    /// Creates an empty core and starts its reload daemon. No shards exist
    /// until [`Self::init`] runs.
    #[must_use]
    pub fn new(config: &CacheConfig, backing: Weak<dyn BackingStore>) -> Self {
        let inner = Arc::new(CacheInner {
            state: RwLock::new(CoreState {
                shards: Vec::new(),
                position: config.cache_start_pos,
                items_per_key: extend_items_per_key(config.cache_items_per_key),
            }),
            status: AtomicU8::new(CacheStatus::None as u8),
            backing: Mutex::new(Some(backing)),
        });
        let loader = RwLock::new(CacheLoader::spawn(Arc::downgrade(&inner)));
        Self { inner, loader }
    }

    /// Builds the shard array.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corruption`] when shards already exist; the core
    /// falls back to `None` status with every partially built shard torn down.
    pub fn init(&self, cache_num: ShardCount, config: &CacheConfig) -> CacheResult<()> {
        let mut state = self.write_state();
        self.inner.init_without_lock(&mut state, cache_num, config)
    }

    /// Destroys and rebuilds the shard array. The reload daemon drains its
    /// queue against the old shards and a fresh one starts for the new ones.
    pub fn reset(&self, cache_num: ShardCount, config: &CacheConfig) -> CacheResult<()> {
        {
            let mut loader = self.loader.write().unwrap_or_else(PoisonError::into_inner);
            loader.shutdown();
        }
        let result = {
            let mut state = self.write_state();
            self.inner.destroy_without_lock(&mut state);
            self.inner.init_without_lock(&mut state, cache_num, config)
        };
        let mut loader = self.loader.write().unwrap_or_else(PoisonError::into_inner);
        *loader = CacheLoader::spawn(Arc::downgrade(&self.inner));
        result
    }

    /// Rebinds the window tunables live and forwards the rest to the
    /// process-wide store configuration.
    pub fn reset_config(&self, config: &CacheConfig) {
        let mut state = self.write_state();
        state.position = config.cache_start_pos;
        state.items_per_key = extend_items_per_key(config.cache_items_per_key);
        warn!(
            position = ?state.position,
            items_per_key = state.items_per_key,
            "cache window configuration rebound"
        );
        process::set_config(&store_config_of(config));
    }

    /// Tears the shard array down, drops the backing-store link so the reload
    /// daemon cannot resurrect shards, then drains and stops the daemon.
    pub fn destroy(&self) {
        {
            let mut state = self.write_state();
            self.inner.destroy_without_lock(&mut state);
        }
        {
            let mut backing = self
                .inner
                .backing
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *backing = None;
        }
        // The shard-array write lock is released first: the daemon may be
        // mid-load behind the read lock, and joining it here must not wait
        // behind ourselves.
        let mut loader = self.loader.write().unwrap_or_else(PoisonError::into_inner);
        loader.shutdown();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        self.inner.status()
    }

    /// Overrides the lifecycle state.
    pub fn set_status(&self, status: CacheStatus) {
        self.inner.set_status(status);
    }

    /// Snapshot of process- and core-level counters.
    #[must_use]
    pub fn info(&self) -> CacheInfo {
        let state = self.read_state();
        let (hits, misses) = process::hit_and_miss();
        let mut keys_num = 0;
        for shard in &state.shards {
            let guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            keys_num += guard.db_size();
        }
        let loader = self.loader.read().unwrap_or_else(PoisonError::into_inner);
        CacheInfo {
            status: self.inner.status(),
            cache_num: state.shards.len(),
            keys_num,
            used_memory: process::used_memory(),
            hits,
            misses,
            async_load_keys_num: loader.admitted_keys(),
            waiting_load_keys_num: loader.waiting_keys(),
        }
    }

    /// Live keys across every shard.
    #[must_use]
    pub fn db_size(&self) -> usize {
        let state = self.read_state();
        state
            .shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .db_size()
            })
            .sum()
    }

    /// Drops every key in every shard.
    pub fn flush(&self) {
        let state = self.read_state();
        for shard in &state.shards {
            shard.lock().unwrap_or_else(PoisonError::into_inner).flush();
        }
    }

    /// Runs one bounded expiration batch on every shard. Invoked by the cron
    /// hook.
    pub fn active_expire_cycle(&self) -> usize {
        let state = self.read_state();
        state
            .shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .active_expire_cycle()
            })
            .sum()
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

    /// True when the key is live in its shard.
    #[must_use]
    pub fn exists(&self, key: &[u8]) -> bool {
        self.inner
            .with_shard(key, |store| Ok(store.exists(key)))
            .unwrap_or(false)
    }

    /// Removes one key.
    pub fn del(&self, key: &[u8]) -> CacheResult<()> {
        self.inner.with_shard(key, |store| store.del(key))
    }

    /// Applies a relative TTL.
    pub fn expire(&self, key: &[u8], ttl_secs: i64) -> CacheResult<()> {
        self.inner.with_shard(key, |store| store.expire(key, ttl_secs))
    }

    /// Applies an absolute deadline.
    pub fn expireat(&self, key: &[u8], deadline_unix_secs: i64) -> CacheResult<()> {
        self.inner
            .with_shard(key, |store| store.expireat(key, deadline_unix_secs))
    }

    /// Remaining TTL in seconds, `-1` for no expiry.
    pub fn ttl(&self, key: &[u8]) -> CacheResult<i64> {
        self.inner.with_shard(key, |store| store.ttl(key))
    }

    /// Drops the expiry of one key.
    pub fn persist(&self, key: &[u8]) -> CacheResult<bool> {
        self.inner.with_shard(key, |store| store.persist(key))
    }

    /// Redis-compatible type name of one key.
    pub fn type_name(&self, key: &[u8]) -> CacheResult<&'static str> {
        self.inner.with_shard(key, |store| store.type_name(key))
    }

    /// One random key from a random shard, probing the others on emptiness.
    pub fn random_key(&self) -> CacheResult<Vec<u8>> {
        let state = self.read_state();
        if state.shards.is_empty() {
            return Err(CacheError::KeyNotInCache);
        }
        let offset = rand::thread_rng().gen_range(0..state.shards.len());
        for probe in 0..state.shards.len() {
            let shard = &state.shards[(offset + probe) % state.shards.len()];
            let found = shard
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_key();
            if found.is_ok() {
                return found;
            }
        }
        Err(CacheError::KeyNotInCache)
    }

    /// Enqueues an asynchronous reload for one key. Returns false when the key
    /// is already pending or the daemon has been stopped.
    pub fn push_key_to_async_load_queue(&self, key_type: KeyType, key: &[u8]) -> bool {
        let loader = self.loader.read().unwrap_or_else(PoisonError::into_inner);
        loader.push(key_type, key)
    }

    pub(crate) fn inner(&self) -> &CacheInner {
        &self.inner
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CoreState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CoreState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // Populate-on-read writes. TTL mapping: positive arms an expiry, the
    // `TTL_NONE` sentinel stores without one, anything else deletes.

    /// Writes an authoritative string value into cache.
    pub fn write_kv_to_cache(&self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        self.inner.write_kv_to_cache(key, value, ttl_secs)
    }

    /// Writes an authoritative hash into cache.
    pub fn write_hash_to_cache(
        &self,
        key: &[u8],
        pairs: &[FieldValue],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        self.inner.write_hash_to_cache(key, pairs, ttl_secs)
    }

    /// Writes an authoritative list window into cache.
    pub fn write_list_to_cache(
        &self,
        key: &[u8],
        values: &[Vec<u8>],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        self.inner.write_list_to_cache(key, values, ttl_secs)
    }

    /// Writes an authoritative set into cache.
    pub fn write_set_to_cache(
        &self,
        key: &[u8],
        members: &[Vec<u8>],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        self.inner.write_set_to_cache(key, members, ttl_secs)
    }

    /// Writes an authoritative zset window into cache.
    pub fn write_zset_to_cache(
        &self,
        key: &[u8],
        pairs: &[ScoreMember],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        self.inner.write_zset_to_cache(key, pairs, ttl_secs)
    }
}

impl Drop for SlotCache {
    fn drop(&mut self) {
        self.loader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown();
        let mut state = self.write_state();
        self.inner.destroy_without_lock(&mut state);
    }
}

fn store_config_of(config: &CacheConfig) -> StoreConfig {
    StoreConfig {
        maxmemory: config.maxmemory,
        maxmemory_policy: config.maxmemory_policy.clone(),
        maxmemory_samples: config.maxmemory_samples,
    }
}

impl CacheInner {
    pub(crate) fn status(&self) -> CacheStatus {
        CacheStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: CacheStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn init_without_lock(
        &self,
        state: &mut CoreState,
        cache_num: ShardCount,
        config: &CacheConfig,
    ) -> CacheResult<()> {
        self.set_status(CacheStatus::Init);
        if !state.shards.is_empty() {
            error!("cache core init found live shards");
            self.destroy_without_lock(state);
            self.set_status(CacheStatus::None);
            return Err(CacheError::Corruption(
                "cache core is already initialized".to_owned(),
            ));
        }
        process::set_config(&store_config_of(config));
        state.position = config.cache_start_pos;
        state.items_per_key = extend_items_per_key(config.cache_items_per_key);
        state.shards = (0..cache_num.as_usize())
            .map(|_| Mutex::new(ShardStore::new()))
            .collect();
        self.set_status(CacheStatus::Ok);
        Ok(())
    }

    pub(crate) fn destroy_without_lock(&self, state: &mut CoreState) {
        self.set_status(CacheStatus::Destroy);
        state.shards.clear();
        self.set_status(CacheStatus::None);
    }

    pub(crate) fn backing(&self) -> Option<Arc<dyn BackingStore>> {
        self.backing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()?
            .upgrade()
    }

    /// Window policy snapshot `(position, items_per_key)`.
    pub(crate) fn policy(&self) -> (CachePosition, usize) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.position, state.items_per_key)
    }

    /// Runs one operation under core-read + shard-mutex locking.
    pub(crate) fn with_shard<R>(
        &self,
        key: &[u8],
        op: impl FnOnce(&mut ShardStore) -> CacheResult<R>,
    ) -> CacheResult<R> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(shard) = state.shard_for_key(key) else {
            return Err(CacheError::KeyNotInCache);
        };
        let mut guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut guard)
    }

    /// Like [`Self::with_shard`], additionally handing the window policy to
    /// the operation.
    pub(crate) fn with_shard_ctx<R>(
        &self,
        key: &[u8],
        op: impl FnOnce(&mut ShardStore, CachePosition, usize) -> CacheResult<R>,
    ) -> CacheResult<R> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(shard) = state.shard_for_key(key) else {
            return Err(CacheError::KeyNotInCache);
        };
        let mut guard = shard.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut guard, state.position, state.items_per_key)
    }

    pub(crate) fn write_kv_to_cache(
        &self,
        key: &[u8],
        value: Vec<u8>,
        ttl_secs: i64,
    ) -> CacheResult<()> {
        if ttl_secs <= 0 {
            if ttl_secs == TTL_NONE {
                return self.with_shard(key, |store| store.setnx(key, value, 0));
            }
            return self.with_shard(key, |store| store.del(key));
        }
        self.with_shard(key, |store| store.setnx(key, value, ttl_secs))
    }

    pub(crate) fn write_hash_to_cache(
        &self,
        key: &[u8],
        pairs: &[FieldValue],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        if ttl_secs <= 0 && ttl_secs != TTL_NONE {
            return self.with_shard(key, |store| store.del(key));
        }
        self.with_shard(key, |store| {
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

    pub(crate) fn write_list_to_cache(
        &self,
        key: &[u8],
        values: &[Vec<u8>],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        if ttl_secs <= 0 && ttl_secs != TTL_NONE {
            return self.with_shard(key, |store| store.del(key));
        }
        self.with_shard(key, |store| {
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

    pub(crate) fn write_set_to_cache(
        &self,
        key: &[u8],
        members: &[Vec<u8>],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        if ttl_secs <= 0 && ttl_secs != TTL_NONE {
            return self.with_shard(key, |store| store.del(key));
        }
        self.with_shard(key, |store| {
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

    pub(crate) fn write_zset_to_cache(
        &self,
        key: &[u8],
        pairs: &[ScoreMember],
        ttl_secs: i64,
    ) -> CacheResult<()> {
        if ttl_secs <= 0 && ttl_secs != TTL_NONE {
            return self.with_shard(key, |store| store.del(key));
        }
        self.with_shard(key, |store| {
            if store.exists(key) {
                return Err(CacheError::KeyExists);
            }
            let _ = store.zadd(key, pairs)?;
            if ttl_secs > 0 {
                store.expire(key, ttl_secs)?;
            }
            Ok(())
        })
    }

    /// One reload: fetch authoritative state, repopulate the owning shard.
    /// Oversized hashes and sets are not admitted; they have no windowed form.
    pub(crate) fn load_key(&self, key_type: KeyType, key: &[u8]) -> CacheResult<()> {
        let Some(backing) = self.backing() else {
            return Ok(());
        };
        let (position, items_per_key) = self.policy();
        let outcome = match key_type {
            KeyType::Kv => match backing.kv_with_ttl(key)? {
                None => Ok(()),
                Some(payload) => self.write_kv_to_cache(key, payload.value, payload.ttl_secs),
            },
            KeyType::Hash => {
                if backing.hash_len(key)? > items_per_key {
                    return Ok(());
                }
                match backing.hash_with_ttl(key)? {
                    None => Ok(()),
                    Some((pairs, ttl_secs)) => self.write_hash_to_cache(key, &pairs, ttl_secs),
                }
            }
            KeyType::List => match backing.list_range_with_ttl(key, position, items_per_key)? {
                None => Ok(()),
                Some((values, ttl_secs)) => self.write_list_to_cache(key, &values, ttl_secs),
            },
            KeyType::Set => {
                if backing.set_len(key)? > items_per_key {
                    return Ok(());
                }
                match backing.set_with_ttl(key)? {
                    None => Ok(()),
                    Some((members, ttl_secs)) => self.write_set_to_cache(key, &members, ttl_secs),
                }
            }
            KeyType::ZSet => match backing.zset_range_with_ttl(key, position, items_per_key)? {
                None => Ok(()),
                Some((pairs, ttl_secs)) => self.write_zset_to_cache(key, &pairs, ttl_secs),
            },
        };
        match outcome {
            // A concurrent populate beat the reload; the entry is fresh either way.
            Err(CacheError::KeyExists) => Ok(()),
            other => other,
        }
    }
}
