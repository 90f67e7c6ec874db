//! Sorted-set command layer: bounded insertion, window-aware reads and the
//! repair trigger.
//!
//! Authoritative lengths are always read from the backing store before the
//! shard mutex is taken; inside the critical section only shard state is
//! consulted.

use std::collections::VecDeque;

use hashbrown::HashSet;

use slotcache_common::config::CachePosition;
use slotcache_common::error::{CacheError, CacheResult};

use slotcache_store::{LexBound, ScoreBound, ScoreMember, ShardStore};

use crate::cache::SlotCache;
use crate::coherence::{
    RangeCoverage, ScoreCoverage, check_cache_range, check_cache_range_by_score,
    check_cache_rev_range,
};
use crate::loader::KeyType;

fn cache_min_max(store: &mut ShardStore, key: &[u8]) -> Option<(ScoreMember, ScoreMember)> {
    let low = store.zrange(key, 0, 0).ok()?.into_iter().next()?;
    let high = store.zrange(key, -1, -1).ok()?.into_iter().next()?;
    Some((low, high))
}

/// Restores the per-key size bound after a mutation: `FromBegin` trims the
/// tail, `FromEnd` trims the head.
fn clean_cache_key_if_needed(
    store: &mut ShardStore,
    key: &[u8],
    position: CachePosition,
    items_per_key: usize,
) -> CacheResult<()> {
    let cache_len = store.zcard(key);
    if cache_len <= items_per_key {
        return Ok(());
    }
    let excess = (cache_len - items_per_key) as i64;
    let (start, stop) = match position {
        CachePosition::FromBegin => (-excess, -1),
        CachePosition::FromEnd => (0, excess - 1),
    };
    let _ = store.zremrangebyrank(key, start, stop)?;
    Ok(())
}

/// De-duplicates incoming pairs keeping the last occurrence of each member,
/// preserving relative order of the survivors.
fn dedup_keep_last(pairs: &[ScoreMember]) -> Vec<ScoreMember> {
    let mut seen: HashSet<&[u8]> = HashSet::new();
    let mut unique = VecDeque::with_capacity(pairs.len());
    for pair in pairs.iter().rev() {
        if seen.insert(pair.member.as_slice()) {
            unique.push_front(pair.clone());
        }
    }
    unique.into_iter().collect()
}

fn min_max_scores(pairs: &[ScoreMember]) -> Option<(f64, f64)> {
    let mut scores = pairs.iter().map(|pair| pair.score);
    let first = scores.next()?;
    let mut min = first;
    let mut max = first;
    for score in scores {
        if score < min {
            min = score;
        }
        if score > max {
            max = score;
        }
    }
    Some((min, max))
}

impl SlotCache {
    fn db_zset_len(&self, key: &[u8]) -> CacheResult<usize> {
        let Some(backing) = self.inner().backing() else {
            return Err(CacheError::KeyNotInCache);
        };
        backing.zset_len(key)
    }

    /// Decision table of the repair trigger: a window that shrank below half
    /// its target is deleted and queued for an asynchronous rebuild. The 2x
    /// slack avoids thrashing when small mutations nibble at the window.
    fn reload_cache_key_if_needed(
        &self,
        store: &mut ShardStore,
        key: &[u8],
        mem_len: Option<usize>,
        db_len: usize,
        items_per_key: usize,
    ) -> bool {
        let mem_len = mem_len.unwrap_or_else(|| store.zcard(key));
        if db_len == 0 {
            return false;
        }
        let starved = if db_len < items_per_key {
            mem_len * 2 < db_len
        } else {
            items_per_key > 0 && mem_len * 2 < items_per_key
        };
        if !starved {
            return false;
        }
        let _ = store.del(key);
        let _ = self.push_key_to_async_load_queue(KeyType::ZSet, key);
        true
    }

    /// Write-through add, size-capped afterwards.
    pub fn zadd(&self, key: &[u8], pairs: &[ScoreMember]) -> CacheResult<()> {
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let _ = store.zadd(key, pairs)?;
            clean_cache_key_if_needed(store, key, position, items_per_key)
        })
    }

    /// Bounded insertion into an existing cached window.
    ///
    /// Incoming members are partitioned against the window boundary: members
    /// inside the window are added, members strictly outside are removed from
    /// cache entirely, and stale members past the boundary are evicted so the
    /// window stays a contiguous prefix/suffix.
    pub fn zadd_if_exists(&self, key: &[u8], pairs: &[ScoreMember]) -> CacheResult<()> {
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            if !store.exists(key) {
                return Err(CacheError::KeyNotExist);
            }
            let unique = dedup_keep_last(pairs);
            let Some((min_in, max_in)) = min_max_scores(&unique) else {
                return Ok(());
            };
            let Some((cache_min, cache_max)) = cache_min_max(store, key) else {
                return Err(CacheError::KeyNotExist);
            };
            match position {
                CachePosition::FromBegin => {
                    if max_in < cache_max.score {
                        let _ = store.zadd(key, &unique)?;
                    } else {
                        let mut to_add = Vec::new();
                        let mut to_remove = Vec::new();
                        for pair in unique {
                            if pair.score <= cache_max.score {
                                to_add.push(pair);
                            } else {
                                to_remove.push(pair.member);
                            }
                        }
                        if !to_add.is_empty() {
                            let _ = store.zadd(key, &to_add)?;
                            let _ = store.zremrangebyscore(
                                key,
                                ScoreBound::Excl(cache_max.score),
                                ScoreBound::PosInf,
                            )?;
                        }
                        if !to_remove.is_empty() {
                            let _ = store.zrem(key, &to_remove)?;
                        }
                    }
                }
                CachePosition::FromEnd => {
                    if min_in > cache_min.score {
                        let _ = store.zadd(key, &unique)?;
                    } else {
                        let mut to_add = Vec::new();
                        let mut to_remove = Vec::new();
                        for pair in unique {
                            if pair.score >= cache_min.score {
                                to_add.push(pair);
                            } else {
                                to_remove.push(pair.member);
                            }
                        }
                        if !to_add.is_empty() {
                            let _ = store.zadd(key, &to_add)?;
                            let _ = store.zremrangebyscore(
                                key,
                                ScoreBound::NegInf,
                                ScoreBound::Excl(cache_min.score),
                            )?;
                        }
                        if !to_remove.is_empty() {
                            let _ = store.zrem(key, &to_remove)?;
                        }
                    }
                }
            }
            clean_cache_key_if_needed(store, key, position, items_per_key)
        })
    }

    /// Create-only add with a relative TTL.
    pub fn zaddnx(&self, key: &[u8], pairs: &[ScoreMember], ttl_secs: i64) -> CacheResult<()> {
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            if store.exists(key) {
                return Err(CacheError::KeyExists);
            }
            let _ = store.zadd(key, pairs)?;
            if ttl_secs > 0 {
                store.expire(key, ttl_secs)?;
            }
            clean_cache_key_if_needed(store, key, position, items_per_key)
        })
    }

    /// Create-only add without expiry.
    pub fn zaddnx_without_ttl(&self, key: &[u8], pairs: &[ScoreMember]) -> CacheResult<()> {
        self.zaddnx(key, pairs, 0)
    }

    /// Authoritative cardinality, straight from the backing store.
    pub fn zcard(&self, key: &[u8]) -> CacheResult<usize> {
        self.db_zset_len(key)
    }

    /// Cached cardinality.
    pub fn cache_zcard(&self, key: &[u8]) -> CacheResult<usize> {
        self.inner().with_shard(key, |store| Ok(store.zcard(key)))
    }

    /// Count inside a score interval, served only when the window covers it.
    pub fn zcount(&self, key: &[u8], min: ScoreBound, max: ScoreBound) -> CacheResult<usize> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let cache_len = store.zcard(key);
            if cache_len == 0 {
                return Err(CacheError::KeyNotInCache);
            }
            let Some((cache_min, cache_max)) = cache_min_max(store, key) else {
                return Err(CacheError::KeyNotExist);
            };
            let cache_full = cache_len == items_per_key;
            match check_cache_range_by_score(
                cache_full,
                position,
                cache_min.score,
                cache_max.score,
                min,
                max,
            ) {
                ScoreCoverage::Hit => store.zcount(key, min, max),
                ScoreCoverage::Miss => {
                    let _ = self.reload_cache_key_if_needed(
                        store,
                        key,
                        Some(cache_len),
                        db_len,
                        items_per_key,
                    );
                    Err(CacheError::KeyNotInCache)
                }
                ScoreCoverage::Error => Err(CacheError::InvalidScoreRange),
            }
        })
    }

    /// Write-through score increment, size-capped afterwards.
    pub fn zincrby(&self, key: &[u8], member: &[u8], delta: f64) -> CacheResult<f64> {
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let next = store.zincrby(key, member, delta)?;
            clean_cache_key_if_needed(store, key, position, items_per_key)?;
            Ok(next)
        })
    }

    /// Post-increment window maintenance: keep the member with its new score,
    /// evict it when it left the window, or flush boundary ties whose order
    /// can no longer be trusted.
    pub fn zincrby_if_exists(
        &self,
        key: &[u8],
        member: &[u8],
        increment: f64,
        new_score: f64,
    ) -> CacheResult<()> {
        if increment.abs() < f64::EPSILON {
            return Err(CacheError::NothingToDo);
        }
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let cache_len = store.zcard(key);
            let Some((cache_min, cache_max)) = cache_min_max(store, key) else {
                return Err(CacheError::KeyNotExist);
            };
            let evict_member = |store: &mut ShardStore| store.zrem(key, &[member.to_vec()]);
            match position {
                CachePosition::FromBegin => {
                    if new_score > cache_max.score {
                        let _ = evict_member(store)?;
                        let _ = self.reload_cache_key_if_needed(
                            store,
                            key,
                            Some(cache_len),
                            db_len,
                            items_per_key,
                        );
                        Ok(())
                    } else if new_score == cache_max.score {
                        let _ = evict_member(store)?;
                        let _ = store.zremrangebyscore(
                            key,
                            ScoreBound::Incl(cache_max.score),
                            ScoreBound::Incl(cache_max.score),
                        )?;
                        let _ = self.reload_cache_key_if_needed(
                            store,
                            key,
                            Some(cache_len),
                            db_len,
                            items_per_key,
                        );
                        Ok(())
                    } else {
                        let _ = store.zadd(key, &[ScoreMember::new(new_score, member)])?;
                        clean_cache_key_if_needed(store, key, position, items_per_key)
                    }
                }
                CachePosition::FromEnd => {
                    if new_score > cache_min.score {
                        let _ = store.zadd(key, &[ScoreMember::new(new_score, member)])?;
                        clean_cache_key_if_needed(store, key, position, items_per_key)
                    } else if new_score == cache_min.score {
                        let _ = evict_member(store)?;
                        let _ = store.zremrangebyscore(
                            key,
                            ScoreBound::Incl(cache_min.score),
                            ScoreBound::Incl(cache_min.score),
                        )?;
                        let _ = self.reload_cache_key_if_needed(
                            store,
                            key,
                            Some(cache_len),
                            db_len,
                            items_per_key,
                        );
                        Ok(())
                    } else {
                        let _ = evict_member(store)?;
                        let _ = self.reload_cache_key_if_needed(
                            store,
                            key,
                            Some(cache_len),
                            db_len,
                            items_per_key,
                        );
                        Ok(())
                    }
                }
            }
        })
    }

    /// Rank-range read in authoritative coordinates.
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<ScoreMember>> {
        let db_len = self.db_zset_len(key)?;
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            if !store.exists(key) {
                return Err(CacheError::KeyNotInCache);
            }
            let cache_len = store.zcard(key);
            match check_cache_range(cache_len as i64, db_len as i64, position, start, stop) {
                RangeCoverage::Hit { start, stop } => store.zrange(key, start, stop),
                RangeCoverage::Miss => {
                    let _ = self.reload_cache_key_if_needed(
                        store,
                        key,
                        Some(cache_len),
                        db_len,
                        items_per_key,
                    );
                    Err(CacheError::KeyNotInCache)
                }
                RangeCoverage::Error => Err(CacheError::InvalidRange),
            }
        })
    }

    /// Reverse rank-range read in authoritative coordinates.
    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<ScoreMember>> {
        let db_len = self.db_zset_len(key)?;
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            if !store.exists(key) {
                return Err(CacheError::KeyNotInCache);
            }
            let cache_len = store.zcard(key);
            match check_cache_rev_range(cache_len as i64, db_len as i64, position, start, stop) {
                RangeCoverage::Hit { start, stop } => store.zrevrange(key, start, stop),
                RangeCoverage::Miss => {
                    let _ = self.reload_cache_key_if_needed(
                        store,
                        key,
                        Some(cache_len),
                        db_len,
                        items_per_key,
                    );
                    Err(CacheError::KeyNotInCache)
                }
                RangeCoverage::Error => Err(CacheError::InvalidRange),
            }
        })
    }

    /// Score-interval read, ascending.
    pub fn zrangebyscore(
        &self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
        offset: i64,
        count: i64,
    ) -> CacheResult<Vec<ScoreMember>> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let cache_len = store.zcard(key);
            if cache_len == 0 {
                return Err(CacheError::KeyNotInCache);
            }
            let Some((cache_min, cache_max)) = cache_min_max(store, key) else {
                return Err(CacheError::KeyNotExist);
            };
            let cache_full = cache_len == items_per_key;
            match check_cache_range_by_score(
                cache_full,
                position,
                cache_min.score,
                cache_max.score,
                min,
                max,
            ) {
                ScoreCoverage::Hit => store.zrangebyscore(key, min, max, offset, count),
                ScoreCoverage::Miss => {
                    let _ = self.reload_cache_key_if_needed(
                        store,
                        key,
                        Some(cache_len),
                        db_len,
                        items_per_key,
                    );
                    Err(CacheError::KeyNotInCache)
                }
                ScoreCoverage::Error => Err(CacheError::InvalidScoreRange),
            }
        })
    }

    /// Score-interval read, descending.
    pub fn zrevrangebyscore(
        &self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
        offset: i64,
        count: i64,
    ) -> CacheResult<Vec<ScoreMember>> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let cache_len = store.zcard(key);
            if cache_len == 0 {
                return Err(CacheError::KeyNotInCache);
            }
            let Some((cache_min, cache_max)) = cache_min_max(store, key) else {
                return Err(CacheError::KeyNotExist);
            };
            let cache_full = cache_len == items_per_key;
            match check_cache_range_by_score(
                cache_full,
                position,
                cache_min.score,
                cache_max.score,
                min,
                max,
            ) {
                ScoreCoverage::Hit => store.zrevrangebyscore(key, min, max, offset, count),
                ScoreCoverage::Miss => {
                    let _ = self.reload_cache_key_if_needed(
                        store,
                        key,
                        Some(cache_len),
                        db_len,
                        items_per_key,
                    );
                    Err(CacheError::KeyNotInCache)
                }
                ScoreCoverage::Error => Err(CacheError::InvalidScoreRange),
            }
        })
    }

    /// Ascending rank translated into authoritative coordinates.
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> CacheResult<i64> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, _items_per_key| {
            let cache_len = store.zcard(key);
            if cache_len == 0 {
                return Err(CacheError::KeyNotInCache);
            }
            match store.zrank(key, member) {
                Ok(rank) => {
                    let rank = match position {
                        // The window is a prefix, cache rank is the db rank.
                        CachePosition::FromBegin => rank,
                        CachePosition::FromEnd => db_len.saturating_sub(cache_len) + rank,
                    };
                    Ok(i64::try_from(rank).unwrap_or(i64::MAX))
                }
                Err(_) => Err(CacheError::KeyNotInCache),
            }
        })
    }

    /// Descending rank translated into authoritative coordinates.
    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> CacheResult<i64> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, _items_per_key| {
            let cache_len = store.zcard(key);
            if cache_len == 0 {
                return Err(CacheError::KeyNotInCache);
            }
            match store.zrevrank(key, member) {
                Ok(rank) => {
                    let rank = match position {
                        CachePosition::FromBegin => db_len.saturating_sub(cache_len) + rank,
                        // The window is a suffix, cache reverse rank is the db
                        // reverse rank.
                        CachePosition::FromEnd => rank,
                    };
                    Ok(i64::try_from(rank).unwrap_or(i64::MAX))
                }
                Err(_) => Err(CacheError::MemberNotInCache),
            }
        })
    }

    /// Write-through member removal with a repair check.
    pub fn zrem(&self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, _position, items_per_key| {
            let removed = store.zrem(key, members)?;
            let _ = self.reload_cache_key_if_needed(store, key, None, db_len, items_per_key);
            Ok(removed)
        })
    }

    /// Write-through rank-range removal. `ele_deleted` is how many members the
    /// authoritative remove already dropped, so the original length can be
    /// reconstructed for index arithmetic.
    pub fn zremrangebyrank(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
        ele_deleted: i64,
    ) -> CacheResult<usize> {
        let db_len_now = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, position, items_per_key| {
            let cache_len = store.zcard(key);
            if cache_len == 0 {
                return Err(CacheError::KeyNotInCache);
            }
            let db_len = i64::try_from(db_len_now).unwrap_or(i64::MAX) + ele_deleted;
            let mut start_index = if start >= 0 { start } else { db_len + start };
            let mut stop_index = if stop >= 0 { stop } else { db_len + stop };
            start_index = start_index.max(0);
            stop_index = stop_index.min(db_len - 1);
            if start_index > stop_index {
                return Err(CacheError::InvalidRange);
            }
            let cache_len_i64 = i64::try_from(cache_len).unwrap_or(i64::MAX);
            match position {
                CachePosition::FromBegin => {
                    if start_index <= cache_len_i64 {
                        let removed = store.zremrangebyrank(key, start_index, stop_index)?;
                        let _ = self.reload_cache_key_if_needed(
                            store,
                            key,
                            Some(cache_len),
                            db_len_now,
                            items_per_key,
                        );
                        Ok(removed)
                    } else {
                        Err(CacheError::InvalidRange)
                    }
                }
                CachePosition::FromEnd => {
                    let window_start = db_len - cache_len_i64;
                    if stop_index >= window_start {
                        let cache_start = (start_index - window_start).max(0);
                        let cache_stop = (stop_index - window_start).min(cache_len_i64 - 1);
                        let removed = store.zremrangebyrank(key, cache_start, cache_stop)?;
                        let _ = self.reload_cache_key_if_needed(
                            store,
                            key,
                            Some(cache_len),
                            db_len_now,
                            items_per_key,
                        );
                        Ok(removed)
                    } else {
                        Err(CacheError::InvalidRange)
                    }
                }
            }
        })
    }

    /// Write-through score-interval removal with a repair check.
    pub fn zremrangebyscore(
        &self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
    ) -> CacheResult<usize> {
        let db_len = self.db_zset_len(key).unwrap_or(0);
        self.inner().with_shard_ctx(key, |store, _position, items_per_key| {
            let removed = store.zremrangebyscore(key, min, max)?;
            let _ = self.reload_cache_key_if_needed(store, key, None, db_len, items_per_key);
            Ok(removed)
        })
    }

    /// Score of one member.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> CacheResult<f64> {
        self.inner().with_shard(key, |store| {
            store.zscore(key, member).map_err(|_| CacheError::KeyNotInCache)
        })
    }

    /// True when the cache currently holds the entire zset.
    pub fn cache_size_eqs_db(&self, key: &[u8]) -> CacheResult<bool> {
        let db_len = self.db_zset_len(key)?;
        let cache_len = self.cache_zcard(key)?;
        Ok(db_len == cache_len)
    }

    /// Lexicographic range; only a whole-set cache may answer.
    pub fn zrangebylex(
        &self,
        key: &[u8],
        min: &LexBound,
        max: &LexBound,
    ) -> CacheResult<Vec<Vec<u8>>> {
        if !self.cache_size_eqs_db(key)? {
            return Err(CacheError::KeyNotInCache);
        }
        self.inner().with_shard(key, |store| store.zrangebylex(key, min, max))
    }

    /// Reverse lexicographic range; only a whole-set cache may answer.
    pub fn zrevrangebylex(
        &self,
        key: &[u8],
        min: &LexBound,
        max: &LexBound,
    ) -> CacheResult<Vec<Vec<u8>>> {
        if !self.cache_size_eqs_db(key)? {
            return Err(CacheError::KeyNotInCache);
        }
        self.inner()
            .with_shard(key, |store| store.zrevrangebylex(key, min, max))
    }

    /// Lexicographic count; only a whole-set cache may answer.
    pub fn zlexcount(&self, key: &[u8], min: &LexBound, max: &LexBound) -> CacheResult<usize> {
        if !self.cache_size_eqs_db(key)? {
            return Err(CacheError::KeyNotInCache);
        }
        self.inner().with_shard(key, |store| store.zlexcount(key, min, max))
    }

    /// Lexicographic removal; only a whole-set cache may apply it.
    pub fn zremrangebylex(&self, key: &[u8], min: &LexBound, max: &LexBound) -> CacheResult<usize> {
        if !self.cache_size_eqs_db(key)? {
            return Err(CacheError::KeyNotInCache);
        }
        self.inner()
            .with_shard(key, |store| store.zremrangebylex(key, min, max))
    }
}
