//! Sorted-set commands.

use slotcache_common::error::{CacheError, CacheResult};

use crate::entry::Value;
use crate::types::{LexBound, ScoreBound, ScoreMember};
use crate::zset::SortedSet;
use crate::{ShardStore, normalize_index_range};

impl ShardStore {
    fn zset_value(&mut self, key: &[u8]) -> CacheResult<&SortedSet> {
        match &self.read_entry(key)?.value {
            Value::ZSet(zset) => Ok(zset),
            _ => Err(CacheError::WrongType),
        }
    }

    fn with_zset_mut<R>(
        &mut self,
        key: &[u8],
        create: bool,
        op: impl FnOnce(&mut SortedSet) -> CacheResult<R>,
    ) -> CacheResult<R> {
        if create {
            self.ensure_entry(key, || Value::ZSet(SortedSet::default()));
        }
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::ZSet(zset) => op(zset),
            _ => Err(CacheError::WrongType),
        })
    }

    /// Adds or updates pairs, creating the key when absent. Returns how many
    /// members were new.
    pub fn zadd(&mut self, key: &[u8], pairs: &[ScoreMember]) -> CacheResult<usize> {
        self.with_zset_mut(key, true, |zset| {
            Ok(pairs
                .iter()
                .filter(|pair| zset.insert(pair.score, pair.member.clone()))
                .count())
        })
    }

    /// Member count; zero for an absent key. Does not touch hit/miss counters
    /// because the cache core probes it on every coherence decision.
    pub fn zcard(&mut self, key: &[u8]) -> usize {
        match self.peek_entry(key) {
            Some(entry) => match &entry.value {
                Value::ZSet(zset) => zset.len(),
                _ => 0,
            },
            None => 0,
        }
    }

    /// Number of members inside the score interval.
    pub fn zcount(&mut self, key: &[u8], min: ScoreBound, max: ScoreBound) -> CacheResult<usize> {
        Ok(self.zset_value(key)?.count_by_score(min, max))
    }

    /// Adds `delta` to one member's score, creating member and key as needed.
    /// Returns the new score.
    pub fn zincrby(&mut self, key: &[u8], member: &[u8], delta: f64) -> CacheResult<f64> {
        self.with_zset_mut(key, true, |zset| {
            let next = zset.score(member).unwrap_or(0.0) + delta;
            if !next.is_finite() {
                return Err(CacheError::NotSupported);
            }
            let _ = zset.insert(next, member.to_vec());
            Ok(next)
        })
    }

    /// Members at a possibly negative rank range, ascending.
    pub fn zrange(&mut self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<ScoreMember>> {
        let zset = self.zset_value(key)?;
        match normalize_index_range(start, stop, zset.len()) {
            Some((start_index, stop_index)) => {
                Ok(zset.range_by_rank(start_index, stop_index).to_vec())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Members at a possibly negative reverse-rank range, descending.
    pub fn zrevrange(&mut self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<ScoreMember>> {
        let zset = self.zset_value(key)?;
        let len = zset.len();
        match normalize_index_range(start, stop, len) {
            Some((start_index, stop_index)) => {
                // Reverse rank r maps to forward rank len - r - 1.
                let forward_start = len - stop_index - 1;
                let forward_stop = len - start_index - 1;
                let mut picked = zset.range_by_rank(forward_start, forward_stop).to_vec();
                picked.reverse();
                Ok(picked)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Members inside the score interval, ascending, with offset/count.
    pub fn zrangebyscore(
        &mut self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
        offset: i64,
        count: i64,
    ) -> CacheResult<Vec<ScoreMember>> {
        Ok(self.zset_value(key)?.range_by_score(min, max, offset, count))
    }

    /// Members inside the score interval, descending, with offset/count.
    pub fn zrevrangebyscore(
        &mut self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
        offset: i64,
        count: i64,
    ) -> CacheResult<Vec<ScoreMember>> {
        Ok(self.zset_value(key)?.rev_range_by_score(min, max, offset, count))
    }

    /// Ascending rank of one member.
    pub fn zrank(&mut self, key: &[u8], member: &[u8]) -> CacheResult<usize> {
        self.zset_value(key)?
            .rank(member)
            .ok_or(CacheError::MemberNotInCache)
    }

    /// Descending rank of one member.
    pub fn zrevrank(&mut self, key: &[u8], member: &[u8]) -> CacheResult<usize> {
        let zset = self.zset_value(key)?;
        match zset.rank(member) {
            Some(rank) => Ok(zset.len() - rank - 1),
            None => Err(CacheError::MemberNotInCache),
        }
    }

    /// Removes members. Returns how many were present.
    pub fn zrem(&mut self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        self.with_zset_mut(key, false, |zset| {
            Ok(members
                .iter()
                .filter(|member| zset.remove(member))
                .count())
        })
    }

    /// Removes a possibly negative rank range. Returns the removed count.
    pub fn zremrangebyrank(&mut self, key: &[u8], start: i64, stop: i64) -> CacheResult<usize> {
        self.with_zset_mut(key, false, |zset| {
            match normalize_index_range(start, stop, zset.len()) {
                Some((start_index, stop_index)) => {
                    Ok(zset.remove_range_by_rank(start_index, stop_index))
                }
                None => Ok(0),
            }
        })
    }

    /// Removes every member inside the score interval. Returns the removed count.
    pub fn zremrangebyscore(
        &mut self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
    ) -> CacheResult<usize> {
        self.with_zset_mut(key, false, |zset| Ok(zset.remove_range_by_score(min, max)))
    }

    /// Score of one member.
    pub fn zscore(&mut self, key: &[u8], member: &[u8]) -> CacheResult<f64> {
        self.zset_value(key)?
            .score(member)
            .ok_or(CacheError::MemberNotInCache)
    }

    /// Members inside the lexicographic interval, ascending.
    pub fn zrangebylex(
        &mut self,
        key: &[u8],
        min: &LexBound,
        max: &LexBound,
    ) -> CacheResult<Vec<Vec<u8>>> {
        Ok(self.zset_value(key)?.range_by_lex(min, max))
    }

    /// Members inside the lexicographic interval, descending.
    pub fn zrevrangebylex(
        &mut self,
        key: &[u8],
        min: &LexBound,
        max: &LexBound,
    ) -> CacheResult<Vec<Vec<u8>>> {
        let mut members = self.zset_value(key)?.range_by_lex(min, max);
        members.reverse();
        Ok(members)
    }

    /// Number of members inside the lexicographic interval.
    pub fn zlexcount(&mut self, key: &[u8], min: &LexBound, max: &LexBound) -> CacheResult<usize> {
        Ok(self.zset_value(key)?.range_by_lex(min, max).len())
    }

    /// Removes every member inside the lexicographic interval. Returns the
    /// removed count.
    pub fn zremrangebylex(
        &mut self,
        key: &[u8],
        min: &LexBound,
        max: &LexBound,
    ) -> CacheResult<usize> {
        self.with_zset_mut(key, false, |zset| Ok(zset.remove_range_by_lex(min, max)))
    }
}
