use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use googletest::prelude::*;
use rstest::rstest;

use slotcache_common::config::{CacheConfig, CachePosition, TTL_NONE};
use slotcache_common::error::{CacheError, CacheResult};
use slotcache_common::ids::ShardCount;

use slotcache_store::{FieldValue, LexBound, ScoreBound, ScoreMember, ShardStore};

use crate::backing::{BackingStore, KvPayload};
use crate::cache::{CacheStatus, SlotCache};
use crate::loader::KeyType;
use crate::manager::CacheManager;

/// Authoritative store stand-in: one shard store behind a mutex, exposing the
/// read-only backing surface.
#[derive(Default)]
struct FakeBacking {
    store: Mutex<ShardStore>,
}

impl FakeBacking {
    fn with_store<R>(&self, op: impl FnOnce(&mut ShardStore) -> R) -> R {
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut guard)
    }

    fn ttl_of(store: &mut ShardStore, key: &[u8]) -> i64 {
        store.ttl(key).unwrap_or(TTL_NONE)
    }
}

impl BackingStore for FakeBacking {
    fn kv_with_ttl(&self, key: &[u8]) -> CacheResult<Option<KvPayload>> {
        self.with_store(|store| match store.get(key) {
            Ok(value) => Ok(Some(KvPayload {
                value,
                ttl_secs: Self::ttl_of(store, key),
            })),
            Err(_) => Ok(None),
        })
    }

    fn hash_with_ttl(&self, key: &[u8]) -> CacheResult<Option<(Vec<FieldValue>, i64)>> {
        self.with_store(|store| match store.hgetall(key) {
            Ok(pairs) => {
                let ttl = Self::ttl_of(store, key);
                Ok(Some((pairs, ttl)))
            }
            Err(_) => Ok(None),
        })
    }

    fn hash_len(&self, key: &[u8]) -> CacheResult<usize> {
        self.with_store(|store| Ok(store.hlen(key).unwrap_or(0)))
    }

    fn list_range_with_ttl(
        &self,
        key: &[u8],
        side: CachePosition,
        limit: usize,
    ) -> CacheResult<Option<(Vec<Vec<u8>>, i64)>> {
        self.with_store(|store| {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let picked = match side {
                CachePosition::FromBegin => store.lrange(key, 0, limit - 1),
                CachePosition::FromEnd => store.lrange(key, -limit, -1),
            };
            match picked {
                Ok(values) => {
                    let ttl = Self::ttl_of(store, key);
                    Ok(Some((values, ttl)))
                }
                Err(_) => Ok(None),
            }
        })
    }

    fn list_len(&self, key: &[u8]) -> CacheResult<usize> {
        self.with_store(|store| Ok(store.llen(key).unwrap_or(0)))
    }

    fn set_with_ttl(&self, key: &[u8]) -> CacheResult<Option<(Vec<Vec<u8>>, i64)>> {
        self.with_store(|store| match store.smembers(key) {
            Ok(members) => {
                let ttl = Self::ttl_of(store, key);
                Ok(Some((members, ttl)))
            }
            Err(_) => Ok(None),
        })
    }

    fn set_len(&self, key: &[u8]) -> CacheResult<usize> {
        self.with_store(|store| Ok(store.scard(key).unwrap_or(0)))
    }

    fn zset_range_with_ttl(
        &self,
        key: &[u8],
        side: CachePosition,
        limit: usize,
    ) -> CacheResult<Option<(Vec<ScoreMember>, i64)>> {
        self.with_store(|store| {
            if store.zcard(key) == 0 {
                return Ok(None);
            }
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let picked = match side {
                CachePosition::FromBegin => store.zrange(key, 0, limit - 1),
                CachePosition::FromEnd => store.zrange(key, -limit, -1),
            };
            match picked {
                Ok(pairs) => {
                    let ttl = Self::ttl_of(store, key);
                    Ok(Some((pairs, ttl)))
                }
                Err(_) => Ok(None),
            }
        })
    }

    fn zset_len(&self, key: &[u8]) -> CacheResult<usize> {
        self.with_store(|store| Ok(store.zcard(key)))
    }
}

fn pairs(entries: &[(f64, &str)]) -> Vec<ScoreMember> {
    entries
        .iter()
        .map(|(score, member)| ScoreMember::new(*score, *member))
        .collect()
}

fn rig(items_per_key: usize, position: CachePosition) -> (Arc<FakeBacking>, SlotCache) {
    let backing = Arc::new(FakeBacking::default());
    let config = CacheConfig {
        cache_num: ShardCount::new(4).expect("literal shard count must be non-zero"),
        cache_start_pos: position,
        cache_items_per_key: items_per_key,
        ..CacheConfig::default()
    };
    let dyn_backing: Arc<dyn BackingStore> = backing.clone();
    let weak: Weak<dyn BackingStore> = Arc::downgrade(&dyn_backing);
    let cache = SlotCache::new(&config, weak);
    cache
        .init(config.cache_num, &config)
        .expect("fresh cache core must initialize");
    (backing, cache)
}

fn cached_members(cache: &SlotCache, key: &[u8]) -> Vec<ScoreMember> {
    let len = cache.cache_zcard(key).unwrap_or(0);
    if len == 0 {
        return Vec::new();
    }
    // Read straight from the shard: whole-window dump regardless of coverage.
    let mut window = Vec::new();
    for rank in 0..len {
        let rank = i64::try_from(rank).expect("window fits i64");
        if let Ok(pair) = cache.inner().with_shard(key, |store| {
            store
                .zrange(key, rank, rank)
                .map(|mut picked| picked.remove(0))
        }) {
            window.push(pair);
        }
    }
    window
}

fn wait_for<F: FnMut() -> bool>(mut ready: F) {
    for _ in 0..200 {
        if ready() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("background reload did not settle in time");
}

// S1: range hit and miss against a FromBegin prefix window.
#[rstest]
fn range_hit_within_prefix_window() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    let all = pairs(&[
        (1.0, "a"),
        (2.0, "b"),
        (3.0, "c"),
        (4.0, "d"),
        (5.0, "e"),
        (6.0, "f"),
        (7.0, "g"),
    ]);
    backing.with_store(|store| store.zadd(b"z", &all)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &all[..5], TTL_NONE)
        .expect("populate window");

    let hit = cache.zrange(b"z", 0, 2).expect("prefix range must hit");
    assert_that!(hit, eq(&pairs(&[(1.0, "a"), (2.0, "b"), (3.0, "c")])));

    assert_that!(
        cache.zrange(b"z", 3, 6),
        eq(&Err(CacheError::KeyNotInCache))
    );
}

// S2: a score query past the window misses, and keeps missing afterwards.
#[rstest]
fn score_range_miss_never_turns_into_a_false_hit() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    let all = pairs(&[
        (1.0, "a"),
        (2.0, "b"),
        (3.0, "c"),
        (4.0, "d"),
        (5.0, "e"),
        (6.0, "f"),
        (7.0, "g"),
    ]);
    backing.with_store(|store| store.zadd(b"z", &all)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &all[..5], TTL_NONE)
        .expect("populate window");

    let first = cache.zrangebyscore(
        b"z",
        ScoreBound::Incl(6.0),
        ScoreBound::Incl(7.0),
        0,
        -1,
    );
    assert_that!(first, eq(&Err(CacheError::KeyNotInCache)));

    // However the daemon reacts, the answer may never become a wrong value.
    wait_for(|| cache.info().waiting_load_keys_num == 0);
    let second = cache.zrangebyscore(
        b"z",
        ScoreBound::Incl(6.0),
        ScoreBound::Incl(7.0),
        0,
        -1,
    );
    assert_that!(second, eq(&Err(CacheError::KeyNotInCache)));
}

// S3: bounded insertion keeps the three lowest members and never admits the
// member beyond the boundary.
#[rstest]
fn bounded_insertion_trims_to_the_window() {
    // items_per_key inflates 3 -> 3 (3 * 12 / 10), so the budget stays 3.
    let (backing, cache) = rig(3, CachePosition::FromBegin);
    let seed = pairs(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
    backing.with_store(|store| store.zadd(b"z", &seed)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &seed, TTL_NONE)
        .expect("populate window");

    cache
        .zadd_if_exists(b"z", &pairs(&[(0.0, "x"), (4.0, "y")]))
        .expect("bounded insertion must succeed");

    assert_that!(
        cached_members(&cache, b"z"),
        eq(&pairs(&[(0.0, "x"), (1.0, "a"), (2.0, "b")]))
    );
}

// S4: a score update that pushes a member past the boundary evicts it.
#[rstest]
fn score_update_evicts_member_leaving_the_window() {
    let (backing, cache) = rig(3, CachePosition::FromBegin);
    let seed = pairs(&[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
    backing.with_store(|store| store.zadd(b"z", &seed)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &seed, TTL_NONE)
        .expect("populate window");
    // The authoritative increment has already happened.
    backing
        .with_store(|store| store.zincrby(b"z", b"b", 5.0))
        .expect("authoritative increment");

    cache
        .zincrby_if_exists(b"z", b"b", 5.0, 7.0)
        .expect("window maintenance must succeed");

    assert_that!(
        cached_members(&cache, b"z"),
        eq(&pairs(&[(1.0, "a"), (3.0, "c")]))
    );
}

// S5: lex queries require whole-set equality.
#[rstest]
fn lex_query_needs_the_entire_zset_cached() {
    let (backing, cache) = rig(64, CachePosition::FromBegin);
    let all: Vec<ScoreMember> = (0..20)
        .map(|index| ScoreMember::new(0.0, format!("m{index:02}")))
        .collect();
    backing.with_store(|store| store.zadd(b"z", &all)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &all[..10], TTL_NONE)
        .expect("populate partial window");

    assert_that!(
        cache.zrangebylex(b"z", &LexBound::NegInf, &LexBound::PosInf),
        eq(&Err(CacheError::KeyNotInCache))
    );

    cache.del(b"z").expect("flush partial window");
    cache
        .write_zset_to_cache(b"z", &all, TTL_NONE)
        .expect("populate whole set");
    let members = cache
        .zrangebylex(b"z", &LexBound::NegInf, &LexBound::PosInf)
        .expect("whole-set cache must answer");
    assert_that!(members.len(), eq(20));
}

// S6: the xx guard never creates a key.
#[rstest]
fn setxx_on_missing_key_is_a_guard_noop() {
    let (_backing, cache) = rig(16, CachePosition::FromBegin);
    assert_that!(
        cache.setxx(b"k", b"v".to_vec(), 100),
        eq(&Err(CacheError::KeyNotExist))
    );
    assert_that!(cache.exists(b"k"), eq(false));
}

#[rstest]
fn nx_guard_never_modifies_an_existing_key() {
    let (_backing, cache) = rig(16, CachePosition::FromBegin);
    cache.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    assert_that!(
        cache.setnx(b"k", b"other".to_vec(), 0),
        eq(&Err(CacheError::KeyExists))
    );
    assert_that!(cache.get(b"k"), eq(&Ok(b"v".to_vec())));
}

#[rstest]
fn from_end_window_serves_the_suffix() {
    let (backing, cache) = rig(5, CachePosition::FromEnd);
    let all = pairs(&[
        (1.0, "a"),
        (2.0, "b"),
        (3.0, "c"),
        (4.0, "d"),
        (5.0, "e"),
        (6.0, "f"),
        (7.0, "g"),
    ]);
    backing.with_store(|store| store.zadd(b"z", &all)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &all[2..], TTL_NONE)
        .expect("populate suffix window");

    let hit = cache.zrange(b"z", 4, 6).expect("suffix range must hit");
    assert_that!(hit, eq(&pairs(&[(5.0, "e"), (6.0, "f"), (7.0, "g")])));
    assert_that!(cache.zrange(b"z", 0, 3), eq(&Err(CacheError::KeyNotInCache)));

    // Rank queries translate into authoritative coordinates.
    assert_that!(cache.zrank(b"z", b"e"), eq(&Ok(4)));
    assert_that!(cache.zrevrank(b"z", b"g"), eq(&Ok(0)));
}

#[rstest]
fn zrevrange_hits_inside_the_prefix_window() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    let all = pairs(&[
        (1.0, "a"),
        (2.0, "b"),
        (3.0, "c"),
        (4.0, "d"),
        (5.0, "e"),
        (6.0, "f"),
        (7.0, "g"),
    ]);
    backing.with_store(|store| store.zadd(b"z", &all)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &all[..5], TTL_NONE)
        .expect("populate window");

    // Reverse ranks 3..5 live inside the 5 lowest members.
    let hit = cache.zrevrange(b"z", 3, 5).expect("reverse range must hit");
    assert_that!(hit, eq(&pairs(&[(4.0, "d"), (3.0, "c"), (2.0, "b")])));
    assert_that!(cache.zrevrange(b"z", 0, 2), eq(&Err(CacheError::KeyNotInCache)));
}

#[rstest]
fn starved_window_is_deleted_and_reloaded() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    let all: Vec<ScoreMember> = (0..12)
        .map(|index| ScoreMember::new(f64::from(index), format!("m{index:02}")))
        .collect();
    backing.with_store(|store| store.zadd(b"z", &all)).expect("seed backing");
    // items_per_key inflates 5 -> 6; start from a full window.
    cache
        .write_zset_to_cache(b"z", &all[..6], TTL_NONE)
        .expect("populate window");

    // Shrink the cached window below half its budget: the repair trigger
    // deletes the key and queues an asynchronous rebuild.
    let doomed: Vec<Vec<u8>> = all[..4]
        .iter()
        .map(|pair| pair.member.clone())
        .collect();
    backing
        .with_store(|store| store.zrem(b"z", &doomed))
        .expect("authoritative removal");
    let _ = cache.zrem(b"z", &doomed).expect("write-through removal");

    wait_for(|| {
        cache.info().waiting_load_keys_num == 0 && cache.cache_zcard(b"z").unwrap_or(0) > 0
    });

    // The rebuilt window is the lowest remaining members, bounded by budget.
    let rebuilt = cached_members(&cache, b"z");
    assert_that!(rebuilt, eq(&all[4..10].to_vec()));
    assert_that!(cache.info().async_load_keys_num > 0, eq(true));
}

#[rstest]
fn write_kv_to_cache_maps_the_ttl_sentinel() {
    let (_backing, cache) = rig(16, CachePosition::FromBegin);
    cache
        .write_kv_to_cache(b"k", b"v".to_vec(), TTL_NONE)
        .expect("sentinel stores without expiry");
    assert_that!(cache.ttl(b"k"), eq(&Ok(-1)));

    // Any other non-positive TTL deletes instead of creating.
    cache
        .write_kv_to_cache(b"k", b"v".to_vec(), -5)
        .expect("non-positive ttl deletes");
    assert_that!(cache.exists(b"k"), eq(false));

    cache
        .write_kv_to_cache(b"k", b"v".to_vec(), 100)
        .expect("positive ttl arms expiry");
    let remaining = cache.ttl(b"k").expect("ttl must resolve");
    assert_that!(remaining > 0, eq(true));
}

#[rstest]
fn bounded_size_invariant_survives_mutations() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    let seed = pairs(&[(10.0, "a"), (20.0, "b"), (30.0, "c")]);
    backing.with_store(|store| store.zadd(b"z", &seed)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &seed, TTL_NONE)
        .expect("populate window");

    let flood: Vec<ScoreMember> = (0..40)
        .map(|index| ScoreMember::new(f64::from(index), format!("f{index:02}")))
        .collect();
    cache.zadd_if_exists(b"z", &flood).expect("bounded insertion");

    // cache_items_per_key = 5 inflates to 6.
    assert_that!(cache.cache_zcard(b"z").unwrap_or(0) <= 6, eq(true));
}

#[rstest]
fn destroy_stops_the_daemon_and_reports_misses() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    let seed = pairs(&[(1.0, "a")]);
    backing.with_store(|store| store.zadd(b"z", &seed)).expect("seed backing");
    cache.set(b"k", b"v".to_vec(), 0).expect("set must succeed");

    cache.destroy();
    assert_that!(cache.status(), eq(CacheStatus::None));
    assert_that!(cache.get(b"k"), eq(&Err(CacheError::KeyNotInCache)));

    // The daemon drained its queue and stopped: new reloads are refused and
    // nothing is resurrected.
    assert_that!(
        cache.push_key_to_async_load_queue(KeyType::ZSet, b"z"),
        eq(false)
    );
    assert_that!(cache.info().waiting_load_keys_num, eq(0));
    assert_that!(cache.exists(b"z"), eq(false));
}

#[rstest]
fn reset_rebuilds_the_shard_array_with_a_fresh_daemon() {
    let (backing, cache) = rig(5, CachePosition::FromBegin);
    cache.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    let config = CacheConfig {
        cache_num: ShardCount::new(8).expect("literal shard count must be non-zero"),
        ..CacheConfig::default()
    };
    cache
        .reset(config.cache_num, &config)
        .expect("reset must rebuild");
    assert_that!(cache.status(), eq(CacheStatus::Ok));
    assert_that!(cache.db_size(), eq(0));
    assert_that!(cache.info().cache_num, eq(8));

    // A fresh daemon serves the rebuilt shards.
    backing
        .with_store(|store| store.set(b"k", b"v".to_vec(), 0))
        .expect("seed backing");
    assert_that!(
        cache.push_key_to_async_load_queue(KeyType::Kv, b"k"),
        eq(true)
    );
    wait_for(|| cache.exists(b"k"));
}

#[rstest]
fn list_xx_pushes_guard_on_key_existence() {
    let (_backing, cache) = rig(16, CachePosition::FromBegin);
    assert_that!(
        cache.lpushx(b"l", &[b"a".to_vec()]),
        eq(&Err(CacheError::KeyNotExist))
    );
    assert_that!(
        cache.rpushx(b"l", &[b"a".to_vec()]),
        eq(&Err(CacheError::KeyNotExist))
    );
    assert_that!(cache.exists(b"l"), eq(false));

    cache
        .rpushnx_without_ttl(b"l", &[b"a".to_vec()])
        .expect("create the list");
    assert_that!(cache.lpushx(b"l", &[b"x".to_vec()]), eq(&Ok(2)));
    assert_that!(cache.rpushx(b"l", &[b"y".to_vec()]), eq(&Ok(3)));
    assert_that!(
        cache.lrange(b"l", 0, -1),
        eq(&Ok(vec![b"x".to_vec(), b"a".to_vec(), b"y".to_vec()]))
    );
}

#[rstest]
fn double_init_is_a_corruption() {
    let (_backing, cache) = rig(5, CachePosition::FromBegin);
    let config = CacheConfig::default();
    let outcome = cache.init(config.cache_num, &config);
    assert_that!(
        matches!(outcome, Err(CacheError::Corruption(_))),
        eq(true)
    );
    assert_that!(cache.status(), eq(CacheStatus::None));
}

#[rstest]
fn manager_routes_cron_over_registered_cores() {
    let manager = CacheManager::new();
    let (_backing, cache) = rig(5, CachePosition::FromBegin);
    let cache = Arc::new(cache);
    manager.register("db0", 3, Arc::clone(&cache));

    assert_that!(manager.get("db0", 3).is_some(), eq(true));
    assert_that!(manager.get("db0", 4).is_none(), eq(true));

    cache.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    manager.process_cron_task();
    let ratio = manager.hit_ratio();
    assert_that!((0.0..=1.0).contains(&ratio), eq(true));

    manager.unregister("db0", 3);
    assert_that!(manager.get("db0", 3).is_none(), eq(true));
}

#[rstest]
#[case(CachePosition::FromBegin)]
#[case(CachePosition::FromEnd)]
fn cached_window_is_contiguous_after_bounded_insertion(#[case] position: CachePosition) {
    let (backing, cache) = rig(4, position);
    let seed = pairs(&[(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")]);
    backing.with_store(|store| store.zadd(b"z", &seed)).expect("seed backing");
    cache
        .write_zset_to_cache(b"z", &seed, TTL_NONE)
        .expect("populate window");

    cache
        .zadd_if_exists(b"z", &pairs(&[(0.5, "low"), (9.0, "high"), (2.5, "mid")]))
        .expect("bounded insertion");

    let window = cached_members(&cache, b"z");
    let authoritative = {
        backing
            .with_store(|store| {
                let _ = store.zadd(b"z", &pairs(&[(0.5, "low"), (9.0, "high"), (2.5, "mid")]));
                store.zrange(b"z", 0, -1)
            })
            .expect("authoritative view")
    };
    // The cached members must be a contiguous run of the authoritative order.
    let members: Vec<&[u8]> = window.iter().map(|pair| pair.member.as_slice()).collect();
    let full: Vec<&[u8]> = authoritative.iter().map(|pair| pair.member.as_slice()).collect();
    let position_in_full = full
        .windows(members.len())
        .position(|run| run == members.as_slice());
    assert_that!(position_in_full.is_some(), eq(true));
    match position {
        CachePosition::FromBegin => assert_that!(position_in_full, eq(Some(0))),
        CachePosition::FromEnd => {
            assert_that!(position_in_full, eq(Some(full.len() - members.len())));
        }
    }
}
