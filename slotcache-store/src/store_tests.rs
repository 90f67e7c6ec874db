use googletest::prelude::*;
use rstest::rstest;

use slotcache_common::error::CacheError;

use crate::ShardStore;
use crate::types::{BeforeOrAfter, FieldValue, LexBound, ScoreBound, ScoreMember};

fn store_with_zset(key: &[u8], pairs: &[(f64, &str)]) -> ShardStore {
    let mut store = ShardStore::new();
    let pairs: Vec<ScoreMember> = pairs
        .iter()
        .map(|(score, member)| ScoreMember::new(*score, *member))
        .collect();
    store.zadd(key, &pairs).expect("zadd into empty shard must succeed");
    store
}

#[rstest]
fn get_of_missing_key_is_a_cache_miss() {
    let mut store = ShardStore::new();
    assert_that!(store.get(b"absent"), eq(&Err(CacheError::KeyNotInCache)));
}

#[rstest]
fn set_then_get_roundtrips() {
    let mut store = ShardStore::new();
    store
        .set(b"k", b"v".to_vec(), 0)
        .expect("set must succeed");
    assert_that!(store.get(b"k"), eq(&Ok(b"v".to_vec())));
}

#[rstest]
fn setnx_refuses_existing_key() {
    let mut store = ShardStore::new();
    store.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    assert_that!(
        store.setnx(b"k", b"other".to_vec(), 0),
        eq(&Err(CacheError::KeyExists))
    );
    assert_that!(store.get(b"k"), eq(&Ok(b"v".to_vec())));
}

#[rstest]
fn setxx_refuses_missing_key() {
    let mut store = ShardStore::new();
    assert_that!(
        store.setxx(b"k", b"v".to_vec(), 100),
        eq(&Err(CacheError::KeyNotExist))
    );
    assert_that!(store.exists(b"k"), eq(false));
}

#[rstest]
fn incr_by_rejects_non_numeric_values() {
    let mut store = ShardStore::new();
    store.set(b"k", b"abc".to_vec(), 0).expect("set must succeed");
    assert_that!(store.incr_by(b"k", 1), eq(&Err(CacheError::NotSupported)));
}

#[rstest]
#[case(b"5".to_vec(), 3, 8)]
#[case(b"-2".to_vec(), 2, 0)]
fn incr_by_updates_stored_integer(
    #[case] initial: Vec<u8>,
    #[case] delta: i64,
    #[case] expected: i64,
) {
    let mut store = ShardStore::new();
    store.set(b"k", initial, 0).expect("set must succeed");
    assert_that!(store.incr_by(b"k", delta), eq(&Ok(expected)));
    assert_that!(store.get(b"k"), eq(&Ok(expected.to_string().into_bytes())));
}

#[rstest]
fn append_creates_and_extends() {
    let mut store = ShardStore::new();
    assert_that!(store.append(b"k", b"abc"), eq(&Ok(3)));
    assert_that!(store.append(b"k", b"def"), eq(&Ok(6)));
    assert_that!(store.get(b"k"), eq(&Ok(b"abcdef".to_vec())));
}

#[rstest]
fn get_range_handles_negative_indices() {
    let mut store = ShardStore::new();
    store
        .set(b"k", b"hello world".to_vec(), 0)
        .expect("set must succeed");
    assert_that!(store.get_range(b"k", 0, 4), eq(&Ok(b"hello".to_vec())));
    assert_that!(store.get_range(b"k", -5, -1), eq(&Ok(b"world".to_vec())));
    assert_that!(store.get_range(b"k", 8, 2), eq(&Ok(Vec::new())));
}

#[rstest]
fn set_range_zero_fills_gaps() {
    let mut store = ShardStore::new();
    assert_that!(store.set_range(b"k", 3, b"xy"), eq(&Ok(5)));
    assert_that!(store.get(b"k"), eq(&Ok(vec![0, 0, 0, b'x', b'y'])));
}

#[rstest]
fn set_bit_reports_previous_state() {
    let mut store = ShardStore::new();
    assert_that!(store.set_bit(b"k", 7, true), eq(&Ok(false)));
    assert_that!(store.set_bit(b"k", 7, false), eq(&Ok(true)));
    assert_that!(store.get_bit(b"k", 7), eq(&Ok(false)));
    assert_that!(store.get_bit(b"k", 1000), eq(&Ok(false)));
}

#[rstest]
fn bit_count_and_bit_pos_walk_msb_first() {
    let mut store = ShardStore::new();
    store.set(b"k", vec![0b0000_0000, 0b0001_0000], 0).expect("set");
    assert_that!(store.bit_count(b"k", None), eq(&Ok(1)));
    assert_that!(store.bit_pos(b"k", true, None, None), eq(&Ok(11)));
    assert_that!(store.bit_pos(b"k", false, None, None), eq(&Ok(0)));
}

#[rstest]
fn hash_commands_cover_field_lifecycle() {
    let mut store = ShardStore::new();
    assert_that!(store.hset(b"h", b"f1", b"v1".to_vec()), eq(&Ok(true)));
    assert_that!(store.hset(b"h", b"f1", b"v2".to_vec()), eq(&Ok(false)));
    assert_that!(store.hsetnx(b"h", b"f1", b"v3".to_vec()), eq(&Ok(false)));
    assert_that!(store.hget(b"h", b"f1"), eq(&Ok(Some(b"v2".to_vec()))));
    assert_that!(store.hget(b"h", b"nope"), eq(&Ok(None)));
    assert_that!(store.hexists(b"h", b"f1"), eq(&Ok(true)));
    assert_that!(store.hlen(b"h"), eq(&Ok(1)));
    assert_that!(store.hstrlen(b"h", b"f1"), eq(&Ok(2)));
    assert_that!(store.hdel(b"h", &[b"f1".to_vec()]), eq(&Ok(1)));
    // Removing the last field removes the key.
    assert_that!(store.exists(b"h"), eq(false));
}

#[rstest]
fn hmset_and_hmget_preserve_request_order() {
    let mut store = ShardStore::new();
    store
        .hmset(
            b"h",
            &[FieldValue::new("a", "1"), FieldValue::new("b", "2")],
        )
        .expect("hmset must succeed");
    let values = store
        .hmget(b"h", &[b"b".to_vec(), b"missing".to_vec(), b"a".to_vec()])
        .expect("hmget must succeed");
    assert_that!(
        values,
        eq(&vec![Some(b"2".to_vec()), None, Some(b"1".to_vec())])
    );
}

#[rstest]
fn hincr_by_starts_absent_fields_at_zero() {
    let mut store = ShardStore::new();
    assert_that!(store.hincr_by(b"h", b"f", 5), eq(&Ok(5)));
    assert_that!(store.hincr_by(b"h", b"f", -2), eq(&Ok(3)));
}

#[rstest]
fn list_push_pop_and_order() {
    let mut store = ShardStore::new();
    assert_that!(
        store.rpush(b"l", &[b"a".to_vec(), b"b".to_vec()]),
        eq(&Ok(2))
    );
    assert_that!(store.lpush(b"l", &[b"x".to_vec(), b"y".to_vec()]), eq(&Ok(4)));
    // LPUSH x y leaves y at the head.
    assert_that!(
        store.lrange(b"l", 0, -1),
        eq(&Ok(vec![
            b"y".to_vec(),
            b"x".to_vec(),
            b"a".to_vec(),
            b"b".to_vec()
        ]))
    );
    assert_that!(store.lpop(b"l"), eq(&Ok(b"y".to_vec())));
    assert_that!(store.rpop(b"l"), eq(&Ok(b"b".to_vec())));
    assert_that!(store.llen(b"l"), eq(&Ok(2)));
}

#[rstest]
fn lpushx_refuses_to_create() {
    let mut store = ShardStore::new();
    assert_that!(
        store.lpushx(b"l", &[b"a".to_vec()]),
        eq(&Err(CacheError::KeyNotInCache))
    );
    assert_that!(store.exists(b"l"), eq(false));
}

#[rstest]
fn linsert_before_and_after_pivot() {
    let mut store = ShardStore::new();
    let _ = store.rpush(b"l", &[b"a".to_vec(), b"c".to_vec()]);
    assert_that!(
        store.linsert(b"l", BeforeOrAfter::Before, b"c", b"b".to_vec()),
        eq(&Ok(3))
    );
    assert_that!(
        store.linsert(b"l", BeforeOrAfter::After, b"zzz", b"x".to_vec()),
        eq(&Ok(-1))
    );
    assert_that!(
        store.lrange(b"l", 0, -1),
        eq(&Ok(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]))
    );
}

#[rstest]
#[case(2, vec![b"x".to_vec(), b"a".to_vec(), b"x".to_vec()], 2)]
#[case(-1, vec![b"x".to_vec(), b"a".to_vec(), b"x".to_vec(), b"x".to_vec()], 1)]
#[case(0, vec![b"x".to_vec(), b"x".to_vec(), b"x".to_vec()], 3)]
fn lrem_honors_count_direction(
    #[case] count: i64,
    #[case] initial: Vec<Vec<u8>>,
    #[case] expected_removed: usize,
) {
    let mut store = ShardStore::new();
    let _ = store.rpush(b"l", &initial);
    assert_that!(store.lrem(b"l", count, b"x"), eq(&Ok(expected_removed)));
}

#[rstest]
fn ltrim_keeps_only_the_window() {
    let mut store = ShardStore::new();
    let _ = store.rpush(
        b"l",
        &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()],
    );
    store.ltrim(b"l", 1, 2).expect("ltrim must succeed");
    assert_that!(
        store.lrange(b"l", 0, -1),
        eq(&Ok(vec![b"b".to_vec(), b"c".to_vec()]))
    );
    store.ltrim(b"l", 5, 9).expect("ltrim must succeed");
    assert_that!(store.exists(b"l"), eq(false));
}

#[rstest]
fn set_membership_and_cardinality() {
    let mut store = ShardStore::new();
    assert_that!(
        store.sadd(b"s", &[b"a".to_vec(), b"b".to_vec(), b"a".to_vec()]),
        eq(&Ok(2))
    );
    assert_that!(store.scard(b"s"), eq(&Ok(2)));
    assert_that!(store.sismember(b"s", b"a"), eq(&Ok(true)));
    assert_that!(store.srem(b"s", &[b"a".to_vec(), b"zzz".to_vec()]), eq(&Ok(1)));
    assert_that!(store.sismember(b"s", b"a"), eq(&Ok(false)));
}

#[rstest]
fn srandmember_positive_count_is_distinct() {
    let mut store = ShardStore::new();
    let _ = store.sadd(b"s", &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    let picked = store.srandmember(b"s", 10).expect("srandmember must succeed");
    assert_that!(picked.len(), eq(3));
    let negative = store.srandmember(b"s", -5).expect("srandmember must succeed");
    assert_that!(negative.len(), eq(5));
}

#[rstest]
fn zset_rank_and_score_queries() {
    let mut store = store_with_zset(b"z", &[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
    assert_that!(store.zcard(b"z"), eq(3));
    assert_that!(store.zrank(b"z", b"b"), eq(&Ok(1)));
    assert_that!(store.zrevrank(b"z", b"b"), eq(&Ok(1)));
    assert_that!(store.zscore(b"z", b"c"), eq(&Ok(3.0)));
    assert_that!(
        store.zscore(b"z", b"nope"),
        eq(&Err(CacheError::MemberNotInCache))
    );
    assert_that!(
        store.zcount(b"z", ScoreBound::Incl(2.0), ScoreBound::PosInf),
        eq(&Ok(2))
    );
}

#[rstest]
fn zrevrange_mirrors_zrange() {
    let mut store = store_with_zset(b"z", &[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
    let forward = store.zrange(b"z", 0, 1).expect("zrange must succeed");
    assert_that!(
        forward,
        eq(&vec![ScoreMember::new(1.0, "a"), ScoreMember::new(2.0, "b")])
    );
    let backward = store.zrevrange(b"z", 0, 1).expect("zrevrange must succeed");
    assert_that!(
        backward,
        eq(&vec![ScoreMember::new(3.0, "c"), ScoreMember::new(2.0, "b")])
    );
}

#[rstest]
fn zremrangebyrank_with_negative_start() {
    let mut store = store_with_zset(b"z", &[(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")]);
    // Trim the tail: ranks [-2, -1].
    assert_that!(store.zremrangebyrank(b"z", -2, -1), eq(&Ok(2)));
    assert_that!(store.zcard(b"z"), eq(2));
    assert_that!(store.zscore(b"z", b"d"), eq(&Err(CacheError::MemberNotInCache)));
}

#[rstest]
fn zremrangebyscore_open_bound_keeps_boundary() {
    let mut store = store_with_zset(b"z", &[(1.0, "a"), (2.0, "b"), (3.0, "c")]);
    assert_that!(
        store.zremrangebyscore(b"z", ScoreBound::Excl(2.0), ScoreBound::PosInf),
        eq(&Ok(1))
    );
    assert_that!(store.zscore(b"z", b"b"), eq(&Ok(2.0)));
}

#[rstest]
fn zset_removing_last_member_drops_the_key() {
    let mut store = store_with_zset(b"z", &[(1.0, "a")]);
    assert_that!(store.zrem(b"z", &[b"a".to_vec()]), eq(&Ok(1)));
    assert_that!(store.exists(b"z"), eq(false));
}

#[rstest]
fn lex_queries_follow_byte_order() {
    let mut store = store_with_zset(b"z", &[(0.0, "a"), (0.0, "b"), (0.0, "c")]);
    assert_that!(
        store.zrangebylex(b"z", &LexBound::NegInf, &LexBound::Incl(b"b".to_vec())),
        eq(&Ok(vec![b"a".to_vec(), b"b".to_vec()]))
    );
    assert_that!(
        store.zlexcount(b"z", &LexBound::Excl(b"a".to_vec()), &LexBound::PosInf),
        eq(&Ok(2))
    );
    assert_that!(
        store.zremrangebylex(b"z", &LexBound::NegInf, &LexBound::Excl(b"c".to_vec())),
        eq(&Ok(2))
    );
    assert_that!(store.zcard(b"z"), eq(1));
}

#[rstest]
fn expire_and_persist_drive_the_ttl() {
    let mut store = ShardStore::new();
    store.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    assert_that!(store.ttl(b"k"), eq(&Ok(-1)));
    store.expire(b"k", 100).expect("expire must succeed");
    let remaining = store.ttl(b"k").expect("ttl must succeed");
    assert_that!(remaining > 0 && remaining <= 100, eq(true));
    assert_that!(store.persist(b"k"), eq(&Ok(true)));
    assert_that!(store.ttl(b"k"), eq(&Ok(-1)));
}

#[rstest]
fn non_positive_expire_deletes_the_key() {
    let mut store = ShardStore::new();
    store.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    store.expire(b"k", 0).expect("expire must succeed");
    assert_that!(store.exists(b"k"), eq(false));
}

#[rstest]
fn expired_key_is_purged_on_access() {
    let mut store = ShardStore::new();
    store.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    store.expireat(b"k", 1).expect("expireat must succeed");
    assert_that!(store.exists(b"k"), eq(false));
    assert_that!(store.get(b"k"), eq(&Err(CacheError::KeyNotInCache)));
}

#[rstest]
fn active_expire_cycle_reaps_expired_keys() {
    let mut store = ShardStore::new();
    store.set(b"dead", b"v".to_vec(), 0).expect("set must succeed");
    store.set(b"live", b"v".to_vec(), 1000).expect("set must succeed");
    // Arm an already-passed deadline without going through the purging accessors.
    {
        let entry = store.entries.get_mut(b"dead".as_slice()).expect("entry exists");
        entry.expire_at_unix_secs = Some(1);
        let _ = store.expires.insert(b"dead".to_vec());
    }
    let reaped = store.active_expire_cycle();
    assert_that!(reaped, eq(1));
    assert_that!(store.entries.contains_key(b"dead".as_slice()), eq(false));
    assert_that!(store.exists(b"live"), eq(true));
}

#[rstest]
fn flush_empties_the_shard() {
    let mut store = ShardStore::new();
    store.set(b"a", b"1".to_vec(), 0).expect("set must succeed");
    let _ = store.sadd(b"s", &[b"m".to_vec()]);
    store.flush();
    assert_that!(store.db_size(), eq(0));
    assert_that!(store.random_key(), eq(&Err(CacheError::KeyNotInCache)));
}

#[rstest]
fn wrong_type_access_is_rejected() {
    let mut store = ShardStore::new();
    store.set(b"k", b"v".to_vec(), 0).expect("set must succeed");
    assert_that!(
        store.sadd(b"k", &[b"m".to_vec()]),
        eq(&Err(CacheError::WrongType))
    );
    assert_that!(store.llen(b"k"), eq(&Err(CacheError::WrongType)));
}

#[rstest]
fn type_name_reports_stored_kind() {
    let mut store = ShardStore::new();
    store.set(b"s", b"v".to_vec(), 0).expect("set must succeed");
    let _ = store.zadd(b"z", &[ScoreMember::new(1.0, "m")]);
    assert_that!(store.type_name(b"s"), eq(&Ok("string")));
    assert_that!(store.type_name(b"z"), eq(&Ok("zset")));
    assert_that!(store.type_name(b"nope"), eq(&Err(CacheError::KeyNotInCache)));
}
