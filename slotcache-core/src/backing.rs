//! Read-only contract against the authoritative backing store.
//!
//! The cache consumes this trait for coherence reads (lengths) and for the
//! reload daemon's authoritative fetches. It never writes through it; the
//! command dispatcher applies authoritative writes before the cache sees them.

use slotcache_common::config::CachePosition;
use slotcache_common::error::CacheResult;

use slotcache_store::{FieldValue, ScoreMember};

/// Authoritative value of a string key plus its reported TTL
/// (`TTL_NONE` when the key never expires).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPayload {
    /// Stored bytes.
    pub value: Vec<u8>,
    /// Remaining TTL in seconds, or `TTL_NONE`.
    pub ttl_secs: i64,
}

/// Which end of an ordered collection a windowed read starts from.
pub type WindowSide = CachePosition;

/// Read surface of the backing store for one slot.
///
/// Every method returns `Ok(None)` when the key does not exist
/// authoritatively; errors are reserved for transport or storage failures.
pub trait BackingStore: Send + Sync {
    /// String value and TTL.
    fn kv_with_ttl(&self, key: &[u8]) -> CacheResult<Option<KvPayload>>;

    /// Every hash field with the key TTL.
    fn hash_with_ttl(&self, key: &[u8]) -> CacheResult<Option<(Vec<FieldValue>, i64)>>;

    /// Number of hash fields.
    fn hash_len(&self, key: &[u8]) -> CacheResult<usize>;

    /// Up to `limit` list elements taken from `side`, with the key TTL.
    fn list_range_with_ttl(
        &self,
        key: &[u8],
        side: WindowSide,
        limit: usize,
    ) -> CacheResult<Option<(Vec<Vec<u8>>, i64)>>;

    /// Number of list elements.
    fn list_len(&self, key: &[u8]) -> CacheResult<usize>;

    /// Every set member with the key TTL.
    fn set_with_ttl(&self, key: &[u8]) -> CacheResult<Option<(Vec<Vec<u8>>, i64)>>;

    /// Number of set members.
    fn set_len(&self, key: &[u8]) -> CacheResult<usize>;

    /// Up to `limit` zset pairs taken from `side` in score order, with the key
    /// TTL.
    fn zset_range_with_ttl(
        &self,
        key: &[u8],
        side: WindowSide,
        limit: usize,
    ) -> CacheResult<Option<(Vec<ScoreMember>, i64)>>;

    /// Authoritative zset cardinality (the `ZCard` equivalent).
    fn zset_len(&self, key: &[u8]) -> CacheResult<usize>;
}
