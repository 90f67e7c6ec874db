//! Sharded in-memory cache layer fronting a Redis-compatible backing store.
//!
//! One [`SlotCache`] accelerates reads against a single slot of the backing
//! store by holding a bounded, partial image of its keyspace: whole strings,
//! hashes, lists and sets, plus a contiguous score-ordered window of each
//! sorted set. Reads the window cannot answer surface as
//! [`CacheError::KeyNotInCache`](slotcache_common::error::CacheError), telling
//! the caller to fall through to the backing store; an asynchronous reload
//! daemon rebuilds entries found stale or truncated.

pub mod backing;
pub mod cache;
pub mod coherence;
pub mod loader;
pub mod manager;

mod hashes;
mod lists;
mod sets;
mod strings;
mod zsets;

pub use backing::{BackingStore, KvPayload};
pub use cache::{CacheInfo, CacheStatus, SlotCache};
pub use coherence::{RangeCoverage, ScoreCoverage};
pub use loader::KeyType;
pub use manager::CacheManager;

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
