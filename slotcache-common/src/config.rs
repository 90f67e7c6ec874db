//! Runtime configuration shared by cache-core bootstrap code.

use crate::ids::ShardCount;

/// TTL sentinel meaning "no expiry". Any other non-positive TTL handed to a
/// populate-on-read write deletes the cache entry instead of creating one.
pub const TTL_NONE: i64 = -1;

/// Which end of a sorted collection the cache retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePosition {
    /// Keep the lowest-scoring members (score asc, member asc for ties).
    FromBegin,
    /// Keep the highest-scoring members.
    FromEnd,
}

/// Bootstrap configuration for one cache core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of independent shards inside one cache core.
    pub cache_num: ShardCount,
    /// Window policy for sorted collections.
    pub cache_start_pos: CachePosition,
    /// Requested maximum items retained per collection key. The core stores
    /// this inflated by 20 % to absorb churn; see [`extend_items_per_key`].
    pub cache_items_per_key: usize,
    /// Max memory budget in bytes, forwarded verbatim to the shard stores.
    pub maxmemory: u64,
    /// Eviction policy name, forwarded verbatim to the shard stores.
    pub maxmemory_policy: String,
    /// Eviction sampling width, forwarded verbatim to the shard stores.
    pub maxmemory_samples: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_num: ShardCount::new(16).expect("literal shard count must be non-zero"),
            cache_start_pos: CachePosition::FromBegin,
            cache_items_per_key: 512,
            maxmemory: 0,
            maxmemory_policy: "noeviction".to_owned(),
            maxmemory_samples: 5,
        }
    }
}

/// Inflates the requested per-key item bound by 20 % so small churn around the
/// window edge does not immediately re-trigger trimming and reloads.
#[must_use]
pub fn extend_items_per_key(requested: usize) -> usize {
    requested.saturating_mul(12) / 10
}

#[cfg(test)]
mod tests {
    use super::{CacheConfig, CachePosition, extend_items_per_key};
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(10, 12)]
    #[case(100, 120)]
    #[case(0, 0)]
    #[case(5, 6)]
    fn extend_inflates_by_twenty_percent(#[case] requested: usize, #[case] expected: usize) {
        assert_that!(extend_items_per_key(requested), eq(expected));
    }

    #[rstest]
    fn default_config_keeps_lowest_scores() {
        let config = CacheConfig::default();
        assert_that!(config.cache_start_pos, eq(CachePosition::FromBegin));
        assert_that!(config.cache_items_per_key > 0, eq(true));
    }
}
