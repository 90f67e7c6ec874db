//! Hot-path container aliases used by shard-local state tables.
//!
//! Container choices stay centralized here so future allocator/container
//! upgrades can be done in one place without touching command logic modules.

use hashbrown::{HashMap as HbMap, HashSet as HbSet};

/// Hot-path hash map used by shard-local key tables and hash values.
pub type HotMap<K, V> = HbMap<K, V>;

/// Hot-path hash set used by set values and the expires secondary index.
pub type HotSet<T> = HbSet<T>;
