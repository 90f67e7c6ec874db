//! Stored value representation and per-entry bookkeeping.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::containers::{HotMap, HotSet};
use crate::zset::SortedSet;

/// Typed payload of one cached key.
#[derive(Debug, Clone)]
pub enum Value {
    /// Binary-safe string (also the carrier for bitmaps).
    Str(Vec<u8>),
    /// Field/value hash.
    Hash(HotMap<Vec<u8>, Vec<u8>>),
    /// Double-ended list.
    List(VecDeque<Vec<u8>>),
    /// Unordered member set.
    Set(HotSet<Vec<u8>>),
    /// Score-ordered member set.
    ZSet(SortedSet),
}

impl Value {
    /// Redis-compatible type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Hash(_) => "hash",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::ZSet(_) => "zset",
        }
    }

    /// True when a collection value has no members left and the key must go.
    #[must_use]
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Self::Str(_) => false,
            Self::Hash(map) => map.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Set(members) => members.is_empty(),
            Self::ZSet(zset) => zset.len() == 0,
        }
    }

    /// Approximate heap footprint in bytes, used for the process-wide gauge.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        const PER_ITEM_OVERHEAD: u64 = 16;
        match self {
            Self::Str(bytes) => bytes.len() as u64,
            Self::Hash(map) => map
                .iter()
                .map(|(field, value)| field.len() as u64 + value.len() as u64 + PER_ITEM_OVERHEAD)
                .sum(),
            Self::List(items) => items
                .iter()
                .map(|item| item.len() as u64 + PER_ITEM_OVERHEAD)
                .sum(),
            Self::Set(members) => members
                .iter()
                .map(|member| member.len() as u64 + PER_ITEM_OVERHEAD)
                .sum(),
            Self::ZSet(zset) => zset.size_bytes(),
        }
    }
}

/// One stored key: payload plus optional absolute expiry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Typed payload.
    pub value: Value,
    /// Absolute expiry deadline in unix seconds, `None` for no expiry.
    pub expire_at_unix_secs: Option<u64>,
}

impl Entry {
    /// Creates a live entry without expiry.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expire_at_unix_secs: None,
        }
    }

    /// True when the deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now_unix_secs: u64) -> bool {
        self.expire_at_unix_secs
            .is_some_and(|deadline| deadline <= now_unix_secs)
    }
}

/// Current wall-clock time as unix seconds.
#[must_use]
pub fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
