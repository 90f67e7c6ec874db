//! Shared error model for cross-crate APIs.

use thiserror::Error;

/// Unified result type used by all public interfaces in `slotcache`.
pub type CacheResult<T> = Result<T, CacheError>;

/// Status outcomes of cache operations.
///
/// The miss-shaped variants are part of the cache contract, not failures: a caller receiving
/// [`CacheError::KeyNotInCache`] falls through to the backing store, and the `xx`/`nx` guard
/// variants tell the command dispatcher the cache deliberately did nothing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Read fell through; the caller must ask the backing store instead.
    #[error("key not in cache")]
    KeyNotInCache,

    /// Only-if-exists (`xx`) guard: the key is not cached, nothing was created.
    #[error("key not exist")]
    KeyNotExist,

    /// Only-if-absent (`nx`) guard: the key is already cached, nothing was modified.
    #[error("key exist")]
    KeyExists,

    /// The key is cached but the requested member is outside the cached window.
    #[error("member not in cache")]
    MemberNotInCache,

    /// Normalized index range is empty or reversed.
    #[error("error range")]
    InvalidRange,

    /// Score query arithmetic produced an empty or reversed interval.
    #[error("score range error")]
    InvalidScoreRange,

    /// A mutation that cannot change anything (for example a zero increment).
    #[error("nothing to be done")]
    NothingToDo,

    /// Stored value does not support the requested operation (for example a
    /// non-numeric string handed to the incr family).
    #[error("value is not valid for this operation")]
    NotSupported,

    /// The key holds a value of a different data type.
    #[error("wrong type of value for this key")]
    WrongType,

    /// Configuration is invalid for the requested operation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Fatal internal error; the cache core tears down partially built shards.
    #[error("corruption: {0}")]
    Corruption(String),
}

impl CacheError {
    /// Returns true when the error means "serve this from the backing store".
    #[must_use]
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::KeyNotInCache | Self::MemberNotInCache)
    }

    /// Returns true for the `xx`/`nx` guard outcomes the dispatcher treats as cache no-ops.
    #[must_use]
    pub fn is_guard(&self) -> bool {
        matches!(self, Self::KeyNotExist | Self::KeyExists)
    }
}
