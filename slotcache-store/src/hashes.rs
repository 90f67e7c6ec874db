//! Hash commands.

use std::str;

use slotcache_common::error::{CacheError, CacheResult};

use crate::ShardStore;
use crate::containers::HotMap;
use crate::entry::Value;
use crate::types::FieldValue;

impl ShardStore {
    fn hash_value(&mut self, key: &[u8]) -> CacheResult<&HotMap<Vec<u8>, Vec<u8>>> {
        match &self.read_entry(key)?.value {
            Value::Hash(map) => Ok(map),
            _ => Err(CacheError::WrongType),
        }
    }

    fn with_hash_mut<R>(
        &mut self,
        key: &[u8],
        op: impl FnOnce(&mut HotMap<Vec<u8>, Vec<u8>>) -> CacheResult<R>,
    ) -> CacheResult<R> {
        self.ensure_entry(key, || Value::Hash(HotMap::new()));
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::Hash(map) => op(map),
            _ => Err(CacheError::WrongType),
        })
    }

    /// Stores one field. Returns true when the field was new.
    pub fn hset(&mut self, key: &[u8], field: &[u8], value: Vec<u8>) -> CacheResult<bool> {
        self.with_hash_mut(key, |map| Ok(map.insert(field.to_vec(), value).is_none()))
    }

    /// Stores one field only when it is absent. Returns true when stored.
    pub fn hsetnx(&mut self, key: &[u8], field: &[u8], value: Vec<u8>) -> CacheResult<bool> {
        self.with_hash_mut(key, |map| {
            if map.contains_key(field) {
                return Ok(false);
            }
            let _ = map.insert(field.to_vec(), value);
            Ok(true)
        })
    }

    /// Stores a batch of fields, overwriting existing ones.
    pub fn hmset(&mut self, key: &[u8], pairs: &[FieldValue]) -> CacheResult<()> {
        self.with_hash_mut(key, |map| {
            for pair in pairs {
                let _ = map.insert(pair.field.clone(), pair.value.clone());
            }
            Ok(())
        })
    }

    /// Removes fields. Returns how many existed.
    pub fn hdel(&mut self, key: &[u8], fields: &[Vec<u8>]) -> CacheResult<usize> {
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::Hash(map) => Ok(fields
                .iter()
                .filter(|field| map.remove(field.as_slice()).is_some())
                .count()),
            _ => Err(CacheError::WrongType),
        })
    }

    /// One field; `None` when the field is absent from a cached hash.
    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.hash_value(key)?.get(field).cloned())
    }

    /// Batch field read preserving request order.
    pub fn hmget(&mut self, key: &[u8], fields: &[Vec<u8>]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        let map = self.hash_value(key)?;
        Ok(fields
            .iter()
            .map(|field| map.get(field.as_slice()).cloned())
            .collect())
    }

    /// Every field/value pair.
    pub fn hgetall(&mut self, key: &[u8]) -> CacheResult<Vec<FieldValue>> {
        Ok(self
            .hash_value(key)?
            .iter()
            .map(|(field, value)| FieldValue::new(field.clone(), value.clone()))
            .collect())
    }

    /// Every field name.
    pub fn hkeys(&mut self, key: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        Ok(self.hash_value(key)?.keys().cloned().collect())
    }

    /// Every field payload.
    pub fn hvals(&mut self, key: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        Ok(self.hash_value(key)?.values().cloned().collect())
    }

    /// True when the field is present.
    pub fn hexists(&mut self, key: &[u8], field: &[u8]) -> CacheResult<bool> {
        Ok(self.hash_value(key)?.contains_key(field))
    }

    /// Integer add on one field; the field must parse as a signed integer.
    pub fn hincr_by(&mut self, key: &[u8], field: &[u8], delta: i64) -> CacheResult<i64> {
        self.with_hash_mut(key, |map| {
            let current = match map.get(field) {
                None => 0,
                Some(bytes) => str::from_utf8(bytes)
                    .ok()
                    .and_then(|text| text.parse::<i64>().ok())
                    .ok_or(CacheError::NotSupported)?,
            };
            let next = current.checked_add(delta).ok_or(CacheError::NotSupported)?;
            let _ = map.insert(field.to_vec(), next.to_string().into_bytes());
            Ok(next)
        })
    }

    /// Float add on one field.
    pub fn hincr_by_float(&mut self, key: &[u8], field: &[u8], delta: f64) -> CacheResult<f64> {
        self.with_hash_mut(key, |map| {
            let current = match map.get(field) {
                None => 0.0,
                Some(bytes) => str::from_utf8(bytes)
                    .ok()
                    .and_then(|text| text.parse::<f64>().ok())
                    .ok_or(CacheError::NotSupported)?,
            };
            let next = current + delta;
            if !next.is_finite() {
                return Err(CacheError::NotSupported);
            }
            let _ = map.insert(field.to_vec(), format!("{next}").into_bytes());
            Ok(next)
        })
    }

    /// Number of fields.
    pub fn hlen(&mut self, key: &[u8]) -> CacheResult<usize> {
        Ok(self.hash_value(key)?.len())
    }

    /// Byte length of one field's payload, zero when the field is absent.
    pub fn hstrlen(&mut self, key: &[u8], field: &[u8]) -> CacheResult<usize> {
        Ok(self
            .hash_value(key)?
            .get(field)
            .map_or(0, Vec::len))
    }
}
