//! String commands, including the bitmap group carried on string values.

use std::str;

use slotcache_common::error::{CacheError, CacheResult};

use crate::entry::{Entry, Value, now_unix_seconds};
use crate::{ShardStore, normalize_index_range};

fn parse_stored_i64(payload: &[u8]) -> CacheResult<i64> {
    let Ok(text) = str::from_utf8(payload) else {
        return Err(CacheError::NotSupported);
    };
    text.parse::<i64>().map_err(|_| CacheError::NotSupported)
}

fn parse_stored_f64(payload: &[u8]) -> CacheResult<f64> {
    let Ok(text) = str::from_utf8(payload) else {
        return Err(CacheError::NotSupported);
    };
    text.parse::<f64>().map_err(|_| CacheError::NotSupported)
}

fn string_entry(value: Vec<u8>, ttl_secs: i64) -> Entry {
    let mut entry = Entry::new(Value::Str(value));
    if let Ok(delta) = u64::try_from(ttl_secs)
        && delta > 0
    {
        entry.expire_at_unix_secs = Some(now_unix_seconds().saturating_add(delta));
    }
    entry
}

impl ShardStore {
    fn string_value(&mut self, key: &[u8]) -> CacheResult<&Vec<u8>> {
        match &self.read_entry(key)?.value {
            Value::Str(bytes) => Ok(bytes),
            _ => Err(CacheError::WrongType),
        }
    }

    fn with_string_mut<R>(
        &mut self,
        key: &[u8],
        op: impl FnOnce(&mut Vec<u8>) -> CacheResult<R>,
    ) -> CacheResult<R> {
        self.ensure_entry(key, || Value::Str(Vec::new()));
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::Str(bytes) => op(bytes),
            _ => Err(CacheError::WrongType),
        })
    }

    /// Unconditional write; `ttl_secs > 0` arms an expiry, anything else stores
    /// without one.
    pub fn set(&mut self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        self.insert_entry(key.to_vec(), string_entry(value, ttl_secs));
        Ok(())
    }

    /// Write only when the key is absent.
    pub fn setnx(&mut self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        if self.peek_entry(key).is_some() {
            return Err(CacheError::KeyExists);
        }
        self.insert_entry(key.to_vec(), string_entry(value, ttl_secs));
        Ok(())
    }

    /// Write only when the key is present.
    pub fn setxx(&mut self, key: &[u8], value: Vec<u8>, ttl_secs: i64) -> CacheResult<()> {
        if self.peek_entry(key).is_none() {
            return Err(CacheError::KeyNotExist);
        }
        self.insert_entry(key.to_vec(), string_entry(value, ttl_secs));
        Ok(())
    }

    /// Whole-value read.
    pub fn get(&mut self, key: &[u8]) -> CacheResult<Vec<u8>> {
        self.string_value(key).cloned()
    }

    /// Integer add; the value must parse as a signed integer.
    pub fn incr_by(&mut self, key: &[u8], delta: i64) -> CacheResult<i64> {
        self.with_string_mut(key, |bytes| {
            let current = if bytes.is_empty() {
                0
            } else {
                parse_stored_i64(bytes)?
            };
            let next = current.checked_add(delta).ok_or(CacheError::NotSupported)?;
            *bytes = next.to_string().into_bytes();
            Ok(next)
        })
    }

    /// Float add; the value must parse as a double.
    pub fn incr_by_float(&mut self, key: &[u8], delta: f64) -> CacheResult<f64> {
        self.with_string_mut(key, |bytes| {
            let current = if bytes.is_empty() {
                0.0
            } else {
                parse_stored_f64(bytes)?
            };
            let next = current + delta;
            if !next.is_finite() {
                return Err(CacheError::NotSupported);
            }
            *bytes = format!("{next}").into_bytes();
            Ok(next)
        })
    }

    /// Appends to the value, creating it when absent. Returns the new length.
    pub fn append(&mut self, key: &[u8], suffix: &[u8]) -> CacheResult<usize> {
        self.with_string_mut(key, |bytes| {
            bytes.extend_from_slice(suffix);
            Ok(bytes.len())
        })
    }

    /// Byte slice of the value; empty for an out-of-bounds range.
    pub fn get_range(&mut self, key: &[u8], start: i64, end: i64) -> CacheResult<Vec<u8>> {
        let bytes = self.string_value(key)?;
        match normalize_index_range(start, end, bytes.len()) {
            Some((start_index, end_index)) => Ok(bytes[start_index..=end_index].to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Overwrites bytes at `offset`, zero-filling any gap. Returns the new length.
    pub fn set_range(&mut self, key: &[u8], offset: usize, payload: &[u8]) -> CacheResult<usize> {
        self.with_string_mut(key, |bytes| {
            if payload.is_empty() {
                return Ok(bytes.len());
            }
            let needed = offset.saturating_add(payload.len());
            if needed > bytes.len() {
                bytes.resize(needed, 0_u8);
            }
            bytes[offset..offset + payload.len()].copy_from_slice(payload);
            Ok(bytes.len())
        })
    }

    /// Value length in bytes.
    pub fn strlen(&mut self, key: &[u8]) -> CacheResult<usize> {
        Ok(self.string_value(key)?.len())
    }

    /// Sets one bit (MSB-first addressing) and returns its previous state.
    pub fn set_bit(&mut self, key: &[u8], offset: usize, bit: bool) -> CacheResult<bool> {
        self.with_string_mut(key, |bytes| {
            let byte_index = offset / 8;
            let mask = 0x80_u8 >> (offset % 8);
            if byte_index >= bytes.len() {
                bytes.resize(byte_index + 1, 0_u8);
            }
            let previous = bytes[byte_index] & mask != 0;
            if bit {
                bytes[byte_index] |= mask;
            } else {
                bytes[byte_index] &= !mask;
            }
            Ok(previous)
        })
    }

    /// Reads one bit; bits beyond the value read as zero.
    pub fn get_bit(&mut self, key: &[u8], offset: usize) -> CacheResult<bool> {
        let bytes = self.string_value(key)?;
        let byte_index = offset / 8;
        if byte_index >= bytes.len() {
            return Ok(false);
        }
        Ok(bytes[byte_index] & (0x80_u8 >> (offset % 8)) != 0)
    }

    /// Population count over the whole value or a byte range.
    pub fn bit_count(&mut self, key: &[u8], range: Option<(i64, i64)>) -> CacheResult<u64> {
        let bytes = self.string_value(key)?;
        let window = match range {
            None => bytes.as_slice(),
            Some((start, end)) => match normalize_index_range(start, end, bytes.len()) {
                Some((start_index, end_index)) => &bytes[start_index..=end_index],
                None => &[],
            },
        };
        Ok(window.iter().map(|byte| u64::from(byte.count_ones())).sum())
    }

    /// First position of `bit` inside an optional byte range, `-1` when absent.
    ///
    /// Matches Redis: searching for a zero bit without an explicit end returns
    /// the first position past the value when the value is all ones.
    pub fn bit_pos(
        &mut self,
        key: &[u8],
        bit: bool,
        start: Option<i64>,
        end: Option<i64>,
    ) -> CacheResult<i64> {
        let bytes = self.string_value(key)?;
        let len = bytes.len();
        let (start_index, end_index) = match (start, end) {
            (None, _) => {
                if len == 0 {
                    return Ok(-1);
                }
                (0, len - 1)
            }
            (Some(start), end) => {
                let end = end.unwrap_or_else(|| i64::try_from(len).unwrap_or(i64::MAX) - 1);
                match normalize_index_range(start, end, len) {
                    Some(range) => range,
                    None => return Ok(-1),
                }
            }
        };
        for byte_index in start_index..=end_index {
            let byte = bytes[byte_index];
            if (bit && byte == 0x00) || (!bit && byte == 0xFF) {
                continue;
            }
            for bit_index in 0..8 {
                let is_set = byte & (0x80_u8 >> bit_index) != 0;
                if is_set == bit {
                    return Ok((byte_index * 8 + bit_index) as i64);
                }
            }
        }
        if !bit && end.is_none() {
            return Ok((len * 8) as i64);
        }
        Ok(-1)
    }
}
