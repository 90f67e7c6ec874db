//! List commands.

use std::collections::VecDeque;

use slotcache_common::error::{CacheError, CacheResult};

use crate::entry::Value;
use crate::types::BeforeOrAfter;
use crate::{ShardStore, normalize_index_range};

impl ShardStore {
    fn list_value(&mut self, key: &[u8]) -> CacheResult<&VecDeque<Vec<u8>>> {
        match &self.read_entry(key)?.value {
            Value::List(items) => Ok(items),
            _ => Err(CacheError::WrongType),
        }
    }

    fn with_list_mut<R>(
        &mut self,
        key: &[u8],
        create: bool,
        op: impl FnOnce(&mut VecDeque<Vec<u8>>) -> CacheResult<R>,
    ) -> CacheResult<R> {
        if create {
            self.ensure_entry(key, || Value::List(VecDeque::new()));
        }
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::List(items) => op(items),
            _ => Err(CacheError::WrongType),
        })
    }

    /// Pushes values to the head, leftmost argument first. Returns the new length.
    pub fn lpush(&mut self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.with_list_mut(key, true, |items| {
            for value in values {
                items.push_front(value.clone());
            }
            Ok(items.len())
        })
    }

    /// Head push that refuses to create the key.
    pub fn lpushx(&mut self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.with_list_mut(key, false, |items| {
            for value in values {
                items.push_front(value.clone());
            }
            Ok(items.len())
        })
    }

    /// Pushes values to the tail. Returns the new length.
    pub fn rpush(&mut self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.with_list_mut(key, true, |items| {
            for value in values {
                items.push_back(value.clone());
            }
            Ok(items.len())
        })
    }

    /// Tail push that refuses to create the key.
    pub fn rpushx(&mut self, key: &[u8], values: &[Vec<u8>]) -> CacheResult<usize> {
        self.with_list_mut(key, false, |items| {
            for value in values {
                items.push_back(value.clone());
            }
            Ok(items.len())
        })
    }

    /// Pops the head element.
    pub fn lpop(&mut self, key: &[u8]) -> CacheResult<Vec<u8>> {
        self.with_list_mut(key, false, |items| {
            items.pop_front().ok_or(CacheError::KeyNotInCache)
        })
    }

    /// Pops the tail element.
    pub fn rpop(&mut self, key: &[u8]) -> CacheResult<Vec<u8>> {
        self.with_list_mut(key, false, |items| {
            items.pop_back().ok_or(CacheError::KeyNotInCache)
        })
    }

    /// Element at a possibly negative index; `None` when out of range.
    pub fn lindex(&mut self, key: &[u8], index: i64) -> CacheResult<Option<Vec<u8>>> {
        let items = self.list_value(key)?;
        let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
        let index = if index < 0 { len + index } else { index };
        if index < 0 || index >= len {
            return Ok(None);
        }
        Ok(items.get(usize::try_from(index).unwrap_or(usize::MAX)).cloned())
    }

    /// Inserts relative to the first occurrence of `pivot`. Returns the new
    /// length, or `-1` when the pivot is absent.
    pub fn linsert(
        &mut self,
        key: &[u8],
        side: BeforeOrAfter,
        pivot: &[u8],
        value: Vec<u8>,
    ) -> CacheResult<i64> {
        self.with_list_mut(key, false, |items| {
            let Some(position) = items.iter().position(|item| item.as_slice() == pivot) else {
                return Ok(-1);
            };
            let insert_at = match side {
                BeforeOrAfter::Before => position,
                BeforeOrAfter::After => position + 1,
            };
            items.insert(insert_at, value);
            Ok(i64::try_from(items.len()).unwrap_or(i64::MAX))
        })
    }

    /// Number of elements.
    pub fn llen(&mut self, key: &[u8]) -> CacheResult<usize> {
        Ok(self.list_value(key)?.len())
    }

    /// Elements inside a normalized index range; empty for an invalid range.
    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> CacheResult<Vec<Vec<u8>>> {
        let items = self.list_value(key)?;
        match normalize_index_range(start, stop, items.len()) {
            Some((start_index, stop_index)) => Ok(items
                .iter()
                .skip(start_index)
                .take(stop_index - start_index + 1)
                .cloned()
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Removes occurrences of `value`: `count > 0` from the head, `< 0` from
    /// the tail, `0` everywhere. Returns how many were removed.
    pub fn lrem(&mut self, key: &[u8], count: i64, value: &[u8]) -> CacheResult<usize> {
        self.with_list_mut(key, false, |items| {
            let budget = if count == 0 {
                usize::MAX
            } else {
                usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX)
            };
            let mut removed = 0_usize;
            if count >= 0 {
                let mut index = 0;
                while index < items.len() && removed < budget {
                    if items[index].as_slice() == value {
                        let _ = items.remove(index);
                        removed += 1;
                    } else {
                        index += 1;
                    }
                }
            } else {
                let mut index = items.len();
                while index > 0 && removed < budget {
                    index -= 1;
                    if items[index].as_slice() == value {
                        let _ = items.remove(index);
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
    }

    /// Overwrites the element at `index`; out-of-range indices are an error.
    pub fn lset(&mut self, key: &[u8], index: i64, value: Vec<u8>) -> CacheResult<()> {
        self.with_list_mut(key, false, |items| {
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let index = if index < 0 { len + index } else { index };
            if index < 0 || index >= len {
                return Err(CacheError::InvalidRange);
            }
            items[usize::try_from(index).unwrap_or(usize::MAX)] = value;
            Ok(())
        })
    }

    /// Keeps only the normalized index range; an invalid range clears the key.
    pub fn ltrim(&mut self, key: &[u8], start: i64, stop: i64) -> CacheResult<()> {
        self.with_list_mut(key, false, |items| {
            match normalize_index_range(start, stop, items.len()) {
                Some((start_index, stop_index)) => {
                    let _ = items.drain(stop_index + 1..);
                    let _ = items.drain(..start_index);
                }
                None => items.clear(),
            }
            Ok(())
        })
    }
}
