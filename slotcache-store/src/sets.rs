//! Set commands.

use rand::Rng;
use rand::seq::IteratorRandom;

use slotcache_common::error::{CacheError, CacheResult};

use crate::ShardStore;
use crate::containers::HotSet;
use crate::entry::Value;

impl ShardStore {
    fn set_value(&mut self, key: &[u8]) -> CacheResult<&HotSet<Vec<u8>>> {
        match &self.read_entry(key)?.value {
            Value::Set(members) => Ok(members),
            _ => Err(CacheError::WrongType),
        }
    }

    /// Adds members, creating the key when absent. Returns how many were new.
    pub fn sadd(&mut self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        self.ensure_entry(key, || Value::Set(HotSet::new()));
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::Set(existing) => Ok(members
                .iter()
                .filter(|member| existing.insert((*member).clone()))
                .count()),
            _ => Err(CacheError::WrongType),
        })
    }

    /// Removes members. Returns how many were present.
    pub fn srem(&mut self, key: &[u8], members: &[Vec<u8>]) -> CacheResult<usize> {
        self.mutate_entry(key, |entry| match &mut entry.value {
            Value::Set(existing) => Ok(members
                .iter()
                .filter(|member| existing.remove(member.as_slice()))
                .count()),
            _ => Err(CacheError::WrongType),
        })
    }

    /// Number of members.
    pub fn scard(&mut self, key: &[u8]) -> CacheResult<usize> {
        Ok(self.set_value(key)?.len())
    }

    /// True when the member is present.
    pub fn sismember(&mut self, key: &[u8], member: &[u8]) -> CacheResult<bool> {
        Ok(self.set_value(key)?.contains(member))
    }

    /// Every member.
    pub fn smembers(&mut self, key: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        Ok(self.set_value(key)?.iter().cloned().collect())
    }

    /// Random members: a positive count samples without replacement, a negative
    /// count draws `|count|` members with repeats.
    pub fn srandmember(&mut self, key: &[u8], count: i64) -> CacheResult<Vec<Vec<u8>>> {
        let members = self.set_value(key)?;
        if members.is_empty() || count == 0 {
            return Ok(Vec::new());
        }
        let mut rng = rand::thread_rng();
        if count > 0 {
            let wanted = usize::try_from(count).unwrap_or(usize::MAX).min(members.len());
            Ok(members.iter().cloned().choose_multiple(&mut rng, wanted))
        } else {
            let wanted = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);
            let pool: Vec<&Vec<u8>> = members.iter().collect();
            Ok((0..wanted)
                .map(|_| pool[rng.gen_range(0..pool.len())].clone())
                .collect())
        }
    }
}
