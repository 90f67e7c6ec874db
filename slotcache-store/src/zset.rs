//! Sorted-set container used by the shard store.
//!
//! Keeps a member→score map for O(1) score lookups next to a vector ordered by
//! `(score, member)` for rank arithmetic. Cached windows are bounded by the
//! per-key item budget, so linear insert/remove on the ordered vector stays
//! cheap.

use std::cmp::Ordering;

use crate::containers::HotMap;
use crate::types::{LexBound, ScoreBound, ScoreMember};

/// Score-ordered member set. Ties are broken by member byte order, matching
/// Redis rank semantics.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HotMap<Vec<u8>, f64>,
    ordered: Vec<ScoreMember>,
}

fn order_key(score: f64, member: &[u8]) -> impl FnMut(&ScoreMember) -> Ordering + '_ {
    move |probe| {
        probe
            .score
            .total_cmp(&score)
            .then_with(|| probe.member.as_slice().cmp(member))
    }
}

impl SortedSet {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// True when the set holds no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Inserts or updates one member. Returns true when the member was new.
    pub fn insert(&mut self, score: f64, member: Vec<u8>) -> bool {
        let is_new = match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                if let Ok(position) = self
                    .ordered
                    .binary_search_by(order_key(previous, member.as_slice()))
                {
                    let _ = self.ordered.remove(position);
                }
                false
            }
            None => true,
        };
        let position = self
            .ordered
            .binary_search_by(order_key(score, member.as_slice()))
            .unwrap_or_else(|insert_at| insert_at);
        self.ordered.insert(position, ScoreMember { score, member });
        is_new
    }

    /// Removes one member. Returns true when it was present.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        let Some(score) = self.scores.remove(member) else {
            return false;
        };
        if let Ok(position) = self.ordered.binary_search_by(order_key(score, member)) {
            let _ = self.ordered.remove(position);
        }
        true
    }

    /// Score of one member, if present.
    #[must_use]
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Ascending rank of one member.
    #[must_use]
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.ordered.binary_search_by(order_key(score, member)).ok()
    }

    /// Members at ranks `[start, stop]`, both already normalized into bounds.
    #[must_use]
    pub fn range_by_rank(&self, start: usize, stop: usize) -> &[ScoreMember] {
        if start >= self.ordered.len() || start > stop {
            return &[];
        }
        let stop = stop.min(self.ordered.len() - 1);
        &self.ordered[start..=stop]
    }

    /// Lowest-ordered member.
    #[must_use]
    pub fn first(&self) -> Option<&ScoreMember> {
        self.ordered.first()
    }

    /// Highest-ordered member.
    #[must_use]
    pub fn last(&self) -> Option<&ScoreMember> {
        self.ordered.last()
    }

    fn score_range_indices(&self, min: ScoreBound, max: ScoreBound) -> (usize, usize) {
        let start = self
            .ordered
            .partition_point(|probe| !min.allows_from_below(probe.score));
        let stop = self
            .ordered
            .partition_point(|probe| max.allows_from_above(probe.score));
        (start, stop)
    }

    /// Number of members inside the score interval.
    #[must_use]
    pub fn count_by_score(&self, min: ScoreBound, max: ScoreBound) -> usize {
        let (start, stop) = self.score_range_indices(min, max);
        stop.saturating_sub(start)
    }

    /// Members inside the score interval in ascending order, after skipping
    /// `offset` and keeping at most `count` (negative count keeps all).
    #[must_use]
    pub fn range_by_score(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        offset: i64,
        count: i64,
    ) -> Vec<ScoreMember> {
        let (start, stop) = self.score_range_indices(min, max);
        if start >= stop {
            return Vec::new();
        }
        let selected = &self.ordered[start..stop];
        let offset = usize::try_from(offset).unwrap_or(0);
        if offset >= selected.len() {
            return Vec::new();
        }
        let remaining = &selected[offset..];
        let keep = usize::try_from(count).unwrap_or(remaining.len());
        remaining[..keep.min(remaining.len())].to_vec()
    }

    /// Same as [`Self::range_by_score`] but descending, with offset/count
    /// applied from the high end.
    #[must_use]
    pub fn rev_range_by_score(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        offset: i64,
        count: i64,
    ) -> Vec<ScoreMember> {
        let (start, stop) = self.score_range_indices(min, max);
        if start >= stop {
            return Vec::new();
        }
        let mut selected: Vec<ScoreMember> = self.ordered[start..stop].to_vec();
        selected.reverse();
        let offset = usize::try_from(offset).unwrap_or(0);
        if offset >= selected.len() {
            return Vec::new();
        }
        let keep = usize::try_from(count).unwrap_or(selected.len() - offset);
        selected[offset..(offset + keep).min(selected.len())].to_vec()
    }

    /// Removes ranks `[start, stop]` (normalized). Returns removed count.
    pub fn remove_range_by_rank(&mut self, start: usize, stop: usize) -> usize {
        if start >= self.ordered.len() || start > stop {
            return 0;
        }
        let stop = stop.min(self.ordered.len() - 1);
        let removed: Vec<ScoreMember> = self.ordered.drain(start..=stop).collect();
        for pair in &removed {
            let _ = self.scores.remove(&pair.member);
        }
        removed.len()
    }

    /// Removes every member inside the score interval. Returns removed count.
    pub fn remove_range_by_score(&mut self, min: ScoreBound, max: ScoreBound) -> usize {
        let (start, stop) = self.score_range_indices(min, max);
        if start >= stop {
            return 0;
        }
        self.remove_range_by_rank(start, stop - 1)
    }

    /// Members inside the lexicographic interval, in ascending member order.
    #[must_use]
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound) -> Vec<Vec<u8>> {
        let mut members: Vec<Vec<u8>> = self
            .scores
            .keys()
            .filter(|member| {
                min.allows_from_below(member) && max.allows_from_above(member)
            })
            .cloned()
            .collect();
        members.sort_unstable();
        members
    }

    /// Removes every member inside the lexicographic interval. Returns removed count.
    pub fn remove_range_by_lex(&mut self, min: &LexBound, max: &LexBound) -> usize {
        let doomed = self.range_by_lex(min, max);
        for member in &doomed {
            let _ = self.remove(member);
        }
        doomed.len()
    }

    /// Approximate heap footprint in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        const PER_MEMBER_OVERHEAD: u64 = 48;
        self.ordered
            .iter()
            .map(|pair| pair.member.len() as u64 * 2 + PER_MEMBER_OVERHEAD)
            .sum()
    }
}
