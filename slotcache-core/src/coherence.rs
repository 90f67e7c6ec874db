//! Partial-zset coverage predicates.
//!
//! A cached zset holds a contiguous prefix (`FromBegin`) or suffix (`FromEnd`)
//! of the authoritative member sequence. These predicates decide, per query,
//! whether the cached window is sufficient — and translate hit coordinates
//! into cache-local space. The boundary logic around closure flags is the
//! subtle part; every branch is table-tested below.

use slotcache_common::config::CachePosition;
use slotcache_store::ScoreBound;

/// Outcome of an index-range coverage check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCoverage {
    /// Normalized range is empty or reversed.
    Error,
    /// The request lies inside the cached window; coordinates are
    /// cache-local.
    Hit {
        /// First cache-local index.
        start: i64,
        /// Last cache-local index.
        stop: i64,
    },
    /// The request needs members outside the cached window.
    Miss,
}

/// Outcome of a score-range coverage check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCoverage {
    /// The interval cannot match anything the authoritative zset holds.
    Error,
    /// The cache alone can answer the interval.
    Hit,
    /// The interval reaches past the cached window.
    Miss,
}

/// Checks whether a forward rank range `[start, stop]` (Redis negative-index
/// convention, relative to the authoritative length) is covered by the cached
/// window.
#[must_use]
pub fn check_cache_range(
    cache_len: i64,
    db_len: i64,
    position: CachePosition,
    start: i64,
    stop: i64,
) -> RangeCoverage {
    let mut out_start = if start >= 0 { start } else { db_len + start };
    let mut out_stop = if stop >= 0 { stop } else { db_len + stop };
    out_start = out_start.max(0);
    out_stop = out_stop.min(db_len - 1);
    if out_start > out_stop || out_start >= db_len || out_stop < 0 {
        return RangeCoverage::Error;
    }
    match position {
        CachePosition::FromBegin => {
            if out_start < cache_len && out_stop < cache_len {
                RangeCoverage::Hit {
                    start: out_start,
                    stop: out_stop,
                }
            } else {
                RangeCoverage::Miss
            }
        }
        CachePosition::FromEnd => {
            let window_start = db_len - cache_len;
            if out_start >= window_start && out_stop >= window_start {
                RangeCoverage::Hit {
                    start: out_start - window_start,
                    stop: out_stop - window_start,
                }
            } else {
                RangeCoverage::Miss
            }
        }
    }
}

/// Checks a reverse rank range. The request indices count from the high end;
/// hit coordinates come back as cache-local reverse indices.
#[must_use]
pub fn check_cache_rev_range(
    cache_len: i64,
    db_len: i64,
    position: CachePosition,
    start: i64,
    stop: i64,
) -> RangeCoverage {
    // Forward authoritative indices of the reverse request.
    let mut start_index = if stop >= 0 { db_len - stop - 1 } else { -stop - 1 };
    let mut stop_index = if start >= 0 { db_len - start - 1 } else { -start - 1 };
    start_index = start_index.max(0);
    stop_index = stop_index.min(db_len - 1);
    if start_index > stop_index || start_index >= db_len || stop_index < 0 {
        return RangeCoverage::Error;
    }
    match position {
        CachePosition::FromBegin => {
            if start_index < cache_len && stop_index < cache_len {
                RangeCoverage::Hit {
                    start: cache_len - stop_index - 1,
                    stop: cache_len - start_index - 1,
                }
            } else {
                RangeCoverage::Miss
            }
        }
        CachePosition::FromEnd => {
            let window_start = db_len - cache_len;
            if start_index >= window_start && stop_index >= window_start {
                let cache_start = start_index - window_start;
                let cache_stop = stop_index - window_start;
                RangeCoverage::Hit {
                    start: cache_len - cache_stop - 1,
                    stop: cache_len - cache_start - 1,
                }
            } else {
                RangeCoverage::Miss
            }
        }
    }
}

fn bound_score(bound: ScoreBound) -> f64 {
    match bound {
        ScoreBound::NegInf => f64::NEG_INFINITY,
        ScoreBound::PosInf => f64::INFINITY,
        ScoreBound::Incl(value) | ScoreBound::Excl(value) => value,
    }
}

/// Checks whether a score interval is covered by the cached window.
///
/// `cache_min`/`cache_max` are the scores at the two ends of the window;
/// `cache_full` says the window is at its item budget, meaning members past
/// the boundary score may have been trimmed and boundary equality can no
/// longer be trusted regardless of closure.
#[must_use]
pub fn check_cache_range_by_score(
    cache_full: bool,
    position: CachePosition,
    cache_min: f64,
    cache_max: f64,
    min: ScoreBound,
    max: ScoreBound,
) -> ScoreCoverage {
    let min_score = bound_score(min);
    let max_score = bound_score(max);
    match position {
        CachePosition::FromBegin => {
            let covered = if cache_full {
                max_score < cache_max
            } else if max.is_closed() || matches!(max, ScoreBound::PosInf) {
                max_score < cache_max
            } else {
                max_score <= cache_max
            };
            if !covered {
                return ScoreCoverage::Miss;
            }
            if max_score < cache_min {
                ScoreCoverage::Error
            } else {
                ScoreCoverage::Hit
            }
        }
        CachePosition::FromEnd => {
            let covered = if cache_full {
                min_score > cache_min
            } else if min.is_closed() || matches!(min, ScoreBound::NegInf) {
                min_score > cache_min
            } else {
                min_score >= cache_min
            };
            if !covered {
                return ScoreCoverage::Miss;
            }
            if min_score > cache_max {
                ScoreCoverage::Error
            } else {
                ScoreCoverage::Hit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RangeCoverage, ScoreCoverage, check_cache_range, check_cache_range_by_score, check_cache_rev_range};
    use googletest::prelude::*;
    use rstest::rstest;
    use slotcache_common::config::CachePosition;
    use slotcache_store::ScoreBound;

    // Window of 5 cached members over a 7-member authoritative zset.
    #[rstest]
    #[case(0, 2, RangeCoverage::Hit { start: 0, stop: 2 })]
    #[case(0, 4, RangeCoverage::Hit { start: 0, stop: 4 })]
    #[case(3, 6, RangeCoverage::Miss)]
    #[case(-7, -3, RangeCoverage::Hit { start: 0, stop: 4 })]
    #[case(-2, -1, RangeCoverage::Miss)]
    #[case(5, 3, RangeCoverage::Error)]
    #[case(9, 12, RangeCoverage::Error)]
    fn forward_range_from_begin(#[case] start: i64, #[case] stop: i64, #[case] expected: RangeCoverage) {
        assert_that!(
            check_cache_range(5, 7, CachePosition::FromBegin, start, stop),
            eq(expected)
        );
    }

    #[rstest]
    #[case(2, 6, RangeCoverage::Hit { start: 0, stop: 4 })]
    #[case(5, 6, RangeCoverage::Hit { start: 3, stop: 4 })]
    #[case(0, 4, RangeCoverage::Miss)]
    #[case(-2, -1, RangeCoverage::Hit { start: 3, stop: 4 })]
    fn forward_range_from_end(#[case] start: i64, #[case] stop: i64, #[case] expected: RangeCoverage) {
        assert_that!(
            check_cache_range(5, 7, CachePosition::FromEnd, start, stop),
            eq(expected)
        );
    }

    // Reverse request indices count from the authoritative high end.
    #[rstest]
    #[case(3, 6, RangeCoverage::Hit { start: 1, stop: 4 })]
    #[case(0, 2, RangeCoverage::Miss)]
    #[case(6, 6, RangeCoverage::Hit { start: 4, stop: 4 })]
    #[case(4, 2, RangeCoverage::Error)]
    fn reverse_range_from_begin(#[case] start: i64, #[case] stop: i64, #[case] expected: RangeCoverage) {
        assert_that!(
            check_cache_rev_range(5, 7, CachePosition::FromBegin, start, stop),
            eq(expected)
        );
    }

    #[rstest]
    #[case(0, 4, RangeCoverage::Hit { start: 0, stop: 4 })]
    #[case(0, 1, RangeCoverage::Hit { start: 0, stop: 1 })]
    #[case(3, 6, RangeCoverage::Miss)]
    fn reverse_range_from_end(#[case] start: i64, #[case] stop: i64, #[case] expected: RangeCoverage) {
        assert_that!(
            check_cache_rev_range(5, 7, CachePosition::FromEnd, start, stop),
            eq(expected)
        );
    }

    #[rstest]
    fn forward_hit_translates_back_to_db_indices() {
        // FromEnd window [2, 6] of a 7-member zset: db index i maps to
        // cache-local i - 2 and back.
        let RangeCoverage::Hit { start, stop } =
            check_cache_range(5, 7, CachePosition::FromEnd, 3, 5)
        else {
            panic!("request inside the suffix window must hit");
        };
        assert_that!((start + 2, stop + 2), eq((3, 5)));
    }

    // Full window, FromBegin: only strictly-below-boundary queries hit.
    #[rstest]
    #[case(ScoreBound::Incl(4.0), ScoreCoverage::Hit)]
    #[case(ScoreBound::Excl(5.0), ScoreCoverage::Miss)]
    #[case(ScoreBound::Incl(5.0), ScoreCoverage::Miss)]
    #[case(ScoreBound::PosInf, ScoreCoverage::Miss)]
    fn score_coverage_full_from_begin(#[case] max: ScoreBound, #[case] expected: ScoreCoverage) {
        assert_that!(
            check_cache_range_by_score(
                true,
                CachePosition::FromBegin,
                1.0,
                5.0,
                ScoreBound::NegInf,
                max,
            ),
            eq(expected)
        );
    }

    // Partial window, FromBegin: an open query may touch the boundary, a
    // closed one may not.
    #[rstest]
    #[case(ScoreBound::Excl(5.0), ScoreCoverage::Hit)]
    #[case(ScoreBound::Incl(5.0), ScoreCoverage::Miss)]
    #[case(ScoreBound::Incl(4.0), ScoreCoverage::Hit)]
    fn score_coverage_partial_from_begin(#[case] max: ScoreBound, #[case] expected: ScoreCoverage) {
        assert_that!(
            check_cache_range_by_score(
                false,
                CachePosition::FromBegin,
                1.0,
                5.0,
                ScoreBound::NegInf,
                max,
            ),
            eq(expected)
        );
    }

    // FromEnd mirrors on the minimum bound.
    #[rstest]
    #[case(true, ScoreBound::Incl(2.0), ScoreCoverage::Hit)]
    #[case(true, ScoreBound::Incl(1.0), ScoreCoverage::Miss)]
    #[case(true, ScoreBound::NegInf, ScoreCoverage::Miss)]
    #[case(false, ScoreBound::Excl(1.0), ScoreCoverage::Hit)]
    #[case(false, ScoreBound::Incl(1.0), ScoreCoverage::Miss)]
    fn score_coverage_from_end(
        #[case] cache_full: bool,
        #[case] min: ScoreBound,
        #[case] expected: ScoreCoverage,
    ) {
        assert_that!(
            check_cache_range_by_score(
                cache_full,
                CachePosition::FromEnd,
                1.0,
                5.0,
                min,
                ScoreBound::PosInf,
            ),
            eq(expected)
        );
    }

    // A hit whose interval lies entirely outside the window is an empty range.
    #[rstest]
    fn empty_interval_inside_hit_is_an_error() {
        assert_that!(
            check_cache_range_by_score(
                true,
                CachePosition::FromBegin,
                3.0,
                5.0,
                ScoreBound::NegInf,
                ScoreBound::Incl(2.0),
            ),
            eq(ScoreCoverage::Error)
        );
    }
}
