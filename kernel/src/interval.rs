//! Half-open time intervals over the absolute (UTC) timeline, and the small
//! amount of interval algebra the planner needs: containment, overlap,
//! umbrella intervals, and subtraction of skip ranges from a total range.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::require;
use crate::{Error, PlannerResult};

/// A half-open interval `[start, end)` on the UTC timeline.
///
/// `start <= end` always holds. An interval with `start == end` is empty; it
/// contains no instant and overlaps nothing. Ordering is by start, then end,
/// which is the ordering every sorted interval collection in this crate uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    /// The interval spanning the whole representable timeline.
    pub const ETERNITY: Interval = Interval {
        start: DateTime::<Utc>::MIN_UTC,
        end: DateTime::<Utc>::MAX_UTC,
    };

    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> PlannerResult<Self> {
        require!(
            start <= end,
            Error::generic(format!("Invalid interval: start {start} is after end {end}"))
        );
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True iff `other` lies fully within this interval.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True iff the two intervals share at least one instant. Empty
    /// intervals overlap nothing.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The smallest interval containing every interval in `intervals`, or
    /// `None` if the iterator is empty.
    pub fn umbrella<'a>(intervals: impl IntoIterator<Item = &'a Interval>) -> Option<Interval> {
        intervals
            .into_iter()
            .fold(None, |acc: Option<Interval>, iv| match acc {
                None => Some(*iv),
                Some(acc) => Some(Interval {
                    start: acc.start.min(iv.start),
                    end: acc.end.max(iv.end),
                }),
            })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Returns the maximal non-empty subintervals of `total` that do not overlap
/// any of `skip_intervals`.
///
/// The skips must be sorted by start then end. A skip that is not contained
/// in the remaining range (after previous skips were consumed) is degenerate
/// input and is ignored with a warning.
pub fn filter_skip_intervals(total: &Interval, skip_intervals: &[Interval]) -> Vec<Interval> {
    let mut filtered = Vec::with_capacity(skip_intervals.len() + 1);

    let mut remaining_start = total.start();
    let mut remaining_end = total.end();
    for skip in skip_intervals {
        if skip.start() < remaining_start && skip.end() > remaining_start {
            // Trims the remaining range from the left
            remaining_start = skip.end();
        } else if skip.start() < remaining_end && skip.end() > remaining_end {
            // Trims the remaining range from the right
            remaining_end = skip.start();
        } else if remaining_start <= skip.start() && remaining_end >= skip.end() {
            if remaining_start < skip.start() {
                filtered.push(Interval {
                    start: remaining_start,
                    end: skip.start(),
                });
            }
            remaining_start = skip.end();
        } else {
            warn!(
                "skip interval [{}] is not contained in remaining interval [{}/{}]",
                skip,
                remaining_start.to_rfc3339(),
                remaining_end.to_rfc3339()
            );
        }
    }

    if remaining_start < remaining_end {
        filtered.push(Interval {
            start: remaining_start,
            end: remaining_end,
        });
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn interval(s: u32, e: u32) -> Interval {
        Interval::new(day(s), day(e)).unwrap()
    }

    #[test]
    fn test_invalid_interval() {
        let result = Interval::new(day(2), day(1));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid interval"));
    }

    #[test]
    fn test_contains_and_overlaps() {
        let outer = interval(1, 10);
        let inner = interval(3, 5);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer));

        assert!(outer.overlaps(&inner));
        assert!(interval(1, 5).overlaps(&interval(4, 8)));
        // Abutting half-open intervals do not overlap
        assert!(!interval(1, 5).overlaps(&interval(5, 8)));
        // Empty intervals overlap nothing, but are contained
        let empty = interval(3, 3);
        assert!(!outer.overlaps(&empty));
        assert!(outer.contains(&empty));
    }

    #[test]
    fn test_umbrella() {
        let intervals = [interval(3, 5), interval(1, 2), interval(4, 9)];
        assert_eq!(Interval::umbrella(&intervals), Some(interval(1, 9)));
        assert_eq!(Interval::umbrella(std::iter::empty::<&Interval>()), None);
    }

    #[test]
    fn test_ordering_is_start_then_end() {
        let mut intervals = vec![interval(2, 3), interval(1, 5), interval(1, 2)];
        intervals.sort();
        assert_eq!(intervals, vec![interval(1, 2), interval(1, 5), interval(2, 3)]);
    }

    #[test]
    fn test_filter_skip_intervals_inner_skip() {
        let remainder = filter_skip_intervals(&interval(1, 10), &[interval(4, 6)]);
        assert_eq!(remainder, vec![interval(1, 4), interval(6, 10)]);
    }

    #[test]
    fn test_filter_skip_intervals_trims_edges() {
        // Overlapping the left edge only advances the start
        let remainder = filter_skip_intervals(&interval(3, 10), &[interval(1, 5)]);
        assert_eq!(remainder, vec![interval(5, 10)]);

        // Overlapping the right edge only retreats the end
        let remainder = filter_skip_intervals(&interval(1, 8), &[interval(6, 12)]);
        assert_eq!(remainder, vec![interval(1, 6)]);
    }

    #[test]
    fn test_filter_skip_intervals_multiple_sorted_skips() {
        let remainder = filter_skip_intervals(
            &interval(1, 20),
            &[interval(2, 4), interval(4, 6), interval(10, 12)],
        );
        assert_eq!(
            remainder,
            vec![interval(1, 2), interval(6, 10), interval(12, 20)]
        );
    }

    #[test]
    fn test_filter_skip_intervals_skip_at_boundary() {
        // A skip starting exactly at the remaining start leaves no empty slice behind
        let remainder = filter_skip_intervals(&interval(1, 10), &[interval(1, 3)]);
        assert_eq!(remainder, vec![interval(3, 10)]);

        let remainder = filter_skip_intervals(&interval(1, 10), &[interval(7, 10)]);
        assert_eq!(remainder, vec![interval(1, 7)]);
    }

    #[test]
    fn test_filter_skip_intervals_ignores_degenerate_skip() {
        // Entirely outside the total interval
        let remainder = filter_skip_intervals(&interval(5, 10), &[interval(1, 3)]);
        assert_eq!(remainder, vec![interval(5, 10)]);
    }

    #[test]
    fn test_filter_skip_intervals_full_coverage() {
        let remainder = filter_skip_intervals(&interval(1, 10), &[interval(1, 10)]);
        assert!(remainder.is_empty());
    }

    #[test]
    fn test_filter_skip_intervals_union_property() {
        // The remainder plus the skips partition the total interval
        let total = interval(1, 30);
        let skips = [interval(3, 6), interval(9, 14), interval(20, 25)];
        let remainder = filter_skip_intervals(&total, &skips);

        let mut pieces: Vec<Interval> = remainder.iter().chain(skips.iter()).copied().collect();
        pieces.sort();
        assert_eq!(pieces.first().unwrap().start(), total.start());
        assert_eq!(pieces.last().unwrap().end(), total.end());
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }
}
