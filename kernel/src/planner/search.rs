//! Computing the ordered list of intervals the planner will visit for one
//! datasource: the timeline's total span, minus the "skip latest" tail and
//! the operator's skip intervals, tightened to the segments that actually
//! exist.

use std::collections::HashMap;
use std::iter;

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools as _;
use tracing::debug;

use super::{collect_segment_statistics, SegmentBatch};
use crate::granularity::Granularity;
use crate::interval::{filter_skip_intervals, Interval};
use crate::statistics::CompactionStatistics;
use crate::timeline::{Partitions, VersionedSegmentTimeline};
use crate::utils::require;
use crate::{Error, PlannerResult};

/// Returns the search intervals for a datasource in ascending order, and
/// accounts every segment falling fully inside an effective skip interval
/// into the skipped statistics.
///
/// The timeline must be non-empty; `first`/`last` failing on it is a
/// timeline-library bug.
pub(crate) fn find_initial_search_interval(
    datasource: &str,
    timeline: &VersionedSegmentTimeline,
    skip_offset: TimeDelta,
    configured_granularity: Option<Granularity>,
    skip_intervals: Option<&[Interval]>,
    skipped_statistics: &mut HashMap<String, CompactionStatistics>,
) -> PlannerResult<Vec<Interval>> {
    let first = timeline.first().ok_or_else(|| {
        Error::invariant_violation(format!("no first holder on non-empty timeline of {datasource}"))
    })?;
    let last = timeline.last().ok_or_else(|| {
        Error::invariant_violation(format!("no last holder on non-empty timeline of {datasource}"))
    })?;

    let full_skip_intervals = sort_and_add_skip_interval_from_latest(
        last.interval().end(),
        skip_offset,
        configured_granularity,
        skip_intervals,
    )?;

    // Segments the effective skips swallow whole are accounted up front
    for skip_interval in &full_skip_intervals {
        let skipped: Vec<_> = timeline
            .find_non_overshadowed(skip_interval, Partitions::OnlyComplete)
            .into_iter()
            .filter(|segment| skip_interval.contains(segment.interval()))
            .collect();
        collect_segment_statistics(
            skipped_statistics,
            datasource,
            &SegmentBatch::new(skipped),
        );
    }

    let total_interval = Interval::new(first.interval().start(), last.interval().end())?;
    let mut search_intervals = Vec::new();
    for lookup_interval in filter_skip_intervals(&total_interval, &full_skip_intervals) {
        // The lookup may return segments merely intersecting the interval;
        // only segments fully inside it are searched for compaction.
        let segments: Vec<_> = timeline
            .find_non_overshadowed(&lookup_interval, Partitions::OnlyComplete)
            .into_iter()
            .filter(|segment| lookup_interval.contains(segment.interval()))
            .collect();

        if segments.is_empty() {
            continue;
        }
        let search_start = segments
            .iter()
            .map(|segment| segment.interval().start())
            .min()
            .ok_or_else(|| Error::invariant_violation("non-empty segment list has a minimum"))?;
        let search_end = segments
            .iter()
            .map(|segment| segment.interval().end())
            .max()
            .ok_or_else(|| Error::invariant_violation("non-empty segment list has a maximum"))?;
        search_intervals.push(Interval::new(search_start, search_end)?);
    }

    debug!(
        datasource,
        intervals = search_intervals.len(),
        "computed search intervals"
    );
    Ok(search_intervals)
}

/// Builds the effective skip list: the operator's skip intervals sorted by
/// start then end, with the "skip latest" tail appended. Operator skips
/// overlapping the tail are merged with it into a single umbrella interval.
///
/// With a configured segment granularity the tail start snaps down to a
/// bucket boundary, so a partially-aged bucket is left alone as a whole.
pub(crate) fn sort_and_add_skip_interval_from_latest(
    latest: DateTime<Utc>,
    skip_offset: TimeDelta,
    configured_granularity: Option<Granularity>,
    skip_intervals: Option<&[Interval]>,
) -> PlannerResult<Vec<Interval>> {
    require!(
        skip_offset >= TimeDelta::zero(),
        Error::generic(format!("Negative skip offset {skip_offset}"))
    );

    let skip_from_latest = match configured_granularity {
        Some(granularity) => {
            Interval::new(granularity.bucket_start(latest - skip_offset), latest)?
        }
        None => Interval::new(latest - skip_offset, latest)?,
    };

    let Some(skip_intervals) = skip_intervals else {
        return Ok(vec![skip_from_latest]);
    };

    let sorted = skip_intervals.iter().copied().sorted();
    let (overlapping, mut effective): (Vec<_>, Vec<_>) =
        sorted.partition(|interval| interval.overlaps(&skip_from_latest));

    if overlapping.is_empty() {
        effective.push(skip_from_latest);
    } else {
        let merged = Interval::umbrella(overlapping.iter().chain(iter::once(&skip_from_latest)))
            .ok_or_else(|| Error::invariant_violation("umbrella of a non-empty set"))?;
        effective.push(merged);
    }
    Ok(effective)
}
