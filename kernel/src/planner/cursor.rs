//! A drain-once cursor over the compactible holders of one datasource,
//! newest first.

use crate::interval::Interval;
use crate::segment::DataSegment;
use crate::timeline::{Partitions, TimelineObjectHolder, VersionedSegmentTimeline};

/// Walks the timeline holders that are worth considering for compaction.
///
/// The holder list is computed once at construction: for every search
/// interval, the visible holders whose first chunk lies inside the search
/// interval and which hold any bytes at all. Popping from the back of the
/// ascending list yields holders newest-first.
///
/// When the cursor was built over a regranulated timeline it carries the
/// physical timeline too, and every popped holder is re-resolved against it
/// so that callers only ever see real segments with their true versions and
/// shard specs.
#[derive(Debug)]
pub(crate) struct CompactibleHolderCursor<'a> {
    holders: Vec<TimelineObjectHolder>,
    original_timeline: Option<&'a VersionedSegmentTimeline>,
}

impl<'a> CompactibleHolderCursor<'a> {
    pub(crate) fn new(
        timeline: &VersionedSegmentTimeline,
        search_intervals: &[Interval],
        original_timeline: Option<&'a VersionedSegmentTimeline>,
    ) -> Self {
        let holders = search_intervals
            .iter()
            .flat_map(|interval| {
                timeline
                    .lookup(interval)
                    .into_iter()
                    .filter(|holder| is_compactible_holder(interval, holder))
            })
            .collect();
        Self {
            holders,
            original_timeline,
        }
    }

    /// The next (newest remaining) holder's segments, re-resolved against
    /// the physical timeline when one is attached. `None` once drained.
    pub(crate) fn next_candidates(&mut self) -> Option<Vec<DataSegment>> {
        let holder = self.holders.pop()?;
        let candidates = holder.into_chunks();
        let Some(original_timeline) = self.original_timeline else {
            return Some(candidates);
        };
        let umbrella = Interval::umbrella(candidates.iter().map(|segment| segment.interval()))?;
        Some(original_timeline.find_non_overshadowed(&umbrella, Partitions::OnlyComplete))
    }
}

/// A holder is compactible when it has a chunk at all, its first chunk lies
/// fully inside the search interval (partially-overlapping boundary holders
/// are not touched), and its chunks hold at least one byte.
fn is_compactible_holder(search_interval: &Interval, holder: &TimelineObjectHolder) -> bool {
    let mut chunks = holder.chunks().iter();
    let Some(first) = chunks.next() else {
        return false;
    };
    if !search_interval.contains(first.interval()) {
        return false;
    }
    let mut partition_bytes = first.size();
    while partition_bytes == 0 {
        match chunks.next() {
            Some(chunk) => partition_bytes += chunk.size(),
            None => break,
        }
    }
    partition_bytes > 0
}
