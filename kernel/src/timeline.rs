//! A versioned interval map over the segments of one datasource.
//!
//! Segments are grouped into time chunks (one contiguous interval), versions
//! within a chunk, and numbered partition chunks within a version. Within a
//! time chunk, the lexicographically greatest version whose partition set is
//! complete hides every older version; an incomplete newer version hides
//! nothing. Queries only ever see the visible (non-overshadowed) holders.

use std::collections::BTreeMap;

use itertools::Itertools as _;

use crate::interval::Interval;
use crate::segment::DataSegment;
use crate::VersionTag;

/// Which partition sets a query is willing to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partitions {
    /// Only versions whose partition set covers `0..partitions` entirely.
    OnlyComplete,
    /// Prefer the greatest complete version, but fall back to the greatest
    /// incomplete one if no version of the chunk is complete.
    IncompleteOk,
}

/// One visible time chunk: a contiguous interval at a single version,
/// holding that version's partition chunks in partition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineObjectHolder {
    interval: Interval,
    version: VersionTag,
    chunks: Vec<DataSegment>,
}

impl TimelineObjectHolder {
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    pub fn chunks(&self) -> &[DataSegment] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<DataSegment> {
        self.chunks
    }
}

/// The partition chunks of one version within one time chunk, keyed by
/// partition number.
#[derive(Debug, Default, Clone)]
struct PartitionHolder {
    chunks: BTreeMap<u32, DataSegment>,
}

impl PartitionHolder {
    fn insert(&mut self, segment: DataSegment) {
        self.chunks
            .insert(segment.shard_spec().partition_num(), segment);
    }

    /// True iff the held partitions cover exactly `0..partitions` as
    /// declared by the chunks' shard specs.
    fn is_complete(&self) -> bool {
        let Some(first) = self.chunks.values().next() else {
            return false;
        };
        let declared = first.shard_spec().partitions();
        self.chunks.len() as u32 == declared
            && self
                .chunks
                .keys()
                .enumerate()
                .all(|(position, partition)| position as u32 == *partition)
    }
}

/// Versioned interval map for one datasource. See the module docs for the
/// overshadow rules.
#[derive(Debug, Default, Clone)]
pub struct VersionedSegmentTimeline {
    chunks: BTreeMap<Interval, BTreeMap<VersionTag, PartitionHolder>>,
}

impl VersionedSegmentTimeline {
    /// Builds a timeline from segments, each chunked under its own interval
    /// and version.
    pub fn from_segments(segments: impl IntoIterator<Item = DataSegment>) -> Self {
        let mut timeline = Self::default();
        for segment in segments {
            timeline.add_segment(segment);
        }
        timeline
    }

    /// Adds a segment under its own interval and version.
    pub fn add_segment(&mut self, segment: DataSegment) {
        self.add(*segment.interval(), segment.version().clone(), segment);
    }

    /// Adds a segment under an explicit time chunk and version. The chunk
    /// interval may differ from the segment's own interval; a regranulated
    /// timeline re-bins original segments into configured-granularity
    /// buckets this way.
    pub fn add(&mut self, chunk_interval: Interval, version: VersionTag, segment: DataSegment) {
        self.chunks
            .entry(chunk_interval)
            .or_default()
            .entry(version)
            .or_default()
            .insert(segment);
    }

    /// True iff no time chunk has a complete version, i.e. nothing is
    /// visible.
    pub fn is_empty(&self) -> bool {
        self.visible_holders().next().is_none()
    }

    /// The visible (greatest complete) version of each time chunk, in
    /// chunk-interval order.
    fn visible_holders(
        &self,
    ) -> impl Iterator<Item = (&Interval, &VersionTag, &PartitionHolder)> {
        self.chunks.iter().filter_map(|(interval, versions)| {
            versions
                .iter()
                .rev()
                .find(|(_, holder)| holder.is_complete())
                .map(|(version, holder)| (interval, version, holder))
        })
    }

    fn materialize(
        interval: &Interval,
        version: &VersionTag,
        holder: &PartitionHolder,
    ) -> TimelineObjectHolder {
        TimelineObjectHolder {
            interval: *interval,
            version: version.clone(),
            chunks: holder.chunks.values().cloned().collect(),
        }
    }

    /// The earliest visible holder by interval start, or `None` if the
    /// timeline is empty.
    pub fn first(&self) -> Option<TimelineObjectHolder> {
        self.visible_holders()
            .next()
            .map(|(interval, version, holder)| Self::materialize(interval, version, holder))
    }

    /// The latest visible holder by interval end, or `None` if the timeline
    /// is empty.
    pub fn last(&self) -> Option<TimelineObjectHolder> {
        self.visible_holders()
            .max_by_key(|(interval, _, _)| (interval.end(), interval.start()))
            .map(|(interval, version, holder)| Self::materialize(interval, version, holder))
    }

    /// The visible holders of every time chunk overlapping `interval`,
    /// ordered by holder interval.
    pub fn lookup(&self, interval: &Interval) -> Vec<TimelineObjectHolder> {
        self.visible_holders()
            .filter(|(chunk_interval, _, _)| chunk_interval.overlaps(interval))
            .map(|(chunk_interval, version, holder)| {
                Self::materialize(chunk_interval, version, holder)
            })
            .collect()
    }

    /// Every segment of every non-overshadowed holder whose time chunk
    /// overlaps `interval`, deduplicated by segment identity and ordered by
    /// (datasource, interval, version, partition).
    ///
    /// With [`Partitions::OnlyComplete`] a chunk with no complete version
    /// contributes nothing; with [`Partitions::IncompleteOk`] its greatest
    /// version contributes instead.
    pub fn find_non_overshadowed(
        &self,
        interval: &Interval,
        partitions: Partitions,
    ) -> Vec<DataSegment> {
        self.chunks
            .iter()
            .filter(|(chunk_interval, _)| chunk_interval.overlaps(interval))
            .filter_map(|(_, versions)| {
                let complete = versions.iter().rev().find(|(_, holder)| holder.is_complete());
                match (complete, partitions) {
                    (Some((_, holder)), _) => Some(holder),
                    (None, Partitions::IncompleteOk) => {
                        versions.values().next_back()
                    }
                    (None, Partitions::OnlyComplete) => None,
                }
            })
            .flat_map(|holder| holder.chunks.values().cloned())
            .sorted()
            .dedup()
            .collect()
    }
}
