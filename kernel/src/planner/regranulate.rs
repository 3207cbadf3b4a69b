//! Re-binning a physical timeline into the operator's configured segment
//! granularity.
//!
//! The resulting timeline exists only to drive iteration in the target
//! bucketing: every complete non-overshadowed segment is inserted into each
//! configured-granularity bucket its interval touches, under synthetic
//! partition numbers and one synthetic version shared by the whole
//! construction (so the versioned-interval machinery stays well-defined).
//! Segments emitted from it are always re-resolved against the physical
//! timeline first; the synthetic version and shard specs never reach
//! downstream consumers.

use std::collections::{BTreeMap, BTreeSet};

use crate::granularity::Granularity;
use crate::interval::Interval;
use crate::segment::{DataSegment, ShardSpec};
use crate::timeline::{Partitions, VersionedSegmentTimeline};
use crate::PlannerResult;

pub(crate) fn regranulated_timeline(
    timeline: &VersionedSegmentTimeline,
    granularity: Granularity,
    synthetic_version: &str,
) -> PlannerResult<VersionedSegmentTimeline> {
    let segments = timeline.find_non_overshadowed(&Interval::ETERNITY, Partitions::OnlyComplete);

    // A segment whose interval crosses bucket boundaries lands in several
    // buckets. The per-bucket sets are ordered so partition numbering below
    // is deterministic.
    let mut buckets: BTreeMap<Interval, BTreeSet<DataSegment>> = BTreeMap::new();
    for segment in segments {
        for bucket in granularity.iter_buckets(segment.interval()) {
            buckets.entry(bucket).or_default().insert(segment.clone());
        }
    }

    let mut regranulated = VersionedSegmentTimeline::default();
    for (bucket, bucket_segments) in buckets {
        let partitions = bucket_segments.len() as u32;
        for (partition_num, segment) in bucket_segments.into_iter().enumerate() {
            let shard_spec = ShardSpec::new(partition_num as u32, partitions)?;
            regranulated.add(
                bucket,
                synthetic_version.to_string(),
                segment.with_shard_spec(shard_spec),
            );
        }
    }
    Ok(regranulated)
}
