//! Segments: the immutable, self-describing data files of the store, and
//! the compaction state they carry.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::spec::{DimensionsSpec, PartitionsSpec};
use crate::utils::require;
use crate::{Error, PlannerResult, VersionTag};

/// Position of a segment within its version's time chunk: partition
/// `partition_num` out of `partitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSpec {
    partition_num: u32,
    partitions: u32,
}

impl ShardSpec {
    pub fn new(partition_num: u32, partitions: u32) -> PlannerResult<Self> {
        require!(
            partition_num < partitions,
            Error::generic(format!(
                "Invalid shard spec: partition {partition_num} out of {partitions}"
            ))
        );
        Ok(Self {
            partition_num,
            partitions,
        })
    }

    pub fn partition_num(&self) -> u32 {
        self.partition_num
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }
}

/// The policy a segment was last compacted under, as recorded on the segment
/// itself.
///
/// The partitions and dimensions specs are stored in typed form. The other
/// sub-fields arrive as opaque JSON documents and are only decoded when the
/// planner needs to compare them against the configured policy; a document
/// that fails to decode surfaces [`Error::CorruptCompactionState`] at that
/// point rather than at ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionState {
    pub partitions_spec: PartitionsSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions_spec: Option<DimensionsSpec>,
    /// Opaque index-spec document, decoded on demand into [`crate::spec::IndexSpec`].
    pub index_spec: serde_json::Value,
    /// Opaque granularity-spec document, decoded on demand into
    /// [`crate::spec::GranularitySpec`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity_spec: Option<serde_json::Value>,
    /// Opaque transform-spec document, decoded on demand into
    /// [`crate::spec::TransformSpec`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_spec: Option<serde_json::Value>,
    /// Opaque ordered array of metric definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_spec: Option<serde_json::Value>,
}

/// An immutable data file covering a half-open time interval within a
/// datasource, at a version, holding one partition of that version's time
/// chunk.
///
/// Two segments with the same `(datasource, interval, version,
/// partition_num)` are the same segment; equality, ordering and hashing all
/// use exactly that identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSegment {
    datasource: String,
    interval: Interval,
    version: VersionTag,
    shard_spec: ShardSpec,
    size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_compaction_state: Option<CompactionState>,
}

impl DataSegment {
    pub fn new(
        datasource: impl Into<String>,
        interval: Interval,
        version: impl Into<VersionTag>,
        shard_spec: ShardSpec,
        size: u64,
        last_compaction_state: Option<CompactionState>,
    ) -> Self {
        Self {
            datasource: datasource.into(),
            interval,
            version: version.into(),
            shard_spec,
            size,
            last_compaction_state,
        }
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    pub fn shard_spec(&self) -> &ShardSpec {
        &self.shard_spec
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_compaction_state(&self) -> Option<&CompactionState> {
        self.last_compaction_state.as_ref()
    }

    /// The display identity of this segment:
    /// `{datasource}_{start}_{end}_{version}_{partition}`.
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.datasource,
            self.interval.start().to_rfc3339(),
            self.interval.end().to_rfc3339(),
            self.version,
            self.shard_spec.partition_num()
        )
    }

    /// A copy of this segment occupying a different partition slot. Used
    /// when re-binning segments into a regranulated timeline.
    pub fn with_shard_spec(&self, shard_spec: ShardSpec) -> Self {
        Self {
            shard_spec,
            ..self.clone()
        }
    }

    fn identity(&self) -> (&str, &Interval, &VersionTag, u32) {
        (
            &self.datasource,
            &self.interval,
            &self.version,
            self.shard_spec.partition_num,
        )
    }
}

impl PartialEq for DataSegment {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for DataSegment {}

impl PartialOrd for DataSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for DataSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
