//! Per-datasource compaction policy, as declared by the operator.

use chrono::TimeDelta;

use crate::spec::{DimensionsSpec, GranularitySpec, IndexSpec, PartitionsSpec, TransformSpec};

/// 400 MB, the default ceiling on the bytes a single compaction batch may
/// pull in.
pub const DEFAULT_INPUT_SEGMENT_SIZE_BYTES: u64 = 400 * 1024 * 1024;

/// The operator's declared compaction policy for one datasource.
///
/// Every optional field means "do not constrain on this dimension". The
/// required fields have conventional defaults, so configs are typically
/// written as struct literals over [`Default`]:
///
/// ```
/// use compaction_kernel::DataSourceCompactionConfig;
///
/// let config = DataSourceCompactionConfig {
///     input_segment_size_bytes: 1024 * 1024 * 1024,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceCompactionConfig {
    /// Budget on the summed byte size of one batch of input segments.
    pub input_segment_size_bytes: u64,
    /// How much of the newest data to leave alone, measured back from the
    /// end of the latest segment.
    pub skip_offset_from_latest: TimeDelta,
    /// Row bound folded into the effective dynamic partitions spec when no
    /// explicit partitions spec is set.
    pub max_rows_per_segment: Option<u64>,
    /// Total-row bound folded into the effective dynamic partitions spec;
    /// absent means unbounded.
    pub max_total_rows: Option<u64>,
    pub partitions_spec: Option<PartitionsSpec>,
    pub index_spec: Option<IndexSpec>,
    pub granularity_spec: Option<GranularitySpec>,
    pub dimensions_spec: Option<DimensionsSpec>,
    pub transform_spec: Option<TransformSpec>,
    /// Desired metric definitions, compared against the stored ones as an
    /// ordered array. `None` or empty constrains nothing.
    pub metrics_spec: Option<Vec<serde_json::Value>>,
}

impl Default for DataSourceCompactionConfig {
    fn default() -> Self {
        Self {
            input_segment_size_bytes: DEFAULT_INPUT_SEGMENT_SIZE_BYTES,
            skip_offset_from_latest: TimeDelta::days(1),
            max_rows_per_segment: None,
            max_total_rows: None,
            partitions_spec: None,
            index_spec: None,
            granularity_spec: None,
            dimensions_spec: None,
            transform_spec: None,
            metrics_spec: None,
        }
    }
}

impl DataSourceCompactionConfig {
    /// The partitions spec candidate segments are compared against: the
    /// configured one (dynamic form normalized), or a dynamic spec built
    /// from the row bounds when none is configured.
    pub fn effective_partitions_spec(&self) -> PartitionsSpec {
        match &self.partitions_spec {
            Some(spec) => spec.clone().normalized(),
            None => {
                PartitionsSpec::dynamic(self.max_rows_per_segment, self.max_total_rows).normalized()
            }
        }
    }

    /// The index spec candidate segments are compared against; defaults
    /// apply when the config leaves it open.
    pub fn effective_index_spec(&self) -> IndexSpec {
        self.index_spec.clone().unwrap_or_default()
    }

    /// The segment granularity the operator wants, if any.
    pub fn segment_granularity(&self) -> Option<crate::granularity::Granularity> {
        self.granularity_spec
            .as_ref()
            .and_then(|spec| spec.segment_granularity)
    }
}
