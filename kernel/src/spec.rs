//! The policy sub-specs a compaction config can constrain and a segment's
//! compaction state can record: partitioning, indexing, granularity,
//! transforms, dimensions.
//!
//! All of these decode from the store's JSON wire form. Equality is
//! structural; the needs-compaction diff relies on that.

use serde::{Deserialize, Serialize};

use crate::granularity::Granularity;

/// How the rows of a time chunk are split into segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PartitionsSpec {
    /// Best-effort splitting by row count alone.
    #[serde(rename_all = "camelCase")]
    Dynamic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_rows_per_segment: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_total_rows: Option<u64>,
    },
    /// Hash partitioning on a set of dimensions.
    #[serde(rename_all = "camelCase")]
    Hashed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        num_shards: Option<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        partition_dimensions: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_rows_per_segment: Option<u64>,
    },
}

impl PartitionsSpec {
    pub fn dynamic(max_rows_per_segment: Option<u64>, max_total_rows: Option<u64>) -> Self {
        Self::Dynamic {
            max_rows_per_segment,
            max_total_rows,
        }
    }

    /// A dynamic spec with an absent `max_total_rows` means "unbounded".
    /// Comparisons must not distinguish the two spellings, so dynamic specs
    /// are normalized to the explicit form first. Other spec kinds compare
    /// as written.
    pub fn normalized(self) -> Self {
        match self {
            Self::Dynamic {
                max_rows_per_segment,
                max_total_rows,
            } => Self::Dynamic {
                max_rows_per_segment,
                max_total_rows: Some(max_total_rows.unwrap_or(u64::MAX)),
            },
            other => other,
        }
    }
}

/// Bitmap index encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BitmapSpec {
    #[default]
    Roaring,
    Concise,
}

/// Column compression codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStrategy {
    #[default]
    Lz4,
    Lzf,
    Zstd,
    Uncompressed,
}

/// Encoding for long-typed columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongEncoding {
    #[default]
    Longs,
    Auto,
}

/// Physical layout of segment indexes. Every field has a well-known
/// default, so a partially-specified stored document decodes to the same
/// value a fully-spelled-out one does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSpec {
    #[serde(default)]
    pub bitmap: BitmapSpec,
    #[serde(default)]
    pub dimension_compression: CompressionStrategy,
    #[serde(default)]
    pub metric_compression: CompressionStrategy,
    #[serde(default)]
    pub long_encoding: LongEncoding,
}

/// Time-bucketing policy: segment granularity, query granularity, rollup.
/// Used both as the config form and as the decoded shape of the stored
/// granularity document. An absent field constrains nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranularitySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_granularity: Option<Granularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_granularity: Option<Granularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollup: Option<bool>,
}

/// Row transform applied at ingest: currently just the filter, carried as
/// an opaque predicate document and compared structurally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
}

/// The dimension columns of a segment, as an ordered list of opaque
/// dimension schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<serde_json::Value>>,
}
