//! The config-vs-state diff: does a candidate batch diverge from the
//! operator's declared policy on any dimension?

use serde::de::DeserializeOwned;
use tracing::info;

use super::SegmentBatch;
use crate::config::DataSourceCompactionConfig;
use crate::segment::DataSegment;
use crate::spec::{GranularitySpec, IndexSpec, TransformSpec};
use crate::{Error, PlannerResult};

fn decode_document<T: DeserializeOwned>(
    document: &serde_json::Value,
    segment: &DataSegment,
) -> PlannerResult<T> {
    serde_json::from_value(document.clone()).map_err(|source| {
        Error::corrupt_compaction_state(segment.datasource(), segment.id(), source)
    })
}

/// True if the batch must be compacted to match `config`. The batch must be
/// non-empty.
///
/// Stored state arrives partly as opaque documents; they are decoded here,
/// on demand, and a document that does not have the expected shape surfaces
/// [`Error::CorruptCompactionState`].
pub(crate) fn needs_compaction(
    config: &DataSourceCompactionConfig,
    candidates: &SegmentBatch,
) -> PlannerResult<bool> {
    let segments = candidates.segments();
    let first = segments
        .first()
        .ok_or_else(|| Error::invariant_violation("needs-compaction check on empty candidates"))?;

    let Some(last_state) = first.last_compaction_state() else {
        info!("Candidate segment [{}] was never compacted. Needs compaction.", first.id());
        return Ok(true);
    };

    let all_same_state = segments
        .iter()
        .all(|segment| segment.last_compaction_state() == Some(last_state));
    if !all_same_state {
        info!(
            "[{}] candidate segments were compacted under different states. Needs compaction.",
            segments.len()
        );
        return Ok(true);
    }

    let configured_partitions = config.effective_partitions_spec();
    let stored_partitions = last_state.partitions_spec.clone().normalized();
    if configured_partitions != stored_partitions {
        info!(
            "Configured partitions spec [{configured_partitions:?}] differs from the stored one \
             [{stored_partitions:?}]. Needs compaction."
        );
        return Ok(true);
    }

    let stored_index: IndexSpec = decode_document(&last_state.index_spec, first)?;
    let configured_index = config.effective_index_spec();
    if stored_index != configured_index {
        info!(
            "Configured index spec [{configured_index:?}] differs from the stored one \
             [{stored_index:?}]. Needs compaction."
        );
        return Ok(true);
    }

    if let Some(configured_granularity_spec) = &config.granularity_spec {
        let stored_granularity_spec: Option<GranularitySpec> = last_state
            .granularity_spec
            .as_ref()
            .map(|document| decode_document(document, first))
            .transpose()?;

        if let Some(configured) = configured_granularity_spec.segment_granularity {
            let stored = stored_granularity_spec
                .as_ref()
                .and_then(|spec| spec.segment_granularity);
            match stored {
                // Compacted without a recorded segment granularity: any
                // candidate interval off the configured bucketing means the
                // physical layout disagrees with the policy.
                None => {
                    if segments
                        .iter()
                        .any(|segment| !configured.is_aligned(segment.interval()))
                    {
                        info!(
                            "Segments were compacted without a segment granularity and configured \
                             granularity [{configured}] disagrees with segment intervals. Needs compaction."
                        );
                        return Ok(true);
                    }
                }
                Some(stored) if stored != configured => {
                    info!(
                        "Configured segment granularity [{configured}] differs from the stored one \
                         [{stored}]. Needs compaction."
                    );
                    return Ok(true);
                }
                Some(_) => {}
            }
        }

        if let Some(configured_rollup) = configured_granularity_spec.rollup {
            let stored_rollup = stored_granularity_spec
                .as_ref()
                .and_then(|spec| spec.rollup);
            if stored_rollup != Some(configured_rollup) {
                info!(
                    "Configured rollup [{configured_rollup}] differs from the stored one \
                     [{stored_rollup:?}]. Needs compaction."
                );
                return Ok(true);
            }
        }

        if let Some(configured_query_granularity) = configured_granularity_spec.query_granularity {
            let stored_query_granularity = stored_granularity_spec
                .as_ref()
                .and_then(|spec| spec.query_granularity);
            if stored_query_granularity != Some(configured_query_granularity) {
                info!(
                    "Configured query granularity [{configured_query_granularity}] differs from \
                     the stored one [{stored_query_granularity:?}]. Needs compaction."
                );
                return Ok(true);
            }
        }
    }

    if let Some(configured_dimensions_spec) = &config.dimensions_spec {
        if let Some(configured_dimensions) = &configured_dimensions_spec.dimensions {
            let stored_dimensions = last_state
                .dimensions_spec
                .as_ref()
                .and_then(|spec| spec.dimensions.as_ref());
            if stored_dimensions != Some(configured_dimensions) {
                info!("Configured dimensions differ from the stored ones. Needs compaction.");
                return Ok(true);
            }
        }
    }

    if let Some(configured_transform_spec) = &config.transform_spec {
        if let Some(configured_filter) = &configured_transform_spec.filter {
            let stored_transform: Option<TransformSpec> = last_state
                .transform_spec
                .as_ref()
                .map(|document| decode_document(document, first))
                .transpose()?;
            let stored_filter = stored_transform
                .as_ref()
                .and_then(|transform| transform.filter.as_ref());
            if stored_filter != Some(configured_filter) {
                info!("Configured filter differs from the stored one. Needs compaction.");
                return Ok(true);
            }
        }
    }

    if let Some(configured_metrics) = &config.metrics_spec {
        if !configured_metrics.is_empty() {
            let stored_metrics: Option<Vec<serde_json::Value>> = last_state
                .metrics_spec
                .as_ref()
                .map(|document| decode_document::<Vec<serde_json::Value>>(document, first))
                .transpose()?
                .filter(|metrics| !metrics.is_empty());
            if stored_metrics.as_ref() != Some(configured_metrics) {
                info!("Configured metrics spec differs from the stored one. Needs compaction.");
                return Ok(true);
            }
        }
    }

    Ok(false)
}
