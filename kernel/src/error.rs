//! Error types for the compaction kernel.

/// A [`std::result::Result`] that has the kernel [`Error`] as the error variant.
pub type PlannerResult<T, E = Error> = std::result::Result<T, E>;

/// All the errors the compaction kernel can surface.
///
/// Construction-time errors ([`Error::UnknownDatasource`]) are raised to the
/// caller immediately. Per-batch recoverable conditions (oversized batch,
/// batch already in the desired state, duplicate virtual bucket) are never
/// errors; they are absorbed into the planner statistics. Structural
/// invariant violations abort iteration but never the process.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A generic error with a message
    #[error("Generic compaction kernel error: {0}")]
    Generic(String),

    /// A datasource was configured for compaction but has no timeline.
    #[error("Unknown datasource: {0}")]
    UnknownDatasource(String),

    /// A stored compaction-state sub-document failed to decode into the
    /// expected shape. Carries the owning datasource and segment id so the
    /// offending segment can be located.
    #[error("Corrupt compaction state on segment {segment_id} of datasource {datasource}: {source}")]
    CorruptCompactionState {
        datasource: String,
        segment_id: String,
        source: serde_json::Error,
    },

    /// The timeline handed the planner something it guarantees cannot
    /// happen (an empty compactible holder, a missing first/last holder on
    /// a non-empty timeline). Indicates a timeline-library bug.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Normal terminal signal: `next_batch` was called on a drained planner.
    #[error("No more segment batches to compact")]
    EndOfIteration,
}

// Convenience constructors. Use those when an error type string is inlined.
impl Error {
    pub fn generic(msg: impl ToString) -> Self {
        Self::Generic(msg.to_string())
    }

    pub fn unknown_datasource(datasource: impl ToString) -> Self {
        Self::UnknownDatasource(datasource.to_string())
    }

    pub fn invariant_violation(msg: impl ToString) -> Self {
        Self::InvariantViolation(msg.to_string())
    }

    pub(crate) fn corrupt_compaction_state(
        datasource: impl ToString,
        segment_id: impl ToString,
        source: serde_json::Error,
    ) -> Self {
        Self::CorruptCompactionState {
            datasource: datasource.to_string(),
            segment_id: segment_id.to_string(),
            source,
        }
    }
}
