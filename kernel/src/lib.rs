//! # compaction-kernel
//!
//! A compaction planner for time-partitioned segment stores. A coordinator
//! periodically asks the planner which groups of segments to compact next,
//! and in what order; the planner scans a per-datasource timeline of
//! immutable segments and yields batches that are eligible, fit the
//! configured size budget, and diverge from the operator's declared
//! compaction policy.
//!
//! The crate is a library, not a process: all data is supplied at
//! construction, nothing blocks, and the planner's only interface is a
//! constructor and an iterator.
//!
//! ```
//! use std::collections::HashMap;
//!
//! use compaction_kernel::{
//!     DataSourceCompactionConfig, DataSegment, Interval, NewestSegmentFirstIterator, ShardSpec,
//!     VersionedSegmentTimeline,
//! };
//! use chrono::{TimeDelta, TimeZone as _, Utc};
//!
//! # fn main() -> compaction_kernel::PlannerResult<()> {
//! let interval = Interval::new(
//!     Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
//! )?;
//! let segment = DataSegment::new("wiki", interval, "v1", ShardSpec::new(0, 1)?, 1024, None);
//!
//! let timelines = HashMap::from([(
//!     "wiki".to_string(),
//!     VersionedSegmentTimeline::from_segments([segment]),
//! )]);
//! let configs = HashMap::from([(
//!     "wiki".to_string(),
//!     DataSourceCompactionConfig {
//!         skip_offset_from_latest: TimeDelta::zero(),
//!         ..Default::default()
//!     },
//! )]);
//!
//! let mut planner = NewestSegmentFirstIterator::try_new(configs, &timelines, &HashMap::new())?;
//! while planner.has_next() {
//!     let batch = planner.next_batch()?;
//!     println!("compact {} segments together", batch.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod granularity;
pub mod interval;
pub mod planner;
pub mod segment;
pub mod spec;
pub mod statistics;
pub mod timeline;
mod utils;

pub use config::{DataSourceCompactionConfig, DEFAULT_INPUT_SEGMENT_SIZE_BYTES};
pub use error::{Error, PlannerResult};
pub use granularity::Granularity;
pub use interval::Interval;
pub use planner::{NewestSegmentFirstIterator, SegmentBatch};
pub use segment::{CompactionState, DataSegment, ShardSpec};
pub use statistics::CompactionStatistics;
pub use timeline::{Partitions, TimelineObjectHolder, VersionedSegmentTimeline};

/// Lexicographically comparable version tag of a segment. The store writes
/// wall-clock timestamps rendered as ISO-8601, which order the way the
/// timeline needs without further parsing.
pub type VersionTag = String;
