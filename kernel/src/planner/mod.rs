//! The compaction planner: iterates every segment of the configured
//! datasources from the newest to the oldest, yielding one compactible
//! batch at a time.
//!
//! Construction ingests per-datasource timelines, compaction configs and
//! skip intervals. For each datasource it optionally re-bins the timeline
//! into the configured segment granularity, computes the search window,
//! and seeds a single global queue with the datasource's newest batch.
//! [`NewestSegmentFirstIterator::next_batch`] pops the globally newest
//! batch and re-fills the queue from that batch's datasource, so batches
//! across all datasources come out in non-increasing umbrella-interval
//! order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use chrono::Utc;
use itertools::Itertools as _;
use tracing::{debug, warn};

use crate::config::DataSourceCompactionConfig;
use crate::interval::Interval;
use crate::segment::DataSegment;
use crate::statistics::CompactionStatistics;
use crate::timeline::VersionedSegmentTimeline;
use crate::utils::require;
use crate::{Error, PlannerResult};

mod cursor;
mod needs_compaction;
mod regranulate;
mod search;


use cursor::CompactibleHolderCursor;
use needs_compaction::needs_compaction;
use regranulate::regranulated_timeline;
use search::find_initial_search_interval;

/// An ordered batch of segments sharing a datasource, with its summed byte
/// size cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentBatch {
    segments: Vec<DataSegment>,
    total_size: u64,
}

impl SegmentBatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(segments: Vec<DataSegment>) -> Self {
        let total_size = segments.iter().map(|segment| segment.size()).sum();
        Self {
            segments,
            total_size,
        }
    }

    pub fn segments(&self) -> &[DataSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<DataSegment> {
        self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn num_segments(&self) -> u64 {
        self.segments.len() as u64
    }

    /// Count of distinct stored segment intervals in the batch.
    pub fn num_intervals(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| segment.interval())
            .unique()
            .count() as u64
    }

    /// The smallest interval containing every segment of the batch, by the
    /// stored segment intervals. `None` for an empty batch.
    pub fn umbrella_interval(&self) -> Option<Interval> {
        Interval::umbrella(self.segments.iter().map(|segment| segment.interval()))
    }
}

/// Queue entry: one pending batch, keyed by its umbrella interval. The heap
/// ordering makes the entry with the greatest (start, end) pop first.
#[derive(Debug)]
struct QueueEntry {
    interval: Interval,
    segments: Vec<DataSegment>,
}

impl QueueEntry {
    fn try_new(segments: Vec<DataSegment>) -> PlannerResult<Self> {
        let interval = Interval::umbrella(segments.iter().map(|segment| segment.interval()))
            .ok_or_else(|| Error::invariant_violation("queue entry must hold segments"))?;
        Ok(Self { interval, segments })
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.interval == other.interval
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.interval.cmp(&other.interval)
    }
}

fn collect_segment_statistics(
    statistics: &mut HashMap<String, CompactionStatistics>,
    datasource: &str,
    batch: &SegmentBatch,
) {
    if batch.is_empty() {
        return;
    }
    let stats = statistics.entry(datasource.to_string()).or_default();
    stats.increment_bytes(batch.total_size());
    stats.increment_segment_count(batch.num_segments());
    stats.increment_interval_count(batch.num_intervals());
}

/// Iterates the segments of all configured datasources newest-first,
/// yielding one batch of compaction input per call.
///
/// The planner owns its cursors, queue, emitted-interval sets and
/// statistics; timelines are borrowed and never retained past the
/// planner's lifetime. It is single-threaded and never blocks.
#[derive(Debug)]
pub struct NewestSegmentFirstIterator<'a> {
    compaction_configs: HashMap<String, DataSourceCompactionConfig>,
    timeline_cursors: HashMap<String, CompactibleHolderCursor<'a>>,
    compacted_segments: HashMap<String, CompactionStatistics>,
    skipped_segments: HashMap<String, CompactionStatistics>,
    /// Umbrella intervals already handed out per datasource. Only consulted
    /// under regranulation, where several virtual buckets can resolve back
    /// to the same physical batch.
    intervals_compacted: HashMap<String, HashSet<Interval>>,
    queue: BinaryHeap<QueueEntry>,
}

impl<'a> NewestSegmentFirstIterator<'a> {
    /// Builds a planner over the given timelines.
    ///
    /// Every configured datasource must have a timeline
    /// ([`Error::UnknownDatasource`] otherwise). Datasources with a
    /// timeline but no config are ignored; datasources with an empty
    /// timeline are skipped.
    pub fn try_new(
        compaction_configs: HashMap<String, DataSourceCompactionConfig>,
        timelines: &'a HashMap<String, VersionedSegmentTimeline>,
        skip_intervals: &HashMap<String, Vec<Interval>>,
    ) -> PlannerResult<Self> {
        for datasource in compaction_configs.keys() {
            require!(
                timelines.contains_key(datasource),
                Error::unknown_datasource(datasource)
            );
        }

        let mut planner = Self {
            compaction_configs,
            timeline_cursors: HashMap::new(),
            compacted_segments: HashMap::new(),
            skipped_segments: HashMap::new(),
            intervals_compacted: HashMap::new(),
            queue: BinaryHeap::new(),
        };

        // One synthetic version for every regranulated bucket built in this
        // construction; it never leaks into emitted segments.
        let synthetic_version = Utc::now().to_rfc3339();

        for (datasource, config) in &planner.compaction_configs {
            let Some(timeline) = timelines.get(datasource) else {
                continue;
            };
            if timeline.is_empty() {
                debug!("Timeline for datasource [{datasource}] is empty. Skipping.");
                continue;
            }

            let datasource_skips = skip_intervals.get(datasource).map(Vec::as_slice);
            let cursor = match config.segment_granularity() {
                Some(granularity) => {
                    let regranulated =
                        regranulated_timeline(timeline, granularity, &synthetic_version)?;
                    if regranulated.is_empty() {
                        continue;
                    }
                    let search_intervals = find_initial_search_interval(
                        datasource,
                        &regranulated,
                        config.skip_offset_from_latest,
                        Some(granularity),
                        datasource_skips,
                        &mut planner.skipped_segments,
                    )?;
                    if search_intervals.is_empty() {
                        continue;
                    }
                    CompactibleHolderCursor::new(&regranulated, &search_intervals, Some(timeline))
                }
                None => {
                    let search_intervals = find_initial_search_interval(
                        datasource,
                        timeline,
                        config.skip_offset_from_latest,
                        None,
                        datasource_skips,
                        &mut planner.skipped_segments,
                    )?;
                    if search_intervals.is_empty() {
                        continue;
                    }
                    CompactibleHolderCursor::new(timeline, &search_intervals, None)
                }
            };
            planner
                .timeline_cursors
                .insert(datasource.clone(), cursor);
        }

        let datasources: Vec<String> = planner.compaction_configs.keys().cloned().collect();
        for datasource in datasources {
            planner.update_queue(&datasource)?;
        }
        Ok(planner)
    }

    /// True iff another batch is pending.
    pub fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Pops the batch with the newest umbrella interval across all
    /// datasources, re-seeds the queue from that batch's datasource, and
    /// returns the batch. [`Error::EndOfIteration`] once drained.
    pub fn next_batch(&mut self) -> PlannerResult<Vec<DataSegment>> {
        let entry = self.queue.pop().ok_or(Error::EndOfIteration)?;
        let datasource = entry
            .segments
            .first()
            .ok_or_else(|| Error::invariant_violation("queue entry must not be empty"))?
            .datasource()
            .to_string();
        self.update_queue(&datasource)?;
        Ok(entry.segments)
    }

    /// Live per-datasource counters of segments found already in the
    /// desired state.
    pub fn compacted_statistics(&self) -> &HashMap<String, CompactionStatistics> {
        &self.compacted_segments
    }

    /// Live per-datasource counters of segments skipped (inside a skip
    /// interval, or in an oversized batch).
    pub fn skipped_statistics(&self) -> &HashMap<String, CompactionStatistics> {
        &self.skipped_segments
    }

    /// Finds the next batch for the given datasource and enqueues it if
    /// non-empty.
    fn update_queue(&mut self, datasource: &str) -> PlannerResult<()> {
        let Some(config) = self.compaction_configs.get(datasource).cloned() else {
            warn!("No compaction config for datasource [{datasource}]. Skipping.");
            return Ok(());
        };
        let batch = self.find_segments_to_compact(datasource, &config)?;
        if !batch.is_empty() {
            self.queue.push(QueueEntry::try_new(batch.into_segments())?);
        }
        Ok(())
    }

    /// Walks the datasource's cursor newest-first until a batch both fits
    /// the size budget and diverges from the configured policy. Batches
    /// already in the desired state are counted as compacted; batches that
    /// need work but blow the budget are counted as skipped.
    fn find_segments_to_compact(
        &mut self,
        datasource: &str,
        config: &DataSourceCompactionConfig,
    ) -> PlannerResult<SegmentBatch> {
        let Some(cursor) = self.timeline_cursors.get_mut(datasource) else {
            debug!("No compactible timeline for datasource [{datasource}].");
            return Ok(SegmentBatch::empty());
        };
        let input_segment_size = config.input_segment_size_bytes;

        while let Some(segments) = cursor.next_candidates() {
            let candidates = SegmentBatch::new(segments);
            require!(
                !candidates.is_empty(),
                Error::invariant_violation(format!(
                    "cursor yielded an empty batch for datasource [{datasource}]"
                ))
            );

            let fits = candidates.total_size() <= input_segment_size;
            let needs = needs_compaction(config, &candidates)?;

            if fits && needs {
                if config.segment_granularity().is_some() {
                    let umbrella = candidates.umbrella_interval().ok_or_else(|| {
                        Error::invariant_violation("umbrella of a non-empty batch")
                    })?;
                    let emitted = self
                        .intervals_compacted
                        .entry(datasource.to_string())
                        .or_default();
                    // Several virtual buckets can resolve to this umbrella;
                    // hand it out once
                    if !emitted.insert(umbrella) {
                        continue;
                    }
                }
                return Ok(candidates);
            } else if !needs {
                collect_segment_statistics(&mut self.compacted_segments, datasource, &candidates);
            } else {
                collect_segment_statistics(&mut self.skipped_segments, datasource, &candidates);
                warn!(
                    "Total size [{}] of batch for datasource [{datasource}] is larger than the \
                     input segment size [{input_segment_size}]. Continuing to the next holder.",
                    candidates.total_size(),
                );
            }
        }
        debug!("All segments of datasource [{datasource}] look good. Nothing to compact.");
        Ok(SegmentBatch::empty())
    }
}

impl Iterator for NewestSegmentFirstIterator<'_> {
    type Item = PlannerResult<Vec<DataSegment>>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        Some(self.next_batch())
    }
}
