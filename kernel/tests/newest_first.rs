//! End-to-end planner scenarios driven purely through the public API.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, TimeZone as _, Utc};

use compaction_kernel::spec::GranularitySpec;
use compaction_kernel::{
    DataSegment, DataSourceCompactionConfig, Granularity, Interval, NewestSegmentFirstIterator,
    PlannerResult, ShardSpec, VersionedSegmentTimeline,
};

fn ts(m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, m, d, h, 0, 0).unwrap()
}

fn day_interval(d: u32) -> Interval {
    Interval::new(ts(1, d, 0), ts(1, d + 1, 0)).unwrap()
}

fn daily_segment(datasource: &str, d: u32) -> DataSegment {
    DataSegment::new(
        datasource,
        day_interval(d),
        "v1",
        ShardSpec::new(0, 1).unwrap(),
        1024,
        None,
    )
}

fn config_with_zero_skip() -> DataSourceCompactionConfig {
    DataSourceCompactionConfig {
        input_segment_size_bytes: 1_000_000_000,
        skip_offset_from_latest: TimeDelta::zero(),
        ..Default::default()
    }
}

fn drain(planner: &mut NewestSegmentFirstIterator<'_>) -> PlannerResult<Vec<Vec<DataSegment>>> {
    let mut batches = Vec::new();
    while planner.has_next() {
        batches.push(planner.next_batch()?);
    }
    Ok(batches)
}

#[test]
fn newest_first_across_two_datasources() -> PlannerResult<()> {
    let _ = tracing_subscriber::fmt::try_init();

    // a covers [01-01, 01-05), b covers [01-03, 01-06)
    let timelines = HashMap::from([
        (
            "a".to_string(),
            VersionedSegmentTimeline::from_segments((1..=4).map(|d| daily_segment("a", d))),
        ),
        (
            "b".to_string(),
            VersionedSegmentTimeline::from_segments((3..=5).map(|d| daily_segment("b", d))),
        ),
    ]);
    let configs = HashMap::from([
        ("a".to_string(), config_with_zero_skip()),
        ("b".to_string(), config_with_zero_skip()),
    ]);

    let mut planner = NewestSegmentFirstIterator::try_new(configs, &timelines, &HashMap::new())?;
    let batches = drain(&mut planner)?;

    // Seven single-day batches, the globally newest first
    assert_eq!(batches.len(), 7);
    assert_eq!(batches[0][0].datasource(), "b");
    assert_eq!(batches[0][0].interval(), &day_interval(5));

    // Start-then-end order never increases across datasources
    let intervals: Vec<Interval> = batches.iter().map(|batch| *batch[0].interval()).collect();
    for pair in intervals.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
    assert_eq!(intervals.last().unwrap(), &day_interval(1));

    // Nothing was skipped or found in state
    assert!(planner.skipped_statistics().is_empty());
    assert!(planner.compacted_statistics().is_empty());
    Ok(())
}

#[test]
fn operator_skip_overlapping_tail_is_merged() -> PlannerResult<()> {
    // Daily segments [01-01, 01-05); tail = [01-04, 01-05)
    let timelines = HashMap::from([(
        "wiki".to_string(),
        VersionedSegmentTimeline::from_segments((1..=4).map(|d| daily_segment("wiki", d))),
    )]);
    let configs = HashMap::from([(
        "wiki".to_string(),
        DataSourceCompactionConfig {
            skip_offset_from_latest: TimeDelta::days(1),
            ..config_with_zero_skip()
        },
    )]);
    // The operator skip overlaps the tail and merges with it
    let skip_intervals = HashMap::from([(
        "wiki".to_string(),
        vec![Interval::new(ts(1, 4, 0), ts(1, 4, 12))?],
    )]);

    let mut planner = NewestSegmentFirstIterator::try_new(configs, &timelines, &skip_intervals)?;
    let batches = drain(&mut planner)?;

    // Only intervals strictly earlier than the merged tail are visited
    assert_eq!(batches.len(), 3);
    let merged_tail_start = ts(1, 4, 0);
    for batch in &batches {
        for segment in batch {
            assert!(segment.interval().end() <= merged_tail_start);
        }
    }

    // The day swallowed by the merged tail is accounted as skipped
    let skipped = &planner.skipped_statistics()["wiki"];
    assert_eq!(skipped.segment_count_compacted(), 1);
    assert_eq!(skipped.bytes_compacted(), 1024);
    Ok(())
}

#[test]
fn disjoint_operator_skip_punches_a_hole() -> PlannerResult<()> {
    let timelines = HashMap::from([(
        "wiki".to_string(),
        VersionedSegmentTimeline::from_segments((1..=6).map(|d| daily_segment("wiki", d))),
    )]);
    let configs = HashMap::from([("wiki".to_string(), config_with_zero_skip())]);
    let skip_intervals = HashMap::from([(
        "wiki".to_string(),
        vec![Interval::new(ts(1, 3, 0), ts(1, 5, 0))?],
    )]);

    let mut planner = NewestSegmentFirstIterator::try_new(configs, &timelines, &skip_intervals)?;
    let batches = drain(&mut planner)?;

    let emitted: Vec<Interval> = batches.iter().map(|batch| *batch[0].interval()).collect();
    assert_eq!(
        emitted,
        vec![
            day_interval(6),
            day_interval(5),
            day_interval(2),
            day_interval(1)
        ]
    );

    // No emitted segment intersects the skip interval
    let skip = Interval::new(ts(1, 3, 0), ts(1, 5, 0))?;
    for interval in &emitted {
        assert!(!interval.overlaps(&skip));
    }

    let skipped = &planner.skipped_statistics()["wiki"];
    assert_eq!(skipped.segment_count_compacted(), 2);
    Ok(())
}

#[test]
fn regranulation_month_resolves_and_dedups() -> PlannerResult<()> {
    // Two weekly segments, one crossing the January/February boundary
    let week1 = Interval::new(
        Utc.with_ymd_and_hms(2020, 1, 28, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 2, 3, 0, 0, 0).unwrap(),
    )?;
    let week2 = Interval::new(
        Utc.with_ymd_and_hms(2020, 2, 3, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 2, 10, 0, 0, 0).unwrap(),
    )?;
    let weekly = |interval: Interval| {
        DataSegment::new(
            "wiki",
            interval,
            "2020-02-11T00:00:00Z",
            ShardSpec::new(0, 1).unwrap(),
            2048,
            None,
        )
    };

    let timelines = HashMap::from([(
        "wiki".to_string(),
        VersionedSegmentTimeline::from_segments([weekly(week1), weekly(week2)]),
    )]);
    let configs = HashMap::from([(
        "wiki".to_string(),
        DataSourceCompactionConfig {
            granularity_spec: Some(GranularitySpec {
                segment_granularity: Some(Granularity::Month),
                ..Default::default()
            }),
            ..config_with_zero_skip()
        },
    )]);

    let mut planner = NewestSegmentFirstIterator::try_new(configs, &timelines, &HashMap::new())?;
    let batches = drain(&mut planner)?;

    // The February bucket resolves to both physical weeks, the January
    // bucket to the boundary-crossing week alone; each umbrella comes out
    // once, newest first
    assert_eq!(batches.len(), 2);
    let february: Vec<Interval> = batches[0].iter().map(|s| *s.interval()).collect();
    assert_eq!(february, vec![week1, week2]);
    let january: Vec<Interval> = batches[1].iter().map(|s| *s.interval()).collect();
    assert_eq!(january, vec![week1]);

    // The synthetic regranulation version never leaks
    for segment in batches.iter().flatten() {
        assert_eq!(segment.version(), "2020-02-11T00:00:00Z");
    }
    Ok(())
}

#[test]
fn size_budget_is_respected_on_every_batch() -> PlannerResult<()> {
    let sized = |d: u32, p: u32, partitions: u32, size: u64| {
        DataSegment::new(
            "wiki",
            day_interval(d),
            "v1",
            ShardSpec::new(p, partitions).unwrap(),
            size,
            None,
        )
    };
    // Day 1 fits; day 2 blows the budget as a whole
    let timelines = HashMap::from([(
        "wiki".to_string(),
        VersionedSegmentTimeline::from_segments([
            sized(1, 0, 2, 300),
            sized(1, 1, 2, 300),
            sized(2, 0, 3, 600),
            sized(2, 1, 3, 600),
            sized(2, 2, 3, 600),
        ]),
    )]);
    let configs = HashMap::from([(
        "wiki".to_string(),
        DataSourceCompactionConfig {
            input_segment_size_bytes: 1_000,
            skip_offset_from_latest: TimeDelta::zero(),
            ..Default::default()
        },
    )]);

    let mut planner = NewestSegmentFirstIterator::try_new(configs, &timelines, &HashMap::new())?;
    let batches = drain(&mut planner)?;

    assert_eq!(batches.len(), 1);
    let total: u64 = batches[0].iter().map(|s| s.size()).sum();
    assert!(total <= 1_000);
    assert_eq!(batches[0].len(), 2);

    let skipped = &planner.skipped_statistics()["wiki"];
    assert_eq!(skipped.bytes_compacted(), 1_800);
    assert_eq!(skipped.segment_count_compacted(), 3);
    Ok(())
}
