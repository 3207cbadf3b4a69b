//! Time-bucket granularities. A granularity slices the absolute timeline
//! into aligned, adjacent buckets (hours, days, ISO weeks, months, years)
//! and answers three questions: which bucket does an instant fall in, which
//! buckets does an interval touch, and is an interval exactly one bucket.

use chrono::{DateTime, Datelike as _, Months, NaiveTime, TimeDelta, Timelike as _, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::interval::Interval;

/// A standard time-bucket granularity.
///
/// The serialized form is the uppercase name (`"DAY"`, `"MONTH"`, ...),
/// which is the wire form stored granularity documents use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Aligns `instant` down to the nearest bucket boundary.
    pub fn bucket_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let date = instant.date_naive();
        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        match self {
            Granularity::Hour => day_start + TimeDelta::hours(instant.hour() as i64),
            Granularity::Day => day_start,
            // ISO weeks start on Monday
            Granularity::Week => {
                day_start - TimeDelta::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => {
                // day 1 exists in every month
                let first = date.with_day(1).unwrap();
                first.and_time(NaiveTime::MIN).and_utc()
            }
            Granularity::Year => {
                // January 1st exists in every year
                let first = date.with_day(1).unwrap().with_month(1).unwrap();
                first.and_time(NaiveTime::MIN).and_utc()
            }
        }
    }

    /// The first boundary strictly after the bucket containing
    /// `bucket_start`. `bucket_start` must be aligned.
    fn next_bucket_start(&self, bucket_start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hour => bucket_start + TimeDelta::hours(1),
            Granularity::Day => bucket_start + TimeDelta::days(1),
            Granularity::Week => bucket_start + TimeDelta::days(7),
            // month arithmetic only fails past the end of representable time
            Granularity::Month => bucket_start.checked_add_months(Months::new(1)).unwrap(),
            Granularity::Year => bucket_start.checked_add_months(Months::new(12)).unwrap(),
        }
    }

    /// Enumerates every aligned bucket intersecting `interval` in increasing
    /// order. An interval spanning several buckets yields each of them; an
    /// empty interval yields none.
    pub fn iter_buckets(&self, interval: &Interval) -> BucketIterator {
        BucketIterator {
            granularity: *self,
            cursor: self.bucket_start(interval.start()),
            end: interval.end(),
        }
    }

    /// True iff `interval` is exactly one aligned bucket of this
    /// granularity.
    pub fn is_aligned(&self, interval: &Interval) -> bool {
        let start = interval.start();
        self.bucket_start(start) == start && self.next_bucket_start(start) == interval.end()
    }
}

/// Iterator over the aligned buckets intersecting an interval. See
/// [`Granularity::iter_buckets`].
#[derive(Debug)]
pub struct BucketIterator {
    granularity: Granularity,
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Iterator for BucketIterator {
    type Item = Interval;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let next = self.granularity.next_bucket_start(self.cursor);
        // cursor < next by construction
        let bucket = Interval::new(self.cursor, next).unwrap();
        self.cursor = next;
        Some(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_start() {
        let instant = Utc.with_ymd_and_hms(2020, 2, 5, 13, 44, 31).unwrap();
        assert_eq!(Granularity::Hour.bucket_start(instant), ts(2020, 2, 5, 13));
        assert_eq!(Granularity::Day.bucket_start(instant), ts(2020, 2, 5, 0));
        // 2020-02-05 is a Wednesday; the ISO week starts on Monday the 3rd
        assert_eq!(Granularity::Week.bucket_start(instant), ts(2020, 2, 3, 0));
        assert_eq!(Granularity::Month.bucket_start(instant), ts(2020, 2, 1, 0));
        assert_eq!(Granularity::Year.bucket_start(instant), ts(2020, 1, 1, 0));
    }

    #[test]
    fn test_iter_buckets_splits_crossing_interval() {
        // A weekly interval crossing a month boundary touches both months
        let week = Interval::new(ts(2020, 1, 28, 0), ts(2020, 2, 3, 0)).unwrap();
        let buckets: Vec<_> = Granularity::Month.iter_buckets(&week).collect();
        assert_eq!(
            buckets,
            vec![
                Interval::new(ts(2020, 1, 1, 0), ts(2020, 2, 1, 0)).unwrap(),
                Interval::new(ts(2020, 2, 1, 0), ts(2020, 3, 1, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_iter_buckets_within_single_bucket() {
        let week = Interval::new(ts(2020, 2, 3, 0), ts(2020, 2, 10, 0)).unwrap();
        let buckets: Vec<_> = Granularity::Month.iter_buckets(&week).collect();
        assert_eq!(
            buckets,
            vec![Interval::new(ts(2020, 2, 1, 0), ts(2020, 3, 1, 0)).unwrap()]
        );
    }

    #[test]
    fn test_iter_buckets_aligned_multi_day() {
        let three_days = Interval::new(ts(2024, 1, 1, 0), ts(2024, 1, 4, 0)).unwrap();
        let buckets: Vec<_> = Granularity::Day.iter_buckets(&three_days).collect();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].start(), ts(2024, 1, 1, 0));
        assert_eq!(buckets[2].end(), ts(2024, 1, 4, 0));
    }

    #[test]
    fn test_iter_buckets_empty_interval() {
        let empty = Interval::new(ts(2024, 1, 1, 0), ts(2024, 1, 1, 0)).unwrap();
        assert_eq!(Granularity::Day.iter_buckets(&empty).count(), 0);
    }

    #[test]
    fn test_is_aligned() {
        let jan = Interval::new(ts(2024, 1, 1, 0), ts(2024, 2, 1, 0)).unwrap();
        assert!(Granularity::Month.is_aligned(&jan));
        assert!(!Granularity::Day.is_aligned(&jan));
        assert!(!Granularity::Year.is_aligned(&jan));

        let day = Interval::new(ts(2024, 1, 1, 0), ts(2024, 1, 2, 0)).unwrap();
        assert!(Granularity::Day.is_aligned(&day));
        // Two adjacent buckets are not aligned to one
        let two_days = Interval::new(ts(2024, 1, 1, 0), ts(2024, 1, 3, 0)).unwrap();
        assert!(!Granularity::Day.is_aligned(&two_days));

        // 2024-01-01 is a Monday
        let week = Interval::new(ts(2024, 1, 1, 0), ts(2024, 1, 8, 0)).unwrap();
        assert!(Granularity::Week.is_aligned(&week));
        let off_week = Interval::new(ts(2024, 1, 2, 0), ts(2024, 1, 9, 0)).unwrap();
        assert!(!Granularity::Week.is_aligned(&off_week));
    }

    #[test]
    fn test_wire_form_round_trip() {
        let decoded: Granularity = serde_json::from_str("\"MONTH\"").unwrap();
        assert_eq!(decoded, Granularity::Month);
        assert_eq!(serde_json::to_string(&Granularity::Day).unwrap(), "\"DAY\"");
        assert_eq!("WEEK".parse::<Granularity>().unwrap(), Granularity::Week);
        assert_eq!(Granularity::Year.to_string(), "YEAR");
    }
}
