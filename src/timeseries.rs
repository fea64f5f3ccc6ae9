use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::rates;

/// Daily trend charts show at most this many buckets.
pub const DEFAULT_TREND_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// First calendar day of the bucket containing `date`. Weeks start on Monday.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Granularity::Month => date.with_day(1).unwrap_or(date),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day | Granularity::Week => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub period: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub registrations: u64,
    pub enrollments: u64,
    pub conversion_rate: f64,
}

/// Counts records per period in ascending order. Records without a timestamp
/// are skipped and periods with no records are not emitted.
pub fn bucket_counts<T, F>(records: &[T], timestamp: F, granularity: Granularity) -> Vec<TimeBucket>
where
    F: Fn(&T) -> Option<NaiveDateTime>,
{
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in records {
        if let Some(at) = timestamp(record) {
            *buckets
                .entry(granularity.bucket_start(at.date()))
                .or_insert(0) += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(start, count)| TimeBucket {
            period: granularity.label(start),
            count,
        })
        .collect()
}

/// Registrations and the subset flagged as enrolled, per period.
pub fn conversion_trend<T, F, E>(
    records: &[T],
    timestamp: F,
    enrolled: E,
    granularity: Granularity,
) -> Vec<TrendPoint>
where
    F: Fn(&T) -> Option<NaiveDateTime>,
    E: Fn(&T) -> bool,
{
    let mut buckets: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for record in records {
        if let Some(at) = timestamp(record) {
            let entry = buckets
                .entry(granularity.bucket_start(at.date()))
                .or_insert((0, 0));
            entry.0 += 1;
            if enrolled(record) {
                entry.1 += 1;
            }
        }
    }

    buckets
        .into_iter()
        .map(|(start, (registrations, enrollments))| TrendPoint {
            period: granularity.label(start),
            registrations,
            enrollments,
            conversion_rate: rates::rate(enrollments, registrations),
        })
        .collect()
}

/// Keeps the last `limit` entries of an ascending series.
pub fn most_recent<T: Clone>(series: &[T], limit: usize) -> Vec<T> {
    let start = series.len().saturating_sub(limit);
    series[start..].to_vec()
}
