//! Month-over-month and trailing-window KPI cards.
//!
//! Everything here is computed relative to an explicit `today` so the same
//! records always produce the same snapshot.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::models::{Advisory, Interaction, Prospect, TestResult};
use crate::rates;

const WEEK_DAYS: i64 = 7;
const MONTH_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealTimeMetrics {
    pub total_leads: u64,
    pub total_enrolled: u64,
    pub conversion_rate: f64,
    pub leads_this_month: u64,
    pub leads_previous_month: u64,
    pub enrolled_this_month: u64,
    pub enrolled_previous_month: u64,
    pub leads_trend: f64,
    pub enrolled_trend: f64,
    /// Difference in points between this and last month's conversion rate.
    pub conversion_trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationalKpis {
    pub new_prospects_week: u64,
    pub enrollments_month: u64,
    pub prospects_in_process: u64,
    pub recent_interactions: u64,
    pub recent_tests: u64,
    pub recent_advisories: u64,
    pub weekly_conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub reference_date: NaiveDate,
    pub real_time: RealTimeMetrics,
    pub operational: OperationalKpis,
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn previous_month_start(date: NaiveDate) -> NaiveDate {
    month_start(month_start(date) - Duration::days(1))
}

fn on_or_after(at: Option<NaiveDateTime>, start: NaiveDate) -> bool {
    at.is_some_and(|at| at.date() >= start)
}

fn in_range(at: Option<NaiveDateTime>, start: NaiveDate, end: NaiveDate) -> bool {
    at.is_some_and(|at| at.date() >= start && at.date() < end)
}

fn count_where<T>(records: &[T], predicate: impl Fn(&T) -> bool) -> u64 {
    records.iter().filter(|record| predicate(*record)).count() as u64
}

pub fn real_time(prospects: &[Prospect], today: NaiveDate) -> RealTimeMetrics {
    let current = month_start(today);
    let previous = previous_month_start(today);

    let total_leads = prospects.len() as u64;
    let total_enrolled = count_where(prospects, Prospect::is_enrolled);
    let leads_this_month = count_where(prospects, |p| on_or_after(p.registered_at, current));
    let leads_previous_month =
        count_where(prospects, |p| in_range(p.registered_at, previous, current));
    let enrolled_this_month = count_where(prospects, |p| {
        p.is_enrolled() && on_or_after(p.registered_at, current)
    });
    let enrolled_previous_month = count_where(prospects, |p| {
        p.is_enrolled() && in_range(p.registered_at, previous, current)
    });

    let conversion_trend = rates::rate(enrolled_this_month, leads_this_month)
        - rates::rate(enrolled_previous_month, leads_previous_month);

    RealTimeMetrics {
        total_leads,
        total_enrolled,
        conversion_rate: rates::rate(total_enrolled, total_leads),
        leads_this_month,
        leads_previous_month,
        enrolled_this_month,
        enrolled_previous_month,
        leads_trend: rates::percent_change(leads_this_month, leads_previous_month),
        enrolled_trend: rates::percent_change(enrolled_this_month, enrolled_previous_month),
        conversion_trend: rates::round_to(conversion_trend, 1),
    }
}

pub fn operational(
    prospects: &[Prospect],
    interactions: &[Interaction],
    tests: &[TestResult],
    advisories: &[Advisory],
    today: NaiveDate,
) -> OperationalKpis {
    let week_ago = today - Duration::days(WEEK_DAYS);
    let month_ago = today - Duration::days(MONTH_DAYS);

    let new_prospects_week = count_where(prospects, |p| on_or_after(p.registered_at, week_ago));
    let enrollments_month = count_where(prospects, |p| {
        p.is_enrolled() && on_or_after(p.registered_at, month_ago)
    });

    OperationalKpis {
        new_prospects_week,
        enrollments_month,
        prospects_in_process: count_where(prospects, |p| {
            p.status.is_some_and(|status| status.is_in_contact())
        }),
        recent_interactions: count_where(interactions, |i| on_or_after(i.occurred_at, week_ago)),
        recent_tests: count_where(tests, |t| on_or_after(t.taken_at, week_ago)),
        recent_advisories: count_where(advisories, |a| on_or_after(a.held_at, week_ago)),
        weekly_conversion: rates::rate(enrollments_month, new_prospects_week),
    }
}

pub fn build(
    prospects: &[Prospect],
    interactions: &[Interaction],
    tests: &[TestResult],
    advisories: &[Advisory],
    today: NaiveDate,
) -> KpiSnapshot {
    KpiSnapshot {
        reference_date: today,
        real_time: real_time(prospects, today),
        operational: operational(prospects, interactions, tests, advisories, today),
    }
}
