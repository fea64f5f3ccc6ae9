use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::Prospect;
use crate::timeseries::{self, Granularity, TrendPoint};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendsOverview {
    pub granularity: Granularity,
    pub trends: Vec<TrendPoint>,
    pub total_periods: usize,
}

/// How far back each granularity looks: 30 days, 12 weeks or 12 months.
pub fn lookback_days(granularity: Granularity) -> i64 {
    match granularity {
        Granularity::Day => 30,
        Granularity::Week => 84,
        Granularity::Month => 365,
    }
}

pub fn build(prospects: &[Prospect], granularity: Granularity, today: NaiveDate) -> TrendsOverview {
    let cutoff = today - Duration::days(lookback_days(granularity));
    let recent: Vec<&Prospect> = prospects
        .iter()
        .filter(|p| p.registered_at.is_some_and(|at| at.date() >= cutoff))
        .collect();

    let trends = timeseries::conversion_trend(
        &recent,
        |p| p.registered_at,
        |p| p.is_enrolled(),
        granularity,
    );

    TrendsOverview {
        granularity,
        total_periods: trends.len(),
        trends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::testing::prospect_on;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn monthly_trend_covers_the_last_year() {
        let prospects = vec![
            prospect_on("1", "Web", "Matriculado", Some("2025-05-03")),
            prospect_on("2", "Web", "Nuevo", Some("2025-05-20")),
            prospect_on("3", "Web", "Nuevo", Some("2025-06-01")),
            prospect_on("4", "Web", "Matriculado", Some("2023-01-01")),
            prospect_on("5", "Web", "Matriculado", None),
        ];
        let overview = build(&prospects, Granularity::Month, day("2025-06-15"));

        assert_eq!(overview.total_periods, 2);
        assert_eq!(overview.trends[0].period, "2025-05");
        assert_eq!(overview.trends[0].registrations, 2);
        assert_eq!(overview.trends[0].enrollments, 1);
        assert_eq!(overview.trends[0].conversion_rate, 50.0);
        assert_eq!(overview.trends[1].period, "2025-06");
    }

    #[test]
    fn daily_trend_drops_older_registrations() {
        let prospects = vec![
            prospect_on("1", "Web", "Nuevo", Some("2025-05-01")),
            prospect_on("2", "Web", "Nuevo", Some("2025-06-14")),
        ];
        let overview = build(&prospects, Granularity::Day, day("2025-06-15"));
        assert_eq!(overview.total_periods, 1);
        assert_eq!(overview.trends[0].period, "2025-06-14");
    }

    #[test]
    fn no_prospects_no_periods() {
        let overview = build(&[], Granularity::Week, day("2025-06-15"));
        assert!(overview.trends.is_empty());
        assert_eq!(overview.total_periods, 0);
    }
}
