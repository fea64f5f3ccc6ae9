use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::MetricsConfig;
use crate::models::{ChannelAggregate, FunnelRow, Prospect, ProspectStatus};
use crate::rates;
use crate::ranking;
use crate::timeseries::Granularity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: &'static str,
    pub count: u64,
    pub percentage: f64,
    /// Count over the cumulative count of this and all earlier stages.
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTransition {
    pub from: &'static str,
    pub to: &'static str,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodConversion {
    pub period: String,
    pub total: u64,
    pub enrolled: u64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionsOverview {
    pub stages: Vec<FunnelStage>,
    pub transitions: Vec<StageTransition>,
    pub total_prospects: u64,
    pub overall_conversion: f64,
    pub timeline: Vec<PeriodConversion>,
    pub best_channels: Vec<ChannelAggregate>,
    pub worst_channels: Vec<ChannelAggregate>,
}

/// Monthly `(period, status)` counts, the shape of the backend's conversions
/// report. Prospects without a registration date have no period and are left
/// out.
pub fn funnel_rows(prospects: &[Prospect]) -> Vec<FunnelRow> {
    let mut cells: BTreeMap<(String, String), u64> = BTreeMap::new();
    for prospect in prospects {
        if let Some(at) = prospect.registered_at {
            let period = Granularity::Month.label(Granularity::Month.bucket_start(at.date()));
            *cells
                .entry((period, prospect.status_label.clone()))
                .or_insert(0) += 1;
        }
    }

    cells
        .into_iter()
        .map(|((period, status_label), count)| FunnelRow {
            period,
            status_label,
            count,
        })
        .collect()
}

/// Counts per funnel stage in canonical order. Rows whose status is not a
/// funnel stage are ignored.
pub fn stage_counts(rows: &[FunnelRow]) -> [u64; 5] {
    let mut counts = [0u64; 5];
    for row in rows {
        if let Some(status) = ProspectStatus::from_label(&row.status_label) {
            if let Some(index) = ProspectStatus::FUNNEL.iter().position(|s| *s == status) {
                counts[index] += row.count;
            }
        }
    }
    counts
}

/// Stage shares are taken over `total`, which includes prospects whose status
/// is not a funnel stage.
pub fn stages(counts: &[u64; 5], total: u64) -> Vec<FunnelStage> {
    let mut cumulative = 0u64;

    ProspectStatus::FUNNEL
        .iter()
        .zip(counts.iter())
        .enumerate()
        .map(|(index, (status, &count))| {
            cumulative += count;
            FunnelStage {
                stage: status.label(),
                count,
                percentage: rates::rate(count, total),
                conversion_rate: if index == 0 {
                    0.0
                } else {
                    rates::rate(count, cumulative)
                },
            }
        })
        .collect()
}

pub fn transitions(counts: &[u64; 5]) -> Vec<StageTransition> {
    ProspectStatus::FUNNEL
        .windows(2)
        .zip(counts.windows(2))
        .map(|(pair, values)| StageTransition {
            from: pair[0].label(),
            to: pair[1].label(),
            rate: rates::rate(values[1], values[0]),
        })
        .collect()
}

pub fn timeline(rows: &[FunnelRow]) -> Vec<PeriodConversion> {
    let mut periods: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for row in rows {
        let entry = periods.entry(row.period.as_str()).or_insert((0, 0));
        entry.0 += row.count;
        if ProspectStatus::from_label(&row.status_label) == Some(ProspectStatus::Enrolled) {
            entry.1 += row.count;
        }
    }

    periods
        .into_iter()
        .map(|(period, (total, enrolled))| PeriodConversion {
            period: period.to_string(),
            total,
            enrolled,
            conversion_rate: rates::rate(enrolled, total),
        })
        .collect()
}

pub fn build(
    rows: &[FunnelRow],
    total_prospects: u64,
    channels: &[ChannelAggregate],
    config: &MetricsConfig,
) -> ConversionsOverview {
    let counts = stage_counts(rows);
    let enrolled = counts[3];

    ConversionsOverview {
        stages: stages(&counts, total_prospects),
        transitions: transitions(&counts),
        total_prospects,
        overall_conversion: rates::rate(enrolled, total_prospects),
        timeline: timeline(rows),
        best_channels: ranking::top_n(channels, |c| c.conversion_rate, config.highlight_entries),
        worst_channels: ranking::bottom_n(
            channels,
            |c| c.conversion_rate,
            config.highlight_entries,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::channels::aggregate_channels;
    use crate::reports::testing::prospect_on;
    use pretty_assertions::assert_eq;

    fn row(period: &str, status: &str, count: u64) -> FunnelRow {
        FunnelRow {
            period: period.to_string(),
            status_label: status.to_string(),
            count,
        }
    }

    #[test]
    fn stage_conversion_uses_cumulative_counts() {
        let counts = [40, 30, 20, 10, 0];
        let stages = stages(&counts, 100);

        assert_eq!(stages[0].conversion_rate, 0.0);
        assert_eq!(stages[0].percentage, 40.0);
        // 30 / (40 + 30)
        assert_eq!(stages[1].conversion_rate, 42.9);
        // 10 / 100
        assert_eq!(stages[3].conversion_rate, 10.0);
        assert_eq!(stages[4].conversion_rate, 0.0);
    }

    #[test]
    fn stage_counts_sum_to_total_without_unknown_statuses() {
        let rows = vec![
            row("2025-01", "Nuevo", 4),
            row("2025-01", "Matriculado", 2),
            row("2025-02", "matriculado", 1),
        ];
        let total: u64 = rows.iter().map(|r| r.count).sum();
        let overview = build(&rows, total, &[], &MetricsConfig::default());
        let stage_total: u64 = overview.stages.iter().map(|s| s.count).sum();
        assert_eq!(stage_total, overview.total_prospects);
        assert_eq!(overview.overall_conversion, 42.9);
    }

    #[test]
    fn prospects_outside_the_funnel_still_count_toward_the_total() {
        let rows = vec![
            row("2025-01", "Nuevo", 4),
            row("2025-01", "Matriculado", 2),
            row("2025-02", "matriculado", 1),
            row("2025-02", "Archivado", 7),
        ];
        let overview = build(&rows, 14, &[], &MetricsConfig::default());
        let stage_total: u64 = overview.stages.iter().map(|s| s.count).sum();
        assert_eq!(stage_total, 7);
        assert_eq!(overview.total_prospects, 14);
        assert_eq!(overview.overall_conversion, 21.4);
        assert_eq!(overview.stages[0].percentage, 28.6);
    }

    #[test]
    fn transitions_follow_funnel_order_and_clamp() {
        let transitions = transitions(&[10, 20, 5, 0, 3]);
        assert_eq!(transitions.len(), 4);
        assert_eq!(transitions[0].from, "Nuevo");
        assert_eq!(transitions[0].to, "Contactado");
        assert_eq!(transitions[0].rate, 100.0);
        assert_eq!(transitions[1].rate, 25.0);
        assert_eq!(transitions[3].rate, 0.0);
    }

    #[test]
    fn timeline_is_ascending_by_period() {
        let rows = vec![
            row("2025-03", "Matriculado", 1),
            row("2025-01", "Nuevo", 3),
            row("2025-01", "Matriculado", 1),
            row("2025-03", "Nuevo", 1),
        ];
        let timeline = timeline(&rows);
        assert_eq!(
            timeline,
            vec![
                PeriodConversion {
                    period: "2025-01".into(),
                    total: 4,
                    enrolled: 1,
                    conversion_rate: 25.0,
                },
                PeriodConversion {
                    period: "2025-03".into(),
                    total: 2,
                    enrolled: 1,
                    conversion_rate: 50.0,
                },
            ]
        );
    }

    #[test]
    fn funnel_rows_come_from_dated_prospects() {
        let prospects = vec![
            prospect_on("1", "Web", "Nuevo", Some("2025-01-03")),
            prospect_on("2", "Web", "Nuevo", Some("2025-01-28")),
            prospect_on("3", "Web", "Matriculado", Some("2025-02-01")),
            prospect_on("4", "Web", "Matriculado", None),
        ];
        let rows = funnel_rows(&prospects);
        assert_eq!(rows, vec![row("2025-01", "Nuevo", 2), row("2025-02", "Matriculado", 1)]);
    }

    #[test]
    fn best_and_worst_channels_are_bounded() {
        let prospects = vec![
            prospect_on("1", "Web", "Matriculado", None),
            prospect_on("2", "Facebook", "Nuevo", None),
            prospect_on("3", "Referido", "Matriculado", None),
            prospect_on("4", "Referido", "Nuevo", None),
        ];
        let channels = aggregate_channels(&prospects);
        let config = MetricsConfig {
            highlight_entries: 1,
            ..Default::default()
        };
        let overview = build(&[], 0, &channels, &config);
        assert_eq!(overview.best_channels[0].channel, "Web");
        assert_eq!(overview.worst_channels[0].channel, "Facebook");
        assert_eq!(overview.total_prospects, 0);
        assert_eq!(overview.overall_conversion, 0.0);
    }
}
