//! Report builders: pure functions from normalized records to chart-ready
//! overviews, one module per report kind.

pub mod advisory;
pub mod assessments;
pub mod channels;
pub mod conversions;
pub mod executive;
pub mod geographic;
pub mod history;
pub mod interactions;
pub mod prospects;
pub mod realtime;
pub mod trends;

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;
use crate::models::{
    Advisory, ChannelAggregate, CityAggregate, FunnelRow, Interaction, Prospect, TestResult,
};
use crate::normalize;
use crate::source::{self, PayloadKind, Payloads, ReportFilters};
use crate::timeseries::Granularity;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Prospects,
    Conversions,
    Channels,
    Geographic,
    Interactions,
    Executive,
    Tests,
    Advisory,
    Trends,
    Kpis,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Prospects => "prospects",
            ReportKind::Conversions => "conversions",
            ReportKind::Channels => "channels",
            ReportKind::Geographic => "geographic",
            ReportKind::Interactions => "interactions",
            ReportKind::Executive => "executive",
            ReportKind::Tests => "tests",
            ReportKind::Advisory => "advisory",
            ReportKind::Trends => "trends",
            ReportKind::Kpis => "kpis",
        }
    }

    /// Record-level payloads the report is derived from when no
    /// server-computed aggregate is supplied.
    pub fn required_payloads(self) -> &'static [PayloadKind] {
        match self {
            ReportKind::Prospects
            | ReportKind::Conversions
            | ReportKind::Channels
            | ReportKind::Geographic
            | ReportKind::Executive
            | ReportKind::Trends => &[PayloadKind::Prospects],
            ReportKind::Interactions => &[PayloadKind::Interactions],
            ReportKind::Tests => &[PayloadKind::Tests, PayloadKind::Prospects],
            ReportKind::Advisory => &[PayloadKind::Advisories, PayloadKind::Prospects],
            ReportKind::Kpis => &[
                PayloadKind::Prospects,
                PayloadKind::Interactions,
                PayloadKind::Tests,
                PayloadKind::Advisories,
            ],
        }
    }

    /// Server-computed aggregate that replaces client-side derivation when
    /// present.
    pub fn aggregate_payload(self) -> Option<PayloadKind> {
        match self {
            ReportKind::Channels => Some(PayloadKind::Channels),
            ReportKind::Geographic => Some(PayloadKind::Geographic),
            ReportKind::Conversions => Some(PayloadKind::Conversions),
            _ => None,
        }
    }
}

/// Normalized records of every payload in a bundle. Aggregate rows are
/// `None` when their payload was not supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub prospects: Vec<Prospect>,
    pub interactions: Vec<Interaction>,
    pub tests: Vec<TestResult>,
    pub advisories: Vec<Advisory>,
    pub channel_rows: Option<Vec<ChannelAggregate>>,
    pub city_rows: Option<Vec<CityAggregate>>,
    pub funnel_rows: Option<Vec<FunnelRow>>,
    pub conversion_channels: Option<Vec<ChannelAggregate>>,
}

impl Dataset {
    pub fn from_payloads(payloads: &Payloads) -> Self {
        let records = |kind: PayloadKind| payloads.get(kind).map(source::rows).unwrap_or(&[]);
        let conversions = payloads.get(PayloadKind::Conversions);

        Self {
            prospects: normalize::all(records(PayloadKind::Prospects), normalize::prospect),
            interactions: normalize::all(
                records(PayloadKind::Interactions),
                normalize::interaction,
            ),
            tests: normalize::all(records(PayloadKind::Tests), normalize::test_result),
            advisories: normalize::all(records(PayloadKind::Advisories), normalize::advisory),
            channel_rows: payloads
                .get(PayloadKind::Channels)
                .map(|p| normalize::all(source::rows(p), normalize::channel_aggregate)),
            city_rows: payloads
                .get(PayloadKind::Geographic)
                .map(|p| normalize::all(source::rows(p), normalize::city_aggregate)),
            funnel_rows: conversions.map(|p| {
                normalize::all(source::nested_rows(p, "funnel_data"), normalize::funnel_row)
            }),
            conversion_channels: conversions.map(|p| {
                normalize::all(
                    source::nested_rows(p, "channel_conversion"),
                    normalize::channel_aggregate,
                )
            }),
        }
    }

    /// Keeps the prospects matching `filters` and the activity inside the
    /// date window. When prospects are selected by attribute, interactions,
    /// tests and advisories must also belong to a kept prospect. Aggregate
    /// rows are left alone since the backend has already applied its own
    /// filters to them.
    pub fn filtered(mut self, filters: &ReportFilters) -> Self {
        self.prospects.retain(|p| filters.matches_prospect(p));
        self.interactions.retain(|i| filters.matches_date(i.occurred_at));
        self.tests.retain(|t| filters.matches_date(t.taken_at));
        self.advisories.retain(|a| filters.matches_date(a.held_at));

        if filters.narrows_prospects() {
            let kept: HashSet<&str> = self.prospects.iter().map(|p| p.id.as_str()).collect();
            self.interactions.retain(|i| kept.contains(i.prospect_id.as_str()));
            self.tests.retain(|t| kept.contains(t.prospect_id.as_str()));
            self.advisories.retain(|a| kept.contains(a.prospect_id.as_str()));
        }
        self
    }

    pub fn channels(&self) -> Vec<ChannelAggregate> {
        match &self.channel_rows {
            Some(rows) => rows.clone(),
            None => channels::aggregate_channels(&self.prospects),
        }
    }

    pub fn cities(&self) -> Vec<CityAggregate> {
        match &self.city_rows {
            Some(rows) => rows.clone(),
            None => geographic::aggregate_cities(&self.prospects),
        }
    }

    pub fn funnel(&self) -> Vec<FunnelRow> {
        match &self.funnel_rows {
            Some(rows) => rows.clone(),
            None => conversions::funnel_rows(&self.prospects),
        }
    }

    /// Every prospect behind the funnel, whatever its status.
    pub fn funnel_total(&self) -> u64 {
        match &self.funnel_rows {
            Some(rows) => rows.iter().map(|row| row.count).sum(),
            None => self.prospects.len() as u64,
        }
    }

    pub fn channel_conversions(&self) -> Vec<ChannelAggregate> {
        match &self.conversion_channels {
            Some(rows) => rows.clone(),
            None => self.channels(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportContext {
    pub today: NaiveDate,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum Overview {
    Prospects(prospects::ProspectsOverview),
    Conversions(conversions::ConversionsOverview),
    Channels(channels::ChannelsOverview),
    Geographic(geographic::GeographicOverview),
    Interactions(interactions::InteractionsOverview),
    Executive(executive::ExecutiveSummary),
    Tests(assessments::TestPerformance),
    Advisory(advisory::AdvisoryImpact),
    Trends(trends::TrendsOverview),
    Kpis(realtime::KpiSnapshot),
}

pub fn build(
    kind: ReportKind,
    dataset: &Dataset,
    config: &MetricsConfig,
    context: ReportContext,
) -> Overview {
    match kind {
        ReportKind::Prospects => Overview::Prospects(prospects::build(&dataset.prospects, config)),
        ReportKind::Conversions => Overview::Conversions(conversions::build(
            &dataset.funnel(),
            dataset.funnel_total(),
            &dataset.channel_conversions(),
            config,
        )),
        ReportKind::Channels => Overview::Channels(channels::build(&dataset.channels(), config)),
        ReportKind::Geographic => {
            Overview::Geographic(geographic::build(&dataset.cities(), config))
        }
        ReportKind::Interactions => {
            Overview::Interactions(interactions::build(&dataset.interactions, config))
        }
        ReportKind::Executive => Overview::Executive(executive::build(&dataset.prospects, config)),
        ReportKind::Tests => {
            Overview::Tests(assessments::build(&dataset.tests, &dataset.prospects))
        }
        ReportKind::Advisory => {
            Overview::Advisory(advisory::build(&dataset.advisories, &dataset.prospects))
        }
        ReportKind::Trends => Overview::Trends(trends::build(
            &dataset.prospects,
            context.granularity,
            context.today,
        )),
        ReportKind::Kpis => Overview::Kpis(realtime::build(
            &dataset.prospects,
            &dataset.interactions,
            &dataset.tests,
            &dataset.advisories,
            context.today,
        )),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
    }

    fn context() -> ReportContext {
        ReportContext {
            today: today(),
            granularity: Granularity::Month,
        }
    }

    fn bundle() -> Payloads {
        let mut payloads = Payloads::default();
        payloads.insert(
            PayloadKind::Prospects,
            json!({
                "report_type": "prospects",
                "data": [
                    { "id": "1", "ciudad": "Cali", "origen": "Web", "estado": "Matriculado",
                      "fecha_registro": "2025-06-01T10:00:00" },
                    { "id": "2", "ciudad": "Cali", "origen": "Web", "estado": "Nuevo",
                      "fecha_registro": "2025-05-01T10:00:00" },
                    { "id": "3", "ciudad": null, "estado": "Contactado" }
                ]
            }),
        );
        payloads
    }

    #[test]
    fn dataset_normalizes_each_payload() {
        let dataset = Dataset::from_payloads(&bundle());
        assert_eq!(dataset.prospects.len(), 3);
        assert_eq!(dataset.prospects[2].city, "No especificado");
        assert!(dataset.interactions.is_empty());
        assert!(dataset.channel_rows.is_none());
    }

    #[test]
    fn aggregates_fall_back_to_prospects() {
        let dataset = Dataset::from_payloads(&bundle());
        let channels = dataset.channels();
        assert_eq!(channels[0].channel, "Web");
        assert_eq!(channels[0].total_leads, 2);
        assert_eq!(dataset.cities()[0].city, "Cali");
        assert_eq!(dataset.funnel().len(), 2);
    }

    #[test]
    fn server_aggregates_take_precedence() {
        let mut payloads = bundle();
        payloads.insert(
            PayloadKind::Conversions,
            json!({
                "report_type": "conversions",
                "data": {
                    "funnel_data": [
                        { "periodo": "2025-01", "estado": "Nuevo", "cantidad": 8 },
                        { "periodo": "2025-01", "estado": "Matriculado", "cantidad": 2 }
                    ],
                    "channel_conversion": [
                        { "canal": "Feria", "total_leads": 10, "matriculados": 5 }
                    ]
                }
            }),
        );
        let dataset = Dataset::from_payloads(&payloads);
        let Overview::Conversions(overview) =
            build(ReportKind::Conversions, &dataset, &MetricsConfig::default(), context())
        else {
            panic!("expected a conversions overview");
        };
        assert_eq!(overview.total_prospects, 10);
        assert_eq!(overview.overall_conversion, 20.0);
        assert_eq!(overview.best_channels[0].channel, "Feria");
    }

    #[test]
    fn filters_narrow_the_dataset() {
        let filters = ReportFilters {
            start_date: NaiveDate::from_ymd_opt(2025, 5, 15),
            ..Default::default()
        };
        let dataset = Dataset::from_payloads(&bundle()).filtered(&filters);
        assert_eq!(dataset.prospects.len(), 1);
        assert_eq!(dataset.prospects[0].id, "1");
    }

    /// Two prospects with activity in June 2025: p1 in Cali (enrolled, no
    /// advisory), p2 in Bogotá (registered in April, advised).
    fn linked_bundle() -> Payloads {
        let mut payloads = Payloads::default();
        payloads.insert(
            PayloadKind::Prospects,
            json!([
                { "id": "p1", "ciudad": "Cali", "origen": "Web", "estado": "Matriculado",
                  "fecha_registro": "2025-06-01T10:00:00" },
                { "id": "p2", "ciudad": "Bogotá", "origen": "Web", "estado": "Contactado",
                  "fecha_registro": "2025-04-01T10:00:00" }
            ]),
        );
        payloads.insert(
            PayloadKind::Interactions,
            json!([
                { "prospecto_id": "p1", "modulo": "Test", "accion": "inicio",
                  "timestamp": "2025-06-12T09:00:00" },
                { "prospecto_id": "p2", "modulo": "Test", "accion": "inicio",
                  "timestamp": "2025-06-13T09:00:00" }
            ]),
        );
        payloads.insert(
            PayloadKind::Tests,
            json!([
                { "prospecto_id": "p1", "puntaje": "90", "timestamp": "2025-06-10T08:00:00" },
                { "prospecto_id": "p2", "puntaje": "40", "timestamp": "2025-06-11T08:00:00" }
            ]),
        );
        payloads.insert(
            PayloadKind::Advisories,
            json!([
                { "prospecto_id": "p2", "modalidad_preferida": "Virtual",
                  "fecha_asesoria": "2025-06-05T10:00:00" }
            ]),
        );
        payloads
    }

    fn city(name: &str) -> ReportFilters {
        ReportFilters {
            city: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn filtered_report(kind: ReportKind, filters: &ReportFilters) -> Overview {
        let dataset = Dataset::from_payloads(&linked_bundle()).filtered(filters);
        build(kind, &dataset, &MetricsConfig::default(), context())
    }

    #[test]
    fn city_filter_drops_activity_of_other_cities() {
        let dataset = Dataset::from_payloads(&linked_bundle()).filtered(&city("Cali"));
        assert_eq!(dataset.prospects.len(), 1);
        assert_eq!(dataset.interactions.len(), 1);
        assert_eq!(dataset.tests.len(), 1);
        assert!(dataset.advisories.is_empty());
        assert!(dataset.interactions.iter().all(|i| i.prospect_id == "p1"));
    }

    #[test]
    fn advisory_report_under_city_filter() {
        let Overview::Advisory(impact) = filtered_report(ReportKind::Advisory, &city("Cali")) else {
            panic!("expected an advisory overview");
        };
        assert_eq!(impact.prospects_with_advisory, 0);
        assert_eq!(impact.prospects_without_advisory, 1);
        assert_eq!(impact.advisory_coverage, 0.0);
        assert!(impact.preferred_modalities.is_empty());
    }

    #[test]
    fn advisory_report_under_date_filter() {
        let filters = ReportFilters {
            start_date: NaiveDate::from_ymd_opt(2025, 5, 15),
            ..Default::default()
        };
        let Overview::Advisory(impact) = filtered_report(ReportKind::Advisory, &filters) else {
            panic!("expected an advisory overview");
        };
        // p2 was advised in the window but registered before it
        assert_eq!(impact.prospects_with_advisory, 0);
        assert_eq!(impact.prospects_without_advisory, 1);
        assert_eq!(impact.advisory_coverage, 0.0);
        assert_eq!(impact.preferred_modalities.len(), 1);
    }

    #[test]
    fn tests_report_under_city_filter() {
        let Overview::Tests(performance) = filtered_report(ReportKind::Tests, &city("Bogotá"))
        else {
            panic!("expected a tests overview");
        };
        assert_eq!(performance.overall.total_tests, 1);
        assert_eq!(performance.overall.average, 40.0);
        assert_eq!(performance.enrolled_average, 0.0);
    }

    #[test]
    fn tests_report_under_date_filter() {
        let filters = ReportFilters {
            end_date: NaiveDate::from_ymd_opt(2025, 6, 10),
            ..Default::default()
        };
        let Overview::Tests(performance) = filtered_report(ReportKind::Tests, &filters) else {
            panic!("expected a tests overview");
        };
        assert_eq!(performance.overall.total_tests, 1);
        assert_eq!(performance.enrolled_average, 90.0);
    }

    #[test]
    fn kpis_under_city_filter() {
        let Overview::Kpis(snapshot) = filtered_report(ReportKind::Kpis, &city("Cali")) else {
            panic!("expected a kpi snapshot");
        };
        assert_eq!(snapshot.real_time.total_leads, 1);
        assert_eq!(snapshot.real_time.total_enrolled, 1);
        assert_eq!(snapshot.operational.recent_interactions, 1);
        assert_eq!(snapshot.operational.recent_tests, 1);
        assert_eq!(snapshot.operational.recent_advisories, 0);
        assert_eq!(snapshot.operational.prospects_in_process, 0);
    }

    #[test]
    fn kpis_under_date_filter() {
        let filters = ReportFilters {
            start_date: NaiveDate::from_ymd_opt(2025, 6, 11),
            ..Default::default()
        };
        let Overview::Kpis(snapshot) = filtered_report(ReportKind::Kpis, &filters) else {
            panic!("expected a kpi snapshot");
        };
        assert_eq!(snapshot.real_time.total_leads, 0);
        assert_eq!(snapshot.operational.recent_interactions, 2);
        assert_eq!(snapshot.operational.recent_tests, 1);
    }

    #[test]
    fn funnel_total_matches_executive_total() {
        let mut payloads = Payloads::default();
        payloads.insert(
            PayloadKind::Prospects,
            json!([
                { "id": "1", "estado": "Matriculado", "fecha_registro": "2025-06-01T10:00:00" },
                { "id": "2", "estado": null, "fecha_registro": "2025-06-02T10:00:00" },
                { "id": "3", "estado": "Nuevo", "fecha_registro": "2025-06-03T10:00:00" },
                { "id": "4", "estado": "Nuevo", "fecha_registro": "2025-06-04T10:00:00" }
            ]),
        );
        let dataset = Dataset::from_payloads(&payloads);
        let config = MetricsConfig::default();

        let Overview::Conversions(funnel) =
            build(ReportKind::Conversions, &dataset, &config, context())
        else {
            panic!("expected a conversions overview");
        };
        let Overview::Executive(summary) = build(ReportKind::Executive, &dataset, &config, context())
        else {
            panic!("expected an executive summary");
        };

        assert_eq!(funnel.total_prospects, 4);
        assert_eq!(funnel.total_prospects, summary.kpis.total_prospects);
        assert_eq!(funnel.overall_conversion, 25.0);
        assert_eq!(funnel.overall_conversion, summary.kpis.conversion_rate);
    }

    #[test]
    fn overview_is_tagged_with_its_kind() {
        let dataset = Dataset::from_payloads(&bundle());
        let overview = build(ReportKind::Executive, &dataset, &MetricsConfig::default(), context());
        let value = serde_json::to_value(&overview).expect("serializes");
        assert_eq!(value["report"], "executive");
        assert_eq!(value["kpis"]["total_prospects"], 3);
    }

    #[test]
    fn every_kind_builds_from_an_empty_dataset() {
        use clap::ValueEnum;
        for kind in ReportKind::value_variants() {
            let overview = build(*kind, &Dataset::default(), &MetricsConfig::default(), context());
            assert!(serde_json::to_value(&overview).is_ok());
        }
    }
}
