use serde::Serialize;

use crate::config::MetricsConfig;
use crate::grouping;
use crate::models::{CityAggregate, Prospect};
use crate::rates;
use crate::ranking;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityShare {
    #[serde(flatten)]
    pub aggregate: CityAggregate,
    /// Share of all prospects in the payload.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographicOverview {
    pub cities: Vec<CityShare>,
    pub top_cities: Vec<CityShare>,
    pub best_converting: Vec<CityShare>,
    /// Cities with enough volume but weak conversion.
    pub opportunities: Vec<CityShare>,
    pub total_prospects: u64,
    pub total_enrolled: u64,
    pub average_conversion: f64,
    pub total_cities: usize,
}

/// Per-city counts and rates, largest city first.
pub fn aggregate_cities(prospects: &[Prospect]) -> Vec<CityAggregate> {
    let aggregates: Vec<CityAggregate> = grouping::group_by(prospects, |p| p.city.as_str())
        .into_iter()
        .map(|(city, members)| {
            let total = members.len() as u64;
            let contacted = members.iter().filter(|p| p.is_contacted()).count() as u64;
            let enrolled = members.iter().filter(|p| p.is_enrolled()).count() as u64;
            CityAggregate {
                city: city.to_string(),
                total,
                contacted,
                enrolled,
                contact_rate: rates::rate(contacted, total),
                conversion_rate: rates::rate(enrolled, total),
            }
        })
        .collect();

    ranking::rank_desc(&aggregates, |c| c.total as f64)
}

pub fn build(cities: &[CityAggregate], config: &MetricsConfig) -> GeographicOverview {
    let total_prospects: u64 = cities.iter().map(|c| c.total).sum();
    let shares: Vec<CityShare> = ranking::rank_desc(cities, |c| c.total as f64)
        .into_iter()
        .map(|aggregate| CityShare {
            share: rates::rate(aggregate.total, total_prospects),
            aggregate,
        })
        .collect();

    let opportunities: Vec<CityShare> = shares
        .iter()
        .filter(|c| {
            c.aggregate.total >= config.opportunity_min_prospects
                && c.aggregate.conversion_rate < config.opportunity_max_conversion
        })
        .take(config.highlight_entries)
        .cloned()
        .collect();

    let conversions: Vec<f64> = cities.iter().map(|c| c.conversion_rate).collect();

    GeographicOverview {
        top_cities: ranking::top_n(&shares, |c| c.aggregate.total as f64, config.top_entries),
        best_converting: ranking::top_n(
            &shares,
            |c| c.aggregate.conversion_rate,
            config.highlight_entries,
        ),
        opportunities,
        total_prospects,
        total_enrolled: cities.iter().map(|c| c.enrolled).sum(),
        average_conversion: rates::round_to(rates::mean(&conversions), 1),
        total_cities: cities.len(),
        cities: shares,
    }
}
