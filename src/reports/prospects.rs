use serde::Serialize;

use crate::config::MetricsConfig;
use crate::grouping;
use crate::models::{CategoryCount, CategoryShare, Prospect};
use crate::rates;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProspectTotals {
    pub total: u64,
    pub enrolled: u64,
    pub in_contact: u64,
    pub cities: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelBreakdown {
    pub channel: String,
    pub count: u64,
    pub contacted: u64,
    pub enrolled: u64,
    pub contact_rate: f64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProspectsOverview {
    pub totals: ProspectTotals,
    pub top_cities: Vec<CategoryCount>,
    /// Legend order: statuses as first seen in the payload.
    pub statuses: Vec<CategoryShare>,
    pub channels: Vec<ChannelBreakdown>,
}

pub fn build(prospects: &[Prospect], config: &MetricsConfig) -> ProspectsOverview {
    let total = prospects.len() as u64;

    let mut top_cities = grouping::count_by(prospects, |p| p.city.as_str());
    let cities = top_cities.len() as u64;
    top_cities.truncate(config.top_cities);

    let statuses = grouping::with_shares(
        &grouping::count_in_order(prospects, |p| p.status_label.as_str()),
        total,
    );

    let channels = grouping::count_by(prospects, |p| p.channel.as_str())
        .into_iter()
        .map(|entry| {
            let members = prospects.iter().filter(|p| p.channel == entry.key);
            let (contacted, enrolled) = members.fold((0u64, 0u64), |(c, e), p| {
                (c + p.is_contacted() as u64, e + p.is_enrolled() as u64)
            });
            ChannelBreakdown {
                contact_rate: rates::rate(contacted, entry.count),
                conversion_rate: rates::rate(enrolled, entry.count),
                channel: entry.key,
                count: entry.count,
                contacted,
                enrolled,
            }
        })
        .collect();

    ProspectsOverview {
        totals: ProspectTotals {
            total,
            enrolled: prospects.iter().filter(|p| p.is_enrolled()).count() as u64,
            in_contact: prospects
                .iter()
                .filter(|p| p.status.is_some_and(|s| s.is_in_contact()))
                .count() as u64,
            cities,
        },
        top_cities,
        statuses,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::testing::prospect;

    #[test]
    fn empty_input_gives_zeroed_overview() {
        let overview = build(&[], &MetricsConfig::default());
        assert_eq!(overview.totals.total, 0);
        assert_eq!(overview.totals.cities, 0);
        assert!(overview.top_cities.is_empty());
        assert!(overview.statuses.is_empty());
        assert!(overview.channels.is_empty());
    }

    #[test]
    fn summarizes_cities_statuses_and_channels() {
        let prospects = vec![
            prospect("1", "Bogotá", "Web", "Matriculado"),
            prospect("2", "Bogotá", "Web", "Contactado"),
            prospect("3", "Cali", "Referido", "En proceso"),
            prospect("4", "", "Web", "Nuevo"),
        ];
        let overview = build(&prospects, &MetricsConfig::default());

        assert_eq!(overview.totals.total, 4);
        assert_eq!(overview.totals.enrolled, 1);
        assert_eq!(overview.totals.in_contact, 2);
        assert_eq!(overview.totals.cities, 3);
        assert_eq!(overview.top_cities[0].key, "Bogotá");
        assert_eq!(overview.top_cities[2].key, "No especificado");

        let statuses: Vec<_> = overview.statuses.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(statuses, vec!["Matriculado", "Contactado", "En proceso", "Nuevo"]);
        assert_eq!(overview.statuses[0].percentage, 25.0);

        let web = &overview.channels[0];
        assert_eq!(web.channel, "Web");
        assert_eq!(web.count, 3);
        assert_eq!(web.conversion_rate, 33.3);
        assert_eq!(web.contact_rate, 33.3);
    }

    #[test]
    fn city_list_is_bounded() {
        let prospects: Vec<_> = (0..15)
            .map(|i| prospect(&i.to_string(), &format!("Ciudad {i}"), "Web", "Nuevo"))
            .collect();
        let overview = build(&prospects, &MetricsConfig::default());
        assert_eq!(overview.top_cities.len(), 10);
        assert_eq!(overview.totals.cities, 15);
    }
}
