use serde::Serialize;

use crate::config::MetricsConfig;
use crate::grouping;
use crate::models::{ChannelAggregate, Prospect};
use crate::rates;
use crate::ranking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    NeedsImprovement,
}

impl QualityTier {
    pub fn for_score(quality_score: f64) -> Self {
        if quality_score >= 30.0 {
            QualityTier::Excellent
        } else if quality_score >= 20.0 {
            QualityTier::Good
        } else {
            QualityTier::NeedsImprovement
        }
    }
}

pub fn performance_label(quality_score: f64) -> &'static str {
    if quality_score >= 70.0 {
        "Excelente"
    } else if quality_score >= 50.0 {
        "Bueno"
    } else if quality_score >= 30.0 {
        "Regular"
    } else {
        "Bajo"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedChannel {
    #[serde(flatten)]
    pub aggregate: ChannelAggregate,
    pub tier: QualityTier,
    pub performance: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelsOverview {
    /// Ordered by conversion rate.
    pub channels: Vec<ChannelAggregate>,
    /// Ordered by quality score.
    pub by_quality: Vec<RankedChannel>,
    pub excellent: Vec<String>,
    pub good: Vec<String>,
    pub needs_improvement: Vec<String>,
    pub best_performing: Option<ChannelAggregate>,
    pub needs_attention: Vec<ChannelAggregate>,
    pub total_leads: u64,
    pub total_enrolled: u64,
    pub average_conversion: f64,
}

/// Per-channel lead counts and rates, highest conversion first.
pub fn aggregate_channels(prospects: &[Prospect]) -> Vec<ChannelAggregate> {
    let aggregates: Vec<ChannelAggregate> = grouping::group_by(prospects, |p| p.channel.as_str())
        .into_iter()
        .map(|(channel, members)| {
            let total_leads = members.len() as u64;
            let contacted = members.iter().filter(|p| p.is_contacted()).count() as u64;
            let enrolled = members.iter().filter(|p| p.is_enrolled()).count() as u64;
            let contact_rate = rates::rate(contacted, total_leads);
            let conversion_rate = rates::rate(enrolled, total_leads);
            ChannelAggregate {
                channel: channel.to_string(),
                total_leads,
                contacted,
                enrolled,
                contact_rate,
                conversion_rate,
                quality_score: rates::quality_score(contacted, enrolled, total_leads),
            }
        })
        .collect();

    ranking::rank_desc(&aggregates, |c| c.conversion_rate)
}

pub fn build(channels: &[ChannelAggregate], config: &MetricsConfig) -> ChannelsOverview {
    let by_conversion = ranking::rank_desc(channels, |c| c.conversion_rate);
    let by_quality: Vec<RankedChannel> = ranking::rank_desc(channels, |c| c.quality_score)
        .into_iter()
        .map(|aggregate| RankedChannel {
            tier: QualityTier::for_score(aggregate.quality_score),
            performance: performance_label(aggregate.quality_score),
            aggregate,
        })
        .collect();

    let names_in = |tier: QualityTier| -> Vec<String> {
        by_quality
            .iter()
            .filter(|c| c.tier == tier)
            .map(|c| c.aggregate.channel.clone())
            .collect()
    };

    let conversions: Vec<f64> = channels.iter().map(|c| c.conversion_rate).collect();

    ChannelsOverview {
        excellent: names_in(QualityTier::Excellent),
        good: names_in(QualityTier::Good),
        needs_improvement: names_in(QualityTier::NeedsImprovement),
        best_performing: by_conversion.first().cloned(),
        needs_attention: ranking::bottom_n(channels, |c| c.conversion_rate, config.highlight_entries),
        total_leads: channels.iter().map(|c| c.total_leads).sum(),
        total_enrolled: channels.iter().map(|c| c.enrolled).sum(),
        average_conversion: rates::round_to(rates::mean(&conversions), 1),
        channels: by_conversion,
        by_quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::testing::prospect;
    use pretty_assertions::assert_eq;

    fn channel(name: &str, total: u64, contacted: u64, enrolled: u64) -> ChannelAggregate {
        let contact_rate = rates::rate(contacted, total);
        let conversion_rate = rates::rate(enrolled, total);
        ChannelAggregate {
            channel: name.to_string(),
            total_leads: total,
            contacted,
            enrolled,
            contact_rate,
            conversion_rate,
            quality_score: rates::quality_score(contacted, enrolled, total),
        }
    }

    #[test]
    fn aggregates_prospects_per_channel() {
        let prospects = vec![
            prospect("1", "Cali", "Web", "Matriculado"),
            prospect("2", "Cali", "Web", "Contactado"),
            prospect("3", "Cali", "Web", "Nuevo"),
            prospect("4", "Cali", "", "Matriculado"),
        ];
        let aggregates = aggregate_channels(&prospects);

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].channel, "Directo");
        assert_eq!(aggregates[0].conversion_rate, 100.0);
        let web = &aggregates[1];
        assert_eq!(web.total_leads, 3);
        assert_eq!(web.contacted, 1);
        assert_eq!(web.enrolled, 1);
        assert_eq!(web.contact_rate, 33.3);
        assert_eq!(web.quality_score, 33.3);
    }

    #[test]
    fn tiers_follow_quality_thresholds() {
        assert_eq!(QualityTier::for_score(30.0), QualityTier::Excellent);
        assert_eq!(QualityTier::for_score(29.9), QualityTier::Good);
        assert_eq!(QualityTier::for_score(20.0), QualityTier::Good);
        assert_eq!(QualityTier::for_score(0.0), QualityTier::NeedsImprovement);
        assert_eq!(performance_label(70.0), "Excelente");
        assert_eq!(performance_label(55.0), "Bueno");
        assert_eq!(performance_label(30.0), "Regular");
        assert_eq!(performance_label(12.0), "Bajo");
    }

    #[test]
    fn overview_ranks_and_buckets_channels() {
        let channels = vec![
            channel("Facebook", 100, 40, 20),
            channel("Evento", 10, 1, 0),
            channel("Referido", 20, 8, 8),
            channel("Web", 50, 15, 5),
        ];
        let overview = build(&channels, &MetricsConfig::default());

        let order: Vec<_> = overview.channels.iter().map(|c| c.channel.as_str()).collect();
        assert_eq!(order, vec!["Referido", "Facebook", "Web", "Evento"]);
        assert_eq!(overview.excellent, vec!["Referido", "Facebook"]);
        assert_eq!(overview.good, vec!["Web"]);
        assert_eq!(overview.needs_improvement, vec!["Evento"]);
        assert_eq!(
            overview.best_performing.map(|c| c.channel),
            Some("Referido".to_string())
        );
        let attention: Vec<_> = overview.needs_attention.iter().map(|c| c.channel.as_str()).collect();
        assert_eq!(attention, vec!["Evento", "Web", "Facebook"]);
        assert_eq!(overview.total_leads, 180);
        assert_eq!(overview.total_enrolled, 33);
        assert_eq!(overview.average_conversion, 17.5);
    }

    #[test]
    fn empty_channels_have_no_best_performer() {
        let overview = build(&[], &MetricsConfig::default());
        assert!(overview.best_performing.is_none());
        assert_eq!(overview.average_conversion, 0.0);
        assert_eq!(overview.total_leads, 0);
    }
}
