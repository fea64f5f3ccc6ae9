use serde::Serialize;

use crate::config::MetricsConfig;
use crate::grouping;
use crate::models::{CategoryCount, CategoryShare, Interaction};
use crate::rates;
use crate::timeseries::{self, Granularity, TimeBucket};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleUsage {
    pub module: String,
    pub interactions: u64,
    pub unique_prospects: u64,
    pub per_prospect: f64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionsOverview {
    pub total: u64,
    pub unique_prospects: u64,
    pub average_per_prospect: f64,
    pub modules: Vec<ModuleUsage>,
    pub actions: Vec<CategoryShare>,
    pub devices: Vec<CategoryCount>,
    pub statuses: Vec<CategoryCount>,
    pub timeline: Vec<TimeBucket>,
    /// Interactions in the trailing buckets of the timeline.
    pub recent_total: u64,
}

pub fn build(interactions: &[Interaction], config: &MetricsConfig) -> InteractionsOverview {
    let total = interactions.len() as u64;
    let unique_prospects = grouping::distinct_count(interactions, |i| i.prospect_id.as_str()) as u64;

    let module_counts = grouping::count_by(interactions, |i| i.module.as_str());
    let modules = module_counts
        .iter()
        .map(|entry| {
            let members: Vec<&Interaction> = interactions
                .iter()
                .filter(|i| i.module == entry.key)
                .collect();
            let unique = grouping::distinct_count(&members, |i| i.prospect_id.as_str()) as u64;
            ModuleUsage {
                module: entry.key.clone(),
                interactions: entry.count,
                unique_prospects: unique,
                per_prospect: rates::ratio(entry.count as f64, unique as f64),
                share: rates::rate(entry.count, total),
            }
        })
        .collect();

    let mut devices = grouping::count_by(interactions, |i| i.device.as_str());
    devices.truncate(config.top_devices);

    let daily = timeseries::bucket_counts(interactions, |i| i.occurred_at, Granularity::Day);
    let timeline = timeseries::most_recent(&daily, config.trend_window);
    let recent_total = timeseries::most_recent(&timeline, config.recent_window)
        .iter()
        .map(|bucket| bucket.count)
        .sum();

    InteractionsOverview {
        total,
        unique_prospects,
        average_per_prospect: rates::ratio(total as f64, unique_prospects as f64),
        modules,
        actions: grouping::with_shares(
            &grouping::count_by(interactions, |i| i.action.as_str()),
            total,
        ),
        devices,
        statuses: grouping::count_in_order(interactions, |i| i.status.as_str()),
        timeline,
        recent_total,
    }
}
