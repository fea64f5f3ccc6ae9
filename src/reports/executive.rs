use serde::Serialize;

use crate::config::MetricsConfig;
use crate::grouping;
use crate::models::{CategoryCount, Prospect};
use crate::rates;

/// Revenue attributed to one enrollment and cost of acquiring one lead,
/// used for the rough ROI column.
const ENROLLMENT_VALUE: f64 = 1500.0;
const LEAD_COST: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveKpis {
    pub total_prospects: u64,
    pub total_enrolled: u64,
    pub conversion_rate: f64,
    pub conversion_goal: f64,
    pub goal_met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveChannel {
    pub channel: String,
    pub total: u64,
    pub enrolled: u64,
    pub conversion_rate: f64,
    pub estimated_roi: f64,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveSummary {
    pub kpis: ExecutiveKpis,
    pub top_channels: Vec<ExecutiveChannel>,
    pub top_cities: Vec<CategoryCount>,
}

pub fn estimated_roi(enrolled: u64, total: u64) -> f64 {
    rates::ratio(enrolled as f64 * ENROLLMENT_VALUE, total as f64 * LEAD_COST)
}

pub fn channel_status(conversion_rate: f64) -> &'static str {
    if conversion_rate >= 25.0 {
        "Excelente"
    } else if conversion_rate >= 15.0 {
        "Bueno"
    } else {
        "Mejorar"
    }
}

pub fn build(prospects: &[Prospect], config: &MetricsConfig) -> ExecutiveSummary {
    let total_prospects = prospects.len() as u64;
    let total_enrolled = prospects.iter().filter(|p| p.is_enrolled()).count() as u64;
    let conversion_rate = rates::rate(total_enrolled, total_prospects);

    let top_channels = grouping::count_by(prospects, |p| p.channel.as_str())
        .into_iter()
        .take(config.top_entries)
        .map(|entry| {
            let enrolled = prospects
                .iter()
                .filter(|p| p.channel == entry.key && p.is_enrolled())
                .count() as u64;
            let conversion_rate = rates::rate(enrolled, entry.count);
            ExecutiveChannel {
                estimated_roi: estimated_roi(enrolled, entry.count),
                status: channel_status(conversion_rate),
                channel: entry.key,
                total: entry.count,
                enrolled,
                conversion_rate,
            }
        })
        .collect();

    let mut top_cities = grouping::count_by(prospects, |p| p.city.as_str());
    top_cities.truncate(config.top_entries);

    ExecutiveSummary {
        kpis: ExecutiveKpis {
            total_prospects,
            total_enrolled,
            conversion_rate,
            conversion_goal: config.conversion_goal,
            goal_met: conversion_rate >= config.conversion_goal,
        },
        top_channels,
        top_cities,
    }
}
