use std::collections::HashSet;

use serde::Serialize;

use crate::grouping;
use crate::models::{Advisory, CategoryCount, Prospect};
use crate::rates;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryImpact {
    pub prospects_with_advisory: u64,
    pub prospects_without_advisory: u64,
    pub enrolled_with_advisory: u64,
    pub advisory_conversion_rate: f64,
    pub advisory_coverage: f64,
    pub preferred_modalities: Vec<CategoryCount>,
}

pub fn build(advisories: &[Advisory], prospects: &[Prospect]) -> AdvisoryImpact {
    let advised: HashSet<&str> = advisories.iter().map(|a| a.prospect_id.as_str()).collect();
    let advised_prospects: Vec<&Prospect> = prospects
        .iter()
        .filter(|p| advised.contains(p.id.as_str()))
        .collect();
    let with_advisory = advised_prospects.len() as u64;
    let total_prospects = prospects.len() as u64;
    let enrolled_with_advisory = advised_prospects.iter().filter(|p| p.is_enrolled()).count() as u64;

    AdvisoryImpact {
        prospects_with_advisory: with_advisory,
        prospects_without_advisory: total_prospects - with_advisory,
        enrolled_with_advisory,
        advisory_conversion_rate: rates::rate(enrolled_with_advisory, with_advisory),
        advisory_coverage: rates::rate(with_advisory, total_prospects),
        preferred_modalities: grouping::count_by(advisories, |a| a.modality.as_str()),
    }
}
