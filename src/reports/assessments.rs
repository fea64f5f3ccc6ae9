use std::collections::HashSet;

use serde::Serialize;

use crate::grouping;
use crate::models::{CategoryCount, CategoryShare, Prospect, TestResult};
use crate::rates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    High,
    Medium,
    Low,
    Critical,
}

impl ScoreBand {
    pub const ALL: [ScoreBand; 4] = [
        ScoreBand::High,
        ScoreBand::Medium,
        ScoreBand::Low,
        ScoreBand::Critical,
    ];

    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            ScoreBand::High
        } else if score >= 60.0 {
            ScoreBand::Medium
        } else if score >= 40.0 {
            ScoreBand::Low
        } else {
            ScoreBand::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::High => "alto",
            ScoreBand::Medium => "medio",
            ScoreBand::Low => "bajo",
            ScoreBand::Critical => "crítico",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub total_tests: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestPerformance {
    pub overall: ScoreStats,
    pub classifications: Vec<CategoryShare>,
    /// Every band is listed, including empty ones.
    pub bands: Vec<CategoryCount>,
    pub enrolled_average: f64,
}

pub fn score_stats(tests: &[TestResult]) -> ScoreStats {
    let scores: Vec<f64> = tests.iter().map(|t| t.score).collect();
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    ScoreStats {
        average: rates::round_to(rates::mean(&scores), 1),
        min: if scores.is_empty() { 0.0 } else { min },
        max: if scores.is_empty() { 0.0 } else { max },
        total_tests: tests.len() as u64,
    }
}

pub fn build(tests: &[TestResult], prospects: &[Prospect]) -> TestPerformance {
    let total = tests.len() as u64;
    let enrolled_ids: HashSet<&str> = prospects
        .iter()
        .filter(|p| p.is_enrolled())
        .map(|p| p.id.as_str())
        .collect();
    let enrolled_scores: Vec<f64> = tests
        .iter()
        .filter(|t| enrolled_ids.contains(t.prospect_id.as_str()))
        .map(|t| t.score)
        .collect();

    let bands = ScoreBand::ALL
        .iter()
        .map(|band| CategoryCount {
            key: band.label().to_string(),
            count: tests
                .iter()
                .filter(|t| ScoreBand::for_score(t.score) == *band)
                .count() as u64,
        })
        .collect();

    TestPerformance {
        overall: score_stats(tests),
        classifications: grouping::with_shares(
            &grouping::count_by(tests, |t| t.classification.as_str()),
            total,
        ),
        bands,
        enrolled_average: rates::round_to(rates::mean(&enrolled_scores), 1),
    }
}
