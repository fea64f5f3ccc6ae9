use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{Advisory, Interaction, Prospect, TestResult};
use crate::reports::assessments::ScoreBand;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTest {
    #[serde(flatten)]
    pub result: TestResult,
    pub band: ScoreBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProspectHistory {
    pub prospect_id: String,
    pub prospect: Option<Prospect>,
    pub interactions: Vec<Interaction>,
    pub tests: Vec<ScoredTest>,
    pub advisories: Vec<Advisory>,
}

impl ProspectHistory {
    pub fn is_empty(&self) -> bool {
        self.prospect.is_none()
            && self.interactions.is_empty()
            && self.tests.is_empty()
            && self.advisories.is_empty()
    }
}

/// Sort key that puts undated records after dated ones.
fn chronological(at: Option<NaiveDateTime>) -> (bool, Option<NaiveDateTime>) {
    (at.is_none(), at)
}

pub fn build(
    prospect_id: &str,
    prospects: &[Prospect],
    interactions: &[Interaction],
    tests: &[TestResult],
    advisories: &[Advisory],
) -> ProspectHistory {
    let mut interactions: Vec<Interaction> = interactions
        .iter()
        .filter(|i| i.prospect_id == prospect_id)
        .cloned()
        .collect();
    interactions.sort_by_key(|i| (chronological(i.occurred_at), i.flow_step));

    let mut tests: Vec<ScoredTest> = tests
        .iter()
        .filter(|t| t.prospect_id == prospect_id)
        .map(|t| ScoredTest {
            band: ScoreBand::for_score(t.score),
            result: t.clone(),
        })
        .collect();
    tests.sort_by_key(|t| chronological(t.result.taken_at));

    let mut advisories: Vec<Advisory> = advisories
        .iter()
        .filter(|a| a.prospect_id == prospect_id)
        .cloned()
        .collect();
    advisories.sort_by_key(|a| chronological(a.held_at));

    ProspectHistory {
        prospect_id: prospect_id.to_string(),
        prospect: prospects.iter().find(|p| p.id == prospect_id).cloned(),
        interactions,
        tests,
        advisories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use crate::reports::testing::{advisory_on, prospect, test_result_on};
    use serde_json::json;

    fn step(prospect_id: &str, step: u32, at: Option<&str>) -> Interaction {
        normalize::interaction(&json!({
            "prospecto_id": prospect_id,
            "modulo": "Test vocacional",
            "orden_en_flujo": step.to_string(),
            "timestamp": at,
        }))
    }

    #[test]
    fn orders_interactions_by_time_then_step() {
        let interactions = vec![
            step("p1", 2, Some("2025-05-01T10:00:00")),
            step("p1", 1, None),
            step("p1", 1, Some("2025-05-01T10:00:00")),
            step("p2", 1, Some("2025-04-01T10:00:00")),
            step("p1", 3, Some("2025-04-30T08:00:00")),
        ];
        let history = build("p1", &[], &interactions, &[], &[]);
        let steps: Vec<_> = history
            .interactions
            .iter()
            .map(|i| (i.flow_step, i.occurred_at.is_some()))
            .collect();
        assert_eq!(steps, vec![(3, true), (1, true), (2, true), (1, false)]);
    }

    #[test]
    fn tests_carry_their_band() {
        let tests = vec![
            test_result_on("p1", "85", Some("2025-05-02T09:00:00")),
            test_result_on("p1", "30", Some("2025-05-01T09:00:00")),
            test_result_on("p9", "99", None),
        ];
        let history = build("p1", &[], &[], &tests, &[]);
        assert_eq!(history.tests.len(), 2);
        assert_eq!(history.tests[0].band, ScoreBand::Critical);
        assert_eq!(history.tests[1].band, ScoreBand::High);
    }

    #[test]
    fn includes_the_prospect_record_and_advisories() {
        let prospects = vec![prospect("p1", "Cali", "Web", "Contactado")];
        let advisories = vec![
            advisory_on("p1", None),
            advisory_on("p1", Some("2025-05-03")),
        ];
        let history = build("p1", &prospects, &[], &[], &advisories);
        assert_eq!(
            history.prospect.as_ref().map(|p| p.city.as_str()),
            Some("Cali")
        );
        assert!(history.advisories[0].held_at.is_some());
        assert!(history.advisories[1].held_at.is_none());
        assert!(!history.is_empty());
    }

    #[test]
    fn unknown_prospect_has_an_empty_history() {
        let history = build("missing", &[], &[], &[], &[]);
        assert!(history.is_empty());
    }
}
