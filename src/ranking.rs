use std::cmp::Ordering;

/// Descending order on a float metric with NaN sorted last.
pub fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Stable descending sort by `metric`; equal metrics keep input order.
pub fn rank_desc<T, F>(items: &[T], metric: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> f64,
{
    let mut ranked = items.to_vec();
    ranked.sort_by(|a, b| descending(metric(a), metric(b)));
    ranked
}

pub fn top_n<T, F>(items: &[T], metric: F, limit: usize) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> f64,
{
    if limit == 0 {
        return Vec::new();
    }
    let mut ranked = rank_desc(items, metric);
    ranked.truncate(limit);
    ranked
}

/// The `limit` lowest-ranked items, worst first. Items without a usable
/// metric (NaN) are never reported as worst.
pub fn bottom_n<T, F>(items: &[T], metric: F, limit: usize) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> f64,
{
    let mut ranked = rank_desc(items, &metric);
    ranked.retain(|item| !metric(item).is_nan());
    let start = ranked.len().saturating_sub(limit);
    ranked[start..].iter().rev().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        score: f64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { name: "web", score: 12.5 },
            Row { name: "facebook", score: 30.0 },
            Row { name: "referido", score: 30.0 },
            Row { name: "evento", score: 4.0 },
        ]
    }

    #[test]
    fn top_n_is_stable_on_ties() {
        let top = top_n(&rows(), |r| r.score, 2);
        let names: Vec<_> = top.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["facebook", "referido"]);
    }

    #[test]
    fn limit_larger_than_input_returns_everything() {
        assert_eq!(top_n(&rows(), |r| r.score, 10).len(), 4);
    }

    #[test]
    fn zero_limit_returns_nothing() {
        assert!(top_n(&rows(), |r| r.score, 0).is_empty());
        assert!(bottom_n(&rows(), |r| r.score, 0).is_empty());
    }

    #[test]
    fn bottom_n_lists_worst_first() {
        let worst = bottom_n(&rows(), |r| r.score, 2);
        let names: Vec<_> = worst.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["evento", "web"]);
    }

    #[test]
    fn nan_metrics_sink_to_the_end() {
        let mut input = rows();
        input.insert(0, Row { name: "roto", score: f64::NAN });
        let ranked = rank_desc(&input, |r| r.score);
        assert_eq!(ranked.last().map(|r| r.name), Some("roto"));
    }

    #[test]
    fn bottom_n_skips_nan_metrics() {
        let mut input = rows();
        input.push(Row { name: "roto", score: f64::NAN });
        let worst = bottom_n(&input, |r| r.score, 2);
        let names: Vec<_> = worst.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["evento", "web"]);
    }

    proptest! {
        #[test]
        fn top_n_of_sorted_input_is_its_prefix(
            mut scores in proptest::collection::vec(0.0f64..100.0, 0..50),
            limit in 0usize..60,
        ) {
            scores.sort_by(|a, b| descending(*a, *b));
            let top = top_n(&scores, |s| *s, limit);
            let expected: Vec<f64> = scores.iter().take(limit).copied().collect();
            prop_assert_eq!(&top, &expected);
            prop_assert_eq!(top_n(&top, |s| *s, limit), top);
        }
    }
}
