use std::collections::{HashMap, HashSet};

use crate::models::{CategoryCount, CategoryShare};
use crate::rates;

/// Counts records per key, keeping keys in the order they were first seen.
pub fn count_in_order<T, F>(records: &[T], key: F) -> Vec<CategoryCount>
where
    F: Fn(&T) -> &str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for record in records {
        let value = key(record);
        match index.get(value) {
            Some(&position) => counts[position].count += 1,
            None => {
                index.insert(value, counts.len());
                counts.push(CategoryCount {
                    key: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}

/// Counts records per key, most frequent first. Equal counts keep
/// first-encountered order.
pub fn count_by<T, F>(records: &[T], key: F) -> Vec<CategoryCount>
where
    F: Fn(&T) -> &str,
{
    let mut counts = count_in_order(records, key);
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Attaches each category's share of `total`.
pub fn with_shares(counts: &[CategoryCount], total: u64) -> Vec<CategoryShare> {
    counts
        .iter()
        .map(|entry| CategoryShare {
            key: entry.key.clone(),
            count: entry.count,
            percentage: rates::rate(entry.count, total),
        })
        .collect()
}

/// Partitions records by key, groups in first-seen order.
pub fn group_by<'a, T, F>(records: &'a [T], key: F) -> Vec<(&'a str, Vec<&'a T>)>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&T>)> = Vec::new();

    for record in records {
        let value = key(record);
        match index.get(value) {
            Some(&position) => groups[position].1.push(record),
            None => {
                index.insert(value, groups.len());
                groups.push((value, vec![record]));
            }
        }
    }

    groups
}

pub fn distinct_count<T, F>(records: &[T], key: F) -> usize
where
    F: Fn(&T) -> &str,
{
    records.iter().map(key).collect::<HashSet<_>>().len()
}
