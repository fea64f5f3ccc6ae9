//! Search and paging over the prospect list.

use serde::Serialize;

use crate::models::Prospect;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProspectPage {
    pub prospects: Vec<Prospect>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Case-insensitive substring match on name, document number or email. A
/// blank term matches everything.
pub fn matches_search(prospect: &Prospect, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    [&prospect.name, &prospect.document, &prospect.email]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&term))
}

/// One 1-based page of the prospects matching `search`. Page 0 is read as the
/// first page; a page past the end is empty but still reports the totals.
pub fn page(prospects: &[Prospect], search: Option<&str>, page: usize, limit: usize) -> ProspectPage {
    let limit = limit.max(1);
    let page = page.max(1);
    let matching: Vec<&Prospect> = prospects
        .iter()
        .filter(|p| search.map_or(true, |term| matches_search(p, term)))
        .collect();
    let total = matching.len();

    ProspectPage {
        prospects: matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    }
}
