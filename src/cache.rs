//! Time-boxed cache of raw payload bundles.
//!
//! Only fetched payloads are cached, never derived overviews. Callers pass
//! the current instant explicitly so expiry is deterministic.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::config::CacheTtls;
use crate::reports::ReportKind;
use crate::source::{Payloads, ReportFilters};

#[derive(Debug, Clone)]
struct CacheEntry {
    payloads: Payloads,
    fetched_at: Instant,
}

#[derive(Debug, Clone)]
pub struct PayloadCache {
    ttls: CacheTtls,
    entries: HashMap<(ReportKind, ReportFilters), CacheEntry>,
}

impl PayloadCache {
    pub fn new(ttls: CacheTtls) -> Self {
        Self {
            ttls,
            entries: HashMap::new(),
        }
    }

    /// A fresh entry is one younger than its report's TTL.
    fn is_fresh(&self, kind: ReportKind, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) < self.ttls.for_report(kind)
    }

    pub fn get(&self, kind: ReportKind, filters: &ReportFilters, now: Instant) -> Option<&Payloads> {
        let entry = self.entries.get(&(kind, filters.clone()))?;
        if self.is_fresh(kind, entry, now) {
            Some(&entry.payloads)
        } else {
            debug!(report = kind.as_str(), "cached payloads expired");
            None
        }
    }

    pub fn insert(
        &mut self,
        kind: ReportKind,
        filters: ReportFilters,
        payloads: Payloads,
        fetched_at: Instant,
    ) {
        self.entries.insert(
            (kind, filters),
            CacheEntry {
                payloads,
                fetched_at,
            },
        );
    }

    /// True when there is no entry or the entry has outlived its TTL.
    pub fn is_stale(&self, kind: ReportKind, filters: &ReportFilters, now: Instant) -> bool {
        self.get(kind, filters, now).is_none()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttls = self.ttls.clone();
        self.entries.retain(|(kind, _), entry| {
            now.saturating_duration_since(entry.fetched_at) < ttls.for_report(*kind)
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted stale payloads");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PayloadKind;
    use serde_json::json;
    use std::time::Duration;

    fn bundle() -> Payloads {
        let mut payloads = Payloads::default();
        payloads.insert(PayloadKind::Prospects, json!([{ "id": "1" }]));
        payloads
    }

    #[test]
    fn entries_expire_exactly_at_their_ttl() {
        let mut cache = PayloadCache::new(CacheTtls::default());
        let start = Instant::now();
        let filters = ReportFilters::default();
        cache.insert(ReportKind::Kpis, filters.clone(), bundle(), start);

        let just_before = start + Duration::from_secs(119);
        let at_ttl = start + Duration::from_secs(120);
        assert!(cache.get(ReportKind::Kpis, &filters, just_before).is_some());
        assert!(cache.get(ReportKind::Kpis, &filters, at_ttl).is_none());
        assert!(cache.is_stale(ReportKind::Kpis, &filters, at_ttl));
    }

    #[test]
    fn ttl_depends_on_the_report_kind() {
        let mut cache = PayloadCache::new(CacheTtls::default());
        let start = Instant::now();
        let filters = ReportFilters::default();
        cache.insert(ReportKind::Kpis, filters.clone(), bundle(), start);
        cache.insert(ReportKind::Channels, filters.clone(), bundle(), start);

        let later = start + Duration::from_secs(10 * 60);
        assert!(cache.is_stale(ReportKind::Kpis, &filters, later));
        assert!(!cache.is_stale(ReportKind::Channels, &filters, later));

        assert_eq!(cache.evict_stale(later), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn filters_are_part_of_the_key() {
        let mut cache = PayloadCache::new(CacheTtls::default());
        let start = Instant::now();
        let cali = ReportFilters {
            city: Some("Cali".into()),
            ..Default::default()
        };
        cache.insert(ReportKind::Prospects, cali.clone(), bundle(), start);

        assert!(cache.get(ReportKind::Prospects, &cali, start).is_some());
        assert!(cache
            .get(ReportKind::Prospects, &ReportFilters::default(), start)
            .is_none());
        assert!(cache.get(ReportKind::Executive, &cali, start).is_none());
    }
}
