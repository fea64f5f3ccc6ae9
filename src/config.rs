use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::reports::ReportKind;

/// Tunables for the report builders and the refresh loop. Every field has a
/// default, so a config file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Length of the "top cities" list on the prospects overview.
    pub top_cities: usize,
    /// Length of top-N lists on the executive and geographic views.
    pub top_entries: usize,
    /// Length of best/worst highlight lists.
    pub highlight_entries: usize,
    pub top_devices: usize,
    /// Number of daily buckets kept on trend charts.
    pub trend_window: usize,
    /// Number of trailing buckets summed for "last week" figures.
    pub recent_window: usize,
    pub conversion_goal: f64,
    pub opportunity_min_prospects: u64,
    pub opportunity_max_conversion: f64,
    pub refresh_interval_secs: u64,
    pub cache: CacheTtls,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            top_cities: 10,
            top_entries: 5,
            highlight_entries: 3,
            top_devices: 10,
            trend_window: 30,
            recent_window: 7,
            conversion_goal: 25.0,
            opportunity_min_prospects: 5,
            opportunity_max_conversion: 20.0,
            refresh_interval_secs: 300,
            cache: CacheTtls::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub real_time_secs: u64,
    pub funnel_secs: u64,
    pub activity_secs: u64,
    pub aggregate_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            real_time_secs: 2 * 60,
            funnel_secs: 10 * 60,
            activity_secs: 15 * 60,
            aggregate_secs: 30 * 60,
        }
    }
}

impl CacheTtls {
    pub fn for_report(&self, kind: ReportKind) -> Duration {
        let secs = match kind {
            ReportKind::Kpis => self.real_time_secs,
            ReportKind::Conversions => self.funnel_secs,
            ReportKind::Interactions | ReportKind::Trends => self.activity_secs,
            ReportKind::Prospects
            | ReportKind::Channels
            | ReportKind::Geographic
            | ReportKind::Executive
            | ReportKind::Tests
            | ReportKind::Advisory => self.aggregate_secs,
        };
        Duration::from_secs(secs)
    }
}

impl MetricsConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded metrics config");
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}
