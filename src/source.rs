//! Raw report payloads: where they come from and how their rows are found.
//!
//! A payload is kept exactly as fetched (a JSON array of rows, or the
//! backend's `{report_type, generated_at, filters, data}` envelope) so that
//! exports can write it back verbatim.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::SourceError;
use crate::models::Prospect;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Prospects,
    Interactions,
    Tests,
    Advisories,
    Channels,
    Geographic,
    Conversions,
}

impl PayloadKind {
    pub fn report_type(self) -> &'static str {
        match self {
            PayloadKind::Prospects => "prospects",
            PayloadKind::Interactions => "interactions",
            PayloadKind::Tests => "tests",
            PayloadKind::Advisories => "advisories",
            PayloadKind::Channels => "channels",
            PayloadKind::Geographic => "geographic",
            PayloadKind::Conversions => "conversions",
        }
    }

    pub fn from_report_type(report_type: &str) -> Option<Self> {
        match report_type {
            "prospects" => Some(PayloadKind::Prospects),
            "interactions" => Some(PayloadKind::Interactions),
            "tests" => Some(PayloadKind::Tests),
            "advisories" => Some(PayloadKind::Advisories),
            "channels" => Some(PayloadKind::Channels),
            "geographic" => Some(PayloadKind::Geographic),
            "conversions" => Some(PayloadKind::Conversions),
            _ => None,
        }
    }

    /// Record-level payloads hold one row per stored record and can be read
    /// straight from the database; the others are server-side aggregates.
    pub fn is_record_level(self) -> bool {
        matches!(
            self,
            PayloadKind::Prospects
                | PayloadKind::Interactions
                | PayloadKind::Tests
                | PayloadKind::Advisories
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub channel: Option<String>,
    pub status: Option<String>,
    pub prospect_id: Option<Uuid>,
}

pub fn cutoff_date(since_days: i64, today: NaiveDate) -> NaiveDate {
    today - Duration::days(since_days.max(1))
}

impl ReportFilters {
    pub fn with_since_days(mut self, since_days: Option<i64>, today: NaiveDate) -> Self {
        if let Some(days) = since_days {
            self.start_date = Some(cutoff_date(days, today));
        }
        self
    }

    /// Inclusive date window. A record without a date only passes when no
    /// window is set.
    pub fn matches_date(&self, at: Option<NaiveDateTime>) -> bool {
        if self.start_date.is_none() && self.end_date.is_none() {
            return true;
        }
        let Some(date) = at.map(|at| at.date()) else {
            return false;
        };
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }

    /// Whether prospects are selected by attribute, in which case related
    /// records only count when their prospect survives the same filters.
    pub fn narrows_prospects(&self) -> bool {
        self.city.is_some()
            || self.channel.is_some()
            || self.status.is_some()
            || self.prospect_id.is_some()
    }

    pub fn matches_prospect(&self, prospect: &Prospect) -> bool {
        self.matches_date(prospect.registered_at)
            && self.city.as_deref().map_or(true, |city| prospect.city == city)
            && self
                .channel
                .as_deref()
                .map_or(true, |channel| prospect.channel == channel)
            && self
                .status
                .as_deref()
                .map_or(true, |status| prospect.status_label == status)
            && self
                .prospect_id
                .map_or(true, |id| prospect.id == id.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payloads {
    entries: BTreeMap<PayloadKind, Value>,
}

impl Payloads {
    pub fn insert(&mut self, kind: PayloadKind, payload: Value) {
        self.entries.insert(kind, payload);
    }

    pub fn get(&self, kind: PayloadKind) -> Option<&Value> {
        self.entries.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = PayloadKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn read_payload(path: &Path) -> Result<Value, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let payload: Value = serde_json::from_str(&raw).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = rows(&payload).len(), "read payload");
    Ok(payload)
}

/// Reads a payload meant for `expected`. Bare arrays are accepted as is; an
/// envelope declaring a different report type is rejected.
pub fn load_payload(path: &Path, expected: PayloadKind) -> Result<Value, SourceError> {
    let payload = read_payload(path)?;
    if let Some(found) = payload.get("report_type").and_then(Value::as_str) {
        if declared_kind(&payload) != Some(expected) {
            return Err(SourceError::KindMismatch {
                path: path.to_path_buf(),
                expected: expected.report_type(),
                found: found.to_string(),
            });
        }
    }
    Ok(payload)
}

/// The report kind an envelope declares, if any.
pub fn declared_kind(payload: &Value) -> Option<PayloadKind> {
    payload
        .get("report_type")
        .and_then(Value::as_str)
        .and_then(PayloadKind::from_report_type)
}

/// Record rows of a payload: the payload itself when it is an array, or its
/// `data` array when it is an envelope. Any other shape has no rows.
pub fn rows(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(_) => payload
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Rows stored under `key`, either inside the envelope's `data` object or at
/// the top level.
pub fn nested_rows<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .get("data")
        .and_then(|data| data.get(key))
        .or_else(|| payload.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Wraps rows in the same envelope the enrollment backend returns.
pub fn envelope(
    kind: PayloadKind,
    filters: &ReportFilters,
    rows: Vec<Value>,
    generated_at: NaiveDateTime,
) -> Value {
    json!({
        "report_type": kind.report_type(),
        "generated_at": generated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "filters": filters,
        "total_records": rows.len(),
        "data": rows,
    })
}
