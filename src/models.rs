use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::UnknownStatus;

/// Fallback label for any absent category field on prospects.
pub const UNSPECIFIED: &str = "No especificado";
pub const DIRECT_CHANNEL: &str = "Directo";
pub const NO_MODULE: &str = "Sin módulo";
pub const NO_ACTION: &str = "Sin acción";
pub const UNKNOWN_DEVICE: &str = "Desconocido";
pub const NO_STATUS: &str = "Sin estado";
pub const NO_CLASSIFICATION: &str = "Sin clasificación";

/// Stages of the enrollment pipeline, in funnel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    New,
    Contacted,
    InProcess,
    Enrolled,
    NotInterested,
}

impl ProspectStatus {
    pub const FUNNEL: [ProspectStatus; 5] = [
        ProspectStatus::New,
        ProspectStatus::Contacted,
        ProspectStatus::InProcess,
        ProspectStatus::Enrolled,
        ProspectStatus::NotInterested,
    ];

    /// Parses a stored status label. Accepts the Spanish labels used by the
    /// enrollment database and their English snake_case spellings.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "nuevo" | "new" => Some(Self::New),
            "contactado" | "contacted" => Some(Self::Contacted),
            "en_proceso" | "in_process" | "interesado" => Some(Self::InProcess),
            "matriculado" | "enrolled" => Some(Self::Enrolled),
            "no_interesado" | "not_interested" => Some(Self::NotInterested),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "Nuevo",
            Self::Contacted => "Contactado",
            Self::InProcess => "En proceso",
            Self::Enrolled => "Matriculado",
            Self::NotInterested => "No interesado",
        }
    }

    /// Contacted or in process: the prospects an advisor is actively working.
    pub fn is_in_contact(self) -> bool {
        matches!(self, Self::Contacted | Self::InProcess)
    }
}

impl FromStr for ProspectStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prospect {
    pub id: String,
    pub document_type: Option<String>,
    pub document: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: String,
    pub channel: String,
    pub status_label: String,
    pub status: Option<ProspectStatus>,
    pub registered_at: Option<NaiveDateTime>,
    pub data_consent: bool,
}

impl Prospect {
    pub fn is_enrolled(&self) -> bool {
        self.status == Some(ProspectStatus::Enrolled)
    }

    pub fn is_contacted(&self) -> bool {
        self.status == Some(ProspectStatus::Contacted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interaction {
    pub prospect_id: String,
    pub module: String,
    pub action: String,
    pub device: String,
    pub status: String,
    pub occurred_at: Option<NaiveDateTime>,
    pub flow_step: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub prospect_id: String,
    pub test_id: Option<String>,
    pub score: f64,
    pub classification: String,
    pub taken_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub prospect_id: String,
    pub advisor: Option<String>,
    pub motivations: Option<String>,
    pub barriers: Option<String>,
    pub modality: String,
    pub observations: Option<String>,
    pub held_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAggregate {
    pub channel: String,
    pub total_leads: u64,
    pub contacted: u64,
    pub enrolled: u64,
    pub contact_rate: f64,
    pub conversion_rate: f64,
    pub quality_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityAggregate {
    pub city: String,
    pub total: u64,
    pub contacted: u64,
    pub enrolled: u64,
    pub contact_rate: f64,
    pub conversion_rate: f64,
}

/// One `(period, status)` cell of the conversions report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelRow {
    pub period: String,
    pub status_label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub key: String,
    pub count: u64,
    pub percentage: f64,
}

/// Field changes for one prospect; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProspectUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub channel: Option<String>,
    pub status: Option<ProspectStatus>,
}

impl ProspectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.city.is_none()
            && self.channel.is_none()
            && self.status.is_none()
    }
}
