//! The single boundary where loosely shaped payload rows become typed records.
//!
//! Every function here is total: absent, null, blank or mistyped fields fall
//! back to a display-safe default and nothing is ever rejected. Keys are
//! looked up in both the Spanish report spelling (`ciudad`, `origen`, ...)
//! and the English API spelling (`city`, `origin`, ...).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::models::{
    Advisory, ChannelAggregate, CityAggregate, FunnelRow, Interaction, Prospect, ProspectStatus,
    TestResult, DIRECT_CHANNEL, NO_ACTION, NO_CLASSIFICATION, NO_MODULE, NO_STATUS,
    UNKNOWN_DEVICE, UNSPECIFIED,
};
use crate::rates;

const PROSPECT_ID: &[&str] = &["prospecto_id", "prospect_id"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

fn field<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

pub fn text(record: &Value, keys: &[&str]) -> Option<String> {
    match field(record, keys)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn label(record: &Value, keys: &[&str], fallback: &str) -> String {
    text(record, keys).unwrap_or_else(|| fallback.to_string())
}

fn parsed_number(record: &Value, keys: &[&str]) -> Option<f64> {
    let parsed = match field(record, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn number(record: &Value, keys: &[&str]) -> f64 {
    parsed_number(record, keys).unwrap_or(0.0)
}

/// Non-negative whole count; fractional values are truncated.
pub fn count(record: &Value, keys: &[&str]) -> u64 {
    let value = number(record, keys);
    if value <= 0.0 {
        0
    } else {
        value as u64
    }
}

pub fn flag(record: &Value, keys: &[&str]) -> bool {
    match field(record, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "si" | "sí" | "yes"
        ),
        _ => false,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn timestamp(record: &Value, keys: &[&str]) -> Option<NaiveDateTime> {
    match field(record, keys)? {
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

/// A rate reported by the server if present, otherwise the computed one.
fn reported_rate(record: &Value, keys: &[&str], computed: f64) -> f64 {
    parsed_number(record, keys)
        .map(|value| rates::round_to(rates::clamp_percentage(value), 1))
        .unwrap_or(computed)
}

pub fn prospect(record: &Value) -> Prospect {
    let status_label = label(record, &["estado", "status"], UNSPECIFIED);
    Prospect {
        id: label(record, &["id", "prospecto_id"], ""),
        document_type: text(record, &["tipo_documento", "document_type"]),
        document: text(record, &["dni", "document"]),
        name: text(record, &["nombre", "full_name", "name"]),
        email: text(record, &["correo", "email"]),
        phone: text(record, &["celular", "phone"]),
        city: label(record, &["ciudad", "city"], UNSPECIFIED),
        channel: label(record, &["origen", "origin", "canal", "channel"], DIRECT_CHANNEL),
        status: ProspectStatus::from_label(&status_label),
        status_label,
        registered_at: timestamp(record, &["fecha_registro", "created_at"]),
        data_consent: flag(record, &["consentimiento_datos", "data_consent"]),
    }
}

pub fn interaction(record: &Value) -> Interaction {
    Interaction {
        prospect_id: label(record, PROSPECT_ID, ""),
        module: label(record, &["modulo", "module"], NO_MODULE),
        action: label(record, &["accion", "action"], NO_ACTION),
        device: label(record, &["dispositivo_id", "device_id", "device"], UNKNOWN_DEVICE),
        status: label(record, &["estado", "estado_interaccion", "status"], NO_STATUS),
        occurred_at: timestamp(record, &["timestamp", "created_at"]),
        flow_step: count(record, &["orden_en_flujo", "flow_step"]).min(u32::MAX as u64) as u32,
    }
}

pub fn test_result(record: &Value) -> TestResult {
    TestResult {
        prospect_id: label(record, PROSPECT_ID, ""),
        test_id: text(record, &["test_id"]),
        score: number(record, &["puntaje", "score"]),
        classification: label(record, &["clasificacion", "classification"], NO_CLASSIFICATION),
        taken_at: timestamp(record, &["timestamp", "created_at"]),
    }
}

pub fn advisory(record: &Value) -> Advisory {
    Advisory {
        prospect_id: label(record, PROSPECT_ID, ""),
        advisor: text(record, &["asesor_id", "advisor_id", "advisor"]),
        motivations: text(record, &["motivaciones", "motivations"]),
        barriers: text(record, &["barreras", "barriers"]),
        modality: label(
            record,
            &["modalidad_preferida", "preferred_modality", "modality"],
            UNSPECIFIED,
        ),
        observations: text(record, &["observaciones", "observations"]),
        held_at: timestamp(record, &["fecha_asesoria", "date", "created_at"]),
    }
}

pub fn channel_aggregate(record: &Value) -> ChannelAggregate {
    let total_leads = count(record, &["total_leads", "total"]);
    let contacted = count(record, &["contactados", "contacted"]);
    let enrolled = count(record, &["matriculados", "enrolled"]);
    let contact_rate = reported_rate(
        record,
        &["tasa_contacto", "contact_rate"],
        rates::rate(contacted, total_leads),
    );
    let conversion_rate = reported_rate(
        record,
        &["tasa_conversion", "conversion_rate"],
        rates::rate(enrolled, total_leads),
    );
    ChannelAggregate {
        channel: label(record, &["canal", "channel", "origen"], DIRECT_CHANNEL),
        total_leads,
        contacted,
        enrolled,
        contact_rate,
        conversion_rate,
        quality_score: reported_rate(
            record,
            &["score_calidad", "quality_score"],
            if total_leads > 0 {
                rates::quality_score(contacted, enrolled, total_leads)
            } else {
                rates::mean_rate(contact_rate, conversion_rate)
            },
        ),
    }
}

pub fn city_aggregate(record: &Value) -> CityAggregate {
    let total = count(record, &["total_prospectos", "total_prospects", "total"]);
    let contacted = count(record, &["contactados", "contacted"]);
    let enrolled = count(record, &["matriculados", "enrolled"]);
    CityAggregate {
        city: label(record, &["ciudad", "city"], UNSPECIFIED),
        total,
        contacted,
        enrolled,
        contact_rate: reported_rate(
            record,
            &["tasa_contacto", "contact_rate"],
            rates::rate(contacted, total),
        ),
        conversion_rate: reported_rate(
            record,
            &["tasa_conversion", "conversion_rate"],
            rates::rate(enrolled, total),
        ),
    }
}

pub fn funnel_row(record: &Value) -> FunnelRow {
    FunnelRow {
        period: label(record, &["periodo", "period"], UNSPECIFIED),
        status_label: label(record, &["estado", "status"], UNSPECIFIED),
        count: count(record, &["cantidad", "count"]),
    }
}

pub fn all<T>(rows: &[Value], normalize: fn(&Value) -> T) -> Vec<T> {
    rows.iter().map(normalize).collect()
}
