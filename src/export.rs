use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::info;

use crate::error::SourceError;
use crate::source::{self, PayloadKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Writes `payload` in `format` and returns how many records it holds.
pub fn write(path: &Path, payload: &Value, format: ExportFormat) -> Result<usize, SourceError> {
    match format {
        ExportFormat::Json => {
            write_payload(path, payload)?;
            Ok(source::rows(payload).len())
        }
        ExportFormat::Csv => write_csv(path, payload),
    }
}

/// Writes a payload exactly as it was fetched, pretty-printed.
pub fn write_payload(path: &Path, payload: &Value) -> Result<(), SourceError> {
    let rendered = serde_json::to_string_pretty(payload).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, rendered).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "payload exported");
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One CSV line per record. Columns are the keys of the first record; keys
/// that only appear later are dropped.
pub fn write_csv(path: &Path, payload: &Value) -> Result<usize, SourceError> {
    let csv_error = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let rows = source::rows(payload);
    let headers: Vec<&str> = rows
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    if !headers.is_empty() {
        writer.write_record(&headers).map_err(csv_error)?;
        for row in rows {
            writer
                .write_record(headers.iter().map(|header| cell(row.get(*header))))
                .map_err(csv_error)?;
        }
    }
    writer.flush().map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), records = rows.len(), "payload exported as CSV");
    Ok(rows.len())
}

/// `{kind}_{YYYYmmdd_HHMMSS}.{ext}`, the name the dashboard gives downloads.
pub fn default_file_name(kind: PayloadKind, format: ExportFormat, now: NaiveDateTime) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}.{}",
        kind.report_type(),
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::read_payload;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::HashMap;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|d| d.and_hms_opt(8, 5, 9))
            .expect("valid timestamp")
    }

    #[test]
    fn exported_payload_reads_back_unchanged() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("prospects.json");
        let payload = json!({
            "report_type": "prospects",
            "generated_at": "2025-06-01T08:00:00",
            "filters": { "city": "Cali" },
            "data": [
                { "id": "1", "ciudad": "Cali", "puntaje": "87.5", "extra": [1, null, true] }
            ]
        });

        write_payload(&path, &payload).expect("export");
        assert_eq!(read_payload(&path).expect("re-read"), payload);
    }

    #[test]
    fn csv_export_has_a_header_and_one_line_per_record() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("prospects.csv");
        let payload = json!({
            "report_type": "prospects",
            "data": [
                { "id": "1", "ciudad": "Cali", "estado": "Nuevo", "consentimiento_datos": true },
                { "id": "2", "ciudad": "Bogotá, D.C.", "estado": null, "consentimiento_datos": false }
            ]
        });

        let written = write(&path, &payload, ExportFormat::Csv).expect("export");
        assert_eq!(written, 2);

        let mut reader = csv::Reader::from_path(&path).expect("re-open");
        let headers = reader.headers().expect("headers").clone();
        let mut columns: Vec<&str> = headers.iter().collect();
        columns.sort_unstable();
        assert_eq!(columns, vec!["ciudad", "consentimiento_datos", "estado", "id"]);

        let rows: Vec<HashMap<String, String>> = reader
            .records()
            .map(|record| {
                let record = record.expect("record");
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, value)| (header.to_string(), value.to_string()))
                    .collect()
            })
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ciudad"], "Cali");
        assert_eq!(rows[0]["consentimiento_datos"], "true");
        assert_eq!(rows[1]["ciudad"], "Bogotá, D.C.");
        assert_eq!(rows[1]["estado"], "");
    }

    #[test]
    fn csv_export_of_an_empty_payload_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tests.csv");
        assert_eq!(write_csv(&path, &json!([])).expect("export"), 0);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "");
    }

    #[test]
    fn file_name_carries_kind_timestamp_and_extension() {
        assert_eq!(
            default_file_name(PayloadKind::Interactions, ExportFormat::Json, stamp()),
            PathBuf::from("interactions_20250601_080509.json")
        );
        assert_eq!(
            default_file_name(PayloadKind::Tests, ExportFormat::Csv, stamp()),
            PathBuf::from("tests_20250601_080509.csv")
        );
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing").join("out.json");
        assert!(matches!(
            write_payload(&path, &json!([])),
            Err(SourceError::Io { .. })
        ));
        assert!(matches!(
            write_csv(&path.with_extension("csv"), &json!([])),
            Err(SourceError::Csv { .. })
        ));
    }
}
