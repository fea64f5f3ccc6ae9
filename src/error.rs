use std::path::PathBuf;

use crate::source::PayloadKind;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to access payload file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("payload file {path} is not valid JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write CSV to {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("payload file {path} declares a {found} report, expected {expected}")]
    KindMismatch {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
    #[error("{} payloads are computed by the reporting backend and cannot be read from the database", .0.report_type())]
    NotRecordLevel(PayloadKind),
    #[error("database query failed")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown prospect status `{0}`")]
pub struct UnknownStatus(pub String);
