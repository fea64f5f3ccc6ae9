//! Dashboard metrics for an enrollment prospect pipeline.
//!
//! Raw report payloads (from the enrollment database or saved JSON files)
//! are normalized once and turned into chart-ready overviews: rankings,
//! shares, grouped counts and time series.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod grouping;
pub mod listing;
pub mod markdown;
pub mod models;
pub mod normalize;
pub mod ranking;
pub mod rates;
pub mod reports;
pub mod source;
pub mod timeseries;
