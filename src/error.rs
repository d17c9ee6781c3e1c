//! Error types for the dashboard.
//!
//! The statistics themselves never fail: missing columns and unparseable
//! timestamps only shrink the result. What can fail is everything around
//! them, i.e. resolving a request, reading a sheet, or touching the keyword
//! file.

use std::path::PathBuf;
use thiserror::Error;

/// Rejections of an analysis request.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The session token was never issued, was replaced, or has expired.
    #[error("unknown or expired session: {0}")]
    UnknownSession(String),

    #[error("unknown classification mode: {0} (expected manual or keyword)")]
    UnknownClassificationMode(String),
}

/// Failures while turning an uploaded file into a table.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unsupported file type: {0} (expected .xlsx or .csv)")]
    UnsupportedExtension(String),

    #[error("file has no extension")]
    MissingExtension,

    #[error("CSV file is neither UTF-8 nor GBK; re-save it as \"CSV UTF-8\" or upload the .xlsx instead")]
    UnknownEncoding,

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("sheet is empty")]
    EmptySheet,

    #[error("workbook has no worksheets")]
    NoWorksheet,

    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the keyword list store.
#[derive(Error, Debug)]
pub enum KeywordError {
    #[error("keyword cannot be empty")]
    Empty,

    #[error("keyword already exists: {0}")]
    Duplicate(String),

    #[error("keyword file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keyword file {path} is not a JSON string list: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while rendering statistics for download.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unsupported export format: {0} (expected csv or xlsx)")]
    UnsupportedFormat(String),

    #[error("failed to build workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}
