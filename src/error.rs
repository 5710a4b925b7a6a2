use thiserror::Error;

use crate::schema::Dialect;

/// Document-level faults only. Field-level misses (a label that never
/// matched, a number that failed to parse) are resolved to documented
/// defaults during extraction and never surface here.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("No document supplied.")]
    InputMissing,

    #[error("Unsupported document format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to extract {dialect} report: {details}")]
    ExtractionFailure { dialect: Dialect, details: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
