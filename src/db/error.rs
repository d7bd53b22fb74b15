use super::postgres::error_class::FailureKind;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored row: {0}")]
    InvalidRow(String),

    /// Some records of a candle batch were not written; the rest were.
    #[error("{} of {} records not written", .failures.len(), .written + .failures.len())]
    PartialBatch {
        written: usize,
        failures: Vec<RecordFailure>,
    },
}

/// A candle that could not be written, with the reason of the last attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub time: DateTime<Utc>,
    pub kind: FailureKind,
    pub reason: String,
}
