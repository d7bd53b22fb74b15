pub mod archive;
pub mod candles;
pub mod dividends;
pub mod instruments;

use crate::db::error::StoreError;
use crate::tinvest::ApiError;
use archive::ArchiveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("api: {0}")]
    Api(#[from] ApiError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("instrument {0} not found")]
    UnknownInstrument(String),

    #[error("run cancelled")]
    Cancelled,
}
