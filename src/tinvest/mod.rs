pub mod client;
pub mod convert;
pub mod proto;

use crate::db::postgres::models::{
    candle::Candle,
    dividend::Dividend,
    instrument::{Instrument, InstrumentType},
};
use crate::services::candles::resolution::Resolution;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: tonic::transport::Error,
    },

    #[error("auth token is not a valid header value")]
    InvalidToken,

    #[error("{method} failed: {status}")]
    Status {
        method: &'static str,
        status: tonic::Status,
    },
}

/// Read access to the broker's market data.
#[async_trait]
pub trait MarketDataApi {
    /// Candles with `from <= time < to`, ordered by time.
    async fn fetch_candles(
        &self,
        figi: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ApiError>;

    /// Every listed instrument of a type, in any trading state.
    async fn list_instruments_by_type(
        &self,
        instrument_type: InstrumentType,
    ) -> Result<Vec<Instrument>, ApiError>;

    async fn fetch_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, ApiError>;
}
