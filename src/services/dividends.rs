use crate::app_state::models::AppState;
use crate::db::postgres::models::instrument::Instrument;
use crate::db::postgres::repository::{
    dividend_repository::TraitDividendRepository, instrument_repository::TraitInstrumentRepository,
};
use crate::services::ServiceError;
use crate::services::candles::gate::RateGate;
use crate::tinvest::MarketDataApi;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DividendSummary {
    pub instruments: usize,
    pub dividends: usize,
    pub failed: usize,
}

/// Loads dividend payments of enabled shares, continuing after the last stored one.
pub struct DividendLoader {
    api: Arc<dyn MarketDataApi + Send + Sync>,
    dividends: Arc<dyn TraitDividendRepository + Send + Sync>,
    instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
    gate: Arc<dyn RateGate + Send + Sync>,
    history_start: DateTime<Utc>,
    cancel: CancellationToken,
}

impl DividendLoader {
    pub fn new(
        api: Arc<dyn MarketDataApi + Send + Sync>,
        dividends: Arc<dyn TraitDividendRepository + Send + Sync>,
        instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
        gate: Arc<dyn RateGate + Send + Sync>,
        history_start: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            dividends,
            instruments,
            gate,
            history_start,
            cancel,
        }
    }

    pub fn from_app_state(app_state: &AppState, history_start: DateTime<Utc>) -> Self {
        let postgres = &app_state.postgres_service;
        Self::new(
            app_state.market_data.clone(),
            postgres.repository_dividend.clone(),
            postgres.repository_instrument.clone(),
            app_state.rate_gate.clone(),
            history_start,
            app_state.cancel.clone(),
        )
    }

    pub async fn run_all(&self, now: DateTime<Utc>) -> Result<DividendSummary, ServiceError> {
        let shares: Vec<Instrument> = self
            .instruments
            .list_instruments(true)
            .await?
            .into_iter()
            .filter(Instrument::is_share)
            .collect();
        info!("Loading dividends for {} shares", shares.len());

        let mut summary = DividendSummary::default();
        for share in &shares {
            if self.cancel.is_cancelled() {
                warn!("Dividend loading cancelled before {}", share.figi);
                break;
            }

            match self.load_instrument(&share.figi, now).await {
                Ok(count) => {
                    summary.instruments += 1;
                    summary.dividends += count;
                }
                Err(e) => {
                    error!("Failed to load dividends for {}: {}", share.figi, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Dividends loaded: {} records for {} shares, {} failed",
            summary.dividends, summary.instruments, summary.failed
        );
        Ok(summary)
    }

    pub async fn load_instrument(&self, figi: &str, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let start = match self.dividends.last_dividend_date(figi).await? {
            Some(last) => last + TimeDelta::days(1),
            None => self.history_start,
        };

        if start > now {
            debug!("Dividends of {} are up to date", figi);
            return Ok(0);
        }

        self.gate.wait().await;
        let dividends = self.api.fetch_dividends(figi, start, now).await?;

        for dividend in &dividends {
            self.dividends.upsert_dividend(dividend).await?;
        }

        debug!("Stored {} dividends for {}", dividends.len(), figi);
        Ok(dividends.len())
    }
}
