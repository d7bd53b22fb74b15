use super::gate::RateGate;
use super::planner::plan;
use super::resolution::{Resolution, ResolutionPolicy};
use crate::app_state::models::AppState;
use crate::db::postgres::repository::{
    candle_repository::TraitCandleRepository, instrument_repository::TraitInstrumentRepository,
};
use crate::services::ServiceError;
use crate::tinvest::MarketDataApi;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one `(instrument, resolution)` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Stored data is fresh enough
    Skipped,
    Loaded {
        candles: usize,
        /// Newest stored candle after the pass
        last_loaded: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Incremental candle loading: resumes each instrument from its newest stored candle.
pub struct CandleLoader {
    api: Arc<dyn MarketDataApi + Send + Sync>,
    candles: Arc<dyn TraitCandleRepository + Send + Sync>,
    instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
    gate: Arc<dyn RateGate + Send + Sync>,
    policy: ResolutionPolicy,
    history_start: DateTime<Utc>,
    cancel: CancellationToken,
}

impl CandleLoader {
    pub fn new(
        api: Arc<dyn MarketDataApi + Send + Sync>,
        candles: Arc<dyn TraitCandleRepository + Send + Sync>,
        instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
        gate: Arc<dyn RateGate + Send + Sync>,
        policy: ResolutionPolicy,
        history_start: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            candles,
            instruments,
            gate,
            policy,
            history_start,
            cancel,
        }
    }

    pub fn from_app_state(app_state: &AppState, history_start: DateTime<Utc>) -> Self {
        let postgres = &app_state.postgres_service;
        Self::new(
            app_state.market_data.clone(),
            postgres.repository_candle.clone(),
            postgres.repository_instrument.clone(),
            app_state.rate_gate.clone(),
            ResolutionPolicy::from_config(&app_state.settings.app_config.loading),
            history_start,
            app_state.cancel.clone(),
        )
    }

    /// Загружает свечи всех включённых инструментов
    pub async fn run_all(
        &self,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, ServiceError> {
        let instruments = self.instruments.list_instruments(true).await?;
        if instruments.is_empty() {
            info!("No enabled instruments, nothing to load");
            return Ok(RunSummary::default());
        }

        info!(
            "Loading {} candles for {} instruments",
            resolution,
            instruments.len()
        );

        let mut summary = RunSummary::default();
        for (index, instrument) in instruments.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled before {}", instrument.figi);
                break;
            }

            debug!(
                "Instrument {}/{}: {} ({})",
                index + 1,
                instruments.len(),
                instrument.ticker,
                instrument.figi
            );

            match self.load_instrument(&instrument.figi, resolution, now).await {
                Ok(InstrumentOutcome::Skipped) => summary.skipped += 1,
                Ok(InstrumentOutcome::Loaded { .. }) => summary.processed += 1,
                Err(ServiceError::Cancelled) => {
                    warn!("Run cancelled while loading {}", instrument.figi);
                    break;
                }
                Err(e) => {
                    // Ошибка одного инструмента не прерывает загрузку остальных
                    error!("Failed to load {} candles for {}: {}", resolution, instrument.figi, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Candle run finished: {} loaded, {} skipped, {} failed",
            summary.processed, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Brings one instrument's candles up to `now`.
    pub async fn load_instrument(
        &self,
        figi: &str,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<InstrumentOutcome, ServiceError> {
        let last = self.candles.last_persisted_candle_time(figi, resolution).await?;

        // The boundary candle is fetched again; the upsert makes that harmless.
        let start = match last {
            Some(last) => {
                if now - last <= self.policy.staleness_threshold(resolution) {
                    debug!("{} {} is current (last candle {}), skipping", figi, resolution, last);
                    return Ok(InstrumentOutcome::Skipped);
                }
                last
            }
            None => self.history_start,
        };

        let limit = self.policy.api_limit(resolution);
        info!("Loading {} {} from {} to {}", figi, resolution, start, now);

        let mut stored = 0;
        let mut cancelled = false;
        let mut load_error = None;
        for chunk in plan(resolution, start, now, limit) {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            match self.load_chunk(figi, resolution, chunk.from, chunk.to).await {
                Ok(count) => stored += count,
                Err(e) => {
                    load_error = Some(e);
                    break;
                }
            }
        }

        // Прогресс фиксируется и после ошибки: записанные чанки не теряются
        let progress = self.record_progress(figi, resolution).await;
        if let Some(e) = load_error {
            if let Err(progress_error) = progress {
                error!("Failed to record progress for {}: {}", figi, progress_error);
            }
            return Err(e);
        }
        let last_loaded = progress?;
        if cancelled {
            return Err(ServiceError::Cancelled);
        }

        info!("Loaded {} {} candles for {}", stored, resolution, figi);
        Ok(InstrumentOutcome::Loaded {
            candles: stored,
            last_loaded,
        })
    }

    async fn load_chunk(
        &self,
        figi: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        self.gate.wait().await;
        let candles = self.api.fetch_candles(figi, resolution, from, to).await?;
        debug!("{} {} [{}, {}): {} candles", figi, resolution, from, to, candles.len());

        if candles.is_empty() {
            return Ok(0);
        }
        Ok(self.candles.upsert_candles(figi, resolution, &candles).await?)
    }

    /// Copies the newest stored candle time to the instrument row.
    async fn record_progress(
        &self,
        figi: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let last = self.candles.last_persisted_candle_time(figi, resolution).await?;
        if let Some(time) = last {
            self.instruments.update_last_loaded_time(figi, time).await?;
        }
        Ok(last)
    }
}
