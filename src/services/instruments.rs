use crate::app_state::models::AppState;
use crate::db::postgres::models::instrument::{Instrument, InstrumentType};
use crate::db::postgres::repository::instrument_repository::TraitInstrumentRepository;
use crate::services::ServiceError;
use crate::tinvest::MarketDataApi;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub received: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Refreshes instrument reference data from the broker.
pub struct InstrumentSync {
    api: Arc<dyn MarketDataApi + Send + Sync>,
    instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
}

impl InstrumentSync {
    pub fn new(
        api: Arc<dyn MarketDataApi + Send + Sync>,
        instruments: Arc<dyn TraitInstrumentRepository + Send + Sync>,
    ) -> Self {
        Self { api, instruments }
    }

    pub fn from_app_state(app_state: &AppState) -> Self {
        Self::new(
            app_state.market_data.clone(),
            app_state.postgres_service.repository_instrument.clone(),
        )
    }

    /// Обновляет акции, облигации и фонды; сохраняются только инструменты в режиме нормальной торговли
    pub async fn sync_all(&self) -> SyncSummary {
        let mut total = SyncSummary::default();
        for instrument_type in InstrumentType::ALL {
            match self.sync_type(instrument_type).await {
                Ok(summary) => {
                    total.received += summary.received;
                    total.stored += summary.stored;
                    total.failed += summary.failed;
                }
                Err(e) => error!("Failed to sync {}: {}", instrument_type, e),
            }
        }
        total
    }

    /// Ищет инструмент в базе; если его нет, обновляет справочник и ищет снова
    pub async fn find_or_sync(&self, figi: &str) -> Result<Instrument, ServiceError> {
        if let Some(found) = self.find_stored(figi).await? {
            info!("Instrument found in database: {} ({})", found.name, found.figi);
            return Ok(found);
        }

        warn!("Instrument {} not in database, refreshing from API", figi);
        self.sync_all().await;
        self.find_stored(figi)
            .await?
            .ok_or_else(|| ServiceError::UnknownInstrument(figi.to_string()))
    }

    async fn find_stored(&self, figi: &str) -> Result<Option<Instrument>, ServiceError> {
        Ok(self
            .instruments
            .list_instruments(false)
            .await?
            .into_iter()
            .find(|i| i.figi == figi))
    }

    pub async fn sync_type(&self, instrument_type: InstrumentType) -> Result<SyncSummary, ServiceError> {
        let received = self.api.list_instruments_by_type(instrument_type).await?;

        let mut summary = SyncSummary {
            received: received.len(),
            ..SyncSummary::default()
        };
        for instrument in received
            .iter()
            .filter(|i| i.trading_status.is_normal_trading())
        {
            match self.instruments.upsert_instrument(instrument).await {
                Ok(()) => summary.stored += 1,
                Err(e) => {
                    error!(
                        "Failed to store {} {} ({}): {}",
                        instrument_type, instrument.ticker, instrument.figi, e
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Synced {}: {} received, {} stored, {} failed",
            instrument_type, summary.received, summary.stored, summary.failed
        );
        Ok(summary)
    }
}
