use crate::db::postgres::postgres_service::PostgresService;
use crate::env_config::models::app_setting::AppSettings;
use crate::services::candles::gate::RateGate;
use crate::tinvest::MarketDataApi;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub settings: Arc<AppSettings>,
    pub postgres_service: Arc<PostgresService>,
    pub market_data: Arc<dyn MarketDataApi + Send + Sync>,
    /// Shared by every caller of the external APIs
    pub rate_gate: Arc<dyn RateGate + Send + Sync>,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        settings: Arc<AppSettings>,
        postgres_service: Arc<PostgresService>,
        market_data: Arc<dyn MarketDataApi + Send + Sync>,
        rate_gate: Arc<dyn RateGate + Send + Sync>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            postgres_service,
            market_data,
            rate_gate,
            cancel,
        }
    }
}
