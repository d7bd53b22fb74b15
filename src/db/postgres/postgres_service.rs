use crate::db::error::StoreError;
use crate::db::postgres::repository::{
    candle_repository::{StructCandleRepository, TraitCandleRepository},
    dividend_repository::{StructDividendRepository, TraitDividendRepository},
    instrument_repository::{StructInstrumentRepository, TraitInstrumentRepository},
    partition_repository::{StructPartitionRepository, TraitPartitionRepository},
};
use crate::db::postgres::{connection::PostgresConnection, schema};
use crate::env_config::models::app_setting::AppSettings;
use std::sync::Arc;
use tracing::{error, info};

pub struct PostgresService {
    // Connection
    pub connection: Arc<PostgresConnection>,

    // Repositories
    pub repository_instrument: Arc<dyn TraitInstrumentRepository + Send + Sync>,
    pub repository_candle: Arc<dyn TraitCandleRepository + Send + Sync>,
    pub repository_dividend: Arc<dyn TraitDividendRepository + Send + Sync>,
    pub repository_partition: Arc<dyn TraitPartitionRepository + Send + Sync>,
}

impl PostgresService {
    pub async fn new(settings: &Arc<AppSettings>) -> Result<Self, StoreError> {
        info!("Initializing PostgreSQL service components");

        info!("Creating PostgreSQL connection");
        let postgres_connection = match PostgresConnection::new(settings.clone()).await {
            Ok(conn) => {
                info!("PostgreSQL connection established successfully");
                Arc::new(conn)
            }
            Err(e) => {
                error!("Failed to establish PostgreSQL connection: {}", e);
                return Err(StoreError::Database(e));
            }
        };

        schema::bootstrap(postgres_connection.get_pool(), chrono::Utc::now()).await?;

        info!("Initializing repositories");

        let instrument_repository = Arc::new(StructInstrumentRepository::new(
            postgres_connection.clone(),
        )) as Arc<dyn TraitInstrumentRepository + Send + Sync>;

        let candle_repository = Arc::new(StructCandleRepository::new(postgres_connection.clone()))
            as Arc<dyn TraitCandleRepository + Send + Sync>;

        let dividend_repository = Arc::new(StructDividendRepository::new(
            postgres_connection.clone(),
        )) as Arc<dyn TraitDividendRepository + Send + Sync>;

        let partition_repository = Arc::new(StructPartitionRepository::new(
            postgres_connection.clone(),
        )) as Arc<dyn TraitPartitionRepository + Send + Sync>;

        info!("PostgreSQL service initialized successfully");
        Ok(Self {
            connection: postgres_connection,
            repository_instrument: instrument_repository,
            repository_candle: candle_repository,
            repository_dividend: dividend_repository,
            repository_partition: partition_repository,
        })
    }
}
