use super::partition_repository::create_partition_on;
use crate::db::error::StoreError;
use crate::db::partition::{CandleSink, MonthPartition, WriteFailure, write_with_partition_heal};
use crate::db::postgres::connection::PostgresConnection;
use crate::db::postgres::error_class::classify_write_failure;
use crate::db::postgres::models::candle::Candle;
use crate::services::candles::resolution::Resolution;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

#[async_trait]
pub trait TraitCandleRepository {
    /// Inserts or overwrites candles keyed by `(figi, time, interval_type)`
    async fn upsert_candles(
        &self,
        figi: &str,
        resolution: Resolution,
        candles: &[Candle],
    ) -> Result<usize, StoreError>;

    /// Latest stored candle time; this is the loading progress marker
    async fn last_persisted_candle_time(
        &self,
        figi: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

pub struct StructCandleRepository {
    connection: Arc<PostgresConnection>,
}

impl StructCandleRepository {
    pub fn new(connection: Arc<PostgresConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CandleSink for StructCandleRepository {
    async fn insert_candle(
        &self,
        figi: &str,
        resolution: Resolution,
        candle: &Candle,
    ) -> Result<(), WriteFailure> {
        let pool = self.connection.get_pool();

        let result = sqlx::query(
            "INSERT INTO candles (figi, time, open_price, high_price, low_price, close_price, volume, interval_type)
             VALUES ($1, $2, $3::numeric, $4::numeric, $5::numeric, $6::numeric, $7, $8)
             ON CONFLICT (figi, time, interval_type) DO UPDATE SET
                open_price = EXCLUDED.open_price,
                high_price = EXCLUDED.high_price,
                low_price = EXCLUDED.low_price,
                close_price = EXCLUDED.close_price,
                volume = EXCLUDED.volume",
        )
        .bind(figi)
        .bind(candle.time)
        .bind(&candle.open)
        .bind(&candle.high)
        .bind(&candle.low)
        .bind(&candle.close)
        .bind(candle.volume)
        .bind(resolution.as_str())
        .execute(pool)
        .await;

        result.map(|_| ()).map_err(|e| WriteFailure {
            kind: classify_write_failure(&e),
            reason: e.to_string(),
        })
    }

    async fn create_partition(&self, partition: &MonthPartition) -> Result<(), StoreError> {
        create_partition_on(self.connection.get_pool(), partition).await
    }
}

#[async_trait]
impl TraitCandleRepository for StructCandleRepository {
    async fn upsert_candles(
        &self,
        figi: &str,
        resolution: Resolution,
        candles: &[Candle],
    ) -> Result<usize, StoreError> {
        debug!("Upserting {} {} candles for {}", candles.len(), resolution, figi);

        let result = write_with_partition_heal(self, figi, resolution, candles).await;

        match &result {
            Ok(written) => debug!("Upserted {} candles for {}", written, figi),
            Err(e) => error!("Error upserting candles for {}: {}", figi, e),
        }

        result
    }

    async fn last_persisted_candle_time(
        &self,
        figi: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let pool = self.connection.get_pool();

        let result = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(time) FROM candles WHERE figi = $1 AND interval_type = $2",
        )
        .bind(figi)
        .bind(resolution.as_str())
        .fetch_one(pool)
        .await;

        match &result {
            Ok(Some(time)) => debug!("Last {} candle for {}: {}", resolution, figi, time),
            Ok(None) => debug!("No {} candles stored for {}", resolution, figi),
            Err(e) => error!("Error reading last candle time for {}: {}", figi, e),
        }

        Ok(result?)
    }
}
