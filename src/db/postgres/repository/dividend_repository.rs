use crate::db::error::StoreError;
use crate::db::postgres::connection::PostgresConnection;
use crate::db::postgres::models::dividend::Dividend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

#[async_trait]
pub trait TraitDividendRepository {
    /// Inserts a dividend or overwrites the one with the same payment date
    async fn upsert_dividend(&self, dividend: &Dividend) -> Result<(), StoreError>;

    /// Latest stored payment date for an instrument
    async fn last_dividend_date(&self, figi: &str) -> Result<Option<DateTime<Utc>>, StoreError>;
}

pub struct StructDividendRepository {
    connection: Arc<PostgresConnection>,
}

impl StructDividendRepository {
    pub fn new(connection: Arc<PostgresConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl TraitDividendRepository for StructDividendRepository {
    async fn upsert_dividend(&self, dividend: &Dividend) -> Result<(), StoreError> {
        let pool = self.connection.get_pool();

        debug!(
            "Upserting dividend for {} paid at {}",
            dividend.figi, dividend.payment_date
        );

        let result = sqlx::query(
            "INSERT INTO dividends (figi, payment_date, declared_date, amount, currency, yield_percent)
             VALUES ($1, $2, $3, $4::numeric, $5, $6::numeric)
             ON CONFLICT (figi, payment_date) DO UPDATE SET
                declared_date = EXCLUDED.declared_date,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                yield_percent = EXCLUDED.yield_percent",
        )
        .bind(&dividend.figi)
        .bind(dividend.payment_date)
        .bind(dividend.declared_date)
        .bind(&dividend.amount)
        .bind(&dividend.currency)
        .bind(dividend.yield_percent.as_deref())
        .execute(pool)
        .await;

        match &result {
            Ok(pg_result) => debug!(
                "Upserted dividend for {}, rows affected: {}",
                dividend.figi,
                pg_result.rows_affected()
            ),
            Err(e) => error!("Error upserting dividend for {}: {}", dividend.figi, e),
        }

        result.map(|_| ()).map_err(StoreError::from)
    }

    async fn last_dividend_date(&self, figi: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let pool = self.connection.get_pool();

        let result = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(payment_date) FROM dividends WHERE figi = $1",
        )
        .bind(figi)
        .fetch_one(pool)
        .await;

        match &result {
            Ok(Some(date)) => debug!("Last dividend for {} paid at {}", figi, date),
            Ok(None) => debug!("No dividends stored for {}", figi),
            Err(e) => error!("Error reading last dividend date for {}: {}", figi, e),
        }

        Ok(result?)
    }
}
