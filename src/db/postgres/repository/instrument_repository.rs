use crate::db::error::StoreError;
use crate::db::postgres::connection::PostgresConnection;
use crate::db::postgres::models::instrument::{Instrument, InstrumentKind, TradingStatus};
use crate::utils::decimal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str = "figi, ticker, name, instrument_type, currency, lot_size,
    min_price_increment::text AS min_price_increment, trading_status, enabled, isin,
    short_enabled_flag, sector, real_exchange, first_1min_candle_date, first_1day_candle_date,
    last_loaded_time, ipo_date, issue_size, div_yield_flag, coupon_quantity_per_year,
    maturity_date, placement_date, released_date, num_shares::text AS num_shares";

#[async_trait]
pub trait TraitInstrumentRepository {
    /// Writes instrument metadata, keeping the stored `enabled` flag
    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), StoreError>;

    /// Instruments in normal trading, optionally only the enabled ones
    async fn list_instruments(&self, enabled_only: bool) -> Result<Vec<Instrument>, StoreError>;

    /// Records the time of the newest loaded candle
    async fn update_last_loaded_time(
        &self,
        figi: &str,
        last_loaded_time: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

pub struct StructInstrumentRepository {
    connection: Arc<PostgresConnection>,
}

impl StructInstrumentRepository {
    pub fn new(connection: Arc<PostgresConnection>) -> Self {
        Self { connection }
    }
}

#[derive(Debug, FromRow)]
struct InstrumentRow {
    figi: String,
    ticker: String,
    name: String,
    instrument_type: String,
    currency: String,
    lot_size: i32,
    min_price_increment: String,
    trading_status: String,
    enabled: bool,
    isin: Option<String>,
    short_enabled_flag: bool,
    sector: Option<String>,
    real_exchange: Option<String>,
    first_1min_candle_date: Option<DateTime<Utc>>,
    first_1day_candle_date: Option<DateTime<Utc>>,
    last_loaded_time: Option<DateTime<Utc>>,
    ipo_date: Option<DateTime<Utc>>,
    issue_size: Option<i64>,
    div_yield_flag: Option<bool>,
    coupon_quantity_per_year: Option<i32>,
    maturity_date: Option<DateTime<Utc>>,
    placement_date: Option<DateTime<Utc>>,
    released_date: Option<DateTime<Utc>>,
    num_shares: Option<String>,
}

impl TryFrom<InstrumentRow> for Instrument {
    type Error = StoreError;

    fn try_from(row: InstrumentRow) -> Result<Self, Self::Error> {
        let kind = match row.instrument_type.as_str() {
            "share" => InstrumentKind::Share {
                ipo_date: row.ipo_date,
                issue_size: row.issue_size.unwrap_or_default(),
                div_yield_flag: row.div_yield_flag.unwrap_or_default(),
            },
            "bond" => InstrumentKind::Bond {
                issue_size: row.issue_size.unwrap_or_default(),
                coupon_quantity_per_year: row.coupon_quantity_per_year.unwrap_or_default(),
                maturity_date: row.maturity_date,
                placement_date: row.placement_date,
            },
            "etf" => InstrumentKind::Etf {
                released_date: row.released_date,
                num_shares: row.num_shares.as_deref().map(decimal::normalize),
            },
            other => {
                return Err(StoreError::InvalidRow(format!(
                    "instrument {} has unknown type '{}'",
                    row.figi, other
                )));
            }
        };

        let trading_status = row.trading_status.parse::<TradingStatus>().unwrap_or_else(|e| {
            warn!("Instrument {}: {}", row.figi, e);
            TradingStatus::Unspecified
        });

        Ok(Instrument {
            figi: row.figi,
            ticker: row.ticker,
            name: row.name,
            kind,
            currency: row.currency,
            lot_size: row.lot_size,
            min_price_increment: decimal::normalize(&row.min_price_increment),
            trading_status,
            enabled: row.enabled,
            isin: row.isin,
            short_enabled_flag: row.short_enabled_flag,
            sector: row.sector,
            real_exchange: row.real_exchange,
            first_1min_candle_date: row.first_1min_candle_date,
            first_1day_candle_date: row.first_1day_candle_date,
            last_loaded_time: row.last_loaded_time,
        })
    }
}

/// Kind-specific columns; `None` for columns the kind does not have.
struct KindColumns<'a> {
    ipo_date: Option<DateTime<Utc>>,
    issue_size: Option<i64>,
    div_yield_flag: Option<bool>,
    coupon_quantity_per_year: Option<i32>,
    maturity_date: Option<DateTime<Utc>>,
    placement_date: Option<DateTime<Utc>>,
    released_date: Option<DateTime<Utc>>,
    num_shares: Option<&'a str>,
}

impl<'a> From<&'a InstrumentKind> for KindColumns<'a> {
    fn from(kind: &'a InstrumentKind) -> Self {
        let empty = KindColumns {
            ipo_date: None,
            issue_size: None,
            div_yield_flag: None,
            coupon_quantity_per_year: None,
            maturity_date: None,
            placement_date: None,
            released_date: None,
            num_shares: None,
        };
        match kind {
            InstrumentKind::Share {
                ipo_date,
                issue_size,
                div_yield_flag,
            } => KindColumns {
                ipo_date: *ipo_date,
                issue_size: Some(*issue_size),
                div_yield_flag: Some(*div_yield_flag),
                ..empty
            },
            InstrumentKind::Bond {
                issue_size,
                coupon_quantity_per_year,
                maturity_date,
                placement_date,
            } => KindColumns {
                issue_size: Some(*issue_size),
                coupon_quantity_per_year: Some(*coupon_quantity_per_year),
                maturity_date: *maturity_date,
                placement_date: *placement_date,
                ..empty
            },
            InstrumentKind::Etf {
                released_date,
                num_shares,
            } => KindColumns {
                released_date: *released_date,
                num_shares: num_shares.as_deref(),
                ..empty
            },
        }
    }
}

#[async_trait]
impl TraitInstrumentRepository for StructInstrumentRepository {
    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), StoreError> {
        let pool = self.connection.get_pool();

        debug!("Upserting instrument {} ({})", instrument.figi, instrument.ticker);

        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, InstrumentRow>(&format!(
            "SELECT {} FROM instruments WHERE figi = $1 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(&instrument.figi)
        .fetch_optional(&mut *tx)
        .await?
        .map(Instrument::try_from)
        .transpose()?;

        let merged = Instrument::merge_for_upsert(existing.as_ref(), instrument);
        let kind = KindColumns::from(&merged.kind);

        // enabled is written for new rows only
        let result = sqlx::query(
            "INSERT INTO instruments (
                figi, ticker, name, instrument_type, currency, lot_size, min_price_increment,
                trading_status, enabled, isin, short_enabled_flag, sector, real_exchange,
                first_1min_candle_date, first_1day_candle_date, ipo_date, issue_size,
                div_yield_flag, coupon_quantity_per_year, maturity_date, placement_date,
                released_date, num_shares
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7::numeric, $8, $9, $10, $11, $12, $13, $14, $15,
                     $16, $17, $18, $19, $20, $21, $22, $23::numeric)
             ON CONFLICT (figi) DO UPDATE SET
                ticker = EXCLUDED.ticker,
                name = EXCLUDED.name,
                instrument_type = EXCLUDED.instrument_type,
                currency = EXCLUDED.currency,
                lot_size = EXCLUDED.lot_size,
                min_price_increment = EXCLUDED.min_price_increment,
                trading_status = EXCLUDED.trading_status,
                isin = EXCLUDED.isin,
                short_enabled_flag = EXCLUDED.short_enabled_flag,
                sector = EXCLUDED.sector,
                real_exchange = EXCLUDED.real_exchange,
                first_1min_candle_date = EXCLUDED.first_1min_candle_date,
                first_1day_candle_date = EXCLUDED.first_1day_candle_date,
                ipo_date = EXCLUDED.ipo_date,
                issue_size = EXCLUDED.issue_size,
                div_yield_flag = EXCLUDED.div_yield_flag,
                coupon_quantity_per_year = EXCLUDED.coupon_quantity_per_year,
                maturity_date = EXCLUDED.maturity_date,
                placement_date = EXCLUDED.placement_date,
                released_date = EXCLUDED.released_date,
                num_shares = EXCLUDED.num_shares,
                updated_at = NOW()",
        )
        .bind(&merged.figi)
        .bind(&merged.ticker)
        .bind(&merged.name)
        .bind(merged.kind.type_name())
        .bind(&merged.currency)
        .bind(merged.lot_size)
        .bind(&merged.min_price_increment)
        .bind(merged.trading_status.as_str())
        .bind(merged.enabled)
        .bind(merged.isin.as_deref())
        .bind(merged.short_enabled_flag)
        .bind(merged.sector.as_deref())
        .bind(merged.real_exchange.as_deref())
        .bind(merged.first_1min_candle_date)
        .bind(merged.first_1day_candle_date)
        .bind(kind.ipo_date)
        .bind(kind.issue_size)
        .bind(kind.div_yield_flag)
        .bind(kind.coupon_quantity_per_year)
        .bind(kind.maturity_date)
        .bind(kind.placement_date)
        .bind(kind.released_date)
        .bind(kind.num_shares)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {
                tx.commit().await?;
                debug!("Upserted instrument {}", merged.figi);
                Ok(())
            }
            Err(e) => {
                error!("Error upserting instrument {}: {}", merged.figi, e);
                Err(StoreError::Database(e))
            }
        }
    }

    async fn list_instruments(&self, enabled_only: bool) -> Result<Vec<Instrument>, StoreError> {
        let pool = self.connection.get_pool();

        let mut query = format!(
            "SELECT {} FROM instruments WHERE trading_status = '{}'",
            SELECT_COLUMNS,
            TradingStatus::NormalTrading.as_str()
        );
        if enabled_only {
            query.push_str(" AND enabled = true");
        }
        query.push_str(" ORDER BY instrument_type, ticker");

        let result = sqlx::query_as::<_, InstrumentRow>(&query)
            .fetch_all(pool)
            .await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                error!("Error fetching instruments: {}", e);
                return Err(StoreError::Database(e));
            }
        };

        let instruments = rows
            .into_iter()
            .map(Instrument::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Loaded {} instruments (enabled only: {})",
            instruments.len(),
            enabled_only
        );
        Ok(instruments)
    }

    async fn update_last_loaded_time(
        &self,
        figi: &str,
        last_loaded_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let pool = self.connection.get_pool();

        let result = sqlx::query("UPDATE instruments SET last_loaded_time = $1 WHERE figi = $2")
            .bind(last_loaded_time)
            .bind(figi)
            .execute(pool)
            .await;

        match &result {
            Ok(pg_result) => {
                if pg_result.rows_affected() > 0 {
                    debug!("Updated last_loaded_time for {}: {}", figi, last_loaded_time);
                } else {
                    debug!("No instrument found to update for {}", figi);
                }
            }
            Err(e) => error!("Error updating last_loaded_time for {}: {}", figi, e),
        }

        result.map(|_| ()).map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(instrument_type: &str) -> InstrumentRow {
        InstrumentRow {
            figi: "BBG00475K6C3".to_string(),
            ticker: "CHMF".to_string(),
            name: "Северсталь".to_string(),
            instrument_type: instrument_type.to_string(),
            currency: "rub".to_string(),
            lot_size: 1,
            min_price_increment: "0.200000000".to_string(),
            trading_status: "SECURITY_TRADING_STATUS_NORMAL_TRADING".to_string(),
            enabled: true,
            isin: Some("RU0009046510".to_string()),
            short_enabled_flag: true,
            sector: Some("materials".to_string()),
            real_exchange: None,
            first_1min_candle_date: None,
            first_1day_candle_date: None,
            last_loaded_time: None,
            ipo_date: None,
            issue_size: Some(837_718_660),
            div_yield_flag: Some(true),
            coupon_quantity_per_year: None,
            maturity_date: None,
            placement_date: None,
            released_date: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            num_shares: Some("1000.000000000".to_string()),
        }
    }

    #[test]
    fn test_row_to_share() {
        let instrument = Instrument::try_from(row("share")).unwrap();

        assert_eq!(instrument.min_price_increment, "0.2");
        assert_eq!(instrument.trading_status, TradingStatus::NormalTrading);
        assert_eq!(
            instrument.kind,
            InstrumentKind::Share {
                ipo_date: None,
                issue_size: 837_718_660,
                div_yield_flag: true,
            }
        );
    }

    #[test]
    fn test_row_to_etf_normalizes_num_shares() {
        let instrument = Instrument::try_from(row("etf")).unwrap();
        match instrument.kind {
            InstrumentKind::Etf { num_shares, .. } => assert_eq!(num_shares.as_deref(), Some("1000")),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(matches!(
            Instrument::try_from(row("future")),
            Err(StoreError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_kind_columns_leave_foreign_fields_empty() {
        let kind = InstrumentKind::Bond {
            issue_size: 10,
            coupon_quantity_per_year: 2,
            maturity_date: None,
            placement_date: None,
        };
        let columns = KindColumns::from(&kind);
        assert_eq!(columns.coupon_quantity_per_year, Some(2));
        assert_eq!(columns.div_yield_flag, None);
        assert_eq!(columns.num_shares, None);
    }
}
