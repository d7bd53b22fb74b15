//! Idempotent creation of the tables the loader writes to.

use crate::db::error::StoreError;
use crate::db::partition::MonthPartition;
use crate::db::postgres::repository::partition_repository::create_partition_on;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::{debug, info};

const TABLES: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS instruments (
        figi VARCHAR(50) NOT NULL,
        ticker VARCHAR(30) NOT NULL,
        name TEXT NOT NULL,
        instrument_type VARCHAR(20) NOT NULL,
        currency VARCHAR(3) NOT NULL,
        lot_size INT4 NOT NULL,
        min_price_increment NUMERIC(20, 9) NOT NULL,
        trading_status VARCHAR(64) NOT NULL,
        enabled BOOL NOT NULL DEFAULT FALSE,
        isin VARCHAR(20) NULL,
        short_enabled_flag BOOL NOT NULL DEFAULT FALSE,
        sector TEXT NULL,
        real_exchange VARCHAR(40) NULL,
        first_1min_candle_date TIMESTAMPTZ NULL,
        first_1day_candle_date TIMESTAMPTZ NULL,
        ipo_date TIMESTAMPTZ NULL,
        issue_size INT8 NULL,
        div_yield_flag BOOL NULL,
        coupon_quantity_per_year INT4 NULL,
        maturity_date TIMESTAMPTZ NULL,
        placement_date TIMESTAMPTZ NULL,
        released_date TIMESTAMPTZ NULL,
        num_shares NUMERIC(30, 9) NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_loaded_time TIMESTAMPTZ NULL,
        CONSTRAINT instruments_pkey PRIMARY KEY (figi)
    )",
    "CREATE TABLE IF NOT EXISTS candles (
        figi VARCHAR(50) NOT NULL,
        time TIMESTAMPTZ NOT NULL,
        open_price NUMERIC(20, 9) NOT NULL,
        high_price NUMERIC(20, 9) NOT NULL,
        low_price NUMERIC(20, 9) NOT NULL,
        close_price NUMERIC(20, 9) NOT NULL,
        volume BIGINT NOT NULL,
        interval_type VARCHAR(30) NOT NULL,
        created_at TIMESTAMPTZ DEFAULT NOW(),
        PRIMARY KEY (figi, time, interval_type)
    ) PARTITION BY RANGE (time)",
    "CREATE TABLE IF NOT EXISTS dividends (
        id BIGSERIAL,
        figi VARCHAR(50) NOT NULL,
        payment_date TIMESTAMPTZ NOT NULL,
        declared_date TIMESTAMPTZ NULL,
        amount NUMERIC(20, 9) NOT NULL,
        currency VARCHAR(3) NULL,
        yield_percent NUMERIC(20, 9) NULL,
        created_at TIMESTAMPTZ DEFAULT NOW(),
        PRIMARY KEY (id),
        CONSTRAINT dividends_figi_payment_date_unique UNIQUE (figi, payment_date)
    )",
];

const INDEXES: [&str; 7] = [
    "CREATE INDEX IF NOT EXISTS idx_candles_figi_interval ON candles (figi, interval_type)",
    "CREATE INDEX IF NOT EXISTS idx_candles_time ON candles (time)",
    "CREATE INDEX IF NOT EXISTS idx_instruments_ticker ON instruments (ticker)",
    "CREATE INDEX IF NOT EXISTS idx_instruments_type ON instruments (instrument_type)",
    "CREATE INDEX IF NOT EXISTS idx_instruments_enabled ON instruments (enabled)",
    "CREATE INDEX IF NOT EXISTS idx_dividends_figi ON dividends (figi)",
    "CREATE INDEX IF NOT EXISTS idx_dividends_payment_date ON dividends (payment_date)",
];

const FOREIGN_KEYS: [&str; 2] = [
    "DO $$
     BEGIN
        IF NOT EXISTS (SELECT 1 FROM information_schema.table_constraints
                       WHERE constraint_name = 'candles_figi_fkey') THEN
            ALTER TABLE candles ADD CONSTRAINT candles_figi_fkey
                FOREIGN KEY (figi) REFERENCES instruments (figi) ON UPDATE CASCADE ON DELETE CASCADE;
        END IF;
     END $$",
    "DO $$
     BEGIN
        IF NOT EXISTS (SELECT 1 FROM information_schema.table_constraints
                       WHERE constraint_name = 'dividends_figi_fkey') THEN
            ALTER TABLE dividends ADD CONSTRAINT dividends_figi_fkey
                FOREIGN KEY (figi) REFERENCES instruments (figi) ON UPDATE CASCADE ON DELETE CASCADE;
        END IF;
     END $$",
];

/// Creates tables, indexes, foreign keys and the partition for `now`'s month.
pub async fn bootstrap(pool: &Pool<Postgres>, now: DateTime<Utc>) -> Result<(), StoreError> {
    info!("Ensuring database schema");

    for statement in TABLES.iter().chain(INDEXES.iter()).chain(FOREIGN_KEYS.iter()) {
        debug!("Executing schema statement: {}", first_line(statement));
        sqlx::query(statement).execute(pool).await?;
    }

    create_partition_on(pool, &MonthPartition::containing(now)).await?;

    info!("Database schema is ready");
    Ok(())
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement).trim()
}
