//! In-memory store and API used by unit tests.

use crate::db::error::StoreError;
use crate::db::partition::{CandleSink, MonthPartition, WriteFailure, write_with_partition_heal};
use crate::db::postgres::error_class::FailureKind;
use crate::db::postgres::models::candle::Candle;
use crate::db::postgres::models::dividend::Dividend;
use crate::db::postgres::models::instrument::{
    Instrument, InstrumentKind, InstrumentType, TradingStatus,
};
use crate::db::postgres::repository::{
    candle_repository::TraitCandleRepository, dividend_repository::TraitDividendRepository,
    instrument_repository::TraitInstrumentRepository,
    partition_repository::TraitPartitionRepository,
};
use crate::services::candles::resolution::Resolution;
use crate::tinvest::{ApiError, MarketDataApi};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

pub fn candle_at(time: DateTime<Utc>, price: &str) -> Candle {
    Candle {
        time,
        open: price.to_string(),
        high: price.to_string(),
        low: price.to_string(),
        close: price.to_string(),
        volume: 1,
    }
}

pub fn share(figi: &str, enabled: bool) -> Instrument {
    Instrument {
        figi: figi.to_string(),
        ticker: format!("T{}", figi),
        name: format!("Share {}", figi),
        kind: InstrumentKind::Share {
            ipo_date: None,
            issue_size: 1_000,
            div_yield_flag: true,
        },
        currency: "rub".to_string(),
        lot_size: 10,
        min_price_increment: "0.01".to_string(),
        trading_status: TradingStatus::NormalTrading,
        enabled,
        isin: None,
        short_enabled_flag: false,
        sector: None,
        real_exchange: None,
        first_1min_candle_date: None,
        first_1day_candle_date: None,
        last_loaded_time: None,
    }
}

type CandleKey = (String, &'static str, DateTime<Utc>);

/// Store with the same keys and partition rules as the database.
#[derive(Default)]
pub struct MemoryStore {
    instruments: Mutex<BTreeMap<String, Instrument>>,
    candles: Mutex<BTreeMap<CandleKey, Candle>>,
    dividends: Mutex<BTreeMap<(String, DateTime<Utc>), Dividend>>,
    partitions: Mutex<BTreeSet<String>>,
    prepared_years: Mutex<Vec<i32>>,
    partition_creations: AtomicUsize,
    rejected_times: Mutex<HashSet<DateTime<Utc>>>,
    refuse_partitions: AtomicBool,
    failing_dividends: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partitions(names: &[&str]) -> Self {
        let store = Self::default();
        store
            .partitions
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        store
    }

    pub fn partition_creations(&self) -> usize {
        self.partition_creations.load(Ordering::SeqCst)
    }

    pub fn has_partition(&self, name: &str) -> bool {
        self.partitions.lock().unwrap().contains(name)
    }

    pub fn prepared_years(&self) -> Vec<i32> {
        self.prepared_years.lock().unwrap().clone()
    }

    /// Writes at `time` fail as integrity violations.
    pub fn reject_time(&self, time: DateTime<Utc>) {
        self.rejected_times.lock().unwrap().insert(time);
    }

    pub fn refuse_partition_creation(&self) {
        self.refuse_partitions.store(true, Ordering::SeqCst);
    }

    pub fn fail_dividends_for(&self, figi: &str) {
        self.failing_dividends.lock().unwrap().insert(figi.to_string());
    }

    pub fn add_instrument(&self, instrument: Instrument) {
        self.instruments
            .lock()
            .unwrap()
            .insert(instrument.figi.clone(), instrument);
    }

    pub fn instrument(&self, figi: &str) -> Option<Instrument> {
        self.instruments.lock().unwrap().get(figi).cloned()
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.lock().unwrap().len()
    }

    pub async fn seed_candles(&self, figi: &str, resolution: Resolution, candles: &[Candle]) {
        let mut stored = self.candles.lock().unwrap();
        for candle in candles {
            stored.insert((figi.to_string(), resolution.as_str(), candle.time), candle.clone());
        }
    }

    pub fn candle_count(&self) -> usize {
        self.candles.lock().unwrap().len()
    }

    pub fn candle(&self, figi: &str, resolution: Resolution, time: DateTime<Utc>) -> Option<Candle> {
        self.candles
            .lock()
            .unwrap()
            .get(&(figi.to_string(), resolution.as_str(), time))
            .cloned()
    }

    pub fn candles_for(&self, figi: &str, resolution: Resolution) -> Vec<Candle> {
        self.candles
            .lock()
            .unwrap()
            .iter()
            .filter(|((f, r, _), _)| f == figi && *r == resolution.as_str())
            .map(|(_, candle)| candle.clone())
            .collect()
    }

    pub fn dividends_for(&self, figi: &str) -> Vec<Dividend> {
        self.dividends
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.figi == figi)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CandleSink for MemoryStore {
    async fn insert_candle(
        &self,
        figi: &str,
        resolution: Resolution,
        candle: &Candle,
    ) -> Result<(), WriteFailure> {
        if self.rejected_times.lock().unwrap().contains(&candle.time) {
            return Err(WriteFailure {
                kind: FailureKind::Integrity,
                reason: "rejected".to_string(),
            });
        }
        let partition = MonthPartition::containing(candle.time).name();
        if !self.partitions.lock().unwrap().contains(&partition) {
            return Err(WriteFailure {
                kind: FailureKind::MissingPartition,
                reason: format!("no partition of relation \"candles\" found for row ({})", partition),
            });
        }
        self.candles
            .lock()
            .unwrap()
            .insert((figi.to_string(), resolution.as_str(), candle.time), candle.clone());
        Ok(())
    }

    async fn create_partition(&self, partition: &MonthPartition) -> Result<(), StoreError> {
        if self.refuse_partitions.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.partition_creations.fetch_add(1, Ordering::SeqCst);
        self.partitions.lock().unwrap().insert(partition.name());
        Ok(())
    }
}

#[async_trait]
impl TraitCandleRepository for MemoryStore {
    async fn upsert_candles(
        &self,
        figi: &str,
        resolution: Resolution,
        candles: &[Candle],
    ) -> Result<usize, StoreError> {
        write_with_partition_heal(self, figi, resolution, candles).await
    }

    async fn last_persisted_candle_time(
        &self,
        figi: &str,
        resolution: Resolution,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .candles_for(figi, resolution)
            .iter()
            .map(|c| c.time)
            .max())
    }
}

#[async_trait]
impl TraitPartitionRepository for MemoryStore {
    async fn create_partition(&self, partition: &MonthPartition) -> Result<(), StoreError> {
        CandleSink::create_partition(self, partition).await
    }

    async fn create_partitions_for_year(&self, year: i32) -> Result<(), StoreError> {
        for partition in MonthPartition::months_of_year(year) {
            CandleSink::create_partition(self, &partition).await?;
        }
        self.prepared_years.lock().unwrap().push(year);
        Ok(())
    }
}

#[async_trait]
impl TraitInstrumentRepository for MemoryStore {
    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), StoreError> {
        let mut instruments = self.instruments.lock().unwrap();
        let merged = Instrument::merge_for_upsert(instruments.get(&instrument.figi), instrument);
        instruments.insert(merged.figi.clone(), merged);
        Ok(())
    }

    async fn list_instruments(&self, enabled_only: bool) -> Result<Vec<Instrument>, StoreError> {
        Ok(self
            .instruments
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.trading_status.is_normal_trading() && (!enabled_only || i.enabled))
            .cloned()
            .collect())
    }

    async fn update_last_loaded_time(
        &self,
        figi: &str,
        last_loaded_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(instrument) = self.instruments.lock().unwrap().get_mut(figi) {
            instrument.last_loaded_time = Some(last_loaded_time);
        }
        Ok(())
    }
}

#[async_trait]
impl TraitDividendRepository for MemoryStore {
    async fn upsert_dividend(&self, dividend: &Dividend) -> Result<(), StoreError> {
        if self.failing_dividends.lock().unwrap().contains(&dividend.figi) {
            return Err(StoreError::Database(sqlx::Error::Protocol("rejected".to_string())));
        }
        self.dividends.lock().unwrap().insert(
            (dividend.figi.clone(), dividend.payment_date),
            dividend.clone(),
        );
        Ok(())
    }

    async fn last_dividend_date(&self, figi: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.dividends_for(figi).iter().map(|d| d.payment_date).max())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub figi: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Market data API serving canned responses.
#[derive(Default)]
pub struct FakeApi {
    candles: Mutex<HashMap<(String, Resolution), Vec<Candle>>>,
    instruments: Mutex<HashMap<InstrumentType, Vec<Instrument>>>,
    dividends: Mutex<HashMap<String, Vec<Dividend>>>,
    failing: Mutex<HashSet<String>>,
    candle_calls: Mutex<Vec<ApiCall>>,
    dividend_calls: Mutex<Vec<ApiCall>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeApi {
    pub fn set_candles(&self, figi: &str, resolution: Resolution, candles: Vec<Candle>) {
        self.candles
            .lock()
            .unwrap()
            .insert((figi.to_string(), resolution), candles);
    }

    pub fn set_instruments(&self, instrument_type: InstrumentType, instruments: Vec<Instrument>) {
        self.instruments
            .lock()
            .unwrap()
            .insert(instrument_type, instruments);
    }

    pub fn set_dividends(&self, figi: &str, dividends: Vec<Dividend>) {
        self.dividends
            .lock()
            .unwrap()
            .insert(figi.to_string(), dividends);
    }

    /// Every call for `figi` fails as unavailable.
    pub fn fail_for(&self, figi: &str) {
        self.failing.lock().unwrap().insert(figi.to_string());
    }

    /// Trips `token` once `calls` candle requests were served.
    pub fn cancel_after_calls(&self, calls: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((calls, token));
    }

    pub fn candle_calls(&self) -> Vec<ApiCall> {
        self.candle_calls.lock().unwrap().clone()
    }

    pub fn dividend_calls(&self) -> Vec<ApiCall> {
        self.dividend_calls.lock().unwrap().clone()
    }

    fn check_failure(&self, key: &str, method: &'static str) -> Result<(), ApiError> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(ApiError::Status {
                method,
                status: tonic::Status::unavailable("unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataApi for FakeApi {
    async fn fetch_candles(
        &self,
        figi: &str,
        resolution: Resolution,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ApiError> {
        let served = {
            let mut calls = self.candle_calls.lock().unwrap();
            calls.push(ApiCall {
                figi: figi.to_string(),
                from,
                to,
            });
            calls.len()
        };
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if served >= *after {
                token.cancel();
            }
        }
        self.check_failure(figi, "GetCandles")?;

        Ok(self
            .candles
            .lock()
            .unwrap()
            .get(&(figi.to_string(), resolution))
            .map(|all| {
                all.iter()
                    .filter(|c| c.time >= from && c.time < to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_instruments_by_type(
        &self,
        instrument_type: InstrumentType,
    ) -> Result<Vec<Instrument>, ApiError> {
        self.check_failure(instrument_type.as_str(), "Instruments")?;
        Ok(self
            .instruments
            .lock()
            .unwrap()
            .get(&instrument_type)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_dividends(
        &self,
        figi: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Dividend>, ApiError> {
        self.dividend_calls.lock().unwrap().push(ApiCall {
            figi: figi.to_string(),
            from,
            to,
        });
        self.check_failure(figi, "GetDividends")?;

        Ok(self
            .dividends
            .lock()
            .unwrap()
            .get(figi)
            .map(|all| {
                all.iter()
                    .filter(|d| d.payment_date >= from && d.payment_date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
