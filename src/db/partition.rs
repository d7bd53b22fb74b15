//! Monthly candle partitions and the write loop that creates them on demand.

use super::error::{RecordFailure, StoreError};
use super::postgres::error_class::FailureKind;
use super::postgres::models::candle::Candle;
use crate::services::candles::resolution::Resolution;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

/// The `candles_YYYY_MM` partition covering `[month start, next month start)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthPartition {
    pub year: i32,
    pub month: u32,
}

impl MonthPartition {
    pub fn containing(time: DateTime<Utc>) -> Self {
        Self {
            year: time.year(),
            month: time.month(),
        }
    }

    pub fn months_of_year(year: i32) -> impl Iterator<Item = MonthPartition> {
        (1..=12).map(move |month| MonthPartition { year, month })
    }

    pub fn name(&self) -> String {
        format!("candles_{}_{:02}", self.year, self.month)
    }

    pub fn lower_bound(&self) -> DateTime<Utc> {
        month_start(self.year, self.month)
    }

    /// Exclusive upper bound: the first instant of the following month.
    pub fn upper_bound(&self) -> DateTime<Utc> {
        if self.month == 12 {
            month_start(self.year + 1, 1)
        } else {
            month_start(self.year, self.month + 1)
        }
    }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
        .and_utc()
}

/// Single-row failure as seen by the write loop.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub kind: FailureKind,
    pub reason: String,
}

/// Row-level candle writes against a partitioned table.
#[async_trait]
pub trait CandleSink {
    async fn insert_candle(
        &self,
        figi: &str,
        resolution: Resolution,
        candle: &Candle,
    ) -> Result<(), WriteFailure>;

    async fn create_partition(&self, partition: &MonthPartition) -> Result<(), StoreError>;
}

/// Writes every candle, creating a missing month partition and retrying the row once.
///
/// A failing row never stops the batch. Returns the number written, or
/// [`StoreError::PartialBatch`] when any row could not be stored.
pub async fn write_with_partition_heal<S>(
    sink: &S,
    figi: &str,
    resolution: Resolution,
    candles: &[Candle],
) -> Result<usize, StoreError>
where
    S: CandleSink + Sync + ?Sized,
{
    let mut written = 0;
    let mut failures = Vec::new();

    for candle in candles {
        let failure = match sink.insert_candle(figi, resolution, candle).await {
            Ok(()) => {
                written += 1;
                continue;
            }
            Err(failure) => failure,
        };

        if failure.kind != FailureKind::MissingPartition {
            warn!(
                "Candle {} {} at {} rejected: {}",
                figi, resolution, candle.time, failure.reason
            );
            failures.push(RecordFailure {
                time: candle.time,
                kind: failure.kind,
                reason: failure.reason,
            });
            continue;
        }

        let partition = MonthPartition::containing(candle.time);
        debug!("Partition {} missing, creating it", partition.name());
        if let Err(e) = sink.create_partition(&partition).await {
            warn!("Failed to create partition {}: {}", partition.name(), e);
            failures.push(RecordFailure {
                time: candle.time,
                kind: FailureKind::MissingPartition,
                reason: e.to_string(),
            });
            continue;
        }

        match sink.insert_candle(figi, resolution, candle).await {
            Ok(()) => written += 1,
            Err(retry) => {
                warn!(
                    "Candle {} {} at {} rejected after creating {}: {}",
                    figi,
                    resolution,
                    candle.time,
                    partition.name(),
                    retry.reason
                );
                failures.push(RecordFailure {
                    time: candle.time,
                    kind: retry.kind,
                    reason: retry.reason,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(written)
    } else {
        Err(StoreError::PartialBatch { written, failures })
    }
}
