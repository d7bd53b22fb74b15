use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Rows per request used when the limits table has no entry for a key.
pub const DEFAULT_API_LIMIT: u32 = 1440;
/// History depth used when `loading.start_date` is not set.
pub const DEFAULT_YEARS_BACK: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub log: LogConfig,
    pub postgres: PostgresConfig,
    pub tinvest: TinvestConfig,
    pub loading: LoadingConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub struct PostgresConfig {
    pub timeout: u64,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: u64,
    pub idle_timeout: u64,
}

#[derive(Debug, Deserialize)]
pub struct TinvestConfig {
    pub endpoint: String,
    pub app_name: String,
    /// Per-call deadline, seconds.
    pub timeout: u64,
}

#[derive(Debug, Deserialize)]
pub struct LoadingConfig {
    /// First day of history for instruments with no candles, `YYYY-MM-DD`.
    #[serde(default)]
    pub start_date: Option<String>,
    /// Rows per request, keyed by resolution text (`1min`, `1hour`, `1day`, ...).
    #[serde(default)]
    pub limits: HashMap<String, u32>,
    #[serde(default)]
    pub rate_limit_pause_ms: u64,
    /// Optional per-resolution freshness thresholds, seconds.
    #[serde(default)]
    pub staleness_secs: HashMap<String, u64>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_url")]
    pub base_url: String,
    #[serde(default)]
    pub temp_dir: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Per-request deadline, seconds.
    #[serde(default = "default_archive_timeout")]
    pub timeout: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_archive_url(),
            temp_dir: None,
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout: default_archive_timeout(),
        }
    }
}

fn default_archive_url() -> String {
    "https://invest-public-api.tbank.ru/history-data".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5_000
}

fn default_archive_timeout() -> u64 {
    30
}

impl LoadingConfig {
    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limit_pause_ms)
    }

    /// Start of history as midnight UTC.
    ///
    /// Without a configured date the history reaches back [`DEFAULT_YEARS_BACK`]
    /// years from `now`.
    pub fn history_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        match self.start_date.as_deref() {
            None | Some("") => Ok(now
                .checked_sub_months(Months::new(DEFAULT_YEARS_BACK * 12))
                .unwrap_or(now)),
            Some(raw) => {
                parse_start_date(raw, now).map_err(|e| format!("loading.start_date: {}", e))
            }
        }
    }
}

/// Parses a `YYYY-MM-DD` history start as midnight UTC; dates after `now` are rejected.
pub fn parse_start_date(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("'{}' is not a YYYY-MM-DD date: {}", raw, e))?;
    let start = date.and_time(NaiveTime::MIN).and_utc();
    if start > now {
        return Err(format!("{} is in the future", raw));
    }
    Ok(start)
}

impl ArchiveConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_start_date() {
        assert_eq!(
            parse_start_date("2024-01-01", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_start_date(" 2024-06-15 ", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_start_date_rejects_future_and_garbage() {
        assert!(parse_start_date("2024-06-16", now()).unwrap_err().contains("future"));
        assert!(parse_start_date("15.06.2024", now()).is_err());
        assert!(parse_start_date("", now()).is_err());
    }
}
