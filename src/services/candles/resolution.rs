use crate::env_config::models::app_config::{DEFAULT_API_LIMIT, LoadingConfig};
use chrono::TimeDelta;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Candle width supported by the market data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Min1,
    Min2,
    Min3,
    Min5,
    Min10,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Day,
    Week,
    Month,
}

impl Resolution {
    pub const ALL: [Resolution; 13] = [
        Resolution::Min1,
        Resolution::Min2,
        Resolution::Min3,
        Resolution::Min5,
        Resolution::Min10,
        Resolution::Min15,
        Resolution::Min30,
        Resolution::Hour1,
        Resolution::Hour2,
        Resolution::Hour4,
        Resolution::Day,
        Resolution::Week,
        Resolution::Month,
    ];

    /// Text stored in `candles.interval_type` and used as the config key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Min1 => "1min",
            Resolution::Min2 => "2min",
            Resolution::Min3 => "3min",
            Resolution::Min5 => "5min",
            Resolution::Min10 => "10min",
            Resolution::Min15 => "15min",
            Resolution::Min30 => "30min",
            Resolution::Hour1 => "1hour",
            Resolution::Hour2 => "2hour",
            Resolution::Hour4 => "4hour",
            Resolution::Day => "1day",
            Resolution::Week => "1week",
            Resolution::Month => "1month",
        }
    }

    /// Unit the API counts request limits in.
    ///
    /// Every intraday width up to one hour is limited in minutes, two and four
    /// hour candles in hours.
    pub fn atomic_unit(&self) -> TimeDelta {
        match self {
            Resolution::Min1
            | Resolution::Min2
            | Resolution::Min3
            | Resolution::Min5
            | Resolution::Min10
            | Resolution::Min15
            | Resolution::Min30
            | Resolution::Hour1 => TimeDelta::minutes(1),
            Resolution::Hour2 | Resolution::Hour4 => TimeDelta::hours(1),
            Resolution::Day => TimeDelta::hours(24),
            Resolution::Week => TimeDelta::days(7),
            Resolution::Month => TimeDelta::days(30),
        }
    }

    /// Key of `loading.limits` holding the rows-per-request limit.
    pub fn limit_key(&self) -> &'static str {
        match self {
            Resolution::Min1
            | Resolution::Min2
            | Resolution::Min3
            | Resolution::Min5
            | Resolution::Min10
            | Resolution::Min15
            | Resolution::Min30
            | Resolution::Hour1 => "1min",
            Resolution::Hour2 | Resolution::Hour4 => "1hour",
            Resolution::Day => "1day",
            Resolution::Week => "1week",
            Resolution::Month => "1month",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Resolution::ALL
            .iter()
            .find(|r| r.as_str() == needle)
            .copied()
            .ok_or_else(|| format!("unknown candle interval: {}", s))
    }
}

/// Per-resolution limits and freshness thresholds taken from `[loading]`.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPolicy {
    limits: HashMap<String, u32>,
    staleness: HashMap<String, u64>,
}

impl ResolutionPolicy {
    pub fn from_config(loading: &LoadingConfig) -> Self {
        Self {
            limits: loading.limits.clone(),
            staleness: loading.staleness_secs.clone(),
        }
    }

    pub fn api_limit(&self, resolution: Resolution) -> u32 {
        self.limits
            .get(resolution.limit_key())
            .copied()
            .unwrap_or(DEFAULT_API_LIMIT)
    }

    /// Data younger than this is considered current and is not re-fetched.
    pub fn staleness_threshold(&self, resolution: Resolution) -> TimeDelta {
        self.staleness
            .get(resolution.as_str())
            .and_then(|secs| TimeDelta::try_seconds(*secs as i64))
            .unwrap_or_else(|| resolution.atomic_unit())
    }
}
