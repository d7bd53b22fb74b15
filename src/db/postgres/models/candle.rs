use chrono::{DateTime, Utc};

/// One price bar. Prices are exact decimal text produced by `utils::decimal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: i64,
}
