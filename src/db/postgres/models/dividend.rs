use chrono::{DateTime, Utc};

/// Represents a record in the dividends table, unique per `(figi, payment_date)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dividend {
    pub figi: String,
    pub payment_date: DateTime<Utc>,
    pub declared_date: Option<DateTime<Utc>>,
    /// Net amount per share, exact decimal text
    pub amount: String,
    pub currency: String,
    /// Yield in percent, exact decimal text
    pub yield_percent: Option<String>,
}
