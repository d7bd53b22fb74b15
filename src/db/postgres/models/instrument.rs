use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Trading state reported by the broker for an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingStatus {
    Unspecified,
    NotAvailableForTrading,
    OpeningPeriod,
    ClosingPeriod,
    BreakInTrading,
    NormalTrading,
    ClosingAuction,
    DarkPoolAuction,
    DiscreteAuction,
    OpeningAuctionPeriod,
    TradingAtClosingAuctionPrice,
    SessionAssigned,
    SessionClose,
    SessionOpen,
    DealerNormalTrading,
    DealerBreakInTrading,
    DealerNotAvailableForTrading,
}

impl TradingStatus {
    const NAMES: [(TradingStatus, &'static str); 17] = [
        (TradingStatus::Unspecified, "SECURITY_TRADING_STATUS_UNSPECIFIED"),
        (TradingStatus::NotAvailableForTrading, "SECURITY_TRADING_STATUS_NOT_AVAILABLE_FOR_TRADING"),
        (TradingStatus::OpeningPeriod, "SECURITY_TRADING_STATUS_OPENING_PERIOD"),
        (TradingStatus::ClosingPeriod, "SECURITY_TRADING_STATUS_CLOSING_PERIOD"),
        (TradingStatus::BreakInTrading, "SECURITY_TRADING_STATUS_BREAK_IN_TRADING"),
        (TradingStatus::NormalTrading, "SECURITY_TRADING_STATUS_NORMAL_TRADING"),
        (TradingStatus::ClosingAuction, "SECURITY_TRADING_STATUS_CLOSING_AUCTION"),
        (TradingStatus::DarkPoolAuction, "SECURITY_TRADING_STATUS_DARK_POOL_AUCTION"),
        (TradingStatus::DiscreteAuction, "SECURITY_TRADING_STATUS_DISCRETE_AUCTION"),
        (TradingStatus::OpeningAuctionPeriod, "SECURITY_TRADING_STATUS_OPENING_AUCTION_PERIOD"),
        (TradingStatus::TradingAtClosingAuctionPrice, "SECURITY_TRADING_STATUS_TRADING_AT_CLOSING_AUCTION_PRICE"),
        (TradingStatus::SessionAssigned, "SECURITY_TRADING_STATUS_SESSION_ASSIGNED"),
        (TradingStatus::SessionClose, "SECURITY_TRADING_STATUS_SESSION_CLOSE"),
        (TradingStatus::SessionOpen, "SECURITY_TRADING_STATUS_SESSION_OPEN"),
        (TradingStatus::DealerNormalTrading, "SECURITY_TRADING_STATUS_DEALER_NORMAL_TRADING"),
        (TradingStatus::DealerBreakInTrading, "SECURITY_TRADING_STATUS_DEALER_BREAK_IN_TRADING"),
        (TradingStatus::DealerNotAvailableForTrading, "SECURITY_TRADING_STATUS_DEALER_NOT_AVAILABLE_FOR_TRADING"),
    ];

    /// Maps the wire enum value; unknown codes become `Unspecified`.
    pub fn from_code(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::NAMES.get(idx))
            .map_or(TradingStatus::Unspecified, |(status, _)| *status)
    }

    pub fn as_str(&self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(status, _)| status == self)
            .map_or("SECURITY_TRADING_STATUS_UNSPECIFIED", |(_, name)| name)
    }

    pub fn is_normal_trading(&self) -> bool {
        *self == TradingStatus::NormalTrading
    }
}

impl fmt::Display for TradingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(status, _)| *status)
            .ok_or_else(|| format!("unknown trading status: {}", s))
    }
}

/// Instrument class as requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentType {
    Share,
    Bond,
    Etf,
}

impl InstrumentType {
    pub const ALL: [InstrumentType; 3] = [InstrumentType::Share, InstrumentType::Bond, InstrumentType::Etf];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Share => "share",
            InstrumentType::Bond => "bond",
            InstrumentType::Etf => "etf",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific instrument data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentKind {
    Share {
        ipo_date: Option<DateTime<Utc>>,
        issue_size: i64,
        div_yield_flag: bool,
    },
    Bond {
        issue_size: i64,
        coupon_quantity_per_year: i32,
        maturity_date: Option<DateTime<Utc>>,
        placement_date: Option<DateTime<Utc>>,
    },
    Etf {
        released_date: Option<DateTime<Utc>>,
        /// Exact decimal text
        num_shares: Option<String>,
    },
}

impl InstrumentKind {
    pub fn instrument_type(&self) -> InstrumentType {
        match self {
            InstrumentKind::Share { .. } => InstrumentType::Share,
            InstrumentKind::Bond { .. } => InstrumentType::Bond,
            InstrumentKind::Etf { .. } => InstrumentType::Etf,
        }
    }

    /// Value of `instruments.instrument_type`.
    pub fn type_name(&self) -> &'static str {
        self.instrument_type().as_str()
    }
}

/// Represents a record in the instruments table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub figi: String,
    pub ticker: String,
    pub name: String,
    pub kind: InstrumentKind,
    pub currency: String,
    pub lot_size: i32,
    /// Exact decimal text
    pub min_price_increment: String,
    pub trading_status: TradingStatus,
    /// Operator switch; only enabled instruments are loaded
    pub enabled: bool,
    pub isin: Option<String>,
    pub short_enabled_flag: bool,
    pub sector: Option<String>,
    pub real_exchange: Option<String>,
    pub first_1min_candle_date: Option<DateTime<Utc>>,
    pub first_1day_candle_date: Option<DateTime<Utc>>,
    /// Informational, written after each candle run
    pub last_loaded_time: Option<DateTime<Utc>>,
}

impl Instrument {
    /// Row to write when `incoming` metadata meets the `existing` stored row.
    ///
    /// Every column comes from `incoming` except `enabled` and
    /// `last_loaded_time`, which belong to the store. A new row starts disabled.
    pub fn merge_for_upsert(existing: Option<&Instrument>, incoming: &Instrument) -> Instrument {
        let mut merged = incoming.clone();
        match existing {
            Some(stored) => {
                merged.enabled = stored.enabled;
                merged.last_loaded_time = stored.last_loaded_time;
            }
            None => {
                merged.enabled = false;
                merged.last_loaded_time = None;
            }
        }
        merged
    }

    pub fn is_share(&self) -> bool {
        matches!(self.kind, InstrumentKind::Share { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::share;
    use chrono::TimeZone;

    #[test]
    fn test_merge_keeps_stored_enabled_flag() {
        let mut stored = share("BBG000B9XRY4", true);
        stored.last_loaded_time = Some(Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap());

        let mut incoming = share("BBG000B9XRY4", false);
        incoming.name = "Renamed".to_string();
        incoming.lot_size = 1;

        let merged = Instrument::merge_for_upsert(Some(&stored), &incoming);

        assert!(merged.enabled);
        assert_eq!(merged.name, "Renamed");
        assert_eq!(merged.lot_size, 1);
        assert_eq!(merged.last_loaded_time, stored.last_loaded_time);
    }

    #[test]
    fn test_merge_new_row_starts_disabled() {
        let incoming = share("BBG004730N88", true);
        let merged = Instrument::merge_for_upsert(None, &incoming);
        assert!(!merged.enabled);
    }

    #[test]
    fn test_trading_status_codes() {
        assert_eq!(TradingStatus::from_code(5), TradingStatus::NormalTrading);
        assert!(TradingStatus::from_code(5).is_normal_trading());
        assert_eq!(TradingStatus::from_code(99), TradingStatus::Unspecified);
        assert_eq!(TradingStatus::from_code(-1), TradingStatus::Unspecified);
        assert_eq!(
            "SECURITY_TRADING_STATUS_BREAK_IN_TRADING".parse::<TradingStatus>().unwrap(),
            TradingStatus::BreakInTrading
        );
        assert_eq!(
            TradingStatus::DealerNormalTrading.to_string(),
            "SECURITY_TRADING_STATUS_DEALER_NORMAL_TRADING"
        );
    }

    #[test]
    fn test_kind_type_names() {
        assert_eq!(share("X", false).kind.type_name(), "share");
        let etf = InstrumentKind::Etf {
            released_date: None,
            num_shares: Some("1500000".to_string()),
        };
        assert_eq!(etf.type_name(), "etf");
    }
}
