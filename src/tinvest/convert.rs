//! Wire messages to store records.

use super::proto;
use crate::db::postgres::models::candle::Candle;
use crate::db::postgres::models::dividend::Dividend;
use crate::db::postgres::models::instrument::{Instrument, InstrumentKind, TradingStatus};
use crate::services::candles::resolution::Resolution;
use crate::utils::decimal;
use chrono::{DateTime, Utc};
use prost_types::Timestamp;

pub fn to_timestamp(time: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

pub fn from_timestamp(ts: &Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}

/// Dates the broker leaves unset arrive as the zero timestamp.
fn optional_date(ts: Option<&Timestamp>) -> Option<DateTime<Utc>> {
    ts.filter(|ts| ts.seconds != 0 || ts.nanos != 0)
        .and_then(from_timestamp)
}

fn quotation_text(q: Option<&proto::Quotation>) -> String {
    q.map_or_else(|| "0".to_string(), |q| decimal::encode(q.units, q.nano))
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

fn real_exchange_name(code: i32) -> Option<String> {
    let name = match proto::RealExchange::try_from(code).ok()? {
        proto::RealExchange::Unspecified => return None,
        proto::RealExchange::Moex => "REAL_EXCHANGE_MOEX",
        proto::RealExchange::Rts => "REAL_EXCHANGE_RTS",
        proto::RealExchange::Otc => "REAL_EXCHANGE_OTC",
        proto::RealExchange::Dealer => "REAL_EXCHANGE_DEALER",
    };
    Some(name.to_string())
}

pub fn candle_interval(resolution: Resolution) -> proto::CandleInterval {
    use proto::CandleInterval as I;
    match resolution {
        Resolution::Min1 => I::OneMinute,
        Resolution::Min2 => I::TwoMinutes,
        Resolution::Min3 => I::ThreeMinutes,
        Resolution::Min5 => I::FiveMinutes,
        Resolution::Min10 => I::TenMinutes,
        Resolution::Min15 => I::FifteenMinutes,
        Resolution::Min30 => I::ThirtyMinutes,
        Resolution::Hour1 => I::Hour,
        Resolution::Hour2 => I::TwoHours,
        Resolution::Hour4 => I::FourHours,
        Resolution::Day => I::Day,
        Resolution::Week => I::Week,
        Resolution::Month => I::Month,
    }
}

/// `None` for a candle without a time.
pub fn candle_from_proto(candle: &proto::HistoricCandle) -> Option<Candle> {
    let time = candle.time.as_ref().and_then(from_timestamp)?;
    Some(Candle {
        time,
        open: quotation_text(candle.open.as_ref()),
        high: quotation_text(candle.high.as_ref()),
        low: quotation_text(candle.low.as_ref()),
        close: quotation_text(candle.close.as_ref()),
        volume: candle.volume,
    })
}

pub fn share_to_instrument(share: proto::Share) -> Instrument {
    Instrument {
        kind: InstrumentKind::Share {
            ipo_date: optional_date(share.ipo_date.as_ref()),
            issue_size: share.issue_size,
            div_yield_flag: share.div_yield_flag,
        },
        figi: share.figi,
        ticker: share.ticker,
        name: share.name,
        currency: share.currency,
        lot_size: share.lot,
        min_price_increment: quotation_text(share.min_price_increment.as_ref()),
        trading_status: TradingStatus::from_code(share.trading_status),
        enabled: false,
        isin: non_empty(share.isin),
        short_enabled_flag: share.short_enabled_flag,
        sector: non_empty(share.sector),
        real_exchange: real_exchange_name(share.real_exchange),
        first_1min_candle_date: optional_date(share.first_1min_candle_date.as_ref()),
        first_1day_candle_date: optional_date(share.first_1day_candle_date.as_ref()),
        last_loaded_time: None,
    }
}

pub fn bond_to_instrument(bond: proto::Bond) -> Instrument {
    Instrument {
        kind: InstrumentKind::Bond {
            issue_size: bond.issue_size,
            coupon_quantity_per_year: bond.coupon_quantity_per_year,
            maturity_date: optional_date(bond.maturity_date.as_ref()),
            placement_date: optional_date(bond.placement_date.as_ref()),
        },
        figi: bond.figi,
        ticker: bond.ticker,
        name: bond.name,
        currency: bond.currency,
        lot_size: bond.lot,
        min_price_increment: quotation_text(bond.min_price_increment.as_ref()),
        trading_status: TradingStatus::from_code(bond.trading_status),
        enabled: false,
        isin: non_empty(bond.isin),
        short_enabled_flag: bond.short_enabled_flag,
        sector: non_empty(bond.sector),
        real_exchange: real_exchange_name(bond.real_exchange),
        first_1min_candle_date: optional_date(bond.first_1min_candle_date.as_ref()),
        first_1day_candle_date: optional_date(bond.first_1day_candle_date.as_ref()),
        last_loaded_time: None,
    }
}

pub fn etf_to_instrument(etf: proto::Etf) -> Instrument {
    Instrument {
        kind: InstrumentKind::Etf {
            released_date: optional_date(etf.released_date.as_ref()),
            num_shares: etf
                .num_shares
                .as_ref()
                .map(|q| decimal::encode(q.units, q.nano)),
        },
        figi: etf.figi,
        ticker: etf.ticker,
        name: etf.name,
        currency: etf.currency,
        lot_size: etf.lot,
        min_price_increment: quotation_text(etf.min_price_increment.as_ref()),
        trading_status: TradingStatus::from_code(etf.trading_status),
        enabled: false,
        isin: non_empty(etf.isin),
        short_enabled_flag: etf.short_enabled_flag,
        sector: non_empty(etf.sector),
        real_exchange: real_exchange_name(etf.real_exchange),
        first_1min_candle_date: optional_date(etf.first_1min_candle_date.as_ref()),
        first_1day_candle_date: optional_date(etf.first_1day_candle_date.as_ref()),
        last_loaded_time: None,
    }
}

/// `None` for a dividend without a payment date.
pub fn dividend_from_proto(figi: &str, dividend: &proto::Dividend) -> Option<Dividend> {
    let payment_date = optional_date(dividend.payment_date.as_ref())?;
    let net = dividend
        .dividend_net
        .as_ref()
        .map(|net| decimal::MoneyValue::new(net.currency.clone(), net.units, net.nano))
        .unwrap_or_default();

    Some(Dividend {
        figi: figi.to_string(),
        payment_date,
        declared_date: optional_date(dividend.declared_date.as_ref()),
        amount: net.to_decimal_string(),
        currency: net.currency,
        yield_percent: dividend
            .yield_value
            .as_ref()
            .map(|q| decimal::encode(q.units, q.nano)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> Option<Timestamp> {
        Some(to_timestamp(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()))
    }

    #[test]
    fn test_candle_prices_are_exact() {
        let candle = proto::HistoricCandle {
            open: Some(proto::Quotation { units: 272, nano: 270_000_000 }),
            high: Some(proto::Quotation { units: 272, nano: 269_999_999 }),
            low: Some(proto::Quotation { units: 270, nano: 0 }),
            close: None,
            volume: 1_234,
            time: ts(2024, 1, 2),
            is_complete: true,
        };

        let converted = candle_from_proto(&candle).unwrap();
        assert_eq!(converted.open, "272.27");
        assert_eq!(converted.high, "272.269999999");
        assert_eq!(converted.low, "270");
        assert_eq!(converted.close, "0");
        assert_eq!(converted.volume, 1_234);
        assert_eq!(converted.time, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_candle_without_time_is_dropped() {
        let candle = proto::HistoricCandle {
            time: None,
            ..Default::default()
        };
        assert!(candle_from_proto(&candle).is_none());
    }

    #[test]
    fn test_share_conversion() {
        let share = proto::Share {
            figi: "BBG004730N88".to_string(),
            ticker: "SBER".to_string(),
            isin: "RU0009029540".to_string(),
            lot: 10,
            currency: "rub".to_string(),
            name: "Сбер Банк".to_string(),
            ipo_date: Some(Timestamp { seconds: 0, nanos: 0 }),
            issue_size: 21_586_948_000,
            sector: String::new(),
            trading_status: 5,
            div_yield_flag: true,
            min_price_increment: Some(proto::Quotation { units: 0, nano: 10_000_000 }),
            real_exchange: proto::RealExchange::Moex as i32,
            first_1day_candle_date: ts(2000, 1, 3),
            ..Default::default()
        };

        let instrument = share_to_instrument(share);
        assert_eq!(instrument.min_price_increment, "0.01");
        assert_eq!(instrument.trading_status, TradingStatus::NormalTrading);
        assert_eq!(instrument.isin.as_deref(), Some("RU0009029540"));
        assert_eq!(instrument.sector, None);
        assert_eq!(instrument.real_exchange.as_deref(), Some("REAL_EXCHANGE_MOEX"));
        assert!(!instrument.enabled);
        assert_eq!(
            instrument.kind,
            InstrumentKind::Share {
                ipo_date: None,
                issue_size: 21_586_948_000,
                div_yield_flag: true,
            }
        );
        assert_eq!(
            instrument.first_1day_candle_date,
            Some(Utc.with_ymd_and_hms(2000, 1, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_dividend_conversion() {
        let dividend = proto::Dividend {
            dividend_net: Some(proto::MoneyValue {
                currency: "rub".to_string(),
                units: 33,
                nano: 300_000_000,
            }),
            payment_date: ts(2024, 7, 11),
            declared_date: None,
            yield_value: Some(proto::Quotation { units: 10, nano: 750_000_000 }),
        };

        let converted = dividend_from_proto("BBG004730N88", &dividend).unwrap();
        assert_eq!(converted.amount, "33.3");
        assert_eq!(converted.currency, "rub");
        assert_eq!(converted.yield_percent.as_deref(), Some("10.75"));
        assert_eq!(converted.declared_date, None);

        let unpaid = proto::Dividend {
            payment_date: None,
            ..dividend
        };
        assert!(dividend_from_proto("BBG004730N88", &unpaid).is_none());
    }

    #[test]
    fn test_interval_mapping() {
        assert_eq!(candle_interval(Resolution::Min2) as i32, 6);
        assert_eq!(candle_interval(Resolution::Hour1) as i32, 4);
        assert_eq!(candle_interval(Resolution::Month) as i32, 13);
    }
}
