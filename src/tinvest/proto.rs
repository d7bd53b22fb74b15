//! Wire messages of the T-Invest gRPC contract
//! (`tinkoff.public.invest.api.contract.v1`), limited to the fields the loader reads.
//! Unknown fields in responses are skipped by the decoder.

use prost_types::Timestamp;

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Quotation {
    #[prost(int64, tag = "1")]
    pub units: i64,
    #[prost(int32, tag = "2")]
    pub nano: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MoneyValue {
    #[prost(string, tag = "1")]
    pub currency: String,
    #[prost(int64, tag = "2")]
    pub units: i64,
    #[prost(int32, tag = "3")]
    pub nano: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CandleInterval {
    Unspecified = 0,
    OneMinute = 1,
    FiveMinutes = 2,
    FifteenMinutes = 3,
    Hour = 4,
    Day = 5,
    TwoMinutes = 6,
    ThreeMinutes = 7,
    TenMinutes = 8,
    ThirtyMinutes = 9,
    TwoHours = 10,
    FourHours = 11,
    Week = 12,
    Month = 13,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum InstrumentStatus {
    Unspecified = 0,
    Base = 1,
    All = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RealExchange {
    Unspecified = 0,
    Moex = 1,
    Rts = 2,
    Otc = 3,
    Dealer = 4,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetCandlesRequest {
    #[prost(message, optional, tag = "2")]
    pub from: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub to: Option<Timestamp>,
    #[prost(enumeration = "CandleInterval", tag = "4")]
    pub interval: i32,
    #[prost(string, optional, tag = "5")]
    pub instrument_id: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetCandlesResponse {
    #[prost(message, repeated, tag = "1")]
    pub candles: Vec<HistoricCandle>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HistoricCandle {
    #[prost(message, optional, tag = "1")]
    pub open: Option<Quotation>,
    #[prost(message, optional, tag = "2")]
    pub high: Option<Quotation>,
    #[prost(message, optional, tag = "3")]
    pub low: Option<Quotation>,
    #[prost(message, optional, tag = "4")]
    pub close: Option<Quotation>,
    #[prost(int64, tag = "5")]
    pub volume: i64,
    #[prost(message, optional, tag = "6")]
    pub time: Option<Timestamp>,
    #[prost(bool, tag = "7")]
    pub is_complete: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstrumentsRequest {
    #[prost(enumeration = "InstrumentStatus", tag = "1")]
    pub instrument_status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SharesResponse {
    #[prost(message, repeated, tag = "1")]
    pub instruments: Vec<Share>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BondsResponse {
    #[prost(message, repeated, tag = "1")]
    pub instruments: Vec<Bond>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EtfsResponse {
    #[prost(message, repeated, tag = "1")]
    pub instruments: Vec<Etf>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Share {
    #[prost(string, tag = "1")]
    pub figi: String,
    #[prost(string, tag = "2")]
    pub ticker: String,
    #[prost(string, tag = "4")]
    pub isin: String,
    #[prost(int32, tag = "5")]
    pub lot: i32,
    #[prost(string, tag = "6")]
    pub currency: String,
    #[prost(bool, tag = "13")]
    pub short_enabled_flag: bool,
    #[prost(string, tag = "15")]
    pub name: String,
    #[prost(message, optional, tag = "17")]
    pub ipo_date: Option<Timestamp>,
    #[prost(int64, tag = "18")]
    pub issue_size: i64,
    #[prost(string, tag = "21")]
    pub sector: String,
    #[prost(int32, tag = "25")]
    pub trading_status: i32,
    #[prost(bool, tag = "29")]
    pub div_yield_flag: bool,
    #[prost(message, optional, tag = "31")]
    pub min_price_increment: Option<Quotation>,
    #[prost(string, tag = "33")]
    pub uid: String,
    #[prost(enumeration = "RealExchange", tag = "34")]
    pub real_exchange: i32,
    #[prost(message, optional, tag = "56")]
    pub first_1min_candle_date: Option<Timestamp>,
    #[prost(message, optional, tag = "57")]
    pub first_1day_candle_date: Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Bond {
    #[prost(string, tag = "1")]
    pub figi: String,
    #[prost(string, tag = "2")]
    pub ticker: String,
    #[prost(string, tag = "4")]
    pub isin: String,
    #[prost(int32, tag = "5")]
    pub lot: i32,
    #[prost(string, tag = "6")]
    pub currency: String,
    #[prost(bool, tag = "13")]
    pub short_enabled_flag: bool,
    #[prost(string, tag = "15")]
    pub name: String,
    #[prost(int32, tag = "17")]
    pub coupon_quantity_per_year: i32,
    #[prost(message, optional, tag = "18")]
    pub maturity_date: Option<Timestamp>,
    #[prost(message, optional, tag = "22")]
    pub placement_date: Option<Timestamp>,
    #[prost(string, tag = "27")]
    pub sector: String,
    #[prost(int64, tag = "29")]
    pub issue_size: i64,
    #[prost(int32, tag = "31")]
    pub trading_status: i32,
    #[prost(message, optional, tag = "38")]
    pub min_price_increment: Option<Quotation>,
    #[prost(enumeration = "RealExchange", tag = "41")]
    pub real_exchange: i32,
    #[prost(message, optional, tag = "61")]
    pub first_1min_candle_date: Option<Timestamp>,
    #[prost(message, optional, tag = "62")]
    pub first_1day_candle_date: Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Etf {
    #[prost(string, tag = "1")]
    pub figi: String,
    #[prost(string, tag = "2")]
    pub ticker: String,
    #[prost(string, tag = "4")]
    pub isin: String,
    #[prost(int32, tag = "5")]
    pub lot: i32,
    #[prost(string, tag = "6")]
    pub currency: String,
    #[prost(bool, tag = "13")]
    pub short_enabled_flag: bool,
    #[prost(string, tag = "15")]
    pub name: String,
    #[prost(message, optional, tag = "19")]
    pub released_date: Option<Timestamp>,
    #[prost(message, optional, tag = "20")]
    pub num_shares: Option<Quotation>,
    #[prost(string, tag = "23")]
    pub sector: String,
    #[prost(int32, tag = "25")]
    pub trading_status: i32,
    #[prost(message, optional, tag = "29")]
    pub min_price_increment: Option<Quotation>,
    #[prost(enumeration = "RealExchange", tag = "32")]
    pub real_exchange: i32,
    #[prost(message, optional, tag = "56")]
    pub first_1min_candle_date: Option<Timestamp>,
    #[prost(message, optional, tag = "57")]
    pub first_1day_candle_date: Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetDividendsRequest {
    #[prost(message, optional, tag = "2")]
    pub from: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub to: Option<Timestamp>,
    #[prost(string, optional, tag = "4")]
    pub instrument_id: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetDividendsResponse {
    #[prost(message, repeated, tag = "1")]
    pub dividends: Vec<Dividend>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Dividend {
    #[prost(message, optional, tag = "1")]
    pub dividend_net: Option<MoneyValue>,
    #[prost(message, optional, tag = "2")]
    pub payment_date: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub declared_date: Option<Timestamp>,
    #[prost(message, optional, tag = "9")]
    pub yield_value: Option<Quotation>,
}
