//! Rows of the broker's yearly minute-candle CSV extracts.
//!
//! Each row is `uid;time;open;close;high;low;volume` without a header.

use crate::db::postgres::models::candle::Candle;
use crate::utils::decimal;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::debug;

const MIN_FIELDS: usize = 7;
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Default)]
pub struct ParsedFile {
    pub candles: Vec<Candle>,
    pub rows: usize,
    pub skipped: usize,
}

pub fn parse_csv<R: Read>(reader: R) -> ParsedFile {
    let mut csv = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut parsed = ParsedFile::default();
    for (index, result) in csv.records().enumerate() {
        parsed.rows += 1;
        let row = index + 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!("Row {}: unreadable: {}", row, e);
                parsed.skipped += 1;
                continue;
            }
        };

        match parse_row(&record) {
            Ok(candle) => parsed.candles.push(candle),
            Err(reason) => {
                debug!("Row {}: {}, skipping", row, reason);
                parsed.skipped += 1;
            }
        }
    }
    parsed
}

fn parse_row(record: &StringRecord) -> Result<Candle, String> {
    if record.len() < MIN_FIELDS {
        return Err(format!("{} fields", record.len()));
    }

    let field = |i: usize| record.get(i).unwrap_or_default().trim();

    let time = NaiveDateTime::parse_from_str(field(1), TIME_FORMAT)
        .map_err(|e| format!("bad time '{}': {}", field(1), e))?
        .and_utc();
    let volume = field(6)
        .parse::<i64>()
        .map_err(|e| format!("bad volume '{}': {}", field(6), e))?;

    Ok(Candle {
        time,
        open: decimal::normalize(field(2)),
        close: decimal::normalize(field(3)),
        high: decimal::normalize(field(4)),
        low: decimal::normalize(field(5)),
        volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_rows() {
        let data = "\
e6123145-9665-43e0-8413-cd61b8aa9b13;2024-01-03T07:00:00Z;272.27;272.5;272.8;271.95;1520;
e6123145-9665-43e0-8413-cd61b8aa9b13;2024-01-03T07:01:00Z;272.5;272.269999999;272.5;272.2;310;
";
        let parsed = parse_csv(data.as_bytes());

        assert_eq!(parsed.rows, 2);
        assert_eq!(parsed.skipped, 0);
        let first = &parsed.candles[0];
        assert_eq!(first.time, Utc.with_ymd_and_hms(2024, 1, 3, 7, 0, 0).unwrap());
        assert_eq!(first.open, "272.27");
        assert_eq!(first.close, "272.5");
        assert_eq!(first.high, "272.8");
        assert_eq!(first.low, "271.95");
        assert_eq!(first.volume, 1520);
        assert_eq!(parsed.candles[1].close, "272.269999999");
    }

    #[test]
    fn test_short_and_malformed_rows_are_skipped() {
        let data = "\
uid;2024-01-03T07:00:00Z;1;2;3
uid;not-a-time;1;2;3;4;5
uid;2024-01-03T07:02:00Z;1;2;3;4;many
uid;2024-01-03T07:03:00Z;10.1234567891;10;10;10;7
";
        let parsed = parse_csv(data.as_bytes());

        assert_eq!(parsed.rows, 4);
        assert_eq!(parsed.skipped, 3);
        assert_eq!(parsed.candles.len(), 1);
        assert_eq!(parsed.candles[0].open, "10.123456789");
    }

    #[test]
    fn test_malformed_price_becomes_zero() {
        let parsed = parse_csv("uid;2024-01-03T07:00:00Z;abc;1;1;1;1".as_bytes());
        assert_eq!(parsed.candles[0].open, "0");
    }
}
