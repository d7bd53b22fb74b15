//! Exact conversion between the broker's fixed-point prices and decimal text.
//!
//! Prices arrive as `(units, nano)` pairs where `nano` is the fractional part
//! scaled by 10^9. Nothing here goes through `f64`: a float cannot hold values
//! like `272.27` and would store `272.269999999`.

/// Fractional digits carried by a nano value.
pub const NANO_DIGITS: usize = 9;

const NANO_SCALE: i128 = 1_000_000_000;

/// Fixed-point value as sent by the broker.
///
/// Negative values carry the sign on both parts: `-1.5` is `(-1, -500000000)`
/// and `-0.5` is `(0, -500000000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quotation {
    pub units: i64,
    pub nano: i32,
}

impl Quotation {
    pub fn new(units: i64, nano: i32) -> Self {
        Self { units, nano }
    }

    /// Parses decimal text; malformed input yields zero.
    pub fn parse(text: &str) -> Self {
        let (units, nano) = decode(text);
        Self { units, nano }
    }

    pub fn to_decimal_string(&self) -> String {
        encode(self.units, self.nano)
    }
}

/// A [`Quotation`] in a currency.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MoneyValue {
    pub currency: String,
    pub value: Quotation,
}

impl MoneyValue {
    pub fn new(currency: impl Into<String>, units: i64, nano: i32) -> Self {
        Self {
            currency: currency.into(),
            value: Quotation::new(units, nano),
        }
    }

    pub fn to_decimal_string(&self) -> String {
        self.value.to_decimal_string()
    }
}

/// Canonical decimal text for a `(units, nano)` pair.
///
/// A zero fraction yields the integer alone; otherwise the fraction is
/// zero-padded to nine digits and trailing zeros are stripped.
pub fn encode(units: i64, nano: i32) -> String {
    let total = i128::from(units) * NANO_SCALE + i128::from(nano);
    let sign = if total < 0 { "-" } else { "" };
    let magnitude = total.unsigned_abs();
    let whole = magnitude / NANO_SCALE as u128;
    let fraction = magnitude % NANO_SCALE as u128;

    if fraction == 0 {
        return format!("{}{}", sign, whole);
    }

    let padded = format!("{:0width$}", fraction, width = NANO_DIGITS);
    format!("{}{}.{}", sign, whole, padded.trim_end_matches('0'))
}

/// Parses decimal text into a `(units, nano)` pair.
///
/// The fraction is right-padded or truncated to nine digits; digits past the
/// ninth are dropped, never rounded. Anything that is not a plain decimal
/// number decodes to `(0, 0)` so one bad value cannot abort a batch.
pub fn decode(text: &str) -> (i64, i32) {
    parse_parts(text).unwrap_or((0, 0))
}

/// Canonical form of decimal text, e.g. `"0.010000000"` becomes `"0.01"`.
pub fn normalize(text: &str) -> String {
    let (units, nano) = decode(text);
    encode(units, nano)
}

fn parse_parts(text: &str) -> Option<(i64, i32)> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() || !is_digits(int_part) || !is_digits(frac_part) {
        return None;
    }

    let units: i64 = int_part.parse().ok()?;
    let truncated = &frac_part[..frac_part.len().min(NANO_DIGITS)];
    let nano: i32 = if truncated.is_empty() {
        0
    } else {
        format!("{:0<width$}", truncated, width = NANO_DIGITS)
            .parse()
            .ok()?
    };

    if negative {
        Some((-units, -nano))
    } else {
        Some((units, nano))
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
