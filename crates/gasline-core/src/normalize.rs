//! Turns raw extracted text or JSON into a trusted price.
//!
//! Both strategies pass through here, so a garbage attribute and a garbage
//! service response are rejected the same way: the result is `None` and the
//! artifact records an absent value.

use serde_json::Value;

/// Default ceiling for a per-gallon price.
pub const DEFAULT_MAX_PRICE: f64 = 100.0;

/// Accepted range for a price: strictly above zero, at most `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub max: f64,
}

impl PriceBounds {
    pub fn new(max: f64) -> Self {
        Self { max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value > 0.0 && value <= self.max
    }
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRICE)
    }
}

/// Parses a plain decimal literal (`3.47`, `+3`, `.5`).
///
/// Exponents, `inf`, `NaN`, thousands separators and currency symbols are
/// rejected.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);

    if digits.is_empty() || !digits.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    if digits.bytes().filter(|&b| b == b'.').count() > 1 {
        return None;
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalizes an attribute string into a price within `bounds`.
pub fn price_from_str(raw: &str, bounds: PriceBounds) -> Option<f64> {
    parse_decimal(raw).filter(|v| bounds.contains(*v))
}

/// Normalizes a JSON value from the extraction service into a price within
/// `bounds`. Numbers are taken as-is; strings go through [`parse_decimal`].
pub fn price_from_json(value: &Value, bounds: PriceBounds) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };
    parsed.filter(|v| bounds.contains(*v))
}
