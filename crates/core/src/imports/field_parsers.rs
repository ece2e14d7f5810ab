//! Tolerant parsers for raw broker fields.
//!
//! Broker exports decorate numbers with currency symbols, thousands
//! separators and accounting-style parentheses, and mix date layouts even
//! within one vendor. These helpers strip that noise and return `None` when
//! nothing usable remains; callers decide whether absence is an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

const DATETIME_FORMATS: [&str; 9] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
];

// Two-digit years come first: `%Y` would happily read "24" as year 24.
const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%b %d, %Y", "%Y%m%d",
];

/// Parses a numeric field, keeping its sign.
///
/// Accepts `$1,234.50`, ` 12 `, `(12.50)` (negative), `-3`, `1.5e3`.
pub fn parse_decimal_field(raw: &str) -> Option<Decimal> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let mut negative = false;
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        negative = true;
        text = inner;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    Some(if negative { -value } else { value })
}

/// Quantities are unsigned; direction comes from explicit columns, never the sign.
pub fn parse_quantity(raw: &str) -> Option<Decimal> {
    parse_decimal_field(raw).map(|q| q.abs())
}

pub fn parse_price(raw: &str) -> Option<Decimal> {
    parse_decimal_field(raw).map(|p| p.abs())
}

/// Parses a date or timestamp in any of the layouts brokers commonly export.
/// Naive values are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let mut text = raw.trim();
    // "01/31/2024 as of 01/30/2024": the leading value is the trade date.
    if let Some(idx) = text.to_ascii_lowercase().find(" as of ") {
        text = text[..idx].trim();
    }
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Trims and upper-cases a symbol; `None` when blank.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_strips_formatting_noise() {
        assert_eq!(parse_decimal_field("$1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal_field("  42 "), Some(dec!(42)));
        assert_eq!(parse_decimal_field("£2,000"), Some(dec!(2000)));
        assert_eq!(parse_decimal_field("(12.50)"), Some(dec!(-12.50)));
        assert_eq!(parse_decimal_field("-$7.25"), Some(dec!(-7.25)));
        assert_eq!(parse_decimal_field("1.5e3"), Some(dec!(1500)));
    }

    #[test]
    fn test_decimal_rejects_blank_and_garbage() {
        assert_eq!(parse_decimal_field(""), None);
        assert_eq!(parse_decimal_field("   "), None);
        assert_eq!(parse_decimal_field("$"), None);
        assert_eq!(parse_decimal_field("n/a"), None);
    }

    #[test]
    fn test_quantity_and_price_are_absolute() {
        assert_eq!(parse_quantity("-25"), Some(dec!(25)));
        assert_eq!(parse_quantity("(3)"), Some(dec!(3)));
        assert_eq!(parse_price("-$10.00"), Some(dec!(10.00)));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        for raw in [
            "2024-03-15",
            "03/15/2024",
            "03/15/24",
            "15-Mar-2024",
            "Mar 15, 2024",
            "20240315",
            "2024/03/15",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "format {raw}");
        }
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 5).unwrap();
        assert_eq!(parse_date("2024-03-15 14:30:05"), Some(expected));
        assert_eq!(parse_date("2024-03-15T14:30:05Z"), Some(expected));
        assert_eq!(parse_date("2024-03-15T16:30:05+02:00"), Some(expected));
        assert_eq!(parse_date("03/15/2024 02:30:05 PM"), Some(expected));
    }

    #[test]
    fn test_parse_date_ignores_as_of_qualifier() {
        assert_eq!(
            parse_date("03/15/2024 as of 03/14/2024"),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("13/45/2024"), None);
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("  "), None);
    }
}
