//! Schema-bound adapter for activity statements.
//!
//! These exports list every account activity (trades, dividends, fees,
//! transfers, expirations) with an explicit activity type and a BUY/SELL
//! sub-type. Only trade rows are turned into fragments.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use super::{HeaderIndex, RecordView, RowOutcome, TradeFragment};
use crate::imports::field_parsers::{
    normalize_symbol, parse_date, parse_decimal_field, parse_price, parse_quantity,
};
use crate::trades::{InstrumentType, OptionType, TradeAction};

const TRANSACTION_DATE: &str = "transaction_date";
const ACTIVITY_TYPE: &str = "activity_type";
const ACTIVITY_SUB_TYPE: &str = "activity_sub_type";
const SYMBOL: &str = "symbol";
const UNDERLYING_SYMBOL: &str = "underlying_symbol";
const QUANTITY: &str = "quantity";
const UNIT_PRICE: &str = "unit_price";
const COMMISSION: &str = "commission";
const CURRENCY: &str = "currency";
const NAME_COLUMN: &str = "name";

const FINGERPRINT: [&str; 6] = [
    TRANSACTION_DATE,
    ACTIVITY_TYPE,
    ACTIVITY_SUB_TYPE,
    SYMBOL,
    QUANTITY,
    UNIT_PRICE,
];

const TRADE_ACTIVITY: &str = "trade";

// ROOT + YYMMDD + C/P + strike * 1000 (8 digits), e.g. "AAPL  240315C00150000".
static OCC_SYMBOL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9.]{0,5})\s*(\d{6})([CP])(\d{8})$").expect("Invalid regex pattern")
});

/// A listed option contract decoded from its OCC symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccContract {
    pub root: String,
    pub expiration: DateTime<Utc>,
    pub option_type: OptionType,
    pub strike: Decimal,
}

pub fn parse_occ_symbol(raw: &str) -> Option<OccContract> {
    let symbol = raw.trim().to_uppercase();
    let caps = OCC_SYMBOL_REGEX.captures(&symbol)?;

    let expiration = NaiveDate::parse_from_str(&caps[2], "%y%m%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))?;
    let option_type = if &caps[3] == "C" {
        OptionType::Call
    } else {
        OptionType::Put
    };
    let strike = Decimal::from_str(&caps[4]).ok()? / Decimal::ONE_THOUSAND;

    Some(OccContract {
        root: caps[1].to_string(),
        expiration,
        option_type,
        strike,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementAdapter;

impl StatementAdapter {
    pub const NAME: &'static str = "activity-statement";

    pub fn detect(&self, headers: &HeaderIndex) -> bool {
        self.missing_columns(headers).is_empty()
    }

    pub fn missing_columns(&self, headers: &HeaderIndex) -> Vec<&'static str> {
        FINGERPRINT
            .into_iter()
            .filter(|column| !headers.contains(column))
            .collect()
    }

    pub fn parse(&self, record: &RecordView<'_>) -> RowOutcome {
        let Some(activity) = record.get(ACTIVITY_TYPE) else {
            return RowOutcome::Fail("Missing activity type".to_string());
        };
        if !activity.eq_ignore_ascii_case(TRADE_ACTIVITY) {
            return RowOutcome::Skip;
        }

        let sub_type = record.get(ACTIVITY_SUB_TYPE).unwrap_or_default();
        let side = match sub_type.to_ascii_uppercase().as_str() {
            "BUY" => TradeAction::Buy,
            "SELL" => TradeAction::Sell,
            _ => {
                return RowOutcome::Fail(format!(
                    "Invalid trade sub-type '{}': expected BUY or SELL",
                    sub_type
                ))
            }
        };

        let mut fragment = TradeFragment::new(side);

        if let Some(raw) = record.get(TRANSACTION_DATE) {
            match parse_date(raw) {
                Some(date) => fragment.date = Some(date),
                None => return RowOutcome::Fail(format!("Invalid date '{}'", raw)),
            }
        }
        if let Some(raw) = record.get(QUANTITY) {
            match parse_quantity(raw) {
                Some(quantity) => fragment.quantity = Some(quantity),
                None => return RowOutcome::Fail(format!("Invalid quantity '{}'", raw)),
            }
        }
        if let Some(raw) = record.get(UNIT_PRICE) {
            match parse_price(raw) {
                Some(price) => fragment.price = Some(price),
                None => return RowOutcome::Fail(format!("Invalid unit price '{}'", raw)),
            }
        }
        if let Some(raw) = record.get(COMMISSION) {
            match parse_decimal_field(raw) {
                Some(fee) => fragment.fees = fee.abs(),
                None => return RowOutcome::Fail(format!("Invalid commission '{}'", raw)),
            }
        }

        let raw_symbol = record.get(SYMBOL).and_then(normalize_symbol);
        let underlying = record.get(UNDERLYING_SYMBOL).and_then(normalize_symbol);
        let option_contract = raw_symbol.as_deref().and_then(parse_occ_symbol);
        let is_option = option_contract.is_some()
            || matches!((&underlying, &raw_symbol), (Some(u), Some(s)) if u != s);

        fragment.symbol = underlying
            .clone()
            .or_else(|| option_contract.as_ref().map(|c| c.root.clone()))
            .or_else(|| raw_symbol.clone());
        if is_option {
            fragment.instrument_type = InstrumentType::Option;
            fragment.contract_symbol = raw_symbol;
            fragment.option_contract = option_contract;
        }

        fragment.currency = record.get(CURRENCY).map(|c| c.to_uppercase());
        fragment.description = record.get(NAME_COLUMN).map(str::to_string);

        RowOutcome::Parsed(fragment)
    }
}
