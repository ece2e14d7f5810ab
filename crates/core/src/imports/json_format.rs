//! JSON import and export of trades.
//!
//! Import accepts an array of pre-shaped trade objects, tolerating the
//! timestamp and number encodings other tools emit. Identifiers are dropped;
//! the store assigns new ones. Export writes decimals as strings so a
//! re-import reproduces values exactly.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Number, Value};

use super::field_parsers::{parse_date, parse_decimal_field};
use crate::errors::ImportError;
use crate::trades::{
    compute_pnl, compute_pnl_percent, InstrumentType, MatchedTrade, OptionLeg, OptionType,
    PositionDirection, Trade, TradeAction, TradeStatus,
};
use crate::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FlexibleTimestamp {
    Text(String),
    Millis(i64),
    Parts {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
}

impl FlexibleTimestamp {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Text(text) => parse_date(text),
            Self::Millis(millis) => Utc.timestamp_millis_opt(*millis).single(),
            Self::Parts {
                seconds,
                nanoseconds,
            } => Utc.timestamp_opt(*seconds, *nanoseconds).single(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FlexibleDecimal {
    Text(String),
    Number(Number),
}

impl FlexibleDecimal {
    fn resolve(&self) -> Option<Decimal> {
        match self {
            Self::Text(text) => parse_decimal_field(text),
            Self::Number(number) => parse_decimal_field(&number.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonOptionLeg {
    option_type: String,
    strike: FlexibleDecimal,
    expiration: FlexibleTimestamp,
    quantity: FlexibleDecimal,
    action: String,
    #[serde(default)]
    premium: Option<FlexibleDecimal>,
}

/// One element of a JSON import. Unknown fields (including `id`) are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonTradeRecord {
    symbol: String,
    #[serde(default)]
    match_key: Option<String>,
    #[serde(default)]
    instrument_type: Option<String>,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "date")]
    entry_date: Option<FlexibleTimestamp>,
    #[serde(default)]
    exit_date: Option<FlexibleTimestamp>,
    entry_price: FlexibleDecimal,
    #[serde(default)]
    exit_price: Option<FlexibleDecimal>,
    quantity: FlexibleDecimal,
    #[serde(default)]
    pnl: Option<FlexibleDecimal>,
    #[serde(default)]
    pnl_percent: Option<FlexibleDecimal>,
    #[serde(default)]
    fees: Option<FlexibleDecimal>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    created_at: Option<FlexibleTimestamp>,
    #[serde(default)]
    legs: Vec<JsonOptionLeg>,
}

/// Trades read from a JSON document plus per-element failure messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonImport {
    pub trades: Vec<MatchedTrade>,
    pub failures: Vec<String>,
}

/// Parses a JSON array of trade objects.
///
/// A document that is not valid JSON, is not an array, or is an empty array
/// fails as a whole. Individual malformed elements are reported in
/// [`JsonImport::failures`] as `Trade N: reason` (1-based).
pub fn parse_json_trades(content: &[u8]) -> Result<JsonImport> {
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(ImportError::EmptyFile.into());
    }

    let document: Value = serde_json::from_slice(content)?;
    let Value::Array(elements) = document else {
        return Err(ImportError::InvalidJson("expected an array of trades".to_string()).into());
    };
    if elements.is_empty() {
        return Err(ImportError::EmptyFile.into());
    }

    let mut import = JsonImport::default();
    for (idx, element) in elements.into_iter().enumerate() {
        let converted = serde_json::from_value::<JsonTradeRecord>(element)
            .map_err(|e| e.to_string())
            .and_then(into_matched_trade);
        match converted {
            Ok(trade) => import.trades.push(trade),
            Err(reason) => import.failures.push(format!("Trade {}: {}", idx + 1, reason)),
        }
    }
    Ok(import)
}

/// Serializes stored trades (ids included) as a pretty-printed JSON array.
pub fn export_trades_json(trades: &[Trade]) -> Result<String> {
    Ok(serde_json::to_string_pretty(trades)?)
}

fn required_decimal(value: &FlexibleDecimal, field: &str) -> std::result::Result<Decimal, String> {
    value
        .resolve()
        .ok_or_else(|| format!("Invalid {}: {:?}", field, value))
}

fn optional_decimal(
    value: Option<&FlexibleDecimal>,
    field: &str,
) -> std::result::Result<Option<Decimal>, String> {
    value.map(|v| required_decimal(v, field)).transpose()
}

fn optional_timestamp(
    value: Option<&FlexibleTimestamp>,
    field: &str,
) -> std::result::Result<Option<DateTime<Utc>>, String> {
    value
        .map(|v| {
            v.resolve()
                .ok_or_else(|| format!("Invalid {}: {:?}", field, v))
        })
        .transpose()
}

fn into_leg(leg: JsonOptionLeg) -> std::result::Result<OptionLeg, String> {
    let option_type = match leg.option_type.trim().to_ascii_uppercase().as_str() {
        "CALL" | "C" => OptionType::Call,
        "PUT" | "P" => OptionType::Put,
        other => return Err(format!("Invalid leg option type: {}", other)),
    };
    Ok(OptionLeg {
        option_type,
        strike: required_decimal(&leg.strike, "leg strike")?,
        expiration: leg
            .expiration
            .resolve()
            .ok_or_else(|| format!("Invalid leg expiration: {:?}", leg.expiration))?,
        quantity: required_decimal(&leg.quantity, "leg quantity")?.abs(),
        action: leg.action.parse::<TradeAction>()?,
        premium: optional_decimal(leg.premium.as_ref(), "leg premium")?,
    })
}

fn into_matched_trade(record: JsonTradeRecord) -> std::result::Result<MatchedTrade, String> {
    let symbol = record.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err("Missing symbol".to_string());
    }

    let entry_date = optional_timestamp(record.entry_date.as_ref(), "entryDate")?
        .or(optional_timestamp(record.created_at.as_ref(), "createdAt")?)
        .ok_or_else(|| "Missing entryDate".to_string())?;
    let exit_date = optional_timestamp(record.exit_date.as_ref(), "exitDate")?;
    let entry_price = required_decimal(&record.entry_price, "entryPrice")?.abs();
    let exit_price = optional_decimal(record.exit_price.as_ref(), "exitPrice")?;
    let quantity = required_decimal(&record.quantity, "quantity")?.abs();
    if quantity.is_zero() {
        return Err("Quantity must be greater than zero".to_string());
    }
    let fees = optional_decimal(record.fees.as_ref(), "fees")?
        .unwrap_or_default()
        .abs();

    let legs = record
        .legs
        .into_iter()
        .map(into_leg)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let instrument_type = match record.instrument_type.as_deref() {
        Some(raw) => raw.parse::<InstrumentType>()?,
        None if !legs.is_empty() => InstrumentType::Option,
        None => InstrumentType::Stock,
    };
    let direction = record
        .direction
        .as_deref()
        .map(str::parse::<PositionDirection>)
        .transpose()?
        .unwrap_or_default();
    let status = match record.status.as_deref() {
        Some(raw) => raw.parse::<TradeStatus>()?,
        None if exit_date.is_some() && exit_price.is_some() => TradeStatus::Closed,
        None => TradeStatus::Open,
    };

    let (pnl, pnl_percent) = match (status, exit_price) {
        (TradeStatus::Closed, Some(exit)) => {
            if exit_date.is_none() {
                return Err("Closed trade requires exitDate".to_string());
            }
            let pnl = match optional_decimal(record.pnl.as_ref(), "pnl")? {
                Some(pnl) => pnl,
                None => compute_pnl(direction, entry_price, exit, quantity, fees)
                    .ok_or_else(|| "P&L out of range".to_string())?,
            };
            let pnl_percent = optional_decimal(record.pnl_percent.as_ref(), "pnlPercent")?
                .or_else(|| compute_pnl_percent(pnl, entry_price, quantity));
            (Some(pnl), pnl_percent)
        }
        (TradeStatus::Closed, None) => return Err("Closed trade requires exitPrice".to_string()),
        (TradeStatus::Open, _) => (
            optional_decimal(record.pnl.as_ref(), "pnl")?,
            optional_decimal(record.pnl_percent.as_ref(), "pnlPercent")?,
        ),
    };

    Ok(MatchedTrade {
        match_key: record
            .match_key
            .map(|key| key.trim().to_uppercase())
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| symbol.clone()),
        symbol,
        instrument_type,
        direction,
        status,
        entry_date,
        exit_date,
        entry_price,
        exit_price,
        quantity,
        pnl,
        pnl_percent,
        fees,
        currency: record.currency.filter(|c| !c.trim().is_empty()),
        notes: record.notes,
        legs,
    })
}
