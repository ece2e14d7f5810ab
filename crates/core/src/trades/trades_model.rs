//! Trade domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle state of a reconstructed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    #[default]
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(TradeStatus::Open),
            "CLOSED" => Ok(TradeStatus::Closed),
            other => Err(format!("Unknown trade status: {}", other)),
        }
    }
}

/// Declared side of the position a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionDirection {
    #[default]
    Long,
    Short,
}

impl PositionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionDirection::Long => "LONG",
            PositionDirection::Short => "SHORT",
        }
    }
}

impl FromStr for PositionDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(PositionDirection::Long),
            "SHORT" => Ok(PositionDirection::Short),
            other => Err(format!("Unknown position direction: {}", other)),
        }
    }
}

/// The literal transacted action on a broker row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            other => Err(format!("Unknown trade action: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    #[default]
    Stock,
    Option,
    Future,
    Crypto,
    Other,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Stock => "STOCK",
            InstrumentType::Option => "OPTION",
            InstrumentType::Future => "FUTURE",
            InstrumentType::Crypto => "CRYPTO",
            InstrumentType::Other => "OTHER",
        }
    }
}

impl FromStr for InstrumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOCK" | "EQUITY" | "ETF" => Ok(InstrumentType::Stock),
            "OPTION" | "OPTIONS" => Ok(InstrumentType::Option),
            "FUTURE" | "FUTURES" => Ok(InstrumentType::Future),
            "CRYPTO" => Ok(InstrumentType::Crypto),
            "OTHER" => Ok(InstrumentType::Other),
            other => Err(format!("Unknown instrument type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionType {
    Call,
    Put,
}

/// One leg of a multi-leg option structure. Each leg carries its own expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionLeg {
    pub option_type: OptionType,
    #[serde(with = "decimal_format")]
    pub strike: Decimal,
    #[serde(with = "timestamp_format")]
    pub expiration: DateTime<Utc>,
    #[serde(with = "decimal_format")]
    pub quantity: Decimal,
    pub action: TradeAction,
    #[serde(default, with = "optional_decimal_format")]
    pub premium: Option<Decimal>,
}

/// A reconstructed round-trip trade (or open position) that has not been
/// persisted yet. Identity is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTrade {
    pub symbol: String,
    pub match_key: String,
    pub instrument_type: InstrumentType,
    pub direction: PositionDirection,
    pub status: TradeStatus,
    #[serde(with = "timestamp_format")]
    pub entry_date: DateTime<Utc>,
    #[serde(default, with = "optional_timestamp_format")]
    pub exit_date: Option<DateTime<Utc>>,
    #[serde(with = "decimal_format")]
    pub entry_price: Decimal,
    #[serde(default, with = "optional_decimal_format")]
    pub exit_price: Option<Decimal>,
    #[serde(with = "decimal_format")]
    pub quantity: Decimal,
    #[serde(default, with = "optional_decimal_format")]
    pub pnl: Option<Decimal>,
    #[serde(default, with = "optional_decimal_format")]
    pub pnl_percent: Option<Decimal>,
    #[serde(with = "decimal_format")]
    pub fees: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub legs: Vec<OptionLeg>,
}

impl MatchedTrade {
    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }
}

/// A persisted trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    #[serde(flatten)]
    pub details: MatchedTrade,
    #[serde(with = "timestamp_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp_format")]
    pub updated_at: DateTime<Utc>,
}

/// Realized P&L for a closed position, net of fees. `None` when the result
/// does not fit in a `Decimal`.
pub fn compute_pnl(
    direction: PositionDirection,
    entry_price: Decimal,
    exit_price: Decimal,
    quantity: Decimal,
    fees: Decimal,
) -> Option<Decimal> {
    let per_unit = match direction {
        PositionDirection::Long => exit_price.checked_sub(entry_price)?,
        PositionDirection::Short => entry_price.checked_sub(exit_price)?,
    };
    per_unit.checked_mul(quantity)?.checked_sub(fees)
}

/// P&L as a percentage of the entry cost basis. `None` when there is no basis
/// or the ratio is out of range.
pub fn compute_pnl_percent(pnl: Decimal, entry_price: Decimal, quantity: Decimal) -> Option<Decimal> {
    let basis = entry_price.checked_mul(quantity)?;
    if basis.is_zero() {
        return None;
    }
    pnl.checked_div(basis)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|percent| percent.round_dp(crate::constants::PNL_PERCENT_PRECISION))
}

mod timestamp_format {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "Invalid timestamp format: {}. Expected ISO 8601/RFC3339 or YYYY-MM-DD",
                s
            ))
        })
    }

    pub(super) fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

mod optional_timestamp_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::timestamp_format::parse(s.trim())
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("Invalid timestamp: {}", s))),
        }
    }
}

// Decimals are written as strings so exported values survive a round-trip exactly.
mod decimal_format {
    use rust_decimal::Decimal;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use serde_json::Number;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DecimalInput {
        String(String),
        Number(Number),
    }

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.normalize().to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match DecimalInput::deserialize(deserializer)? {
            DecimalInput::String(s) => s,
            DecimalInput::Number(n) => n.to_string(),
        };
        let trimmed = raw.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|e| serde::de::Error::custom(format!("Invalid decimal value '{}': {}", raw, e)))
    }
}

mod optional_decimal_format {
    use rust_decimal::Decimal;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use serde_json::Number;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DecimalInput {
        String(String),
        Number(Number),
    }

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&d.normalize().to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match Option::<DecimalInput>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(DecimalInput::String(s)) => s,
            Some(DecimalInput::Number(n)) => n.to_string(),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
