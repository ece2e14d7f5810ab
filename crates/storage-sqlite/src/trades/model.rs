//! Database models for trades.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;
use tradelog_core::trades::{MatchedTrade, OptionLeg, Trade};

/// Parses a stored decimal, tolerating scientific notation. Falls back to zero
/// with an error log so one corrupt cell does not hide the whole journal.
fn parse_decimal_string_tolerant(value_str: &str, field_name: &str) -> Decimal {
    Decimal::from_str(value_str)
        .or_else(|_| Decimal::from_scientific(value_str))
        .ok()
        .or_else(|| f64::from_str(value_str).ok().and_then(Decimal::from_f64))
        .unwrap_or_else(|| {
            log::error!(
                "Failed to parse {} '{}' as Decimal. Falling back to ZERO.",
                field_name,
                value_str
            );
            Decimal::ZERO
        })
}

fn parse_timestamp(value: &str, field_name: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::error!("Failed to parse {} '{}': {}", field_name, value, e);
            DateTime::<Utc>::default()
        })
}

fn parse_enum<T: FromStr<Err = String> + Default>(value: &str, field_name: &str) -> T {
    value.parse().unwrap_or_else(|e| {
        log::error!("Failed to parse {} '{}': {}", field_name, value, e);
        T::default()
    })
}

/// Database model for trades. Decimals and timestamps are stored as text.
#[derive(
    Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone,
)]
#[diesel(table_name = crate::schema::trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeDB {
    pub id: String,
    pub symbol: String,
    pub match_key: String,
    pub instrument_type: String,
    pub direction: String,
    pub status: String,
    pub entry_date: String,
    pub exit_date: Option<String>,
    pub entry_price: String,
    pub exit_price: Option<String>,
    pub quantity: String,
    pub pnl: Option<String>,
    pub pnl_percent: Option<String>,
    pub fees: String,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub legs: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TradeDB {
    /// Builds a new row for a freshly matched trade.
    pub fn new_record(
        id: String,
        trade: MatchedTrade,
        now: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let timestamp = now.to_rfc3339();
        Ok(Self {
            id,
            legs: serde_json::to_string(&trade.legs)?,
            symbol: trade.symbol,
            match_key: trade.match_key,
            instrument_type: trade.instrument_type.as_str().to_string(),
            direction: trade.direction.as_str().to_string(),
            status: trade.status.as_str().to_string(),
            entry_date: trade.entry_date.to_rfc3339(),
            exit_date: trade.exit_date.map(|d| d.to_rfc3339()),
            entry_price: trade.entry_price.to_string(),
            exit_price: trade.exit_price.map(|d| d.to_string()),
            quantity: trade.quantity.to_string(),
            pnl: trade.pnl.map(|d| d.to_string()),
            pnl_percent: trade.pnl_percent.map(|d| d.to_string()),
            fees: trade.fees.to_string(),
            currency: trade.currency,
            notes: trade.notes,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        })
    }
}

impl From<TradeDB> for Trade {
    fn from(db: TradeDB) -> Self {
        let legs: Vec<OptionLeg> = serde_json::from_str(&db.legs).unwrap_or_else(|e| {
            log::error!("Failed to parse legs of trade '{}': {}", db.id, e);
            Vec::new()
        });

        Self {
            details: MatchedTrade {
                symbol: db.symbol,
                match_key: db.match_key,
                instrument_type: parse_enum(&db.instrument_type, "instrument_type"),
                direction: parse_enum(&db.direction, "direction"),
                status: parse_enum(&db.status, "status"),
                entry_date: parse_timestamp(&db.entry_date, "entry_date"),
                exit_date: db
                    .exit_date
                    .as_deref()
                    .map(|s| parse_timestamp(s, "exit_date")),
                entry_price: parse_decimal_string_tolerant(&db.entry_price, "entry_price"),
                exit_price: db
                    .exit_price
                    .as_deref()
                    .map(|s| parse_decimal_string_tolerant(s, "exit_price")),
                quantity: parse_decimal_string_tolerant(&db.quantity, "quantity"),
                pnl: db
                    .pnl
                    .as_deref()
                    .map(|s| parse_decimal_string_tolerant(s, "pnl")),
                pnl_percent: db
                    .pnl_percent
                    .as_deref()
                    .map(|s| parse_decimal_string_tolerant(s, "pnl_percent")),
                fees: parse_decimal_string_tolerant(&db.fees, "fees"),
                currency: db.currency,
                notes: db.notes,
                legs,
            },
            created_at: parse_timestamp(&db.created_at, "created_at"),
            updated_at: parse_timestamp(&db.updated_at, "updated_at"),
            id: db.id,
        }
    }
}
