//! Turns adapter fragments into canonical transactions for the matcher.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::adapters::{OccContract, RecordView, TradeFragment};
use crate::trades::{InstrumentType, PositionDirection, TradeAction};

/// Columns that may declare the position side on the original row.
const DIRECTION_COLUMNS: [&str; 4] = [
    "direction",
    "position_direction",
    "position_side",
    "long/short",
];

/// A normalized broker transaction. Lives only for one matching pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// 1-based source row (header = 1).
    pub row_index: usize,
    pub date: DateTime<Utc>,
    pub display_symbol: String,
    pub match_key: String,
    pub direction: PositionDirection,
    pub action: TradeAction,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fees: Decimal,
    pub instrument_type: InstrumentType,
    pub option_contract: Option<OccContract>,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

impl Transaction {
    /// Whether this transaction opens (rather than closes) a position.
    pub fn is_entry(&self) -> bool {
        matches!(
            (self.direction, self.action),
            (PositionDirection::Long, TradeAction::Buy)
                | (PositionDirection::Short, TradeAction::Sell)
        )
    }
}

/// Reads the declared position side from the row, defaulting to long.
pub fn read_direction(record: &RecordView<'_>) -> PositionDirection {
    DIRECTION_COLUMNS
        .iter()
        .find_map(|column| record.get(column))
        .filter(|value| value.to_ascii_lowercase().contains("short"))
        .map(|_| PositionDirection::Short)
        .unwrap_or_default()
}

/// Builds a [`Transaction`] from one fragment. The error is a user-facing
/// reason without the row prefix.
pub fn normalize(
    fragment: TradeFragment,
    record: &RecordView<'_>,
) -> std::result::Result<Transaction, String> {
    let (Some(date), Some(symbol), Some(price), Some(quantity)) = (
        fragment.date,
        fragment.symbol.clone(),
        fragment.price,
        fragment.quantity,
    ) else {
        let missing: Vec<&str> = [
            ("date", fragment.date.is_none()),
            ("symbol", fragment.symbol.is_none()),
            ("price", fragment.price.is_none()),
            ("quantity", fragment.quantity.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect();
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    };

    if quantity <= Decimal::ZERO {
        return Err(format!("Quantity must be greater than zero, got {}", quantity));
    }

    let display_symbol = symbol.trim().to_uppercase();
    let match_key = match (&fragment.instrument_type, &fragment.contract_symbol) {
        (InstrumentType::Option, Some(contract)) => contract.trim().to_uppercase(),
        _ => display_symbol.clone(),
    };

    Ok(Transaction {
        row_index: record.row_number(),
        date,
        display_symbol,
        match_key,
        direction: read_direction(record),
        action: fragment.side,
        price,
        quantity,
        fees: fragment.fees,
        instrument_type: fragment.instrument_type,
        option_contract: fragment.option_contract,
        currency: fragment.currency,
        notes: fragment.description,
    })
}
