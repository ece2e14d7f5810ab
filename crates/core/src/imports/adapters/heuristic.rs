//! Fallback adapter that locates columns by fuzzy header matching.

use super::{HeaderIndex, RecordView, RowOutcome, TradeFragment};
use crate::imports::field_parsers::{
    normalize_symbol, parse_date, parse_decimal_field, parse_price, parse_quantity,
};
use crate::trades::TradeAction;

// Synonyms are tried in order; the first one found in any header wins.
const DATE_SYNONYMS: [&str; 4] = ["trade_date", "date", "time", "executed"];
const SYMBOL_SYNONYMS: [&str; 5] = ["symbol", "ticker", "instrument", "security", "underlying"];
const QUANTITY_SYNONYMS: [&str; 6] = ["quantity", "qty", "shares", "units", "contracts", "size"];
const PRICE_SYNONYMS: [&str; 4] = ["price", "fill", "avg", "cost"];
const FEE_SYNONYMS: [&str; 2] = ["commission", "fee"];
const SIDE_SYNONYMS: [&str; 5] = ["side", "action", "buy/sell", "transaction", "type"];
const CURRENCY_SYNONYMS: [&str; 2] = ["currency", "ccy"];

/// Column positions the heuristic found in one header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocatedColumns {
    date: Option<usize>,
    symbol: Option<usize>,
    quantity: Option<usize>,
    price: Option<usize>,
    fees: Option<usize>,
    side: Option<usize>,
    currency: Option<usize>,
}

impl LocatedColumns {
    fn locate(headers: &HeaderIndex) -> Self {
        let mut taken = Vec::new();
        let mut claim = |synonyms: &[&str]| {
            let found = headers.find_by_synonyms(synonyms, &taken);
            taken.extend(found);
            found
        };

        // Fees before price so "commission cost" style headers are not read as a price.
        let date = claim(&DATE_SYNONYMS[..]);
        let symbol = claim(&SYMBOL_SYNONYMS[..]);
        let quantity = claim(&QUANTITY_SYNONYMS[..]);
        let fees = claim(&FEE_SYNONYMS[..]);
        let price = claim(&PRICE_SYNONYMS[..]);
        let currency = claim(&CURRENCY_SYNONYMS[..]);
        let side = claim(&SIDE_SYNONYMS[..]);

        Self {
            date,
            symbol,
            quantity,
            price,
            fees,
            side,
            currency,
        }
    }

    fn missing_required(&self) -> Vec<&'static str> {
        [
            ("date", self.date),
            ("symbol", self.symbol),
            ("quantity", self.quantity),
        ]
        .into_iter()
        .filter(|(_, column)| column.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeuristicAdapter;

impl HeuristicAdapter {
    pub const NAME: &'static str = "heuristic";

    /// Always true: this adapter is the catch-all and must be tried last.
    pub fn detect(&self, _headers: &HeaderIndex) -> bool {
        true
    }

    pub fn missing_columns(&self, headers: &HeaderIndex) -> Vec<&'static str> {
        LocatedColumns::locate(headers).missing_required()
    }

    pub fn parse(&self, record: &RecordView<'_>) -> RowOutcome {
        let columns = LocatedColumns::locate(record.headers());
        let (Some(date_col), Some(symbol_col), Some(quantity_col)) =
            (columns.date, columns.symbol, columns.quantity)
        else {
            return RowOutcome::Skip;
        };

        let side_text = columns
            .side
            .and_then(|idx| record.at(idx))
            .map(str::to_lowercase)
            .unwrap_or_default();
        let side = if side_text.contains("sell") || side_text.contains("short") {
            TradeAction::Sell
        } else {
            TradeAction::Buy
        };

        let mut fragment = TradeFragment::new(side);
        fragment.date = record.at(date_col).and_then(parse_date);
        fragment.symbol = record.at(symbol_col).and_then(normalize_symbol);
        fragment.quantity = record.at(quantity_col).and_then(parse_quantity);
        fragment.price = columns
            .price
            .and_then(|idx| record.at(idx))
            .and_then(parse_price);
        fragment.fees = columns
            .fees
            .and_then(|idx| record.at(idx))
            .and_then(parse_decimal_field)
            .map(|fee| fee.abs())
            .unwrap_or_default();
        fragment.currency = columns
            .currency
            .and_then(|idx| record.at(idx))
            .map(str::to_uppercase);

        RowOutcome::Parsed(fragment)
    }
}
