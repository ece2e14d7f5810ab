//! Broker adapters.
//!
//! An adapter recognises one family of export layouts from the header row
//! and turns individual rows into [`TradeFragment`]s. The set of adapters is
//! closed, so dispatch is a plain enum rather than trait objects.

mod heuristic;
mod registry;
mod statement;

pub use heuristic::HeuristicAdapter;
pub use registry::AdapterRegistry;
pub use statement::{parse_occ_symbol, OccContract, StatementAdapter};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::csv_parser::CsvRow;
use crate::trades::{InstrumentType, TradeAction};

/// Lower-cases and trims a header, mapping spaces and hyphens to `_`.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Normalised header names of one file, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderIndex {
    names: Vec<String>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        Self {
            names: headers.iter().map(|h| normalize_header(h)).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.names.iter().position(|name| name == column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// First column whose name contains a synonym, trying synonyms in
    /// priority order. Columns in `taken` are never returned.
    pub fn find_by_synonyms(&self, synonyms: &[&str], taken: &[usize]) -> Option<usize> {
        synonyms.iter().find_map(|synonym| {
            self.names
                .iter()
                .enumerate()
                .find(|(idx, name)| !taken.contains(idx) && name.contains(synonym))
                .map(|(idx, _)| idx)
        })
    }
}

/// A data row viewed through its file's headers.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    headers: &'a HeaderIndex,
    row: &'a CsvRow,
}

impl<'a> RecordView<'a> {
    pub fn new(headers: &'a HeaderIndex, row: &'a CsvRow) -> Self {
        Self { headers, row }
    }

    pub fn headers(&self) -> &'a HeaderIndex {
        self.headers
    }

    pub fn row_number(&self) -> usize {
        self.row.row_number
    }

    /// Trimmed value of a named column; `None` when absent or blank.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers.position(column).and_then(|idx| self.at(idx))
    }

    /// Trimmed value at a column index; `None` when absent or blank.
    pub fn at(&self, idx: usize) -> Option<&'a str> {
        self.row
            .values
            .get(idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// What an adapter could extract from one row. Date, symbol, price and
/// quantity may be missing; the normalizer reports them by name.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeFragment {
    pub date: Option<DateTime<Utc>>,
    /// Display symbol (the underlying for option contracts).
    pub symbol: Option<String>,
    /// Full contract identifier when it differs from the display symbol.
    pub contract_symbol: Option<String>,
    pub side: TradeAction,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub fees: Decimal,
    pub instrument_type: InstrumentType,
    pub option_contract: Option<OccContract>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

impl TradeFragment {
    pub fn new(side: TradeAction) -> Self {
        Self {
            date: None,
            symbol: None,
            contract_symbol: None,
            side,
            price: None,
            quantity: None,
            fees: Decimal::ZERO,
            instrument_type: InstrumentType::Stock,
            option_contract: None,
            currency: None,
            description: None,
        }
    }
}

/// Per-row result of an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Recognised, but intentionally not a trade (dividends, transfers, ...).
    Skip,
    /// Expected to be a trade, but malformed.
    Fail(String),
    Parsed(TradeFragment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerAdapter {
    Statement(StatementAdapter),
    Heuristic(HeuristicAdapter),
}

impl BrokerAdapter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Statement(_) => StatementAdapter::NAME,
            Self::Heuristic(_) => HeuristicAdapter::NAME,
        }
    }

    pub fn detect(&self, headers: &HeaderIndex) -> bool {
        match self {
            Self::Statement(adapter) => adapter.detect(headers),
            Self::Heuristic(adapter) => adapter.detect(headers),
        }
    }

    /// Required columns this adapter cannot locate in `headers`. A non-empty
    /// answer means every row of the file would be skipped.
    pub fn missing_columns(&self, headers: &HeaderIndex) -> Vec<&'static str> {
        match self {
            Self::Statement(adapter) => adapter.missing_columns(headers),
            Self::Heuristic(adapter) => adapter.missing_columns(headers),
        }
    }

    pub fn parse(&self, record: &RecordView<'_>) -> RowOutcome {
        match self {
            Self::Statement(adapter) => adapter.parse(record),
            Self::Heuristic(adapter) => adapter.parse(record),
        }
    }
}
