//! Imports module - broker file reconciliation into trades.
//!
//! Data flow: raw file -> row filter -> broker adapter (detected once per
//! file) -> normalizer (per row, error-isolated) -> FIFO matcher (per
//! instrument) -> import summary -> chunked persistence.

pub mod adapters;
mod csv_parser;
pub mod field_parsers;
mod fifo_matcher;
mod import_result;
mod import_service;
mod json_format;
mod normalizer;
mod row_filter;

#[cfg(test)]
mod import_service_tests;

pub use adapters::{AdapterRegistry, BrokerAdapter, HeuristicAdapter, StatementAdapter};
pub use csv_parser::{parse_csv, CsvRow, ParseConfig, ParsedCsvResult};
pub use fifo_matcher::{match_transactions, MatchOutcome};
pub use import_result::{ImportResult, ImportResultBuilder};
pub use import_service::{
    reconcile_csv, ImportConfig, Reconciliation, TradeImportService, TradeImportServiceTrait,
};
pub use json_format::{export_trades_json, parse_json_trades, JsonImport};
pub use normalizer::Transaction;
pub use row_filter::filter_rows;
