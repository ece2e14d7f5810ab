use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::adapters::{AdapterRegistry, HeaderIndex, RecordView, RowOutcome};
use super::csv_parser::{parse_csv, ParseConfig};
use super::fifo_matcher::match_transactions;
use super::import_result::{ImportResult, ImportResultBuilder};
use super::json_format::{export_trades_json, parse_json_trades};
use super::normalizer::normalize;
use super::row_filter::filter_rows;
use crate::constants::{DEFAULT_COMMIT_BATCH_SIZE, MAX_REPORTED_ERRORS};
use crate::errors::ImportError;
use crate::trades::{MatchedTrade, Trade, TradeRepositoryTrait};
use crate::Result;

/// Tuning for the import pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    /// Maximum records per persistence commit.
    pub commit_batch_size: usize,
    /// Maximum row-level messages kept in an [`ImportResult`].
    pub max_reported_errors: usize,
}

impl ImportConfig {
    pub fn batch_size(&self) -> usize {
        self.commit_batch_size.max(1)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            commit_batch_size: DEFAULT_COMMIT_BATCH_SIZE,
            max_reported_errors: MAX_REPORTED_ERRORS,
        }
    }
}

/// Output of a reconciliation pass over one CSV file, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub adapter: &'static str,
    pub trades: Vec<MatchedTrade>,
    pub result: ImportResult,
}

/// Runs the synchronous part of a CSV import: read, filter, adapt,
/// normalize and match. Row-level problems are collected in the result;
/// only file-level problems return `Err`.
pub fn reconcile_csv(
    content: &[u8],
    parse_config: &ParseConfig,
    registry: &AdapterRegistry,
    max_reported_errors: usize,
) -> Result<Reconciliation> {
    let parsed = parse_csv(content, parse_config)?;
    let headers = HeaderIndex::new(&parsed.headers);

    let adapter = registry.detect(&headers);
    let missing = adapter.missing_columns(&headers);
    if !missing.is_empty() {
        return Err(ImportError::UnrecognizedFormat(format!(
            "could not locate {} column(s) in headers [{}]",
            missing.join(", "),
            parsed.headers.join(", ")
        ))
        .into());
    }

    let rows = filter_rows(parsed.rows);
    let mut summary = ImportResultBuilder::new(max_reported_errors);
    let mut transactions = Vec::with_capacity(rows.len());

    for row in &rows {
        let record = RecordView::new(&headers, row);
        match adapter.parse(&record) {
            RowOutcome::Skip => {}
            RowOutcome::Fail(reason) => record_row_failure(&mut summary, row.row_number, reason),
            RowOutcome::Parsed(fragment) => match normalize(fragment, &record) {
                Ok(transaction) => transactions.push(transaction),
                Err(reason) => record_row_failure(&mut summary, row.row_number, reason),
            },
        }
    }

    debug!(
        "Adapter '{}' produced {} transactions from {} rows ({} failed)",
        adapter.name(),
        transactions.len(),
        rows.len(),
        summary.failed()
    );

    let outcome = match_transactions(transactions);
    for warning in outcome.warnings {
        summary.record_warning(warning);
    }
    summary.record_successes(outcome.trades.len());

    Ok(Reconciliation {
        adapter: adapter.name(),
        trades: outcome.trades,
        result: summary.finish(),
    })
}

fn record_row_failure(summary: &mut ImportResultBuilder, row_number: usize, reason: String) {
    let message = format!("Row {}: {}", row_number, reason);
    warn!("Skipping malformed row. {}", message);
    summary.record_failure(message);
}

/// Trait for trade import service operations
#[async_trait]
pub trait TradeImportServiceTrait: Send + Sync {
    async fn import_csv(&self, content: &[u8], parse_config: ParseConfig) -> Result<ImportResult>;
    async fn import_json(&self, content: &[u8]) -> Result<ImportResult>;
    fn export_json(&self) -> Result<String>;
    fn list_trades(&self) -> Result<Vec<Trade>>;
    fn get_trade(&self, trade_id: &str) -> Result<Trade>;
    async fn delete_trade(&self, trade_id: String) -> Result<usize>;
}

/// Service that reconciles broker files into trades and stores them.
pub struct TradeImportService {
    repository: Arc<dyn TradeRepositoryTrait>,
    registry: AdapterRegistry,
    config: ImportConfig,
}

impl TradeImportService {
    pub fn new(
        repository: Arc<dyn TradeRepositoryTrait>,
        registry: AdapterRegistry,
        config: ImportConfig,
    ) -> Self {
        Self {
            repository,
            registry,
            config,
        }
    }

    /// Commits trades in bounded chunks, strictly one after another. A failing
    /// chunk aborts the import; chunks already committed stay committed.
    async fn persist(&self, trades: Vec<MatchedTrade>) -> Result<usize> {
        let batch_size = self.config.batch_size();
        let total_chunks = trades.len().div_ceil(batch_size);
        let mut committed = 0usize;

        for (chunk_index, chunk) in trades.chunks(batch_size).enumerate() {
            match self.repository.create_trades(chunk.to_vec()).await {
                Ok(count) => {
                    committed += count;
                    debug!(
                        "Committed chunk {}/{} ({} trades)",
                        chunk_index + 1,
                        total_chunks,
                        count
                    );
                }
                Err(e) => {
                    error!(
                        "Commit of chunk {}/{} failed after {} trades were stored: {}",
                        chunk_index + 1,
                        total_chunks,
                        committed,
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(committed)
    }
}

#[async_trait]
impl TradeImportServiceTrait for TradeImportService {
    async fn import_csv(&self, content: &[u8], parse_config: ParseConfig) -> Result<ImportResult> {
        let reconciliation = reconcile_csv(
            content,
            &parse_config,
            &self.registry,
            self.config.max_reported_errors,
        )?;
        self.persist(reconciliation.trades).await?;

        let result = reconciliation.result;
        info!(
            "CSV import via '{}' adapter: {} trades, {} failed rows",
            reconciliation.adapter, result.success, result.failed
        );
        Ok(result)
    }

    async fn import_json(&self, content: &[u8]) -> Result<ImportResult> {
        let import = parse_json_trades(content)?;

        let mut summary = ImportResultBuilder::new(self.config.max_reported_errors);
        for failure in import.failures {
            summary.record_failure(failure);
        }
        summary.record_successes(import.trades.len());
        self.persist(import.trades).await?;

        let result = summary.finish();
        info!(
            "JSON import: {} trades, {} failed records",
            result.success, result.failed
        );
        Ok(result)
    }

    fn export_json(&self) -> Result<String> {
        let trades = self.repository.list_trades()?;
        export_trades_json(&trades)
    }

    fn list_trades(&self) -> Result<Vec<Trade>> {
        self.repository.list_trades()
    }

    fn get_trade(&self, trade_id: &str) -> Result<Trade> {
        self.repository.get_trade(trade_id)
    }

    async fn delete_trade(&self, trade_id: String) -> Result<usize> {
        self.repository.delete_trade(trade_id).await
    }
}
