#[cfg(test)]
mod tests {
    use crate::errors::{DatabaseError, Error, ImportError, Result};
    use crate::imports::{
        reconcile_csv, AdapterRegistry, ImportConfig, ParseConfig, StatementAdapter,
        TradeImportService, TradeImportServiceTrait,
    };
    use crate::trades::{MatchedTrade, Trade, TradeRepositoryTrait, TradeStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    // --- Mock TradeRepository ---
    #[derive(Clone, Default)]
    struct MockTradeRepository {
        commits: Arc<Mutex<Vec<Vec<MatchedTrade>>>>,
        fail_on_commit: Option<usize>,
    }

    impl MockTradeRepository {
        fn failing_on(commit_number: usize) -> Self {
            Self {
                fail_on_commit: Some(commit_number),
                ..Default::default()
            }
        }

        fn commit_sizes(&self) -> Vec<usize> {
            self.commits.lock().unwrap().iter().map(Vec::len).collect()
        }

        fn stored(&self) -> Vec<MatchedTrade> {
            self.commits.lock().unwrap().concat()
        }
    }

    #[async_trait]
    impl TradeRepositoryTrait for MockTradeRepository {
        async fn create_trades(&self, trades: Vec<MatchedTrade>) -> Result<usize> {
            let mut commits = self.commits.lock().unwrap();
            if self.fail_on_commit == Some(commits.len() + 1) {
                return Err(Error::Database(DatabaseError::QueryFailed(
                    "write limit exceeded".to_string(),
                )));
            }
            let count = trades.len();
            commits.push(trades);
            Ok(count)
        }

        fn list_trades(&self) -> Result<Vec<Trade>> {
            Ok(self
                .stored()
                .into_iter()
                .enumerate()
                .map(|(idx, details)| Trade {
                    id: format!("trade-{}", idx + 1),
                    details,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .collect())
        }

        fn get_trade(&self, trade_id: &str) -> Result<Trade> {
            self.list_trades()?
                .into_iter()
                .find(|t| t.id == trade_id)
                .ok_or_else(|| Error::Database(DatabaseError::NotFound(trade_id.to_string())))
        }

        async fn delete_trade(&self, _trade_id: String) -> Result<usize> {
            unimplemented!()
        }
    }

    const STATEMENT_HEADER: &str = "Transaction Date,Activity Type,Activity Sub-Type,Direction,Symbol,Underlying Symbol,Name,Currency,Quantity,Unit Price,Commission";

    fn statement(rows: &[&str]) -> Vec<u8> {
        let mut content = String::from(STATEMENT_HEADER);
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        content.into_bytes()
    }

    fn service(repository: &MockTradeRepository, batch_size: usize) -> TradeImportService {
        TradeImportService::new(
            Arc::new(repository.clone()),
            AdapterRegistry::default(),
            ImportConfig {
                commit_batch_size: batch_size,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_partial_fill_statement_import() {
        let repository = MockTradeRepository::default();
        let content = statement(&[
            "2024-01-02,Trade,BUY,LONG,ABC,,ABC Corp,USD,30,10.00,0",
            "2024-01-03,Trade,SELL,LONG,ABC,,ABC Corp,USD,-10,12.00,0",
            "2024-01-04,Trade,SELL,LONG,ABC,,ABC Corp,USD,-20,14.00,0",
        ]);

        let result = service(&repository, 450)
            .import_csv(&content, ParseConfig::default())
            .await
            .unwrap();

        assert_eq!(result.success, 2);
        assert_eq!(result.failed, 0);
        assert!(result.errors.is_empty());

        let stored = repository.stored();
        assert!(stored.iter().all(|t| t.status == TradeStatus::Closed));
        assert_eq!(stored[0].quantity, dec!(10));
        assert_eq!(stored[0].exit_price, Some(dec!(12)));
        assert_eq!(stored[1].quantity, dec!(20));
        assert_eq!(stored[1].exit_price, Some(dec!(14)));
        assert_eq!(stored[1].entry_price, dec!(10));
    }

    #[tokio::test]
    async fn test_unmatched_entry_is_open_trade() {
        let repository = MockTradeRepository::default();
        let content = b"Date,Symbol,Side,Quantity,Price\n2024-02-01,GOOG,Buy,20,100\n";

        let result = service(&repository, 450)
            .import_csv(content, ParseConfig::default())
            .await
            .unwrap();

        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 0);
        let stored = repository.stored();
        assert_eq!(stored[0].status, TradeStatus::Open);
        assert_eq!(stored[0].quantity, dec!(20));
        assert_eq!(stored[0].entry_price, dec!(100));
    }

    #[tokio::test]
    async fn test_unmatched_exit_reports_row() {
        let repository = MockTradeRepository::default();
        let content = b"Date,Symbol,Side,Quantity,Price\n2024-02-01,XYZ,Sell,5,50\n";

        let result = service(&repository, 450)
            .import_csv(content, ParseConfig::default())
            .await
            .unwrap();

        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Row 2:"));
        let stored = repository.stored();
        assert_eq!(stored[0].status, TradeStatus::Open);
        assert_eq!(stored[0].entry_price, dec!(50));
    }

    #[tokio::test]
    async fn test_non_trade_rows_do_not_count() {
        let repository = MockTradeRepository::default();
        let content = statement(&[
            "2024-01-02,Dividend,,,ABC,,ABC Corp,USD,,,",
            "2024-01-03,Fee,,,,,,USD,,,",
            "Data as of 2024-01-31,,,,,,,,,,",
        ]);

        let result = service(&repository, 450)
            .import_csv(&content, ParseConfig::default())
            .await
            .unwrap();

        assert_eq!(result.success, 0);
        assert_eq!(result.failed, 0);
        assert!(result.errors.is_empty());
        assert!(repository.stored().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_rows_are_isolated_and_capped() {
        let repository = MockTradeRepository::default();
        let mut rows: Vec<String> = (0..12)
            .map(|_| "2024-01-02,Trade,HOLD,LONG,ABC,,,USD,1,10,0".to_string())
            .collect();
        rows.push("2024-01-02,Trade,BUY,LONG,ABC,,,USD,1,10,0".to_string());
        rows.push("2024-01-03,Trade,BUY,LONG,DEF,,,USD,1,,0".to_string());
        let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();

        let result = service(&repository, 450)
            .import_csv(&statement(&row_refs), ParseConfig::default())
            .await
            .unwrap();

        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 13);
        assert_eq!(result.errors.len(), 10);
        assert!(result.errors[0].starts_with("Row 2: Invalid trade sub-type"));
    }

    #[test]
    fn test_missing_required_fields_are_named() {
        let content = statement(&["2024-01-03,Trade,BUY,LONG,DEF,,,USD,1,,0"]);
        let reconciliation = reconcile_csv(
            &content,
            &ParseConfig::default(),
            &AdapterRegistry::default(),
            10,
        )
        .unwrap();

        assert_eq!(reconciliation.adapter, StatementAdapter::NAME);
        assert_eq!(
            reconciliation.result.errors,
            vec!["Row 2: Missing required fields: price".to_string()]
        );
    }

    fn reconcile(content: &[u8]) -> crate::imports::Reconciliation {
        reconcile_csv(
            content,
            &ParseConfig::default(),
            &AdapterRegistry::default(),
            10,
        )
        .unwrap()
    }

    #[test]
    fn test_overflowing_pnl_is_reported_not_fatal() {
        let reconciliation = reconcile(
            b"Date,Symbol,Side,Quantity,Price\n\
              2024-01-02,BIG,Buy,1000000000000000,1\n\
              2024-01-03,BIG,Sell,1000000000000000,100000000000000\n",
        );

        assert_eq!(reconciliation.result.success, 1);
        assert_eq!(reconciliation.result.failed, 0);
        assert_eq!(
            reconciliation.result.errors,
            vec!["Row 3: P&L out of range for BIG; recorded without P&L".to_string()]
        );
        assert_eq!(reconciliation.trades[0].pnl, None);
    }

    #[test]
    fn test_row_numbers_survive_cr_endings_and_multiline_cells() {
        let cr_only = reconcile(
            b"Date,Symbol,Side,Quantity,Price\r2024-01-01,ABC,Buy,1,10\r2024-01-02,XYZ,Sell,5,50\r",
        );
        assert_eq!(cr_only.result.errors.len(), 1);
        assert!(cr_only.result.errors[0].starts_with("Row 3: Unmatched exit for XYZ"));

        let multiline = reconcile(
            b"Date,Symbol,Side,Quantity,Price,Description\n\
              2024-01-01,ABC,Buy,1,10,\"line one\nline two\"\n\
              2024-01-02,XYZ,Sell,5,50,\n",
        );
        assert_eq!(multiline.result.errors.len(), 1);
        assert!(multiline.result.errors[0].starts_with("Row 3: Unmatched exit for XYZ"));
    }

    #[tokio::test]
    async fn test_commits_in_sequential_bounded_chunks() {
        let repository = MockTradeRepository::default();
        let mut content = String::from("Date,Symbol,Side,Quantity,Price\n");
        for i in 0..1000 {
            content.push_str(&format!("2024-03-01,S{i},Buy,1,10\n"));
        }

        let result = service(&repository, 450)
            .import_csv(content.as_bytes(), ParseConfig::default())
            .await
            .unwrap();

        assert_eq!(result.success, 1000);
        assert_eq!(repository.commit_sizes(), vec![450, 450, 100]);
        assert_eq!(repository.stored()[450].symbol, "S450");
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_earlier_chunks() {
        let repository = MockTradeRepository::failing_on(2);
        let mut content = String::from("Date,Symbol,Side,Quantity,Price\n");
        for i in 0..25 {
            content.push_str(&format!("2024-03-01,S{i},Buy,1,10\n"));
        }

        let err = service(&repository, 10)
            .import_csv(content.as_bytes(), ParseConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Database(_)));
        assert_eq!(repository.commit_sizes(), vec![10]);
    }

    #[tokio::test]
    async fn test_file_level_failures_persist_nothing() {
        let repository = MockTradeRepository::default();
        let service = service(&repository, 450);

        let err = service
            .import_csv(b"Date,Description,Amount\n2024-01-01,Deposit,100\n", ParseConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Import(ImportError::UnrecognizedFormat(_))));

        let err = service
            .import_csv(b"", ParseConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Import(ImportError::EmptyFile)));

        assert!(repository.commit_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_json_import_and_export() {
        let repository = MockTradeRepository::default();
        let service = service(&repository, 450);
        let json = br#"[
            {"id": "old-1", "symbol": "AAPL", "entryDate": "2024-01-02", "exitDate": "2024-01-05",
             "entryPrice": "150", "exitPrice": "155", "quantity": "10", "fees": "2"},
            {"id": "old-2", "symbol": "MSFT"}
        ]"#;

        let result = service.import_json(json).await.unwrap();
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 1);
        assert!(result.errors[0].starts_with("Trade 2:"));

        let exported: serde_json::Value =
            serde_json::from_str(&service.export_json().unwrap()).unwrap();
        assert_eq!(exported[0]["id"], "trade-1");
        assert_eq!(exported[0]["symbol"], "AAPL");
        assert_eq!(exported[0]["pnl"], "48");
    }
}
