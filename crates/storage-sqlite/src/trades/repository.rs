use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::model::TradeDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::trades;
use crate::schema::trades::dsl::*;
use tradelog_core::trades::{MatchedTrade, Trade, TradeRepositoryTrait};
use tradelog_core::Result;

pub struct TradeRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl TradeRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        TradeRepository { pool, writer }
    }
}

#[async_trait]
impl TradeRepositoryTrait for TradeRepository {
    /// Inserts one chunk of trades in a single writer transaction. Either the
    /// whole chunk is stored or none of it.
    async fn create_trades(&self, new_trades: Vec<MatchedTrade>) -> Result<usize> {
        if new_trades.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let rows = new_trades
            .into_iter()
            .map(|trade| TradeDB::new_record(Uuid::now_v7().to_string(), trade, now))
            .collect::<std::result::Result<Vec<_>, StorageError>>()?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let inserted = diesel::insert_into(trades::table)
                    .values(&rows)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(inserted)
            })
            .await
    }

    fn list_trades(&self) -> Result<Vec<Trade>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = trades
            .order((entry_date.asc(), id.asc()))
            .select(TradeDB::as_select())
            .load::<TradeDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Trade::from).collect())
    }

    fn get_trade(&self, trade_id: &str) -> Result<Trade> {
        let mut conn = get_connection(&self.pool)?;
        let row = trades
            .find(trade_id)
            .select(TradeDB::as_select())
            .first::<TradeDB>(&mut conn)
            .into_core()?;
        Ok(Trade::from(row))
    }

    async fn delete_trade(&self, trade_id: String) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(trades.find(trade_id))
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;
    use tradelog_core::errors::{DatabaseError, Error};
    use tradelog_core::trades::{
        InstrumentType, OptionLeg, OptionType, PositionDirection, TradeAction, TradeStatus,
    };

    /// Returns the repository and the temp dir that keeps the database alive.
    fn create_test_repository() -> (TradeRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (TradeRepository::new(pool, writer), temp_dir)
    }

    fn closed_trade(sym: &str, day: u32) -> MatchedTrade {
        MatchedTrade {
            symbol: sym.to_string(),
            match_key: sym.to_string(),
            instrument_type: InstrumentType::Stock,
            direction: PositionDirection::Long,
            status: TradeStatus::Closed,
            entry_date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            exit_date: Some(Utc.with_ymd_and_hms(2024, 2, day, 0, 0, 0).unwrap()),
            entry_price: dec!(10.25),
            exit_price: Some(dec!(12.5)),
            quantity: dec!(4),
            pnl: Some(dec!(8.0)),
            pnl_percent: Some(dec!(19.5122)),
            fees: dec!(1),
            currency: Some("USD".to_string()),
            notes: Some("FIFO match: entry row 2, exit row 3".to_string()),
            legs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_round_trip() {
        let (repo, _dir) = create_test_repository();
        let mut option_trade = closed_trade("AAPL", 3);
        option_trade.instrument_type = InstrumentType::Option;
        option_trade.match_key = "AAPL240119C00150000".to_string();
        option_trade.legs = vec![OptionLeg {
            option_type: OptionType::Call,
            strike: dec!(150),
            expiration: Utc.with_ymd_and_hms(2024, 1, 19, 0, 0, 0).unwrap(),
            quantity: dec!(4),
            action: TradeAction::Buy,
            premium: Some(dec!(10.25)),
        }];

        let inserted = repo
            .create_trades(vec![closed_trade("MSFT", 5), option_trade.clone()])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let stored = repo.list_trades().unwrap();
        assert_eq!(stored.len(), 2);
        // Ordered by entry date.
        assert_eq!(stored[0].details, option_trade);
        assert_eq!(stored[1].details.symbol, "MSFT");
        assert_ne!(stored[0].id, stored[1].id);
    }

    #[tokio::test]
    async fn test_get_and_delete_trade() {
        let (repo, _dir) = create_test_repository();
        repo.create_trades(vec![closed_trade("NVDA", 2)])
            .await
            .unwrap();
        let trade_id = repo.list_trades().unwrap()[0].id.clone();

        assert_eq!(repo.get_trade(&trade_id).unwrap().details.symbol, "NVDA");
        assert_eq!(repo.delete_trade(trade_id.clone()).await.unwrap(), 1);

        let err = repo.get_trade(&trade_id).unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_empty_chunk_is_noop() {
        let (repo, _dir) = create_test_repository();
        assert_eq!(repo.create_trades(Vec::new()).await.unwrap(), 0);
        assert!(repo.list_trades().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_job_rolls_back_its_chunk() {
        let (repo, _dir) = create_test_repository();
        let rows = vec![
            TradeDB::new_record("dup".to_string(), closed_trade("AMD", 1), Utc::now()).unwrap(),
            TradeDB::new_record("dup".to_string(), closed_trade("AMD", 2), Utc::now()).unwrap(),
        ];

        let result = repo
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_into(trades::table)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::Database(DatabaseError::UniqueViolation(_)))
        ));
        assert!(repo.list_trades().unwrap().is_empty());
    }
}
