use crate::errors::Result;
use crate::trades::trades_model::{MatchedTrade, Trade};
use async_trait::async_trait;

/// Persistence gateway for reconstructed trades.
///
/// `create_trades` receives one bounded chunk and must commit it atomically.
/// The store owns identity assignment.
#[async_trait]
pub trait TradeRepositoryTrait: Send + Sync {
    async fn create_trades(&self, trades: Vec<MatchedTrade>) -> Result<usize>;
    fn list_trades(&self) -> Result<Vec<Trade>>;
    fn get_trade(&self, trade_id: &str) -> Result<Trade>;
    async fn delete_trade(&self, trade_id: String) -> Result<usize>;
}
