//! Trades module - reconstructed trade models and the persistence trait.

mod trades_model;
mod trades_traits;

pub use trades_model::{
    compute_pnl, compute_pnl_percent, InstrumentType, MatchedTrade, OptionLeg, OptionType,
    PositionDirection, Trade, TradeAction, TradeStatus,
};
pub use trades_traits::TradeRepositoryTrait;
