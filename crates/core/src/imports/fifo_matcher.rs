//! FIFO pairing of entry and exit transactions into trades.
//!
//! Transactions are grouped by match key (contract-level for options) and
//! sorted by date with ties kept in row order. Within a group the oldest open
//! entry is paired with the oldest exit, splitting quantities across partial
//! fills. Queues are index lists into one arena with head cursors; quantities
//! still to be matched live in a parallel `remaining` vector.
//!
//! Fees are not prorated: a transaction's whole fee goes to the first trade
//! that consumes any part of it, and later trades cut from the same
//! transaction carry none of it.

use rust_decimal::Decimal;
use std::collections::HashMap;

use super::normalizer::Transaction;
use crate::trades::{
    compute_pnl, compute_pnl_percent, MatchedTrade, OptionLeg, TradeStatus,
};

/// Trades emitted by one matching pass plus warnings for unmatched exits
/// and closed trades whose P&L does not fit in a `Decimal`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub trades: Vec<MatchedTrade>,
    pub warnings: Vec<String>,
}

struct Ledger {
    arena: Vec<Transaction>,
    remaining: Vec<Decimal>,
    fee_charged: Vec<bool>,
}

impl Ledger {
    fn new(arena: Vec<Transaction>) -> Self {
        let remaining = arena.iter().map(|tx| tx.quantity).collect();
        let fee_charged = vec![false; arena.len()];
        Self {
            arena,
            remaining,
            fee_charged,
        }
    }

    /// Returns the transaction's fee the first time it is asked for, zero after.
    fn take_fee(&mut self, idx: usize) -> Decimal {
        if std::mem::replace(&mut self.fee_charged[idx], true) {
            Decimal::ZERO
        } else {
            self.arena[idx].fees
        }
    }

    /// Indices grouped by match key, groups in order of first appearance.
    fn groups(&self) -> Vec<Vec<usize>> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (idx, tx) in self.arena.iter().enumerate() {
            let slot = *positions.entry(tx.match_key.as_str()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(idx);
        }
        groups
    }
}

/// Pairs transactions per instrument using FIFO lot relief.
pub fn match_transactions(transactions: Vec<Transaction>) -> MatchOutcome {
    let mut ledger = Ledger::new(transactions);
    let mut outcome = MatchOutcome::default();

    for mut group in ledger.groups() {
        group.sort_by_key(|&idx| ledger.arena[idx].date);
        let (entries, exits): (Vec<usize>, Vec<usize>) = group
            .into_iter()
            .partition(|&idx| ledger.arena[idx].is_entry());

        let (mut entry_head, mut exit_head) = (0usize, 0usize);
        while entry_head < entries.len() && exit_head < exits.len() {
            let (entry, exit) = (entries[entry_head], exits[exit_head]);
            let matched_qty = ledger.remaining[entry].min(ledger.remaining[exit]);
            let fees = ledger
                .take_fee(entry)
                .saturating_add(ledger.take_fee(exit));

            let trade =
                closed_trade(&ledger.arena[entry], &ledger.arena[exit], matched_qty, fees);
            if trade.pnl.is_none() {
                let warning = format!(
                    "Row {}: P&L out of range for {}; recorded without P&L",
                    ledger.arena[exit].row_index, trade.symbol
                );
                log::warn!("{}", warning);
                outcome.warnings.push(warning);
            }
            outcome.trades.push(trade);

            ledger.remaining[entry] -= matched_qty;
            ledger.remaining[exit] -= matched_qty;
            if ledger.remaining[entry].is_zero() {
                entry_head += 1;
            }
            if ledger.remaining[exit].is_zero() {
                exit_head += 1;
            }
        }

        for &entry in &entries[entry_head..] {
            let quantity = ledger.remaining[entry];
            if quantity > Decimal::ZERO {
                let fees = ledger.take_fee(entry);
                outcome
                    .trades
                    .push(open_trade(&ledger.arena[entry], quantity, fees));
            }
        }

        for &exit in &exits[exit_head..] {
            let quantity = ledger.remaining[exit];
            if quantity > Decimal::ZERO {
                let fees = ledger.take_fee(exit);
                let tx = &ledger.arena[exit];
                let warning = format!(
                    "Row {}: Unmatched exit for {} (qty {}); recorded as open trade with placeholder entry price",
                    tx.row_index,
                    tx.display_symbol,
                    quantity.normalize()
                );
                log::warn!("{}", warning);
                outcome.warnings.push(warning);
                outcome.trades.push(orphan_exit_trade(tx, quantity, fees));
            }
        }
    }

    outcome
}

fn closed_trade(
    entry: &Transaction,
    exit: &Transaction,
    quantity: Decimal,
    fees: Decimal,
) -> MatchedTrade {
    let pnl = compute_pnl(entry.direction, entry.price, exit.price, quantity, fees);
    MatchedTrade {
        symbol: entry.display_symbol.clone(),
        match_key: entry.match_key.clone(),
        instrument_type: entry.instrument_type,
        direction: entry.direction,
        status: TradeStatus::Closed,
        entry_date: entry.date,
        exit_date: Some(exit.date),
        entry_price: entry.price,
        exit_price: Some(exit.price),
        quantity,
        pnl,
        pnl_percent: pnl.and_then(|pnl| compute_pnl_percent(pnl, entry.price, quantity)),
        fees,
        currency: entry.currency.clone().or_else(|| exit.currency.clone()),
        notes: Some(with_description(
            entry,
            format!(
                "FIFO match: entry row {}, exit row {}",
                entry.row_index, exit.row_index
            ),
        )),
        legs: option_legs(entry, quantity),
    }
}

fn open_trade(entry: &Transaction, quantity: Decimal, fees: Decimal) -> MatchedTrade {
    MatchedTrade {
        symbol: entry.display_symbol.clone(),
        match_key: entry.match_key.clone(),
        instrument_type: entry.instrument_type,
        direction: entry.direction,
        status: TradeStatus::Open,
        entry_date: entry.date,
        exit_date: None,
        entry_price: entry.price,
        exit_price: None,
        quantity,
        pnl: None,
        pnl_percent: None,
        fees,
        currency: entry.currency.clone(),
        notes: Some(with_description(
            entry,
            format!("Open position from row {}", entry.row_index),
        )),
        legs: option_legs(entry, quantity),
    }
}

/// An exit with no entry in the file. The exit price stands in for the entry
/// price so the record stays usable until the user reconciles it.
fn orphan_exit_trade(exit: &Transaction, quantity: Decimal, fees: Decimal) -> MatchedTrade {
    MatchedTrade {
        symbol: exit.display_symbol.clone(),
        match_key: exit.match_key.clone(),
        instrument_type: exit.instrument_type,
        direction: exit.direction,
        status: TradeStatus::Open,
        entry_date: exit.date,
        exit_date: None,
        entry_price: exit.price,
        exit_price: None,
        quantity,
        pnl: None,
        pnl_percent: None,
        fees,
        currency: exit.currency.clone(),
        notes: Some(with_description(
            exit,
            format!(
                "WARNING: missing entry leg. Exit from row {} had no matching entry; entry price is a placeholder",
                exit.row_index
            ),
        )),
        legs: option_legs(exit, quantity),
    }
}

fn with_description(tx: &Transaction, provenance: String) -> String {
    match &tx.notes {
        Some(description) => format!("{} | {}", description, provenance),
        None => provenance,
    }
}

fn option_legs(tx: &Transaction, quantity: Decimal) -> Vec<OptionLeg> {
    tx.option_contract
        .as_ref()
        .map(|contract| OptionLeg {
            option_type: contract.option_type,
            strike: contract.strike,
            expiration: contract.expiration,
            quantity,
            action: tx.action,
            premium: Some(tx.price),
        })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trades::{InstrumentType, PositionDirection, TradeAction};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn tx(
        row: usize,
        day: u32,
        symbol: &str,
        action: TradeAction,
        qty: Decimal,
        price: Decimal,
    ) -> Transaction {
        Transaction {
            row_index: row,
            date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            display_symbol: symbol.to_string(),
            match_key: symbol.to_string(),
            direction: PositionDirection::Long,
            action,
            price,
            quantity: qty,
            fees: Decimal::ZERO,
            instrument_type: InstrumentType::Stock,
            option_contract: None,
            currency: None,
            notes: None,
        }
    }

    #[test]
    fn test_partial_fill_splits_entry() {
        let outcome = match_transactions(vec![
            tx(2, 1, "ABC", TradeAction::Buy, dec!(30), dec!(10)),
            tx(3, 2, "ABC", TradeAction::Sell, dec!(10), dec!(12)),
            tx(4, 3, "ABC", TradeAction::Sell, dec!(20), dec!(14)),
        ]);

        assert_eq!(outcome.trades.len(), 2);
        assert!(outcome.warnings.is_empty());
        let first = &outcome.trades[0];
        assert_eq!(first.status, TradeStatus::Closed);
        assert_eq!(first.quantity, dec!(10));
        assert_eq!(first.entry_price, dec!(10));
        assert_eq!(first.exit_price, Some(dec!(12)));
        assert_eq!(first.pnl, Some(dec!(20)));
        let second = &outcome.trades[1];
        assert_eq!(second.quantity, dec!(20));
        assert_eq!(second.entry_price, dec!(10));
        assert_eq!(second.exit_price, Some(dec!(14)));
        assert_eq!(second.pnl, Some(dec!(80)));
        assert_eq!(second.pnl_percent, Some(dec!(40)));
    }

    #[test]
    fn test_oldest_entry_consumed_first_even_when_rows_are_unsorted() {
        let outcome = match_transactions(vec![
            tx(2, 5, "ABC", TradeAction::Buy, dec!(5), dec!(20)),
            tx(3, 1, "ABC", TradeAction::Buy, dec!(5), dec!(10)),
            tx(4, 9, "ABC", TradeAction::Sell, dec!(7), dec!(30)),
        ]);

        assert_eq!(outcome.trades.len(), 3);
        assert_eq!(outcome.trades[0].entry_price, dec!(10));
        assert_eq!(outcome.trades[0].quantity, dec!(5));
        assert_eq!(outcome.trades[1].entry_price, dec!(20));
        assert_eq!(outcome.trades[1].quantity, dec!(2));
        assert_eq!(outcome.trades[2].status, TradeStatus::Open);
        assert_eq!(outcome.trades[2].quantity, dec!(3));
    }

    #[test]
    fn test_same_date_ties_keep_row_order() {
        let outcome = match_transactions(vec![
            tx(2, 1, "ABC", TradeAction::Buy, dec!(1), dec!(10)),
            tx(3, 1, "ABC", TradeAction::Buy, dec!(1), dec!(11)),
            tx(4, 1, "ABC", TradeAction::Sell, dec!(1), dec!(12)),
        ]);
        assert_eq!(outcome.trades[0].entry_price, dec!(10));
        assert_eq!(outcome.trades[1].status, TradeStatus::Open);
        assert_eq!(outcome.trades[1].entry_price, dec!(11));
    }

    #[test]
    fn test_unmatched_entry_becomes_open_trade() {
        let outcome = match_transactions(vec![tx(2, 1, "GOOG", TradeAction::Buy, dec!(20), dec!(100))]);
        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.quantity, dec!(20));
        assert_eq!(trade.entry_price, dec!(100));
        assert_eq!(trade.exit_date, None);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_unmatched_exit_uses_placeholder_entry_price() {
        let outcome = match_transactions(vec![tx(2, 1, "XYZ", TradeAction::Sell, dec!(5), dec!(50))]);
        let trade = &outcome.trades[0];
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.entry_price, dec!(50));
        assert!(trade.notes.as_deref().unwrap().contains("missing entry"));
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("Row 2:"));
        assert!(outcome.warnings[0].contains("XYZ"));
    }

    #[test]
    fn test_groups_never_cross_match() {
        let mut call = tx(2, 1, "AAPL", TradeAction::Buy, dec!(1), dec!(3));
        call.match_key = "AAPL240315C00150000".to_string();
        let mut put = tx(3, 2, "AAPL", TradeAction::Sell, dec!(1), dec!(4));
        put.match_key = "AAPL240315P00150000".to_string();

        let outcome = match_transactions(vec![call, put]);
        assert_eq!(outcome.trades.len(), 2);
        assert!(outcome.trades.iter().all(|t| t.status == TradeStatus::Open));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_short_position_round_trip() {
        let mut open = tx(2, 1, "TSLA", TradeAction::Sell, dec!(4), dec!(200));
        open.direction = PositionDirection::Short;
        let mut cover = tx(3, 2, "TSLA", TradeAction::Buy, dec!(4), dec!(180));
        cover.direction = PositionDirection::Short;

        let outcome = match_transactions(vec![open, cover]);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].direction, PositionDirection::Short);
        assert_eq!(outcome.trades[0].pnl, Some(dec!(80)));
    }

    #[test]
    fn test_fees_charged_once_per_transaction() {
        let mut entry = tx(2, 1, "ABC", TradeAction::Buy, dec!(30), dec!(10));
        entry.fees = dec!(1);
        let mut exit_a = tx(3, 2, "ABC", TradeAction::Sell, dec!(10), dec!(12));
        exit_a.fees = dec!(0.5);
        let mut exit_b = tx(4, 3, "ABC", TradeAction::Sell, dec!(20), dec!(14));
        exit_b.fees = dec!(0.25);

        let outcome = match_transactions(vec![entry, exit_a, exit_b]);
        assert_eq!(outcome.trades[0].fees, dec!(1.5));
        assert_eq!(outcome.trades[0].pnl, Some(dec!(18.5)));
        assert_eq!(outcome.trades[1].fees, dec!(0.25));
        let total: Decimal = outcome.trades.iter().map(|t| t.fees).sum();
        assert_eq!(total, dec!(1.75));
    }

    #[test]
    fn test_pnl_overflow_keeps_trade_without_pnl() {
        let outcome = match_transactions(vec![
            tx(2, 1, "BIG", TradeAction::Buy, dec!(1000000000000000), dec!(1)),
            tx(3, 2, "BIG", TradeAction::Sell, dec!(1000000000000000), dec!(100000000000000)),
        ]);

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.quantity, dec!(1000000000000000));
        assert_eq!(trade.pnl, None);
        assert_eq!(trade.pnl_percent, None);
        assert_eq!(
            outcome.warnings,
            vec!["Row 3: P&L out of range for BIG; recorded without P&L".to_string()]
        );
    }

    #[test]
    fn test_group_order_follows_first_appearance() {
        let outcome = match_transactions(vec![
            tx(2, 3, "ZZZ", TradeAction::Buy, dec!(1), dec!(1)),
            tx(3, 1, "AAA", TradeAction::Buy, dec!(1), dec!(1)),
        ]);
        let symbols: Vec<&str> = outcome.trades.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ZZZ", "AAA"]);
    }
}
