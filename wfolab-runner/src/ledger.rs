//! Simplified trade ledger — walks a SignalSet once, bar by bar.
//!
//! Rules:
//! - At most one open position per side; long and short books are independent.
//! - Fills happen at the bar close, adjusted by the cost model.
//! - On each bar exits are processed before entries.
//! - No entries on the final bar; anything still open is force-closed there.
//! - Equity starts at 1.0 and compounds realized trade returns; open positions
//!   are marked to market on every bar.

use serde::{Deserialize, Serialize};
use wfolab_core::domain::{OpenPosition, PositionSide};
use wfolab_core::SignalSet;

use crate::costs::{CostModel, FillSide};

/// A closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Return after slippage and both commissions.
    pub net_return: f64,
    pub bars_held: usize,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.net_return > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerOutcome {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
}

fn entry_fill(side: PositionSide) -> FillSide {
    match side {
        PositionSide::Long => FillSide::Buy,
        PositionSide::Short => FillSide::Sell,
    }
}

fn exit_fill(side: PositionSide) -> FillSide {
    match side {
        PositionSide::Long => FillSide::Sell,
        PositionSide::Short => FillSide::Buy,
    }
}

fn close_position(pos: OpenPosition, index: usize, close: f64, costs: &CostModel) -> Trade {
    let exit_price = costs.fill_price(close, exit_fill(pos.side));
    let gross = pos.unrealized_return(exit_price);
    Trade {
        side: pos.side,
        entry_index: pos.entry_index,
        exit_index: index,
        entry_price: pos.entry_price,
        exit_price,
        net_return: gross - 2.0 * costs.commission_fraction(),
        bars_held: index - pos.entry_index,
    }
}

/// Run the ledger over `closes` and the aligned signals.
///
/// Bars beyond the shorter of the two inputs are ignored.
pub fn run_ledger(closes: &[f64], signals: &SignalSet, costs: &CostModel) -> LedgerOutcome {
    let n = closes.len().min(signals.len());
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(n);
    let mut realized = 1.0_f64;
    let mut long: Option<OpenPosition> = None;
    let mut short: Option<OpenPosition> = None;

    for (i, &close) in closes.iter().enumerate().take(n) {
        let last = i + 1 == n;

        for (book, exit) in [
            (&mut long, signals.long_exit[i]),
            (&mut short, signals.short_exit[i]),
        ] {
            if exit || last {
                if let Some(pos) = book.take() {
                    let trade = close_position(pos, i, close, costs);
                    realized *= 1.0 + trade.net_return;
                    trades.push(trade);
                }
            }
        }

        if !last {
            for (book, entry, side) in [
                (&mut long, signals.long_entry[i], PositionSide::Long),
                (&mut short, signals.short_entry[i], PositionSide::Short),
            ] {
                if entry && book.is_none() {
                    *book = Some(OpenPosition {
                        side,
                        entry_index: i,
                        entry_price: costs.fill_price(close, entry_fill(side)),
                    });
                }
            }
        }

        let open_pnl: f64 = [long, short]
            .iter()
            .flatten()
            .map(|pos| pos.unrealized_return(close))
            .sum();
        equity_curve.push(realized * (1.0 + open_pnl));
    }

    LedgerOutcome {
        trades,
        equity_curve,
    }
}
