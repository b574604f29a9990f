//! Equity tracking for the backtest.
//!
//! Costs are booked when paid: an opening step debits the entry cost, and the
//! closing step credits the remainder of the trade (`net_pnl + entry_cost`).
//! Over a completed trade equity therefore moves by exactly `net_pnl`.

use chrono::NaiveDateTime;

use super::position::Transition;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityState {
    pub initial_capital: f64,
    pub cash: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub peak_equity: f64,
    /// Largest `(peak - equity) / peak` seen so far.
    pub max_drawdown: f64,
}

impl EquityState {
    pub fn new(initial_capital: f64) -> Self {
        EquityState {
            initial_capital,
            cash: initial_capital,
            equity_curve: Vec::new(),
            peak_equity: initial_capital,
            max_drawdown: 0.0,
        }
    }

    /// Change in equity caused by a transition.
    pub fn delta(transition: &Transition) -> f64 {
        match transition {
            Transition::Opened(position) => -position.entry_cost,
            // Both sides trade the same notional, so half the cost was paid at entry.
            Transition::Closed(trade) => trade.net_pnl + (trade.total_cost / 2.0),
        }
    }

    pub fn apply(&mut self, transition: &Transition) {
        self.cash += Self::delta(transition);
    }

    /// Append the current equity as the point for `timestamp`.
    pub fn record(&mut self, timestamp: NaiveDateTime) {
        let equity = self.cash;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn final_equity(&self) -> f64 {
        self.cash
    }
}
