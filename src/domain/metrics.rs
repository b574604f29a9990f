//! Summary statistics over a trade log and the replay's equity state.

use super::portfolio::EquityState;
use super::position::{ExitReason, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub total_cost: f64,
    pub total_net_pnl: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade_duration_hours: f64,
    pub stop_losses: usize,
    pub forced_closes: usize,
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
}

impl Summary {
    /// Drawdown is taken from `equity`, which tracks it step by step.
    pub fn compute(trades: &[Trade], equity: &EquityState) -> Self {
        let initial_capital = equity.initial_capital;
        let final_equity = equity.final_equity();

        let total_return_pct = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital * 100.0
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_cost = 0.0_f64;
        let mut total_net_pnl = 0.0_f64;
        let mut total_hours = 0.0_f64;
        let mut stop_losses = 0usize;
        let mut forced_closes = 0usize;

        for trade in trades {
            let pnl = trade.net_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                if pnl > largest_win {
                    largest_win = pnl;
                }
            } else {
                trades_lost += 1;
                total_losses += pnl.abs();
                if pnl.abs() > largest_loss {
                    largest_loss = pnl.abs();
                }
            }
            match trade.exit_reason {
                ExitReason::StopLoss => stop_losses += 1,
                ExitReason::EndOfData => forced_closes += 1,
                ExitReason::Exit => {}
            }
            total_cost += trade.total_cost;
            total_net_pnl += pnl;
            total_hours += trade.duration_hours();
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_trade_duration_hours = if total_trades > 0 {
            total_hours / total_trades as f64
        } else {
            0.0
        };

        Summary {
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            total_cost,
            total_net_pnl,
            profit_factor,
            largest_win,
            largest_loss,
            avg_trade_duration_hours,
            stop_losses,
            forced_closes,
            max_drawdown: equity.max_drawdown,
            final_equity,
            total_return_pct,
        }
    }
}
