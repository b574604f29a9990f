//! Deterministic historical replay.
//!
//! Per observation: observe -> (not ready: record, move on) -> evaluate ->
//! transition -> equity update. A position still open after the final
//! observation's evaluation is force-closed at that ratio in the same step.

use tracing::{debug, info};

use super::advisory::MarketContext;
use super::error::PairtraderError;
use super::metrics::Summary;
use super::observation::RatioObservation;
use super::portfolio::{EquityPoint, EquityState};
use super::position::{ExitReason, Trade, Transition};
use super::rolling::{RollingStatistics, ZScoreSample};
use super::state_machine::PositionStateMachine;
use super::strategy::StrategyConfig;
use crate::ports::advisory_port::AdvisoryGate;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub strategy: StrategyConfig,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), PairtraderError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(PairtraderError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        self.strategy.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub initial_capital: f64,
    /// One point per observation.
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    /// One sample per observation; `z` is `None` where undefined.
    pub samples: Vec<ZScoreSample>,
    pub summary: Summary,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.summary.final_equity
    }
}

pub fn run(
    series: &[RatioObservation],
    config: &BacktestConfig,
    gate: &dyn AdvisoryGate,
) -> Result<BacktestResult, PairtraderError> {
    config.validate()?;

    let mut stats = RollingStatistics::new(config.strategy.window_size);
    let mut machine = PositionStateMachine::new(config.strategy.clone());
    let mut equity = EquityState::new(config.initial_capital);
    let mut trades = Vec::new();
    let mut samples = Vec::with_capacity(series.len());
    let context = MarketContext::default();

    info!(
        observations = series.len(),
        window = config.strategy.window_size,
        initial_capital = config.initial_capital,
        "backtest started"
    );

    let last = series.len().saturating_sub(1);
    for (i, obs) in series.iter().enumerate() {
        let sample = stats.observe(obs.timestamp, obs.ratio)?;

        if sample.is_ready() {
            let outcome = machine.apply(&sample, equity.cash, &context, gate);
            if let Some(transition) = outcome.transition {
                book(&mut equity, &mut trades, transition);
            }
        } else {
            debug!(timestamp = %sample.timestamp, "z-score not ready");
        }

        if i == last {
            if let Some(trade) = machine.force_close(&sample, ExitReason::EndOfData) {
                book(&mut equity, &mut trades, Transition::Closed(trade));
            }
        }

        equity.record(obs.timestamp);
        samples.push(sample);
    }

    let summary = Summary::compute(&trades, &equity);
    info!(
        trades = summary.total_trades,
        final_equity = summary.final_equity,
        max_drawdown = summary.max_drawdown,
        "backtest finished"
    );

    Ok(BacktestResult {
        initial_capital: config.initial_capital,
        equity_curve: equity.equity_curve,
        trades,
        samples,
        summary,
    })
}

fn book(equity: &mut EquityState, trades: &mut Vec<Trade>, transition: Transition) {
    equity.apply(&transition);
    if let Transition::Closed(trade) = transition {
        trades.push(trade);
    }
}
