//! Position lifecycle: NO_POSITION <-> OPEN.
//!
//! The machine owns no I/O. Each step takes a ready z-score sample, evaluates
//! the signal against the current state, consults the advisory gate for a
//! candidate entry, and reports whatever transition happened.

use tracing::{debug, info, warn};

use super::advisory::{AdvisoryRequest, GateVerdict, MarketContext};
use super::cost::pair_cost;
use super::position::{ExitReason, Position, PositionState, Trade, Transition};
use super::rolling::ZScoreSample;
use super::signal::{Signal, evaluate_sample};
use super::strategy::StrategyConfig;
use crate::ports::advisory_port::AdvisoryGate;

/// What one step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub signal: Signal,
    /// Present only when the gate was consulted.
    pub verdict: Option<GateVerdict>,
    pub transition: Option<Transition>,
}

impl StepOutcome {
    fn idle(signal: Signal) -> Self {
        StepOutcome {
            signal,
            verdict: None,
            transition: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    config: StrategyConfig,
    state: PositionState,
}

impl PositionStateMachine {
    pub fn new(config: StrategyConfig) -> Self {
        Self::with_state(config, PositionState::Flat)
    }

    /// Resume from a persisted state.
    pub fn with_state(config: StrategyConfig, state: PositionState) -> Self {
        PositionStateMachine { config, state }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn into_state(self) -> PositionState {
        self.state
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Evaluate one sample. `capital` sizes a new position.
    pub fn apply(
        &mut self,
        sample: &ZScoreSample,
        capital: f64,
        context: &MarketContext,
        gate: &dyn AdvisoryGate,
    ) -> StepOutcome {
        let signal = evaluate_sample(sample, self.state.direction(), &self.config.thresholds);

        match signal {
            Signal::EntryLongSpread | Signal::EntryShortSpread if !self.state.is_open() => {
                self.try_open(signal, sample, capital, context, gate)
            }
            Signal::Exit | Signal::StopLoss if self.state.is_open() => {
                let reason = if signal == Signal::StopLoss {
                    ExitReason::StopLoss
                } else {
                    ExitReason::Exit
                };
                let transition = self.close(sample, reason).map(Transition::Closed);
                StepOutcome {
                    signal,
                    verdict: None,
                    transition,
                }
            }
            _ => StepOutcome::idle(signal),
        }
    }

    /// Close any open position at the sample's ratio, regardless of signal.
    pub fn force_close(&mut self, sample: &ZScoreSample, reason: ExitReason) -> Option<Trade> {
        self.close(sample, reason)
    }

    fn try_open(
        &mut self,
        signal: Signal,
        sample: &ZScoreSample,
        capital: f64,
        context: &MarketContext,
        gate: &dyn AdvisoryGate,
    ) -> StepOutcome {
        let (Some(direction), Some(z)) = (signal.entry_direction(), sample.z) else {
            return StepOutcome::idle(signal);
        };

        let request = AdvisoryRequest {
            direction,
            timestamp: sample.timestamp,
            z,
            ratio: sample.ratio,
            context: context.clone(),
        };
        let verdict = GateVerdict::judge(gate.approve(&request), self.config.min_confidence);

        match &verdict {
            GateVerdict::Approved(response) => {
                debug!(confidence = response.confidence, reason = %response.reason, "advisory approved entry");
            }
            GateVerdict::Rejected(response) => {
                info!(
                    %signal,
                    decision = %response.decision,
                    confidence = response.confidence,
                    reason = %response.reason,
                    "entry rejected by advisory gate"
                );
                return StepOutcome {
                    signal,
                    verdict: Some(verdict),
                    transition: None,
                };
            }
            GateVerdict::Unavailable(err) => {
                warn!(%signal, error = %err, "advisory gate unavailable, treating as reject");
                return StepOutcome {
                    signal,
                    verdict: Some(verdict),
                    transition: None,
                };
            }
        }

        let notional_per_leg = self.config.notional_per_leg(capital);
        if !(notional_per_leg > 0.0) {
            warn!(capital, "no capital available, entry skipped");
            return StepOutcome {
                signal,
                verdict: Some(verdict),
                transition: None,
            };
        }

        let position = Position {
            direction,
            entry_timestamp: sample.timestamp,
            entry_ratio: sample.ratio,
            entry_z: z,
            notional_per_leg,
            entry_cost: pair_cost(notional_per_leg, self.config.fee_rate),
        };
        info!(
            direction = %position.direction,
            timestamp = %position.entry_timestamp,
            ratio = position.entry_ratio,
            z,
            notional_per_leg,
            "position opened"
        );
        self.state = PositionState::Open(position.clone());

        StepOutcome {
            signal,
            verdict: Some(verdict),
            transition: Some(Transition::Opened(position)),
        }
    }

    fn close(&mut self, sample: &ZScoreSample, reason: ExitReason) -> Option<Trade> {
        let PositionState::Open(position) = std::mem::take(&mut self.state) else {
            return None;
        };

        let gross_pnl = position.gross_pnl(sample.ratio);
        let exit_cost = pair_cost(position.notional_per_leg, self.config.fee_rate);
        let total_cost = position.entry_cost + exit_cost;
        let trade = Trade {
            entry_timestamp: position.entry_timestamp,
            exit_timestamp: sample.timestamp,
            direction: position.direction,
            entry_ratio: position.entry_ratio,
            exit_ratio: sample.ratio,
            entry_z: position.entry_z,
            // A degenerate final window has no z; record the mean-reverted value.
            exit_z: sample.z.unwrap_or(0.0),
            notional_per_leg: position.notional_per_leg,
            gross_pnl,
            total_cost,
            net_pnl: gross_pnl - total_cost,
            exit_reason: reason,
        };
        info!(
            direction = %trade.direction,
            reason = %trade.exit_reason,
            timestamp = %trade.exit_timestamp,
            ratio = trade.exit_ratio,
            net_pnl = trade.net_pnl,
            "position closed"
        );
        Some(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advisory::AdvisoryResponse;
    use crate::domain::error::AdvisoryError;
    use crate::domain::position::StateKind;
    use crate::domain::signal::Direction;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::cell::Cell;

    struct Approve;
    impl AdvisoryGate for Approve {
        fn approve(&self, _: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
            Ok(AdvisoryResponse::entry(100, "ok"))
        }
    }

    struct Failing;
    impl AdvisoryGate for Failing {
        fn approve(&self, _: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
            Err(AdvisoryError::Failed("connection refused".into()))
        }
    }

    struct Counting(Cell<usize>);
    impl AdvisoryGate for Counting {
        fn approve(&self, _: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
            self.0.set(self.0.get() + 1);
            Ok(AdvisoryResponse::pass(90, "headline risk"))
        }
    }

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(i)
    }

    fn sample(i: i64, ratio: f64, z: Option<f64>) -> ZScoreSample {
        ZScoreSample {
            timestamp: ts(i),
            ratio,
            mean: 1.0,
            stddev: 0.01,
            z,
        }
    }

    fn machine() -> PositionStateMachine {
        PositionStateMachine::new(StrategyConfig::default())
    }

    fn ctx() -> MarketContext {
        MarketContext::default()
    }

    #[test]
    fn opens_short_on_high_z_when_approved() {
        let mut m = machine();
        let out = m.apply(&sample(0, 1.03, Some(2.34)), 10_000.0, &ctx(), &Approve);
        assert_eq!(out.signal, Signal::EntryShortSpread);
        assert!(out.verdict.as_ref().is_some_and(GateVerdict::is_approved));
        let Some(Transition::Opened(pos)) = out.transition else {
            panic!("expected open");
        };
        assert_eq!(pos.direction, Direction::ShortSpread);
        assert!((pos.notional_per_leg - 2500.0).abs() < f64::EPSILON);
        assert!((pos.entry_cost - 7.5).abs() < 1e-12);
        assert_eq!(m.state().kind(), StateKind::Open);
    }

    #[test]
    fn round_trip_pnl_and_costs() {
        let mut m = machine();
        m.apply(&sample(0, 1.03, Some(2.34)), 10_000.0, &ctx(), &Approve);
        let out = m.apply(&sample(1, 1.0, Some(-0.127)), 10_000.0, &ctx(), &Approve);
        assert_eq!(out.signal, Signal::Exit);
        let Some(Transition::Closed(trade)) = out.transition else {
            panic!("expected close");
        };
        let gross = -2500.0 * (1.0 - 1.03) / 1.03;
        assert!((trade.gross_pnl - gross).abs() < 1e-9);
        assert!((trade.total_cost - 15.0).abs() < 1e-12);
        assert!((trade.net_pnl - (gross - 15.0)).abs() < 1e-9);
        assert_eq!(trade.exit_reason, ExitReason::Exit);
        assert_eq!(m.state(), &PositionState::Flat);
    }

    #[test]
    fn stop_loss_closes_with_reason() {
        let mut m = machine();
        m.apply(&sample(0, 0.97, Some(-2.4)), 10_000.0, &ctx(), &Approve);
        let out = m.apply(&sample(1, 0.9, Some(-4.2)), 10_000.0, &ctx(), &Approve);
        assert_eq!(out.signal, Signal::StopLoss);
        let Some(Transition::Closed(trade)) = out.transition else {
            panic!("expected close");
        };
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!(trade.gross_pnl < 0.0);
    }

    #[test]
    fn rejected_entry_stays_flat() {
        let gate = Counting(Cell::new(0));
        let mut m = machine();
        let out = m.apply(&sample(0, 1.03, Some(2.34)), 10_000.0, &ctx(), &gate);
        assert!(matches!(out.verdict, Some(GateVerdict::Rejected(_))));
        assert!(out.transition.is_none());
        assert_eq!(gate.0.get(), 1);
        assert_eq!(m.state(), &PositionState::Flat);
    }

    #[test]
    fn gate_failure_is_reject() {
        let mut m = machine();
        let out = m.apply(&sample(0, 1.03, Some(2.34)), 10_000.0, &ctx(), &Failing);
        assert!(matches!(out.verdict, Some(GateVerdict::Unavailable(_))));
        assert!(out.transition.is_none());
        assert!(!m.state().is_open());
    }

    #[test]
    fn gate_not_consulted_without_entry_signal() {
        let gate = Counting(Cell::new(0));
        let mut m = machine();
        m.apply(&sample(0, 1.0, Some(1.0)), 10_000.0, &ctx(), &gate);
        m.apply(&sample(1, 1.0, None), 10_000.0, &ctx(), &gate);
        assert_eq!(gate.0.get(), 0);
    }

    #[test]
    fn entry_while_open_is_ignored() {
        let gate = Counting(Cell::new(0));
        let mut m = machine();
        m.apply(&sample(0, 1.03, Some(2.34)), 10_000.0, &ctx(), &Approve);
        let out = m.apply(&sample(1, 1.04, Some(2.9)), 10_000.0, &ctx(), &gate);
        assert_eq!(out.signal, Signal::Hold);
        assert!(out.transition.is_none());
        assert_eq!(gate.0.get(), 0);
    }

    #[test]
    fn exit_while_flat_is_ignored() {
        let mut m = machine();
        let out = m.apply(&sample(0, 1.0, Some(0.1)), 10_000.0, &ctx(), &Approve);
        assert_eq!(out.signal, Signal::Hold);
        assert!(out.transition.is_none());
    }

    #[test]
    fn force_close_uses_given_reason() {
        let mut m = machine();
        assert!(m.force_close(&sample(0, 1.0, Some(0.0)), ExitReason::EndOfData).is_none());

        m.apply(&sample(1, 1.03, Some(2.34)), 10_000.0, &ctx(), &Approve);
        let trade = m
            .force_close(&sample(2, 1.035, Some(2.27)), ExitReason::EndOfData)
            .unwrap();
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert!((trade.exit_ratio - 1.035).abs() < f64::EPSILON);
        assert!(!m.state().is_open());
    }

    #[test]
    fn resumes_from_persisted_state() {
        let position = Position {
            direction: Direction::LongSpread,
            entry_timestamp: ts(0),
            entry_ratio: 0.97,
            entry_z: -2.4,
            notional_per_leg: 2500.0,
            entry_cost: 7.5,
        };
        let mut m = PositionStateMachine::with_state(
            StrategyConfig::default(),
            PositionState::Open(position),
        );
        let out = m.apply(&sample(5, 1.0, Some(0.2)), 10_000.0, &ctx(), &Approve);
        assert!(matches!(out.transition, Some(Transition::Closed(_))));
    }
}
