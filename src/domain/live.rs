//! One scheduled live evaluation.
//!
//! Fetch recent prices, rebuild the rolling window, then under the store's
//! position lock load the stored position, evaluate once and persist whatever
//! changed. Notification comes after the commit; its failures are logged and
//! never undo a persisted transition.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::advisory::{GateVerdict, MarketContext};
use super::error::PairtraderError;
use super::observation::{PairSpec, PricePoint, change_pct};
use super::position::{Position, PositionState, StateKind, Trade, Transition};
use super::rolling::{RollingStatistics, ZScoreSample};
use super::signal::Signal;
use super::state_machine::PositionStateMachine;
use super::strategy::StrategyConfig;
use crate::ports::advisory_port::AdvisoryGate;
use crate::ports::data_port::MarketDataPort;
use crate::ports::notify_port::Notifier;
use crate::ports::store_port::{PositionStore, PositionWrite};

/// Intervals used for the market-context percentage change (24 hours at the
/// default hourly interval).
pub const CONTEXT_LOOKBACK: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub pair: PairSpec,
    pub strategy: StrategyConfig,
    /// Capital used to size a new position.
    pub capital: f64,
}

/// One row of the monitor log, written on every live step.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorRecord {
    pub timestamp: NaiveDateTime,
    pub price_a: f64,
    pub price_b: f64,
    pub ratio: f64,
    pub mean: f64,
    pub stddev: f64,
    pub z: Option<f64>,
    pub signal: Signal,
    pub state: StateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// An entry signal the advisory gate turned down.
    SignalRejected {
        signal: Signal,
        sample: ZScoreSample,
        verdict: GateVerdict,
    },
    Entered(Position),
    Exited(Trade),
}

pub struct LivePorts<'a> {
    pub data: &'a dyn MarketDataPort,
    pub gate: &'a dyn AdvisoryGate,
    pub store: &'a dyn PositionStore,
    pub notifier: &'a dyn Notifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveOutcome {
    pub sample: ZScoreSample,
    pub signal: Signal,
    pub verdict: Option<GateVerdict>,
    pub transition: Option<Transition>,
    pub state: PositionState,
}

pub fn run_once(
    now: NaiveDateTime,
    config: &LiveConfig,
    ports: &LivePorts<'_>,
) -> Result<LiveOutcome, PairtraderError> {
    config.strategy.validate()?;

    let pair = &config.pair;
    let intervals = config.strategy.window_size + CONTEXT_LOOKBACK;
    let start = now - pair.interval * intervals as i32;
    let points = ports.data.get_paired_series(
        &pair.instrument_a,
        &pair.instrument_b,
        start,
        now,
        pair.interval,
    )?;
    let Some(latest) = points.last() else {
        return Err(PairtraderError::NoData {
            instrument_a: pair.instrument_a.clone(),
            instrument_b: pair.instrument_b.clone(),
        });
    };

    let sample = replay(&points, config.strategy.window_size)?;
    let context = market_context(&points, latest);

    // Decided and persisted while the store holds the position lock.
    let mut decided = None;
    ports.store.update_position(&mut |stored| {
        let mut machine = PositionStateMachine::with_state(config.strategy.clone(), stored);
        let outcome = if sample.is_ready() {
            Some(machine.apply(&sample, config.capital, &context, ports.gate))
        } else {
            debug!(
                observations = points.len(),
                window = config.strategy.window_size,
                "z-score not ready, no action"
            );
            None
        };
        let state = machine.into_state();
        let write = match outcome.as_ref().and_then(|o| o.transition.as_ref()) {
            Some(Transition::Opened(_)) => PositionWrite {
                state: Some(state.clone()),
                trade: None,
            },
            Some(Transition::Closed(trade)) => PositionWrite {
                state: Some(state.clone()),
                trade: Some(trade.clone()),
            },
            None => PositionWrite::default(),
        };
        decided = Some((outcome, state));
        Ok(write)
    })?;
    let Some((outcome, state)) = decided else {
        return Err(PairtraderError::Storage {
            reason: "position update did not run".to_string(),
        });
    };
    let (signal, verdict, transition) = match outcome {
        Some(o) => (o.signal, o.verdict, o.transition),
        None => (Signal::Hold, None, None),
    };

    ports.store.append_monitor_sample(&MonitorRecord {
        timestamp: sample.timestamp,
        price_a: latest.price_a,
        price_b: latest.price_b,
        ratio: sample.ratio,
        mean: sample.mean,
        stddev: sample.stddev,
        z: sample.z,
        signal,
        state: state.kind(),
    })?;

    info!(
        timestamp = %sample.timestamp,
        ratio = sample.ratio,
        z = ?sample.z,
        %signal,
        state = %state.kind(),
        "live step evaluated"
    );

    if let Some(event) = notification(signal, &sample, verdict.as_ref(), transition.as_ref()) {
        if let Err(err) = ports.notifier.notify(&event) {
            warn!(error = %err, "notification failed");
        }
    }

    Ok(LiveOutcome {
        sample,
        signal,
        verdict,
        transition,
        state,
    })
}

fn replay(points: &[PricePoint], window_size: usize) -> Result<ZScoreSample, PairtraderError> {
    let mut stats = RollingStatistics::new(window_size);
    let mut last = None;
    for point in points {
        last = Some(stats.observe(point.timestamp, point.ratio())?);
    }
    last.ok_or_else(|| PairtraderError::MarketData {
        reason: "empty price series".to_string(),
    })
}

fn market_context(points: &[PricePoint], latest: &PricePoint) -> MarketContext {
    let change = change_pct(points, CONTEXT_LOOKBACK);
    MarketContext {
        price_a: latest.price_a,
        price_b: latest.price_b,
        change_pct_a: change.map(|(a, _)| a),
        change_pct_b: change.map(|(_, b)| b),
        news: Vec::new(),
    }
}

fn notification(
    signal: Signal,
    sample: &ZScoreSample,
    verdict: Option<&GateVerdict>,
    transition: Option<&Transition>,
) -> Option<NotificationEvent> {
    match (transition, verdict) {
        (Some(Transition::Opened(position)), _) => Some(NotificationEvent::Entered(position.clone())),
        (Some(Transition::Closed(trade)), _) => Some(NotificationEvent::Exited(trade.clone())),
        (None, Some(verdict)) if !verdict.is_approved() => Some(NotificationEvent::SignalRejected {
            signal,
            sample: *sample,
            verdict: verdict.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advisory::AdvisoryResponse;

    #[test]
    fn notification_prefers_transition() {
        let sample = ZScoreSample {
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            ratio: 1.03,
            mean: 1.0,
            stddev: 0.01,
            z: Some(2.5),
        };
        let rejected = GateVerdict::Rejected(AdvisoryResponse::pass(90, "risk"));
        let event = notification(Signal::EntryShortSpread, &sample, Some(&rejected), None);
        assert!(matches!(event, Some(NotificationEvent::SignalRejected { .. })));

        assert!(notification(Signal::Hold, &sample, None, None).is_none());
    }

    #[test]
    fn context_reports_latest_prices() {
        let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let points: Vec<PricePoint> = (0..30)
            .map(|i| PricePoint {
                timestamp: base + chrono::Duration::hours(i),
                price_a: 100.0 + i as f64,
                price_b: 50.0,
            })
            .collect();
        let ctx = market_context(&points, points.last().unwrap());
        assert!((ctx.price_a - 129.0).abs() < f64::EPSILON);
        let expected = (129.0 / 105.0 - 1.0) * 100.0;
        assert!((ctx.change_pct_a.unwrap() - expected).abs() < 1e-9);
        assert!((ctx.change_pct_b.unwrap() - 0.0).abs() < 1e-12);
    }
}
