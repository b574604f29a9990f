#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use pairtrader::domain::advisory::{AdvisoryRequest, AdvisoryResponse};
use pairtrader::domain::backtest::BacktestConfig;
use pairtrader::domain::error::{AdvisoryError, PairtraderError};
use pairtrader::domain::live::{LiveConfig, MonitorRecord, NotificationEvent};
use pairtrader::domain::observation::{PairSpec, PricePoint, RatioObservation};
use pairtrader::domain::position::{PositionState, Trade};
use pairtrader::domain::strategy::StrategyConfig;
use pairtrader::ports::advisory_port::AdvisoryGate;
use pairtrader::ports::data_port::MarketDataPort;
use pairtrader::ports::notify_port::Notifier;
use pairtrader::ports::store_port::{PositionStore, PositionWrite};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub const CAPITAL: f64 = 10_000.0;

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(i as i64)
}

/// `n` ratios alternating 0.99 / 1.01: mean 1.0, small stddev.
pub fn base(n: usize) -> Vec<f64> {
    (0..n).map(|i| if i % 2 == 0 { 0.99 } else { 1.01 }).collect()
}

pub fn with_tail(n: usize, tail: &[f64]) -> Vec<f64> {
    let mut ratios = base(n);
    ratios.extend_from_slice(tail);
    ratios
}

pub fn series(ratios: &[f64]) -> Vec<RatioObservation> {
    ratios
        .iter()
        .enumerate()
        .map(|(i, &ratio)| RatioObservation {
            timestamp: ts(i),
            ratio,
        })
        .collect()
}

/// Hourly prices whose ratio is exactly `ratios[i]`.
pub fn prices(ratios: &[f64]) -> Vec<PricePoint> {
    ratios
        .iter()
        .enumerate()
        .map(|(i, &ratio)| PricePoint {
            timestamp: ts(i),
            price_a: ratio,
            price_b: 1.0,
        })
        .collect()
}

pub fn strategy(window_size: usize) -> StrategyConfig {
    StrategyConfig {
        window_size,
        ..StrategyConfig::default()
    }
}

pub fn backtest_config(window_size: usize) -> BacktestConfig {
    BacktestConfig {
        initial_capital: CAPITAL,
        strategy: strategy(window_size),
    }
}

pub fn pair() -> PairSpec {
    PairSpec {
        instrument_a: "AAA".to_string(),
        instrument_b: "BBB".to_string(),
        interval: Duration::hours(1),
    }
}

pub fn live_config(window_size: usize) -> LiveConfig {
    LiveConfig {
        pair: pair(),
        strategy: strategy(window_size),
        capital: CAPITAL,
    }
}

pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

pub struct MockDataPort {
    pub points: Vec<PricePoint>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self {
            points,
            error: None,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn get_paired_series(
        &self,
        _instrument_a: &str,
        _instrument_b: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        _interval: Duration,
    ) -> Result<Vec<PricePoint>, PairtraderError> {
        if let Some(reason) = &self.error {
            return Err(PairtraderError::MarketData {
                reason: reason.clone(),
            });
        }
        Ok(self
            .points
            .iter()
            .filter(|p| p.timestamp >= start && p.timestamp <= end)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockStore {
    pub state: RefCell<PositionState>,
    pub trades: RefCell<Vec<Trade>>,
    pub monitor: RefCell<Vec<MonitorRecord>>,
    pub saves: Cell<usize>,
}

impl PositionStore for MockStore {
    fn load_position(&self) -> Result<PositionState, PairtraderError> {
        Ok(self.state.borrow().clone())
    }

    fn update_position(
        &self,
        update: &mut dyn FnMut(PositionState) -> Result<PositionWrite, PairtraderError>,
    ) -> Result<(), PairtraderError> {
        let current = self.state.borrow().clone();
        let write = update(current)?;
        if let Some(state) = write.state {
            *self.state.borrow_mut() = state;
            self.saves.set(self.saves.get() + 1);
        }
        if let Some(trade) = write.trade {
            self.trades.borrow_mut().push(trade);
        }
        Ok(())
    }

    fn append_monitor_sample(&self, record: &MonitorRecord) -> Result<(), PairtraderError> {
        self.monitor.borrow_mut().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub events: RefCell<Vec<NotificationEvent>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn failing() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            fail: true,
        }
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, event: &NotificationEvent) -> Result<(), PairtraderError> {
        self.events.borrow_mut().push(event.clone());
        if self.fail {
            return Err(PairtraderError::Notification {
                reason: "channel down".to_string(),
            });
        }
        Ok(())
    }
}

/// Answers from a queue, then passes once the queue is empty.
#[derive(Default)]
pub struct ScriptedGate {
    pub responses: RefCell<VecDeque<Result<AdvisoryResponse, AdvisoryError>>>,
    pub requests: RefCell<Vec<AdvisoryRequest>>,
}

impl ScriptedGate {
    pub fn new(responses: Vec<Result<AdvisoryResponse, AdvisoryError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl AdvisoryGate for ScriptedGate {
    fn approve(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(AdvisoryResponse::pass(0, "script exhausted")))
    }
}
